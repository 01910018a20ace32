// Copyright (c) 2025 - Cowboy AI, Inc.
//! Network Value Objects with Validation Invariants
//!
//! Address space for the stack network and the fixed-size subnet partitions
//! carved out of it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;
use thiserror::Error;

/// Network validation error
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NetworkError {
    #[error("Invalid IP address format: {0}")]
    InvalidIpAddress(String),

    #[error("Invalid CIDR notation: {0}")]
    InvalidCidr(String),

    #[error("Invalid prefix length: {0} (must be 0-32 for IPv4)")]
    InvalidPrefixLength(u8),

    #[error("CIDR block has host bits set: {0}")]
    HostBitsSet(String),

    #[error("Subnet mask /{mask} is shorter than the parent block /{parent}")]
    MaskShorterThanParent { mask: u8, parent: u8 },

    #[error("Requested {requested} subnets of /{mask} but {block} only holds {available}")]
    AddressSpaceExhausted {
        requested: usize,
        mask: u8,
        block: String,
        available: u64,
    },

    #[error("Invalid port: {0} (must be 1-65535)")]
    InvalidPort(u32),
}

/// IPv4 network block in CIDR notation
///
/// Invariants:
/// - Valid dotted-quad address
/// - Prefix length 0-32
/// - No host bits set (the address is the network address)
///
/// # Examples
///
/// ```rust
/// use tpb_infrastructure::domain::Ipv4Cidr;
///
/// let block = Ipv4Cidr::new("10.0.0.0/24").unwrap();
/// assert_eq!(block.prefix_length(), 24);
/// assert_eq!(block.size(), 256);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ipv4Cidr {
    address: Ipv4Addr,
    prefix_length: u8,
}

impl Ipv4Cidr {
    /// Parse and validate a CIDR block such as `10.0.0.0/24`
    pub fn new(cidr: impl AsRef<str>) -> Result<Self, NetworkError> {
        let cidr = cidr.as_ref();

        let (addr_str, prefix_str) = cidr
            .split_once('/')
            .ok_or_else(|| NetworkError::InvalidCidr(cidr.to_string()))?;

        let address = Ipv4Addr::from_str(addr_str)
            .map_err(|_| NetworkError::InvalidIpAddress(addr_str.to_string()))?;

        let prefix_length = prefix_str
            .parse::<u8>()
            .map_err(|_| NetworkError::InvalidCidr(cidr.to_string()))?;

        Self::from_parts(address, prefix_length)
    }

    /// Create from a network address and prefix length
    pub fn from_parts(address: Ipv4Addr, prefix_length: u8) -> Result<Self, NetworkError> {
        if prefix_length > 32 {
            return Err(NetworkError::InvalidPrefixLength(prefix_length));
        }

        // Invariant: the address must be the first address of the block
        if u32::from(address) & !Self::mask_bits(prefix_length) != 0 {
            return Err(NetworkError::HostBitsSet(format!(
                "{}/{}",
                address, prefix_length
            )));
        }

        Ok(Self {
            address,
            prefix_length,
        })
    }

    fn mask_bits(prefix_length: u8) -> u32 {
        if prefix_length == 0 {
            0
        } else {
            u32::MAX << (32 - u32::from(prefix_length))
        }
    }

    /// Network address
    pub fn address(&self) -> Ipv4Addr {
        self.address
    }

    /// Prefix length
    pub fn prefix_length(&self) -> u8 {
        self.prefix_length
    }

    /// Number of addresses in the block
    pub fn size(&self) -> u64 {
        1u64 << (32 - u32::from(self.prefix_length))
    }

    fn first(&self) -> u64 {
        u64::from(u32::from(self.address))
    }

    fn last(&self) -> u64 {
        self.first() + self.size() - 1
    }

    /// Whether `other` lies entirely within this block
    pub fn contains(&self, other: &Ipv4Cidr) -> bool {
        other.first() >= self.first() && other.last() <= self.last()
    }

    /// Whether the two blocks share any address
    pub fn overlaps(&self, other: &Ipv4Cidr) -> bool {
        self.first() <= other.last() && other.first() <= self.last()
    }

    /// Carve `count` sequential, equal-size `/mask` blocks out of this one
    pub fn partition(&self, mask: u8, count: usize) -> Result<Vec<Ipv4Cidr>, NetworkError> {
        if mask > 32 {
            return Err(NetworkError::InvalidPrefixLength(mask));
        }
        if mask < self.prefix_length {
            return Err(NetworkError::MaskShorterThanParent {
                mask,
                parent: self.prefix_length,
            });
        }

        let available = 1u64 << u32::from(mask - self.prefix_length);
        if count as u64 > available {
            return Err(NetworkError::AddressSpaceExhausted {
                requested: count,
                mask,
                block: self.to_string(),
                available,
            });
        }

        let step = 1u64 << (32 - u32::from(mask));
        (0..count as u64)
            .map(|i| {
                let start = self.first() + i * step;
                // start stays below 2^32 because count <= available
                Self::from_parts(Ipv4Addr::from(start as u32), mask)
            })
            .collect()
    }
}

impl fmt::Display for Ipv4Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.prefix_length)
    }
}

impl FromStr for Ipv4Cidr {
    type Err = NetworkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Ipv4Cidr {
    type Error = NetworkError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Ipv4Cidr> for String {
    fn from(cidr: Ipv4Cidr) -> Self {
        cidr.to_string()
    }
}

/// Subnet routing type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubnetKind {
    /// Routable from the internet through the network's gateway
    Public,
    /// No route in or out of the network
    Isolated,
}

impl SubnetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Isolated => "isolated",
        }
    }

    pub fn is_public_routable(&self) -> bool {
        matches!(self, Self::Public)
    }
}

impl fmt::Display for SubnetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cidr() {
        let block = Ipv4Cidr::new("10.0.0.0/24").unwrap();
        assert_eq!(block.address().to_string(), "10.0.0.0");
        assert_eq!(block.prefix_length(), 24);
        assert_eq!(block.to_string(), "10.0.0.0/24");
    }

    #[test]
    fn test_invalid_cidr() {
        assert!(matches!(
            Ipv4Cidr::new("10.0.0.0"),
            Err(NetworkError::InvalidCidr(_))
        ));
        assert!(matches!(
            Ipv4Cidr::new("999.0.0.0/8"),
            Err(NetworkError::InvalidIpAddress(_))
        ));
        assert!(matches!(
            Ipv4Cidr::new("10.0.0.0/33"),
            Err(NetworkError::InvalidPrefixLength(33))
        ));
        assert!(matches!(
            Ipv4Cidr::new("10.0.0.1/24"),
            Err(NetworkError::HostBitsSet(_))
        ));
    }

    #[test]
    fn test_partition_is_sequential_and_disjoint() {
        let block = Ipv4Cidr::new("10.0.0.0/24").unwrap();
        let subnets = block.partition(28, 3).unwrap();

        let rendered: Vec<String> = subnets.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, vec!["10.0.0.0/28", "10.0.0.16/28", "10.0.0.32/28"]);

        for (i, a) in subnets.iter().enumerate() {
            assert!(block.contains(a));
            for b in subnets.iter().skip(i + 1) {
                assert!(!a.overlaps(b));
            }
        }
    }

    #[test]
    fn test_partition_exhausts_address_space() {
        let block = Ipv4Cidr::new("10.0.0.0/24").unwrap();
        assert_eq!(block.partition(28, 16).unwrap().len(), 16);
        assert!(matches!(
            block.partition(28, 17),
            Err(NetworkError::AddressSpaceExhausted { available: 16, .. })
        ));
    }

    #[test]
    fn test_partition_rejects_wider_mask() {
        let block = Ipv4Cidr::new("10.0.0.0/24").unwrap();
        assert!(matches!(
            block.partition(16, 1),
            Err(NetworkError::MaskShorterThanParent { mask: 16, parent: 24 })
        ));
    }

    #[test]
    fn test_cidr_serde_as_string() {
        let block = Ipv4Cidr::new("10.0.0.0/24").unwrap();
        let json = serde_json::to_string(&block).unwrap();
        assert_eq!(json, "\"10.0.0.0/24\"");
        let back: Ipv4Cidr = serde_json::from_str(&json).unwrap();
        assert_eq!(back, block);
        assert!(serde_json::from_str::<Ipv4Cidr>("\"10.0.0.7/24\"").is_err());
    }
}
