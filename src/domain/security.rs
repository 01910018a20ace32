// Copyright (c) 2025 - Cowboy AI, Inc.
//! Security Boundary Value Objects
//!
//! Ingress rules are `(protocol, port, source)` triples. A boundary only ever
//! gains rules; there is no removal.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::NetworkError;
use crate::graph::NodeId;

/// Transport protocol of an ingress rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp => write!(f, "tcp"),
            Self::Udp => write!(f, "udp"),
        }
    }
}

/// Transport port (1-65535)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Port(u16);

impl Port {
    pub const SSH: Port = Port(22);
    pub const HTTP: Port = Port(80);
    pub const HTTPS: Port = Port(443);

    /// Create a port, rejecting 0 and anything above 65535
    pub fn new(port: u32) -> Result<Self, NetworkError> {
        match u16::try_from(port) {
            Ok(p) if p != 0 => Ok(Self(p)),
            _ => Err(NetworkError::InvalidPort(port)),
        }
    }

    pub fn value(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u32> for Port {
    type Error = NetworkError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Port> for u32 {
    fn from(port: Port) -> Self {
        u32::from(port.0)
    }
}

/// Where admitted traffic may originate
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "scope", content = "boundary", rename_all = "snake_case")]
pub enum SourceScope {
    /// Any IPv4 address
    AnyIpv4,
    /// Members of another security boundary in the same graph
    Boundary(NodeId),
}

impl fmt::Display for SourceScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AnyIpv4 => write!(f, "0.0.0.0/0"),
            Self::Boundary(id) => write!(f, "boundary:{}", id),
        }
    }
}

/// Protocol/port pair carried by a relationship edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortConstraint {
    pub protocol: Protocol,
    pub port: Port,
}

impl PortConstraint {
    pub fn tcp(port: Port) -> Self {
        Self {
            protocol: Protocol::Tcp,
            port,
        }
    }
}

impl fmt::Display for PortConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.protocol, self.port)
    }
}

/// A single ingress rule of a security boundary
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IngressRule {
    pub protocol: Protocol,
    pub port: Port,
    pub source: SourceScope,
    pub description: String,
}

impl IngressRule {
    /// TCP rule admitting `port` from `source`
    pub fn tcp(port: Port, source: SourceScope, description: impl Into<String>) -> Self {
        Self {
            protocol: Protocol::Tcp,
            port,
            source,
            description: description.into(),
        }
    }

    /// Constraint equivalent of this rule, for matching against edges
    pub fn constraint(&self) -> PortConstraint {
        PortConstraint {
            protocol: self.protocol,
            port: self.port,
        }
    }

    /// Boundary this rule trusts, if its source is another boundary
    pub fn source_boundary(&self) -> Option<&NodeId> {
        match &self.source {
            SourceScope::Boundary(id) => Some(id),
            SourceScope::AnyIpv4 => None,
        }
    }
}

impl fmt::Display for IngressRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "allow {}/{} from {}", self.protocol, self.port, self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(0 ; "zero is reserved")]
    #[test_case(65536 ; "above u16")]
    #[test_case(100_000 ; "far out of range")]
    fn test_invalid_port(value: u32) {
        assert_eq!(Port::new(value), Err(NetworkError::InvalidPort(value)));
    }

    #[test_case(1)]
    #[test_case(5000)]
    #[test_case(17388)]
    #[test_case(65535)]
    fn test_valid_port(value: u32) {
        assert_eq!(u32::from(Port::new(value).unwrap()), value);
    }

    #[test]
    fn test_any_ipv4_rule() {
        let rule = IngressRule::tcp(Port::SSH, SourceScope::AnyIpv4, "Allow SSH Connections.");
        assert_eq!(rule.constraint(), PortConstraint::tcp(Port::SSH));
        assert!(rule.source_boundary().is_none());
        assert_eq!(rule.to_string(), "allow tcp/22 from 0.0.0.0/0");
    }

    #[test]
    fn test_boundary_source() {
        let id = NodeId::new("tpb-compute-boundary").unwrap();
        let rule = IngressRule::tcp(Port::new(17388).unwrap(), SourceScope::Boundary(id.clone()), "db");
        assert_eq!(rule.source_boundary(), Some(&id));
        assert_eq!(rule.constraint(), PortConstraint::tcp(Port::new(17388).unwrap()));
    }
}
