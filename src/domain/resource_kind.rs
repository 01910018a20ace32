// Copyright (c) 2025 - Cowboy AI, Inc.
//! Resource Kind Domain Model
//!
//! Defines the taxonomy of resources a stack graph can declare. The kind
//! decides which category a node belongs to and which lifecycle defaults the
//! backend applies when nothing more specific is declared.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Declared resource kind taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    // Network
    /// Virtual network (address space)
    Network,
    /// Subnet partition of a network
    Subnet,
    /// Additive set of ingress rules attached to one resource
    SecurityBoundary,
    /// Internet-facing application load balancer
    LoadBalancer,
    /// Load balancer target group
    TargetGroup,

    // Compute
    /// Virtual machine instance
    ComputeInstance,
    /// Stable public address bound to an instance
    StaticAddress,

    // Data
    /// Managed relational database
    ManagedDatabase,
    /// Object storage bucket
    ObjectStore,

    // Edge
    /// CDN cache policy
    CachePolicy,
    /// CDN origin request policy
    OriginRequestPolicy,
    /// CDN distribution
    ContentDistribution,

    // Identity
    /// Role assumable by a service or federated principal
    IdentityRole,
    /// Origin access identity delegating store reads to a distribution
    IdentityDelegation,
    /// External OIDC token issuer trust
    FederationProvider,
    /// Federated principal constrained by a subject-claim condition
    TrustPrincipal,
    /// End-user directory (user pool)
    UserDirectory,
    /// Application client of a user directory
    UserDirectoryClient,
}

impl ResourceKind {
    /// All kinds in declaration order
    pub const ALL: [ResourceKind; 18] = [
        Self::Network,
        Self::Subnet,
        Self::SecurityBoundary,
        Self::LoadBalancer,
        Self::TargetGroup,
        Self::ComputeInstance,
        Self::StaticAddress,
        Self::ManagedDatabase,
        Self::ObjectStore,
        Self::CachePolicy,
        Self::OriginRequestPolicy,
        Self::ContentDistribution,
        Self::IdentityRole,
        Self::IdentityDelegation,
        Self::FederationProvider,
        Self::TrustPrincipal,
        Self::UserDirectory,
        Self::UserDirectoryClient,
    ];

    /// Canonical string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Subnet => "subnet",
            Self::SecurityBoundary => "security-boundary",
            Self::LoadBalancer => "load-balancer",
            Self::TargetGroup => "target-group",
            Self::ComputeInstance => "compute-instance",
            Self::StaticAddress => "static-address",
            Self::ManagedDatabase => "managed-database",
            Self::ObjectStore => "object-store",
            Self::CachePolicy => "cache-policy",
            Self::OriginRequestPolicy => "origin-request-policy",
            Self::ContentDistribution => "content-distribution",
            Self::IdentityRole => "identity-role",
            Self::IdentityDelegation => "identity-delegation",
            Self::FederationProvider => "federation-provider",
            Self::TrustPrincipal => "trust-principal",
            Self::UserDirectory => "user-directory",
            Self::UserDirectoryClient => "user-directory-client",
        }
    }

    /// Human-readable display name
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Network => "Network",
            Self::Subnet => "Subnet",
            Self::SecurityBoundary => "Security Boundary",
            Self::LoadBalancer => "Load Balancer",
            Self::TargetGroup => "Target Group",
            Self::ComputeInstance => "Compute Instance",
            Self::StaticAddress => "Static Address",
            Self::ManagedDatabase => "Managed Database",
            Self::ObjectStore => "Object Store",
            Self::CachePolicy => "Cache Policy",
            Self::OriginRequestPolicy => "Origin Request Policy",
            Self::ContentDistribution => "Content Distribution",
            Self::IdentityRole => "Identity Role",
            Self::IdentityDelegation => "Identity Delegation",
            Self::FederationProvider => "Federation Provider",
            Self::TrustPrincipal => "Trust Principal",
            Self::UserDirectory => "User Directory",
            Self::UserDirectoryClient => "User Directory Client",
        }
    }

    /// Primary category for this kind
    pub fn category(&self) -> ResourceCategory {
        match self {
            Self::Network
            | Self::Subnet
            | Self::SecurityBoundary
            | Self::LoadBalancer
            | Self::TargetGroup => ResourceCategory::Network,

            Self::ComputeInstance | Self::StaticAddress => ResourceCategory::Compute,

            Self::ManagedDatabase | Self::ObjectStore => ResourceCategory::Data,

            Self::CachePolicy | Self::OriginRequestPolicy | Self::ContentDistribution => {
                ResourceCategory::Edge
            }

            Self::IdentityRole
            | Self::IdentityDelegation
            | Self::FederationProvider
            | Self::TrustPrincipal
            | Self::UserDirectory
            | Self::UserDirectoryClient => ResourceCategory::Identity,
        }
    }

    /// Whether a security boundary may be attached to this kind
    pub fn accepts_security_boundary(&self) -> bool {
        matches!(
            self,
            Self::ComputeInstance | Self::ManagedDatabase | Self::LoadBalancer
        )
    }

    /// Removal policy applied when a builder does not choose one.
    ///
    /// Stateful stores are retained; everything else is torn down with the stack.
    pub fn default_removal_policy(&self) -> RemovalPolicy {
        match self {
            Self::ObjectStore | Self::ManagedDatabase | Self::UserDirectory => RemovalPolicy::Retain,
            _ => RemovalPolicy::Destroy,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.to_lowercase().replace('_', "-");
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| format!("unknown resource kind: {}", s))
    }
}

/// Resource category (high-level grouping)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceCategory {
    /// Address space, subnets, boundaries, load balancing
    Network,
    /// Instances and their addresses
    Compute,
    /// Databases and object stores
    Data,
    /// CDN distributions and their policies
    Edge,
    /// Roles, federation, user directories
    Identity,
}

impl fmt::Display for ResourceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network => write!(f, "Network"),
            Self::Compute => write!(f, "Compute"),
            Self::Data => write!(f, "Data"),
            Self::Edge => write!(f, "Edge/CDN"),
            Self::Identity => write!(f, "Identity"),
        }
    }
}

/// What the backend does with a provisioned resource when the stack is torn down
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalPolicy {
    /// Delete the resource with the stack
    Destroy,
    /// Orphan the resource and keep its data
    Retain,
    /// Take a final snapshot, then delete
    Snapshot,
}
