// Copyright (c) 2025 - Cowboy AI, Inc.
//! Stack Domain Models
//!
//! Value objects with validation invariants used by the builders. Nothing in
//! here knows about graph construction order; it only knows what a valid
//! port, CIDR block, domain name or permission statement looks like.
//!
//! # Value Objects with Invariants
//!
//! - [`Ipv4Cidr`] - network block with fixed-size subnet partitioning
//! - [`Port`] / [`IngressRule`] - security boundary rules
//! - [`DomainName`] - distribution aliases (RFC 1123, leading wildcard)
//! - [`CertificateRef`] / [`TtlWindow`] - distribution settings
//! - [`PolicyStatement`] / [`SubjectCondition`] - least-privilege grants
//! - [`ResourceKind`] - declared resource taxonomy

pub mod distribution;
pub mod domain_name;
pub mod invariants;
pub mod network;
pub mod policy;
pub mod resource_kind;
pub mod security;

pub use distribution::{
    AllowedMethods, CertificateRef, Forwarding, OriginProtocolPolicy, TtlWindow,
    ViewerProtocolPolicy,
};
pub use domain_name::{DomainName, DomainNameError};
pub use invariants::{ValidationError, ValidationResult};
pub use network::{Ipv4Cidr, NetworkError, SubnetKind};
pub use policy::{
    Action, ConditionOperator, PolicyDocument, PolicyStatement, ResourceScope, SubjectCondition,
    SubjectMatch,
};
pub use resource_kind::{RemovalPolicy, ResourceCategory, ResourceKind};
pub use security::{IngressRule, Port, PortConstraint, Protocol, SourceScope};
