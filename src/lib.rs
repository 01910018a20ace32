// Copyright (c) 2025 - Cowboy AI, Inc.
//! Resource composition graph for the task-progress web stack
//!
//! Turns a single [`StackConfig`] into a typed, validated graph of declared
//! cloud resources: network, compute, database, edge distributions, CI
//! identity federation and an optional user directory. The graph is then
//! handed to a [`ProvisioningBackend`] that creates the resources.
//!
//! # Layers
//!
//! - [`domain`]: value objects with invariants (ports, CIDRs, domain names, policies)
//! - [`graph`]: nodes, typed edges, forward references, topological order
//! - [`builders`]: one builder per resource group, returning typed handles
//! - [`assembler`]: sequential stage machine driving the builders
//! - [`backend`]: dry-run and NATS provisioning backends
//!
//! # Example
//!
//! ```rust
//! use tpb_infrastructure::{GraphAssembler, StackConfig};
//!
//! let config = StackConfig::builder("tpb-key", "tpb_db_user", 17388, "phipson", "taskify")
//!     .build()
//!     .unwrap();
//! let stack = GraphAssembler::synthesize(&config).unwrap();
//! assert!(stack.graph().validate().is_ok());
//! ```

pub mod assembler;
pub mod backend;
pub mod builders;
pub mod config;
pub mod domain;
pub mod errors;
pub mod graph;
pub mod state_machine;

pub use assembler::{GraphAssembler, StackHandles, StackManifest, SynthesizedStack};
pub use backend::{
    DryRunBackend, NatsConfig, NatsProvisioningBackend, ProvisionError, ProvisionedStack,
    ProvisioningBackend,
};
pub use config::{StackConfig, StackPlan};
pub use errors::{SynthesisError, SynthesisResult};
pub use graph::{Edge, EdgeKind, GraphError, NodeHandle, NodeId, ResourceGraph, ResourceNode};
