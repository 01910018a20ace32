// Copyright (c) 2025 - Cowboy AI, Inc.
//! Resource Builders
//!
//! One builder per assembler stage. A builder receives the validated plan
//! plus handles returned by earlier builders, declares its nodes and edges,
//! and returns handles for the nodes later stages may reference. Because a
//! builder can only name nodes through handles it was given, it cannot
//! reference anything from a later stage.

pub mod compute;
pub mod database;
pub mod directory;
pub mod edge;
pub mod federation;
pub mod network;

pub use compute::{ComputeBuilder, ComputeHandle};
pub use database::{DatabaseBuilder, DatabaseHandle};
pub use directory::{DirectoryHandle, UserDirectoryBuilder};
pub use edge::{
    ApiDistributionHandle, AssetDistributionHandle, EdgeBuilder, EdgeHandle, LoadBalancerHandle,
    StoreBuilder, StoreHandle,
};
pub use federation::{FederationBuilder, FederationHandle};
pub use network::{NetworkBuilder, NetworkHandle};

use crate::errors::SynthesisResult;
use crate::graph::{Edge, EdgeKind, NodeHandle, NodeId, ResourceGraph};

/// A stage of graph construction
pub trait ResourceBuilder {
    /// Handles exposed to later stages
    type Output;

    /// Name used in logs
    const NAME: &'static str;

    /// Declare this builder's nodes and edges
    fn build(self, graph: &mut ResourceGraph) -> SynthesisResult<Self::Output>;
}

/// Logical id `<prefix>-<suffix>`
pub(crate) fn logical_id(prefix: &str, suffix: &str) -> SynthesisResult<NodeId> {
    Ok(NodeId::new(format!("{}-{}", prefix, suffix))?)
}

/// Attach a security boundary to the single resource it protects
pub(crate) fn attach_boundary(
    graph: &mut ResourceGraph,
    boundary: &NodeHandle,
    resource: &NodeHandle,
) -> SynthesisResult<()> {
    graph.add_edge(Edge::new(
        boundary.id().clone(),
        resource.id().clone(),
        EdgeKind::PolicyAttachment,
    ))?;
    Ok(())
}

/// Declare an unconstrained edge between two handles
pub(crate) fn relate(
    graph: &mut ResourceGraph,
    source: &NodeHandle,
    target: &NodeHandle,
    kind: EdgeKind,
) -> SynthesisResult<()> {
    graph.add_edge(Edge::new(source.id().clone(), target.id().clone(), kind))?;
    Ok(())
}
