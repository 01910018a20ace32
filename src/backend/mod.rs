// Copyright (c) 2025 - Cowboy AI, Inc.

//! Provisioning Backends
//!
//! The core only declares resources. A [`ProvisioningBackend`] takes the
//! finished [`StackManifest`], creates each node in dependency order, binds
//! forward references to the attribute values of already-created producers,
//! and reports per-node physical ids.
//!
//! # Contract
//!
//! - Nodes are provisioned in a topological order of their references
//! - A node's properties are fully resolved before its creation request
//! - Ingress rules sourced from another boundary are deferred until every node
//!   exists, since the source boundary may be declared later
//! - A per-node failure stops the run with [`ProvisionError`]; the core never
//!   retries, and teardown of partial results is the backend's business
//!
//! # Implementations
//!
//! - [`DryRunBackend`]: in-memory, deterministic identifiers
//! - [`NatsProvisioningBackend`]: one request/reply per node over NATS

pub mod dry_run;
pub mod nats;

pub use dry_run::DryRunBackend;
pub use nats::{NatsClient, NatsConfig, NatsProvisioningBackend};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use thiserror::Error;
use uuid::Uuid;

use crate::assembler::StackManifest;
use crate::domain::{IngressRule, RemovalPolicy, ResourceKind};
use crate::graph::{AttributeRef, Edge, NodeId, NodeState, ResourceNode};
use crate::state_machine::TransitionError;

/// Provisioning backend trait
#[async_trait]
pub trait ProvisioningBackend: Send + Sync {
    /// Error type for provisioning operations
    type Error: std::error::Error + Send + Sync;

    /// Create every resource of the manifest
    async fn provision(&mut self, manifest: &StackManifest) -> Result<ProvisionedStack, Self::Error>;

    /// Verify the backend is reachable and ready
    async fn health_check(&self) -> Result<(), Self::Error>;

    /// Get the name of this backend
    fn name(&self) -> &str;
}

/// Errors that can occur during provisioning
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProvisionError {
    /// Backend rejected or failed to create a node
    #[error("Provisioning {node} failed: {reason}")]
    NodeFailed { node: NodeId, reason: String },

    /// A forward reference could not be bound
    #[error("Node {node} references {reference}, which no provisioned node exposes")]
    UnresolvedReference { node: NodeId, reference: String },

    /// Manifest contains a node the core never resolved
    #[error("Node {0} was not resolved before handoff")]
    NotResolved(NodeId),

    /// Manifest failed its integrity check
    #[error("Inconsistent manifest: {0}")]
    InconsistentManifest(String),

    /// Backend not reachable
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    /// Transport error talking to the backend
    #[error("Transport error: {0}")]
    Transport(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Lifecycle transition failed: {0}")]
    Lifecycle(#[from] TransitionError),
}

impl From<serde_json::Error> for ProvisionError {
    fn from(err: serde_json::Error) -> Self {
        ProvisionError::Serialization(err.to_string())
    }
}

/// A created resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionedResource {
    pub id: NodeId,
    pub kind: ResourceKind,
    pub physical_id: String,
    /// Generated attribute values, e.g. `Arn`, `GroupId`
    pub attributes: BTreeMap<String, String>,
    /// Properties with every forward reference substituted
    pub properties: BTreeMap<String, serde_json::Value>,
    pub removal_policy: RemovalPolicy,
    pub state: NodeState,
}

/// Ingress rule applied after every node exists
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeferredRule {
    pub boundary: NodeId,
    pub rule: IngressRule,
}

/// Result of a provisioning run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionedStack {
    pub run_id: Uuid,
    pub backend: String,
    /// In provisioning order
    pub resources: Vec<ProvisionedResource>,
    pub deferred_rules: Vec<DeferredRule>,
    pub relationships: Vec<Edge>,
}

impl ProvisionedStack {
    pub fn resource(&self, id: &NodeId) -> Option<&ProvisionedResource> {
        self.resources.iter().find(|r| &r.id == id)
    }

    /// Bound value of a forward reference
    pub fn attribute(&self, reference: &AttributeRef) -> Option<&str> {
        self.resource(&reference.node)?
            .attributes
            .get(&reference.attribute)
            .map(String::as_str)
    }
}

/// Nodes in provisioning order, after checking the manifest is resolved
pub(crate) fn provisioning_order(manifest: &StackManifest) -> Result<Vec<&ResourceNode>, ProvisionError> {
    let graph = &manifest.graph;
    graph
        .validate()
        .map_err(|e| ProvisionError::InconsistentManifest(e.to_string()))?;

    let order = graph
        .topological_order()
        .map_err(|e| ProvisionError::InconsistentManifest(e.to_string()))?;

    order
        .iter()
        .map(|id| {
            let node = graph
                .node(id)
                .ok_or_else(|| ProvisionError::InconsistentManifest(format!("missing node {}", id)))?;
            if node.state == NodeState::Declared {
                return Err(ProvisionError::NotResolved(id.clone()));
            }
            Ok(node)
        })
        .collect()
}

/// Attribute names consumers request from each producer
pub(crate) fn requested_attributes(manifest: &StackManifest) -> HashMap<NodeId, BTreeSet<String>> {
    let mut requested: HashMap<NodeId, BTreeSet<String>> = HashMap::new();
    for node in manifest.graph.nodes() {
        for reference in node.references() {
            requested
                .entry(reference.node.clone())
                .or_default()
                .insert(reference.attribute.clone());
        }
    }
    requested
}

/// Substitute forward references using attributes of provisioned producers
pub(crate) fn resolve_properties(
    node: &ResourceNode,
    provisioned: &HashMap<NodeId, BTreeMap<String, String>>,
) -> Result<BTreeMap<String, serde_json::Value>, ProvisionError> {
    let lookup = |r: &AttributeRef| provisioned.get(&r.node).and_then(|a| a.get(&r.attribute)).cloned();

    node.properties
        .iter()
        .map(|(name, value)| {
            let resolved = value.resolve_with(&lookup).ok_or_else(|| {
                let reference = value
                    .references()
                    .into_iter()
                    .find(|r| lookup(*r).is_none())
                    .map(|r| r.to_string())
                    .unwrap_or_else(|| name.clone());
                ProvisionError::UnresolvedReference {
                    node: node.id.clone(),
                    reference,
                }
            })?;
            Ok((name.clone(), resolved))
        })
        .collect()
}

/// Split a boundary's rules into those applied at creation and deferred ones
pub(crate) fn split_rules(node: &ResourceNode) -> (Vec<IngressRule>, Vec<DeferredRule>) {
    let (immediate, deferred): (Vec<_>, Vec<_>) = node
        .ingress_rules
        .iter()
        .cloned()
        .partition(|rule| rule.source_boundary().is_none());

    (
        immediate,
        deferred
            .into_iter()
            .map(|rule| DeferredRule {
                boundary: node.id.clone(),
                rule,
            })
            .collect(),
    )
}
