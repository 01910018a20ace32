// Copyright (c) 2025 - Cowboy AI, Inc.
//! Resource Composition Graph
//!
//! An append-only DAG of resource declarations. Nodes carry typed properties
//! which may hold forward references to attributes of other nodes; edges
//! carry the security and routing relationships between them.
//!
//! # Structural Ordering
//!
//! [`ResourceGraph::add_node`] refuses any node whose references point at a
//! node not yet in the graph, so insertion order is always a topological
//! order of the reference dependencies. Builders only ever receive
//! [`NodeHandle`]s for nodes already added, which is what keeps them from
//! referencing a later stage.
//!
//! Edges never impose construction order. They describe relationships the
//! backend applies once both endpoints exist.
//!
//! # Example
//!
//! ```rust
//! use tpb_infrastructure::domain::ResourceKind;
//! use tpb_infrastructure::graph::{NodeId, ResourceGraph, ResourceNode};
//!
//! let mut graph = ResourceGraph::new();
//! let vpc = graph
//!     .add_node(ResourceNode::new(NodeId::new("tpb-network").unwrap(), ResourceKind::Network))
//!     .unwrap();
//! let subnet = ResourceNode::new(NodeId::new("tpb-subnet-0").unwrap(), ResourceKind::Subnet)
//!     .with_property("vpc_id", vpc.reference("VpcId"));
//! graph.add_node(subnet).unwrap();
//!
//! assert!(graph.validate().is_ok());
//! ```

mod edge;
mod node;
pub mod topology;

pub use edge::{Edge, EdgeKind};
pub use node::{AttributeRef, NodeHandle, NodeId, NodeState, PropertyValue, ResourceNode};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, trace};

use crate::domain::{IngressRule, ResourceKind};
use crate::state_machine::{NodeLifecycleInput, StateMachine, TransitionError};

/// Graph construction and integrity errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("Invalid node id: {0:?}")]
    InvalidNodeId(String),

    #[error("Node already declared: {0}")]
    DuplicateNode(NodeId),

    #[error("Unknown node: {0}")]
    UnknownNode(NodeId),

    #[error("Node {node} references undeclared node {target}")]
    DanglingReference { node: NodeId, target: NodeId },

    #[error("Edge from {0} to itself")]
    SelfLoop(NodeId),

    #[error("Reference cycle among {0:?}")]
    Cycle(Vec<NodeId>),

    #[error("Node {node} declared before its producer {producer}")]
    OrderViolation { node: NodeId, producer: NodeId },

    #[error("Node {node} is a {kind}, not a security boundary")]
    NotASecurityBoundary { node: NodeId, kind: ResourceKind },

    #[error("Security boundary {boundary} is attached to {attachments} resources, expected exactly one")]
    UnattachedBoundary { boundary: NodeId, attachments: usize },

    #[error("Policy attachment {source_node} -> {target} is not boundary -> protectable resource")]
    InvalidAttachment { source_node: NodeId, target: NodeId },

    #[error("Ingress rule on {boundary} ({rule}) has no matching relationship edge")]
    UnmatchedIngressRule { boundary: NodeId, rule: String },

    #[error("Lifecycle transition failed: {0}")]
    Lifecycle(#[from] TransitionError),
}

/// Append-only resource graph
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "GraphDocument", into = "GraphDocument")]
pub struct ResourceGraph {
    nodes: Vec<ResourceNode>,
    index: HashMap<NodeId, usize>,
    edges: Vec<Edge>,
}

/// Wire form of a graph: nodes in declaration order plus edges
#[derive(Debug, Clone, Serialize, Deserialize)]
struct GraphDocument {
    nodes: Vec<ResourceNode>,
    #[serde(default)]
    edges: Vec<Edge>,
}

impl ResourceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a node
    ///
    /// Every node this one references must already be in the graph.
    pub fn add_node(&mut self, node: ResourceNode) -> Result<NodeHandle, GraphError> {
        if self.index.contains_key(&node.id) {
            return Err(GraphError::DuplicateNode(node.id));
        }

        if let Some(target) = node
            .dependencies()
            .into_iter()
            .find(|producer| !self.index.contains_key(*producer))
        {
            return Err(GraphError::DanglingReference {
                node: node.id.clone(),
                target: target.clone(),
            });
        }

        trace!(node = %node.id, kind = %node.kind, "declaring node");
        let handle = NodeHandle::new(node.id.clone(), node.kind);
        self.index.insert(node.id.clone(), self.nodes.len());
        self.nodes.push(node);
        Ok(handle)
    }

    /// Declare a relationship
    ///
    /// Returns `false` when an identical edge already exists.
    pub fn add_edge(&mut self, edge: Edge) -> Result<bool, GraphError> {
        for endpoint in [&edge.source, &edge.target] {
            if !self.index.contains_key(endpoint) {
                return Err(GraphError::UnknownNode(endpoint.clone()));
            }
        }
        if edge.source == edge.target {
            return Err(GraphError::SelfLoop(edge.source));
        }
        if self.edges.contains(&edge) {
            return Ok(false);
        }

        trace!(%edge, "declaring edge");
        self.edges.push(edge);
        Ok(true)
    }

    /// Add an ingress rule to a security boundary
    ///
    /// Boundaries only grow. Returns `false` when the rule is already present.
    pub fn add_ingress_rule(&mut self, boundary: &NodeId, rule: IngressRule) -> Result<bool, GraphError> {
        let position = *self
            .index
            .get(boundary)
            .ok_or_else(|| GraphError::UnknownNode(boundary.clone()))?;
        let node = &mut self.nodes[position];

        if node.kind != ResourceKind::SecurityBoundary {
            return Err(GraphError::NotASecurityBoundary {
                node: boundary.clone(),
                kind: node.kind,
            });
        }
        if node.ingress_rules.contains(&rule) {
            return Ok(false);
        }

        debug!(boundary = %boundary, %rule, "adding ingress rule");
        node.ingress_rules.push(rule);
        Ok(true)
    }

    pub fn node(&self, id: &NodeId) -> Option<&ResourceNode> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.index.contains_key(id)
    }

    /// Nodes in declaration order
    pub fn nodes(&self) -> &[ResourceNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes_of_kind(&self, kind: ResourceKind) -> impl Iterator<Item = &ResourceNode> {
        self.nodes.iter().filter(move |n| n.kind == kind)
    }

    pub fn edges_of_kind(&self, kind: EdgeKind) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(move |e| e.kind == kind)
    }

    pub fn edges_from<'a>(&'a self, source: &'a NodeId) -> impl Iterator<Item = &'a Edge> {
        self.edges.iter().filter(move |e| &e.source == source)
    }

    /// `(producer, consumer)` pairs implied by forward references
    pub fn dependency_edges(&self) -> Vec<(NodeId, NodeId)> {
        self.nodes
            .iter()
            .flat_map(|node| {
                node.dependencies()
                    .into_iter()
                    .map(move |producer| (producer.clone(), node.id.clone()))
            })
            .collect()
    }

    /// Producers-first ordering of every node
    pub fn topological_order(&self) -> Result<Vec<NodeId>, GraphError> {
        topology::topological_order(&self.nodes)
    }

    /// Node ids in declaration order
    pub fn declaration_order(&self) -> Vec<NodeId> {
        self.nodes.iter().map(|n| n.id.clone()).collect()
    }

    /// Full integrity check run before a graph leaves the core
    pub fn validate(&self) -> Result<(), GraphError> {
        self.validate_references()?;
        self.topological_order()?;
        self.validate_attachments()?;
        self.validate_boundary_rules()?;
        Ok(())
    }

    fn validate_references(&self) -> Result<(), GraphError> {
        for (position, node) in self.nodes.iter().enumerate() {
            for producer in node.dependencies() {
                match self.index.get(producer) {
                    None => {
                        return Err(GraphError::DanglingReference {
                            node: node.id.clone(),
                            target: producer.clone(),
                        })
                    }
                    Some(&p) if p >= position => {
                        return Err(GraphError::OrderViolation {
                            node: node.id.clone(),
                            producer: producer.clone(),
                        })
                    }
                    Some(_) => {}
                }
            }
        }
        Ok(())
    }

    fn validate_attachments(&self) -> Result<(), GraphError> {
        for edge in self.edges_of_kind(EdgeKind::PolicyAttachment) {
            let source_ok = self
                .node(&edge.source)
                .is_some_and(|n| n.kind == ResourceKind::SecurityBoundary);
            let target_ok = self
                .node(&edge.target)
                .is_some_and(|n| n.kind.accepts_security_boundary());
            if !source_ok || !target_ok {
                return Err(GraphError::InvalidAttachment {
                    source_node: edge.source.clone(),
                    target: edge.target.clone(),
                });
            }
        }

        for boundary in self.nodes_of_kind(ResourceKind::SecurityBoundary) {
            let attachments = self
                .edges_from(&boundary.id)
                .filter(|e| e.kind == EdgeKind::PolicyAttachment)
                .count();
            if attachments != 1 {
                return Err(GraphError::UnattachedBoundary {
                    boundary: boundary.id.clone(),
                    attachments,
                });
            }
        }
        Ok(())
    }

    fn validate_boundary_rules(&self) -> Result<(), GraphError> {
        for boundary in self.nodes_of_kind(ResourceKind::SecurityBoundary) {
            for rule in &boundary.ingress_rules {
                let Some(source) = rule.source_boundary() else {
                    continue;
                };
                let matched = self.edges.iter().any(|e| {
                    &e.source == source
                        && e.target == boundary.id
                        && e.kind.grants_reachability()
                        && e.constraint == Some(rule.constraint())
                });
                if !matched {
                    return Err(GraphError::UnmatchedIngressRule {
                        boundary: boundary.id.clone(),
                        rule: rule.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Validate, then move every declared node to resolved
    pub fn resolve(&mut self) -> Result<(), GraphError> {
        self.validate()?;
        for node in &mut self.nodes {
            if node.state == NodeState::Declared {
                let (next, _) = node.state.transition(&NodeLifecycleInput::Resolve)?;
                node.state = next;
            }
        }
        debug!(nodes = self.nodes.len(), edges = self.edges.len(), "graph resolved");
        Ok(())
    }

    /// Whether every node has been resolved
    pub fn is_resolved(&self) -> bool {
        self.nodes.iter().all(|n| n.state != NodeState::Declared)
    }
}

impl TryFrom<GraphDocument> for ResourceGraph {
    type Error = GraphError;

    fn try_from(document: GraphDocument) -> Result<Self, Self::Error> {
        let mut graph = Self::new();
        for node in document.nodes {
            graph.add_node(node)?;
        }
        for edge in document.edges {
            graph.add_edge(edge)?;
        }
        Ok(graph)
    }
}

impl From<ResourceGraph> for GraphDocument {
    fn from(graph: ResourceGraph) -> Self {
        Self {
            nodes: graph.nodes,
            edges: graph.edges,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Port, PortConstraint, SourceScope};

    fn id(s: &str) -> NodeId {
        NodeId::new(s).unwrap()
    }

    /// boundary attached to an instance
    fn guarded_instance(graph: &mut ResourceGraph, prefix: &str) -> (NodeHandle, NodeHandle) {
        let boundary = graph
            .add_node(ResourceNode::new(id(&format!("{}-sg", prefix)), ResourceKind::SecurityBoundary))
            .unwrap();
        let instance = graph
            .add_node(
                ResourceNode::new(id(&format!("{}-vm", prefix)), ResourceKind::ComputeInstance)
                    .with_property("security_group", boundary.reference("GroupId")),
            )
            .unwrap();
        graph
            .add_edge(Edge::new(
                boundary.id().clone(),
                instance.id().clone(),
                EdgeKind::PolicyAttachment,
            ))
            .unwrap();
        (boundary, instance)
    }

    #[test]
    fn test_forward_reference_to_undeclared_node_is_rejected() {
        let mut graph = ResourceGraph::new();
        let node = ResourceNode::new(id("subnet"), ResourceKind::Subnet).with_property(
            "vpc_id",
            PropertyValue::Reference(AttributeRef::new(id("vpc"), "VpcId")),
        );
        assert_eq!(
            graph.add_node(node),
            Err(GraphError::DanglingReference {
                node: id("subnet"),
                target: id("vpc"),
            })
        );
        assert!(graph.is_empty());
    }

    #[test]
    fn test_duplicate_node_rejected() {
        let mut graph = ResourceGraph::new();
        graph.add_node(ResourceNode::new(id("vpc"), ResourceKind::Network)).unwrap();
        assert_eq!(
            graph.add_node(ResourceNode::new(id("vpc"), ResourceKind::Network)),
            Err(GraphError::DuplicateNode(id("vpc")))
        );
    }

    #[test]
    fn test_edges_are_deduplicated() {
        let mut graph = ResourceGraph::new();
        let (boundary, instance) = guarded_instance(&mut graph, "app");
        let edge = Edge::new(boundary.id().clone(), instance.id().clone(), EdgeKind::PolicyAttachment);
        assert!(!graph.add_edge(edge).unwrap());
        assert_eq!(graph.edges().len(), 1);

        assert_eq!(
            graph.add_edge(Edge::new(id("app-vm"), id("app-vm"), EdgeKind::Association)),
            Err(GraphError::SelfLoop(id("app-vm")))
        );
        assert_eq!(
            graph.add_edge(Edge::new(id("app-vm"), id("ghost"), EdgeKind::Association)),
            Err(GraphError::UnknownNode(id("ghost")))
        );
    }

    #[test]
    fn test_ingress_rules_only_on_boundaries() {
        let mut graph = ResourceGraph::new();
        let (boundary, instance) = guarded_instance(&mut graph, "app");
        let rule = IngressRule::tcp(Port::SSH, SourceScope::AnyIpv4, "ssh");

        assert!(graph.add_ingress_rule(boundary.id(), rule.clone()).unwrap());
        assert!(!graph.add_ingress_rule(boundary.id(), rule.clone()).unwrap());
        assert!(matches!(
            graph.add_ingress_rule(instance.id(), rule),
            Err(GraphError::NotASecurityBoundary { .. })
        ));
    }

    #[test]
    fn test_unattached_boundary_fails_validation() {
        let mut graph = ResourceGraph::new();
        graph
            .add_node(ResourceNode::new(id("loose-sg"), ResourceKind::SecurityBoundary))
            .unwrap();
        assert_eq!(
            graph.validate(),
            Err(GraphError::UnattachedBoundary {
                boundary: id("loose-sg"),
                attachments: 0,
            })
        );
    }

    #[test]
    fn test_boundary_rule_requires_matching_edge() {
        let mut graph = ResourceGraph::new();
        let (app_sg, _) = guarded_instance(&mut graph, "app");
        let (db_sg, _) = guarded_instance(&mut graph, "db");
        let port = Port::new(5432).unwrap();

        graph
            .add_ingress_rule(
                db_sg.id(),
                IngressRule::tcp(port, SourceScope::Boundary(app_sg.id().clone()), "db"),
            )
            .unwrap();
        assert!(matches!(
            graph.validate(),
            Err(GraphError::UnmatchedIngressRule { .. })
        ));

        graph
            .add_edge(
                Edge::new(app_sg.id().clone(), db_sg.id().clone(), EdgeKind::TrustGrant)
                    .with_constraint(PortConstraint::tcp(port)),
            )
            .unwrap();
        assert_eq!(graph.validate(), Ok(()));
    }

    #[test]
    fn test_resolve_moves_nodes_to_resolved() {
        let mut graph = ResourceGraph::new();
        guarded_instance(&mut graph, "app");
        assert!(!graph.is_resolved());
        graph.resolve().unwrap();
        assert!(graph.is_resolved());
        assert!(graph.nodes().iter().all(|n| n.state == NodeState::Resolved));
    }

    #[test]
    fn test_dependency_edges_follow_references() {
        let mut graph = ResourceGraph::new();
        guarded_instance(&mut graph, "app");
        assert_eq!(graph.dependency_edges(), vec![(id("app-sg"), id("app-vm"))]);
        assert_eq!(graph.topological_order().unwrap(), graph.declaration_order());
    }

    #[test]
    fn test_serde_rebuilds_and_rechecks() {
        let mut graph = ResourceGraph::new();
        guarded_instance(&mut graph, "app");

        let json = serde_json::to_value(&graph).unwrap();
        let back: ResourceGraph = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(back, graph);

        // reversed node order puts the consumer first
        let mut reversed = json;
        reversed["nodes"].as_array_mut().unwrap().reverse();
        assert!(serde_json::from_value::<ResourceGraph>(reversed).is_err());
    }
}
