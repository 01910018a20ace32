// Copyright (c) 2025 - Cowboy AI, Inc.
//! Resource Nodes, Property Values and Forward References

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use super::GraphError;
use crate::domain::{IngressRule, RemovalPolicy, ResourceKind};

/// Logical identifier of a node, unique within one graph
///
/// Lowercase ASCII letters, digits and hyphens; at most 128 characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodeId(String);

impl NodeId {
    pub const MAX_LENGTH: usize = 128;

    pub fn new(id: impl Into<String>) -> Result<Self, GraphError> {
        let id = id.into();
        let valid = !id.is_empty()
            && id.len() <= Self::MAX_LENGTH
            && id
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
            && !id.starts_with('-')
            && !id.ends_with('-');

        if !valid {
            return Err(GraphError::InvalidNodeId(id));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for NodeId {
    type Error = GraphError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<NodeId> for String {
    fn from(id: NodeId) -> Self {
        id.0
    }
}

/// Forward reference to an attribute another node will expose once provisioned
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AttributeRef {
    pub node: NodeId,
    pub attribute: String,
}

impl AttributeRef {
    pub fn new(node: NodeId, attribute: impl Into<String>) -> Self {
        Self {
            node,
            attribute: attribute.into(),
        }
    }
}

impl fmt::Display for AttributeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.node, self.attribute)
    }
}

/// Property value: either known at declaration time or bound lazily by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyValue {
    /// Value known now
    Literal(serde_json::Value),
    /// Attribute of another node
    Reference(AttributeRef),
    /// String concatenation of the parts once every reference is bound
    Join(Vec<PropertyValue>),
    List(Vec<PropertyValue>),
    Map(BTreeMap<String, PropertyValue>),
}

impl PropertyValue {
    /// Every forward reference inside this value, depth first
    pub fn references(&self) -> Vec<&AttributeRef> {
        let mut refs = Vec::new();
        self.collect_references(&mut refs);
        refs
    }

    fn collect_references<'a>(&'a self, refs: &mut Vec<&'a AttributeRef>) {
        match self {
            Self::Literal(_) => {}
            Self::Reference(r) => refs.push(r),
            Self::Join(parts) | Self::List(parts) => {
                for part in parts {
                    part.collect_references(refs);
                }
            }
            Self::Map(entries) => {
                for value in entries.values() {
                    value.collect_references(refs);
                }
            }
        }
    }

    /// Literal payload, if this value has no references
    pub fn as_literal(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Literal(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<&AttributeRef> {
        match self {
            Self::Reference(r) => Some(r),
            _ => None,
        }
    }

    /// Substitute every reference with the value `lookup` yields for it
    ///
    /// Joins collapse to a single string literal.
    pub fn resolve_with<F>(&self, lookup: &F) -> Option<serde_json::Value>
    where
        F: Fn(&AttributeRef) -> Option<String>,
    {
        match self {
            Self::Literal(value) => Some(value.clone()),
            Self::Reference(r) => lookup(r).map(serde_json::Value::String),
            Self::Join(parts) => {
                let mut joined = String::new();
                for part in parts {
                    match part.resolve_with(lookup)? {
                        serde_json::Value::String(s) => joined.push_str(&s),
                        other => joined.push_str(&other.to_string()),
                    }
                }
                Some(serde_json::Value::String(joined))
            }
            Self::List(items) => items
                .iter()
                .map(|item| item.resolve_with(lookup))
                .collect::<Option<Vec<_>>>()
                .map(serde_json::Value::Array),
            Self::Map(entries) => entries
                .iter()
                .map(|(k, v)| v.resolve_with(lookup).map(|v| (k.clone(), v)))
                .collect::<Option<serde_json::Map<_, _>>>()
                .map(serde_json::Value::Object),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        Self::Literal(serde_json::Value::String(value.to_string()))
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        Self::Literal(serde_json::Value::String(value))
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        Self::Literal(serde_json::Value::Bool(value))
    }
}

impl From<u64> for PropertyValue {
    fn from(value: u64) -> Self {
        Self::Literal(serde_json::Value::from(value))
    }
}

impl From<u32> for PropertyValue {
    fn from(value: u32) -> Self {
        Self::Literal(serde_json::Value::from(value))
    }
}

impl From<u16> for PropertyValue {
    fn from(value: u16) -> Self {
        Self::Literal(serde_json::Value::from(value))
    }
}

impl From<serde_json::Value> for PropertyValue {
    fn from(value: serde_json::Value) -> Self {
        Self::Literal(value)
    }
}

impl From<AttributeRef> for PropertyValue {
    fn from(value: AttributeRef) -> Self {
        Self::Reference(value)
    }
}

impl<T: Into<PropertyValue>> From<Vec<T>> for PropertyValue {
    fn from(items: Vec<T>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}

/// Node lifecycle as seen by the core
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
    /// Added to the graph
    Declared,
    /// Every forward reference bound to a producer node in the graph
    Resolved,
    /// Physically created by a backend
    Provisioned,
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Declared => write!(f, "declared"),
            Self::Resolved => write!(f, "resolved"),
            Self::Provisioned => write!(f, "provisioned"),
        }
    }
}

/// A declared infrastructure resource awaiting provisioning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceNode {
    pub id: NodeId,
    pub kind: ResourceKind,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, PropertyValue>,

    /// Only populated on security boundaries
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ingress_rules: Vec<IngressRule>,

    pub removal_policy: RemovalPolicy,
    pub state: NodeState,
}

impl ResourceNode {
    pub fn new(id: NodeId, kind: ResourceKind) -> Self {
        Self {
            id,
            kind,
            properties: BTreeMap::new(),
            ingress_rules: Vec::new(),
            removal_policy: kind.default_removal_policy(),
            state: NodeState::Declared,
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    /// Set a property only when a value is present
    pub fn with_optional_property<V: Into<PropertyValue>>(
        self,
        name: impl Into<String>,
        value: Option<V>,
    ) -> Self {
        match value {
            Some(value) => self.with_property(name, value),
            None => self,
        }
    }

    pub fn with_removal_policy(mut self, policy: RemovalPolicy) -> Self {
        self.removal_policy = policy;
        self
    }

    pub fn with_ingress_rule(mut self, rule: IngressRule) -> Self {
        if !self.ingress_rules.contains(&rule) {
            self.ingress_rules.push(rule);
        }
        self
    }

    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }

    /// Every forward reference held in this node's properties
    pub fn references(&self) -> Vec<&AttributeRef> {
        self.properties
            .values()
            .flat_map(PropertyValue::references)
            .collect()
    }

    /// Producer nodes this node depends on
    pub fn dependencies(&self) -> BTreeSet<&NodeId> {
        self.references().into_iter().map(|r| &r.node).collect()
    }
}

/// Handle to a node already present in a graph
///
/// Only [`super::ResourceGraph::add_node`] hands these out, so holding a
/// handle proves the node was declared earlier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeHandle {
    id: NodeId,
    kind: ResourceKind,
}

impl NodeHandle {
    pub(crate) fn new(id: NodeId, kind: ResourceKind) -> Self {
        Self { id, kind }
    }

    pub fn id(&self) -> &NodeId {
        &self.id
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Forward reference to one of this node's generated attributes
    pub fn attr(&self, attribute: impl Into<String>) -> AttributeRef {
        AttributeRef::new(self.id.clone(), attribute)
    }

    /// Property value referencing one of this node's generated attributes
    pub fn reference(&self, attribute: impl Into<String>) -> PropertyValue {
        PropertyValue::Reference(self.attr(attribute))
    }
}
