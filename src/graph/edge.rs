// Copyright (c) 2025 - Cowboy AI, Inc.
//! Relationship Edges

use serde::{Deserialize, Serialize};
use std::fmt;

use super::NodeId;
use crate::domain::PortConstraint;

/// Kind of relationship between two nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EdgeKind {
    /// Source resource may open connections to the target
    NetworkIngress,
    /// Source boundary is trusted by the target boundary
    TrustGrant,
    /// Security boundary (source) attached to the resource it protects (target)
    PolicyAttachment,
    /// Distribution (source) served from the origin (target)
    OriginBinding,
    /// Static address (target) bound to an instance (source)
    Association,
}

impl EdgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NetworkIngress => "network-ingress",
            Self::TrustGrant => "trust-grant",
            Self::PolicyAttachment => "policy-attachment",
            Self::OriginBinding => "origin-binding",
            Self::Association => "association",
        }
    }

    /// Edges that let one boundary's members reach another boundary
    pub fn grants_reachability(&self) -> bool {
        matches!(self, Self::NetworkIngress | Self::TrustGrant)
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Directed relationship between two nodes
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub source: NodeId,
    pub target: NodeId,
    pub kind: EdgeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraint: Option<PortConstraint>,
}

impl Edge {
    pub fn new(source: NodeId, target: NodeId, kind: EdgeKind) -> Self {
        Self {
            source,
            target,
            kind,
            constraint: None,
        }
    }

    pub fn with_constraint(mut self, constraint: PortConstraint) -> Self {
        self.constraint = Some(constraint);
        self
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -[{}", self.source, self.kind)?;
        if let Some(constraint) = &self.constraint {
            write!(f, " {}", constraint)?;
        }
        write!(f, "]-> {}", self.target)
    }
}
