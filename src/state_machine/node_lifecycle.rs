// Copyright (c) 2025 - Cowboy AI, Inc.
//! Node Lifecycle State Machine
//!
//! # States
//!
//! - Declared: added to the graph by a builder
//! - Resolved: every forward reference bound to a node in the graph (core)
//! - Provisioned: created by a backend (terminal)
//!
//! # Inputs
//!
//! - Resolve: Declared → Resolved
//! - Provision: Resolved → Provisioned
//!
//! Re-applying the input that produced the current state is a no-op, so a
//! backend may replay a manifest it already applied.

use serde::Serialize;

use super::{StateMachine, TransitionError, TransitionOutput, TransitionResult};
use crate::graph::NodeState;

/// Lifecycle command (FSM input)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeLifecycleInput {
    /// Graph validation bound every reference
    Resolve,
    /// Backend created the physical resource
    Provision,
}

impl StateMachine for NodeState {
    type Input = NodeLifecycleInput;
    type Output = TransitionOutput;

    fn transition(&self, input: &Self::Input) -> TransitionResult<(Self, Self::Output)> {
        use NodeLifecycleInput::*;
        use NodeState::*;

        match (self, input) {
            (Declared, Resolve) => Ok((Resolved, TransitionOutput::ok())),
            (Resolved, Resolve) => Ok((Resolved, TransitionOutput::ok())),

            (Resolved, Provision) => Ok((Provisioned, TransitionOutput::ok())),
            (Provisioned, Provision) => Ok((
                Provisioned,
                TransitionOutput::with_warnings(vec!["node already provisioned".to_string()]),
            )),

            (Declared, Provision) => Err(TransitionError::PreconditionFailed(
                "node has unresolved references".to_string(),
            )),
            (Provisioned, Resolve) => Err(TransitionError::InvalidTransition {
                from: Provisioned.to_string(),
                to: Resolved.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let (state, _) = NodeState::Declared.transition(&NodeLifecycleInput::Resolve).unwrap();
        assert_eq!(state, NodeState::Resolved);
        let (state, output) = state.transition(&NodeLifecycleInput::Provision).unwrap();
        assert_eq!(state, NodeState::Provisioned);
        assert!(output.warnings.is_empty());
    }

    #[test]
    fn test_cannot_provision_unresolved_node() {
        assert!(matches!(
            NodeState::Declared.transition(&NodeLifecycleInput::Provision),
            Err(TransitionError::PreconditionFailed(_))
        ));
    }

    #[test]
    fn test_provisioned_is_terminal() {
        assert!(NodeState::Provisioned
            .transition(&NodeLifecycleInput::Resolve)
            .is_err());
        let (state, output) = NodeState::Provisioned
            .transition(&NodeLifecycleInput::Provision)
            .unwrap();
        assert_eq!(state, NodeState::Provisioned);
        assert_eq!(output.warnings.len(), 1);
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let (state, output) = NodeState::Resolved
            .transition(&NodeLifecycleInput::Resolve)
            .unwrap();
        assert_eq!(state, NodeState::Resolved);
        assert!(output.warnings.is_empty());
    }
}
