// Copyright (c) 2025 - Cowboy AI, Inc.
//! Finite State Machine Abstractions
//!
//! Generic state machine types shared by the graph assembler and the node
//! lifecycle. Transitions are pure functions: the caller owns the state and
//! decides when to commit the new value.
//!
//! # Machines in this crate
//!
//! - [`AssemblyStage`]: strictly sequential synthesis stages, no rollback
//! - [`NodeState`](crate::graph::NodeState): declared → resolved → provisioned
//!
//! Both are **Mealy machines**: the output depends on the state and the input.
//!
//! ```text
//! (State, Input) → (State, Output)
//! ```
//!
//! # Example
//!
//! ```rust
//! use tpb_infrastructure::state_machine::{AssemblyStage, AssemblyStep, StateMachine};
//!
//! let (next, _) = AssemblyStage::Configured
//!     .transition(&AssemblyStep::BuildNetwork)
//!     .unwrap();
//! assert_eq!(next, AssemblyStage::NetworkBuilt);
//! assert!(AssemblyStage::Configured.transition(&AssemblyStep::Wire).is_err());
//! ```

pub mod assembly;
pub mod node_lifecycle;

pub use assembly::{AssemblyStage, AssemblyStep};
pub use node_lifecycle::NodeLifecycleInput;

use serde::Serialize;

/// Result of a state transition
pub type TransitionResult<S> = Result<S, TransitionError>;

/// Errors that can occur during state transitions
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    /// Transition from current state to target state is not allowed
    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    /// Precondition not met for transition
    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    /// Business rule prevents transition
    #[error("Business rule violated: {0}")]
    BusinessRuleViolation(String),
}

/// A machine whose transitions are computed, never applied in place
pub trait StateMachine: Sized + Clone {
    type Input;
    type Output;

    /// Next state and output, or why `input` is not accepted here
    fn transition(&self, input: &Self::Input) -> TransitionResult<(Self, Self::Output)>;
}

/// Warnings carried out of a transition, e.g. skipped builders
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransitionOutput {
    pub warnings: Vec<String>,
}

impl TransitionOutput {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn with_warnings(warnings: Vec<String>) -> Self {
        Self { warnings }
    }
}

/// One accepted transition, kept for the synthesis record
#[derive(Debug, Clone, Serialize)]
pub struct Transition<S, I> {
    pub from: S,
    pub to: S,
    pub input: I,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Current state plus every transition that led to it
#[derive(Debug, Clone)]
pub struct StateMachineWithHistory<FSM: StateMachine> {
    pub current: FSM,
    pub history: Vec<Transition<FSM, FSM::Input>>,
}

impl<FSM: StateMachine> StateMachineWithHistory<FSM> {
    pub fn new(initial: FSM) -> Self {
        Self {
            current: initial,
            history: Vec::new(),
        }
    }

    /// Apply `input` and record it. A rejected input leaves state and history untouched.
    pub fn transition_with_history(
        &mut self,
        input: FSM::Input,
        timestamp: chrono::DateTime<chrono::Utc>,
    ) -> TransitionResult<FSM::Output> {
        let (to, output) = self.current.transition(&input)?;
        let from = std::mem::replace(&mut self.current, to.clone());
        self.history.push(Transition {
            from,
            to,
            input,
            timestamp,
        });
        Ok(output)
    }

    pub fn current_state(&self) -> &FSM {
        &self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_history_records_each_stage() {
        let mut fsm = StateMachineWithHistory::new(AssemblyStage::Configured);

        fsm.transition_with_history(AssemblyStep::BuildNetwork, Utc::now())
            .unwrap();
        fsm.transition_with_history(AssemblyStep::BuildCompute, Utc::now())
            .unwrap();

        assert_eq!(*fsm.current_state(), AssemblyStage::ComputeBuilt);
        assert_eq!(fsm.history.len(), 2);
        assert_eq!(fsm.history[0].from, AssemblyStage::Configured);
        assert_eq!(fsm.history[1].to, AssemblyStage::ComputeBuilt);
    }

    #[test]
    fn test_rejected_transition_keeps_state() {
        let mut fsm = StateMachineWithHistory::new(AssemblyStage::NetworkBuilt);

        assert!(fsm
            .transition_with_history(AssemblyStep::Wire, Utc::now())
            .is_err());
        assert_eq!(*fsm.current_state(), AssemblyStage::NetworkBuilt);
        assert!(fsm.history.is_empty());
    }
}
