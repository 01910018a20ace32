// Copyright (c) 2025 - Cowboy AI, Inc.
//! Graph Assembly State Machine
//!
//! Synthesis advances through a fixed sequence of stages, one builder per
//! stage. Each stage accepts exactly one step; there is no rollback.
//!
//! ```text
//! Configured → NetworkBuilt → ComputeBuilt → StoreBuilt → DatabaseBuilt
//!            → EdgeBuilt → FederationBuilt → Wired → Done
//! ```
//!
//! Optional builders are reported as warnings on the transition output.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{StateMachine, TransitionError, TransitionOutput, TransitionResult};

/// Assembler stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssemblyStage {
    Configured,
    NetworkBuilt,
    ComputeBuilt,
    StoreBuilt,
    DatabaseBuilt,
    EdgeBuilt,
    FederationBuilt,
    /// Cross-builder edges added
    Wired,
    /// Graph validated and resolved
    Done,
}

impl AssemblyStage {
    pub const SEQUENCE: [AssemblyStage; 9] = [
        Self::Configured,
        Self::NetworkBuilt,
        Self::ComputeBuilt,
        Self::StoreBuilt,
        Self::DatabaseBuilt,
        Self::EdgeBuilt,
        Self::FederationBuilt,
        Self::Wired,
        Self::Done,
    ];

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }
}

impl fmt::Display for AssemblyStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Configured => "configured",
            Self::NetworkBuilt => "network_built",
            Self::ComputeBuilt => "compute_built",
            Self::StoreBuilt => "store_built",
            Self::DatabaseBuilt => "database_built",
            Self::EdgeBuilt => "edge_built",
            Self::FederationBuilt => "federation_built",
            Self::Wired => "wired",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// Step that advances the assembler (FSM input)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum AssemblyStep {
    BuildNetwork,
    BuildCompute,
    BuildStore,
    BuildDatabase,
    BuildEdge {
        asset_distribution: bool,
        load_balancer: bool,
    },
    BuildFederation {
        user_directory: bool,
    },
    Wire,
    Finish,
}

impl AssemblyStep {
    /// Stage this step leads to
    pub fn target(&self) -> AssemblyStage {
        match self {
            Self::BuildNetwork => AssemblyStage::NetworkBuilt,
            Self::BuildCompute => AssemblyStage::ComputeBuilt,
            Self::BuildStore => AssemblyStage::StoreBuilt,
            Self::BuildDatabase => AssemblyStage::DatabaseBuilt,
            Self::BuildEdge { .. } => AssemblyStage::EdgeBuilt,
            Self::BuildFederation { .. } => AssemblyStage::FederationBuilt,
            Self::Wire => AssemblyStage::Wired,
            Self::Finish => AssemblyStage::Done,
        }
    }

    /// Stage this step must be applied in
    pub fn source(&self) -> AssemblyStage {
        match self {
            Self::BuildNetwork => AssemblyStage::Configured,
            Self::BuildCompute => AssemblyStage::NetworkBuilt,
            Self::BuildStore => AssemblyStage::ComputeBuilt,
            Self::BuildDatabase => AssemblyStage::StoreBuilt,
            Self::BuildEdge { .. } => AssemblyStage::DatabaseBuilt,
            Self::BuildFederation { .. } => AssemblyStage::EdgeBuilt,
            Self::Wire => AssemblyStage::FederationBuilt,
            Self::Finish => AssemblyStage::Wired,
        }
    }

    fn skipped(&self) -> Vec<String> {
        match *self {
            Self::BuildEdge {
                asset_distribution,
                load_balancer,
            } => {
                let mut skipped = Vec::new();
                if !asset_distribution {
                    skipped.push("asset distribution skipped: no domain names configured".to_string());
                }
                if !load_balancer {
                    skipped.push("load balancer skipped: not configured".to_string());
                }
                skipped
            }
            Self::BuildFederation { user_directory: false } => {
                vec!["user directory skipped: not configured".to_string()]
            }
            _ => Vec::new(),
        }
    }
}

impl StateMachine for AssemblyStage {
    type Input = AssemblyStep;
    type Output = TransitionOutput;

    fn transition(&self, input: &Self::Input) -> TransitionResult<(Self, Self::Output)> {
        if self.is_terminal() {
            return Err(TransitionError::BusinessRuleViolation(
                "assembly already finished".to_string(),
            ));
        }
        if input.source() != *self {
            return Err(TransitionError::InvalidTransition {
                from: self.to_string(),
                to: input.target().to_string(),
            });
        }

        let skipped = input.skipped();
        let output = if skipped.is_empty() {
            TransitionOutput::ok()
        } else {
            TransitionOutput::with_warnings(skipped)
        };
        Ok((input.target(), output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::StateMachineWithHistory;
    use chrono::Utc;

    fn full_run() -> Vec<AssemblyStep> {
        vec![
            AssemblyStep::BuildNetwork,
            AssemblyStep::BuildCompute,
            AssemblyStep::BuildStore,
            AssemblyStep::BuildDatabase,
            AssemblyStep::BuildEdge {
                asset_distribution: true,
                load_balancer: false,
            },
            AssemblyStep::BuildFederation { user_directory: true },
            AssemblyStep::Wire,
            AssemblyStep::Finish,
        ]
    }

    #[test]
    fn test_stages_are_strictly_sequential() {
        let mut fsm = StateMachineWithHistory::new(AssemblyStage::Configured);
        for step in full_run() {
            fsm.transition_with_history(step, Utc::now()).unwrap();
        }
        assert_eq!(*fsm.current_state(), AssemblyStage::Done);

        let visited: Vec<AssemblyStage> = std::iter::once(AssemblyStage::Configured)
            .chain(fsm.history.iter().map(|t| t.to))
            .collect();
        assert_eq!(visited, AssemblyStage::SEQUENCE.to_vec());
    }

    #[test]
    fn test_no_skipping_or_rollback() {
        assert!(matches!(
            AssemblyStage::Configured.transition(&AssemblyStep::BuildCompute),
            Err(TransitionError::InvalidTransition { .. })
        ));
        assert!(AssemblyStage::Wired
            .transition(&AssemblyStep::BuildNetwork)
            .is_err());
        assert!(matches!(
            AssemblyStage::Done.transition(&AssemblyStep::Finish),
            Err(TransitionError::BusinessRuleViolation(_))
        ));
    }

    #[test]
    fn test_skipped_builders_are_reported() {
        let (_, output) = AssemblyStage::DatabaseBuilt
            .transition(&AssemblyStep::BuildEdge {
                asset_distribution: false,
                load_balancer: false,
            })
            .unwrap();
        assert_eq!(output.warnings.len(), 2);

        let (_, output) = AssemblyStage::EdgeBuilt
            .transition(&AssemblyStep::BuildFederation { user_directory: true })
            .unwrap();
        assert!(output.warnings.is_empty());
    }
}
