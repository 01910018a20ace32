//! Error types for stack synthesis

use std::fmt;
use thiserror::Error;

use crate::graph::GraphError;
use crate::state_machine::TransitionError;

/// Errors that can occur while synthesizing a stack
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SynthesisError {
    /// Configuration rejected before any node was declared
    #[error("Configuration error in `{field}`: {reason}")]
    Configuration { field: String, reason: String },

    /// Graph failed its integrity check and was not handed off
    #[error("Graph integrity error: {0}")]
    GraphIntegrity(#[from] GraphError),

    /// Assembler stage transition rejected
    #[error("Assembly transition error: {0}")]
    Transition(#[from] TransitionError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl SynthesisError {
    pub fn configuration(field: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::Configuration {
            field: field.into(),
            reason: reason.to_string(),
        }
    }

    /// Offending field for configuration errors
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Configuration { field, .. } => Some(field),
            _ => None,
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }
}

/// Result type for synthesis operations
pub type SynthesisResult<T> = Result<T, SynthesisError>;

impl From<serde_json::Error> for SynthesisError {
    fn from(err: serde_json::Error) -> Self {
        SynthesisError::Serialization(err.to_string())
    }
}

/// Attach the offending configuration field to a validation failure
pub trait FieldContext<T> {
    fn field(self, name: &str) -> SynthesisResult<T>;
}

impl<T, E: fmt::Display> FieldContext<T> for Result<T, E> {
    fn field(self, name: &str) -> SynthesisResult<T> {
        self.map_err(|err| SynthesisError::configuration(name, err))
    }
}
