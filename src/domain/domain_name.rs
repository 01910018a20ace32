// Copyright (c) 2025 - Cowboy AI, Inc.
//! Domain Name Value Object with DNS Validation Invariants
//!
//! Used for distribution aliases. A single leading `*` label is accepted so
//! wildcard aliases such as `*.phipson.co.za` can be declared.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Domain name validation error
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainNameError {
    #[error("Domain name is empty")]
    Empty,

    #[error("Domain name exceeds maximum length of 253 characters: {0}")]
    TooLong(usize),

    #[error("Label exceeds maximum length of 63 characters: {0}")]
    LabelTooLong(String),

    #[error("Invalid character in domain name: {0}")]
    InvalidCharacter(char),

    #[error("Label cannot start or end with hyphen: {0}")]
    InvalidLabelFormat(String),

    #[error("Wildcard is only allowed as the entire first label")]
    MisplacedWildcard,

    #[error("Domain name needs at least two labels: {0}")]
    NotQualified(String),
}

/// Fully qualified domain name (RFC 1123), lowercased
///
/// # Examples
///
/// ```rust
/// use tpb_infrastructure::domain::DomainName;
///
/// let apex = DomainName::new("taskify.phipson.co.za").unwrap();
/// let wildcard = DomainName::new("*.phipson.co.za").unwrap();
/// assert!(wildcard.is_wildcard());
/// assert!(DomainName::new("localhost").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DomainName(String);

impl DomainName {
    /// Maximum total length (RFC 1123)
    pub const MAX_LENGTH: usize = 253;

    /// Maximum length for a single label (RFC 1123)
    pub const MAX_LABEL_LENGTH: usize = 63;

    /// Create a new domain name with validation
    pub fn new(name: impl Into<String>) -> Result<Self, DomainNameError> {
        let name = name.into().to_ascii_lowercase();

        if name.is_empty() {
            return Err(DomainNameError::Empty);
        }

        if name.len() > Self::MAX_LENGTH {
            return Err(DomainNameError::TooLong(name.len()));
        }

        let labels: Vec<&str> = name.split('.').collect();
        if labels.len() < 2 {
            return Err(DomainNameError::NotQualified(name));
        }

        for (i, label) in labels.iter().enumerate() {
            if *label == "*" {
                if i != 0 {
                    return Err(DomainNameError::MisplacedWildcard);
                }
                continue;
            }
            Self::validate_label(label)?;
        }

        Ok(Self(name))
    }

    fn validate_label(label: &str) -> Result<(), DomainNameError> {
        if label.is_empty() {
            return Err(DomainNameError::Empty);
        }

        if label.len() > Self::MAX_LABEL_LENGTH {
            return Err(DomainNameError::LabelTooLong(label.to_string()));
        }

        for ch in label.chars() {
            if ch == '*' {
                return Err(DomainNameError::MisplacedWildcard);
            }
            if !ch.is_ascii_alphanumeric() && ch != '-' {
                return Err(DomainNameError::InvalidCharacter(ch));
            }
        }

        if label.starts_with('-') || label.ends_with('-') {
            return Err(DomainNameError::InvalidLabelFormat(label.to_string()));
        }

        Ok(())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the first label is `*`
    pub fn is_wildcard(&self) -> bool {
        self.0.starts_with("*.")
    }
}

impl fmt::Display for DomainName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for DomainName {
    type Error = DomainNameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DomainName> for String {
    fn from(name: DomainName) -> Self {
        name.0
    }
}
