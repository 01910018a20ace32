// Copyright (c) 2025 - Cowboy AI, Inc.
//! Content Distribution Value Objects
//!
//! TTL windows, forwarding behaviours and protocol policies for the two CDN
//! distributions. Cache-key semantics are the backend's concern.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use super::invariants::{validate_ttl_window, ValidationError};

/// Bounded cache TTL window, `min <= default <= max`, in whole seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "TtlSeconds", into = "TtlSeconds")]
pub struct TtlWindow {
    min: u64,
    default: u64,
    max: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct TtlSeconds {
    min_secs: u64,
    default_secs: u64,
    max_secs: u64,
}

impl TtlWindow {
    pub fn new(min: Duration, default: Duration, max: Duration) -> Result<Self, ValidationError> {
        Self::from_secs(min.as_secs(), default.as_secs(), max.as_secs())
    }

    pub fn from_secs(min: u64, default: u64, max: u64) -> Result<Self, ValidationError> {
        validate_ttl_window(min, default, max)?;
        Ok(Self { min, default, max })
    }

    /// Every request reaches the origin
    pub fn zero() -> Self {
        Self {
            min: 0,
            default: 0,
            max: 0,
        }
    }

    pub fn min(&self) -> Duration {
        Duration::from_secs(self.min)
    }

    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default)
    }

    pub fn max(&self) -> Duration {
        Duration::from_secs(self.max)
    }

    pub fn is_zero(&self) -> bool {
        self.max == 0
    }
}

impl TryFrom<TtlSeconds> for TtlWindow {
    type Error = ValidationError;

    fn try_from(value: TtlSeconds) -> Result<Self, Self::Error> {
        Self::from_secs(value.min_secs, value.default_secs, value.max_secs)
    }
}

impl From<TtlWindow> for TtlSeconds {
    fn from(window: TtlWindow) -> Self {
        Self {
            min_secs: window.min,
            default_secs: window.default,
            max_secs: window.max,
        }
    }
}

impl fmt::Display for TtlWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s <= {}s <= {}s", self.min, self.default, self.max)
    }
}

/// Which cookies, headers or query strings are forwarded or keyed on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Forwarding {
    None,
    All,
}

impl Forwarding {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::All => "all",
        }
    }
}

/// How viewers may reach the distribution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViewerProtocolPolicy {
    AllowAll,
    RedirectToHttps,
    HttpsOnly,
}

impl ViewerProtocolPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AllowAll => "allow-all",
            Self::RedirectToHttps => "redirect-to-https",
            Self::HttpsOnly => "https-only",
        }
    }
}

/// How the distribution reaches its origin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OriginProtocolPolicy {
    HttpOnly,
    HttpsOnly,
    MatchViewer,
}

impl OriginProtocolPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HttpOnly => "http-only",
            Self::HttpsOnly => "https-only",
            Self::MatchViewer => "match-viewer",
        }
    }
}

/// HTTP methods the distribution passes through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllowedMethods {
    GetHead,
    GetHeadOptions,
    All,
}

impl AllowedMethods {
    pub fn methods(&self) -> &'static [&'static str] {
        match self {
            Self::GetHead => &["GET", "HEAD"],
            Self::GetHeadOptions => &["GET", "HEAD", "OPTIONS"],
            Self::All => &["GET", "HEAD", "OPTIONS", "PUT", "PATCH", "POST", "DELETE"],
        }
    }
}

/// Reference to an externally issued TLS certificate
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CertificateRef(String);

impl CertificateRef {
    pub fn new(reference: impl Into<String>) -> Result<Self, ValidationError> {
        let reference = reference.into();
        if reference.is_empty() || reference.contains(char::is_whitespace) {
            return Err(ValidationError::InvalidCertificate(reference));
        }
        Ok(Self(reference))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CertificateRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for CertificateRef {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CertificateRef> for String {
    fn from(reference: CertificateRef) -> Self {
        reference.0
    }
}
