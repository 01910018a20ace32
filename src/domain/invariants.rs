// Copyright (c) 2025 - Cowboy AI, Inc.
//! Pure Validation Functions - Configuration Invariants
//!
//! Business rules checked before any node is declared. Every function is pure
//! and deterministic; callers attach the offending configuration field.
//!
//! # Invariant Categories
//!
//! 1. **Structural**: identifiers, names, URLs
//! 2. **Bounds**: ports, session durations, TTL windows, password policy
//! 3. **Least privilege**: wildcard resource scope on mutating actions

/// Validation result with detailed error information
pub type ValidationResult = Result<(), ValidationError>;

/// Validation error with context
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Required value was empty
    #[error("value must not be empty")]
    Empty,

    /// Identifier contains characters outside the allowed set
    #[error("invalid identifier `{0}`: use lowercase letters, digits and single hyphens")]
    InvalidIdentifier(String),

    /// Name used in an external subject claim is malformed
    #[error("invalid name `{0}`: use letters, digits, '-', '_' or '.'")]
    InvalidName(String),

    /// Action is not `service:Operation`
    #[error("invalid action `{0}`: expected service:Operation")]
    InvalidAction(String),

    /// Statement without actions
    #[error("policy statement declares no actions")]
    MissingActions,

    /// Statement without resources
    #[error("policy statement declares no resources")]
    MissingResources,

    /// Mutating action granted on every resource
    #[error("wildcard resource scope is only allowed for read-only actions, found `{0}`")]
    WildcardMutatingAction(String),

    /// TTL bounds out of order
    #[error("TTL window must satisfy min <= default <= max, got {min}s/{default}s/{max}s")]
    InvalidTtlWindow { min: u64, default: u64, max: u64 },

    /// Session duration out of the provider's bounds
    #[error("session duration of {0}h is outside 1-12h")]
    InvalidSessionDuration(u32),

    /// Certificate reference is blank or contains whitespace
    #[error("invalid certificate reference `{0}`")]
    InvalidCertificate(String),

    /// URL is not absolute http(s)
    #[error("invalid URL `{0}`: must start with http:// or https://")]
    InvalidUrl(String),

    /// Password policy minimum length out of bounds
    #[error("password minimum length {0} is outside 6-99")]
    InvalidPasswordLength(u8),
}

/// Validate a lowercase identifier used as a logical-id prefix
///
/// # Rules
/// - Non-empty, at most 32 characters
/// - Lowercase ASCII letters, digits and hyphens
/// - No leading, trailing or doubled hyphens
pub fn validate_identifier(value: &str) -> ValidationResult {
    if value.is_empty() {
        return Err(ValidationError::Empty);
    }

    let well_formed = value.len() <= 32
        && value
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !value.starts_with('-')
        && !value.ends_with('-')
        && !value.contains("--");

    if !well_formed {
        return Err(ValidationError::InvalidIdentifier(value.to_string()));
    }
    Ok(())
}

/// Validate an organization or repository name embedded in a subject claim
///
/// Wildcards and path separators are rejected so a name can never widen the
/// trust condition it is interpolated into.
pub fn validate_subject_name(value: &str) -> ValidationResult {
    if value.is_empty() {
        return Err(ValidationError::Empty);
    }
    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err(ValidationError::InvalidName(value.to_string()));
    }
    Ok(())
}

/// Validate a free-form required string (key-pair name, usernames)
pub fn validate_non_blank(value: &str) -> ValidationResult {
    if value.trim().is_empty() {
        return Err(ValidationError::Empty);
    }
    Ok(())
}

/// Validate an automation role session duration in hours (1-12)
pub fn validate_session_duration(hours: u32) -> ValidationResult {
    if !(1..=12).contains(&hours) {
        return Err(ValidationError::InvalidSessionDuration(hours));
    }
    Ok(())
}

/// Validate TTL ordering
pub fn validate_ttl_window(min: u64, default: u64, max: u64) -> ValidationResult {
    if min > default || default > max {
        return Err(ValidationError::InvalidTtlWindow { min, default, max });
    }
    Ok(())
}

/// Validate a callback/logout URL
pub fn validate_url(value: &str) -> ValidationResult {
    let rest = value
        .strip_prefix("https://")
        .or_else(|| value.strip_prefix("http://"));

    match rest {
        Some(host) if !host.is_empty() && !host.contains(char::is_whitespace) => Ok(()),
        _ => Err(ValidationError::InvalidUrl(value.to_string())),
    }
}

/// Validate a password policy minimum length (6-99)
pub fn validate_password_length(min_length: u8) -> ValidationResult {
    if !(6..=99).contains(&min_length) {
        return Err(ValidationError::InvalidPasswordLength(min_length));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("tpb")]
    #[test_case("task-progress")]
    #[test_case("env2")]
    fn test_valid_identifier(value: &str) {
        assert!(validate_identifier(value).is_ok());
    }

    #[test_case("" ; "empty")]
    #[test_case("TPB" ; "uppercase")]
    #[test_case("-tpb" ; "leading hyphen")]
    #[test_case("tpb-" ; "trailing hyphen")]
    #[test_case("tp--b" ; "double hyphen")]
    #[test_case("tpb_web" ; "underscore")]
    fn test_invalid_identifier(value: &str) {
        assert!(validate_identifier(value).is_err());
    }

    #[test]
    fn test_subject_name_rejects_wildcards() {
        assert!(validate_subject_name("phipson").is_ok());
        assert!(validate_subject_name("task_progress.web-ui").is_ok());
        assert_eq!(
            validate_subject_name("org/*"),
            Err(ValidationError::InvalidName("org/*".to_string()))
        );
        assert_eq!(validate_subject_name(""), Err(ValidationError::Empty));
    }

    #[test]
    fn test_session_duration_bounds() {
        assert!(validate_session_duration(1).is_ok());
        assert!(validate_session_duration(12).is_ok());
        assert!(validate_session_duration(0).is_err());
        assert!(validate_session_duration(13).is_err());
    }

    #[test]
    fn test_ttl_window_ordering() {
        assert!(validate_ttl_window(0, 0, 0).is_ok());
        assert!(validate_ttl_window(300, 600, 600).is_ok());
        assert!(validate_ttl_window(600, 300, 600).is_err());
        assert!(validate_ttl_window(0, 700, 600).is_err());
    }

    #[test]
    fn test_url_validation() {
        assert!(validate_url("https://taskify.phipson.co.za").is_ok());
        assert!(validate_url("http://localhost:5500").is_ok());
        assert!(validate_url("ftp://example.com").is_err());
        assert!(validate_url("https://").is_err());
        assert!(validate_url("https://bad host").is_err());
    }

    #[test]
    fn test_password_length() {
        assert!(validate_password_length(8).is_ok());
        assert!(validate_password_length(5).is_err());
        assert!(validate_password_length(100).is_err());
    }

    #[test]
    fn test_non_blank() {
        assert!(validate_non_blank("tpb-key").is_ok());
        assert_eq!(validate_non_blank("   "), Err(ValidationError::Empty));
    }
}
