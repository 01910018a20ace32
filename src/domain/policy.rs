// Copyright (c) 2025 - Cowboy AI, Inc.
//! Permission Statements and Federated Trust Conditions
//!
//! Only the structure the composition model needs: which actions are granted
//! on which resource scopes, and which subject claims a federated principal
//! must present. Policy grammar itself belongs to the backend.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::invariants::{ValidationError, ValidationResult};
use crate::graph::{AttributeRef, PropertyValue};

/// Operation prefixes treated as read-only
const READ_ONLY_PREFIXES: [&str; 3] = ["Describe", "Get", "List"];

/// A `service:Operation` action
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Action(String);

impl Action {
    pub fn new(action: impl Into<String>) -> Result<Self, ValidationError> {
        let action = action.into();
        let valid = match action.split_once(':') {
            Some((service, operation)) => {
                !service.is_empty()
                    && !operation.is_empty()
                    && service
                        .chars()
                        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
                    && operation.chars().all(|c| c.is_ascii_alphanumeric() || c == '*')
            }
            None => false,
        };

        if !valid {
            return Err(ValidationError::InvalidAction(action));
        }
        Ok(Self(action))
    }

    pub fn service(&self) -> &str {
        self.0.split_once(':').map(|(s, _)| s).unwrap_or_default()
    }

    pub fn operation(&self) -> &str {
        self.0.split_once(':').map(|(_, o)| o).unwrap_or_default()
    }

    /// Describe/Get/List operations without wildcards
    pub fn is_read_only(&self) -> bool {
        let operation = self.operation();
        !operation.contains('*')
            && READ_ONLY_PREFIXES
                .iter()
                .any(|prefix| operation.starts_with(prefix))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Action {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Action> for String {
    fn from(action: Action) -> Self {
        action.0
    }
}

/// Resources a statement applies to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceScope {
    /// Every resource (`*`)
    Any,
    /// Literal resource name pattern, possibly containing provider tokens
    Pattern(String),
    /// Every object inside the store whose ARN attribute is referenced
    ObjectsOf(AttributeRef),
}

impl ResourceScope {
    pub fn is_wildcard(&self) -> bool {
        matches!(self, Self::Any)
    }

    pub fn to_property(&self) -> PropertyValue {
        match self {
            Self::Any => PropertyValue::from("*"),
            Self::Pattern(pattern) => PropertyValue::from(pattern.as_str()),
            Self::ObjectsOf(store_arn) => PropertyValue::Join(vec![
                PropertyValue::Reference(store_arn.clone()),
                PropertyValue::from("/*"),
            ]),
        }
    }
}

/// Allow statement: actions granted on resource scopes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyStatement {
    pub actions: Vec<Action>,
    pub resources: Vec<ResourceScope>,
}

impl PolicyStatement {
    /// Build and validate a statement
    pub fn allow<I, S>(actions: I, resources: Vec<ResourceScope>) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let actions = actions
            .into_iter()
            .map(Action::new)
            .collect::<Result<Vec<_>, _>>()?;

        let statement = Self { actions, resources };
        statement.validate()?;
        Ok(statement)
    }

    /// Least-privilege check: wildcard scope only for read-only actions
    pub fn validate(&self) -> ValidationResult {
        if self.actions.is_empty() {
            return Err(ValidationError::MissingActions);
        }
        if self.resources.is_empty() {
            return Err(ValidationError::MissingResources);
        }

        if self.resources.iter().any(ResourceScope::is_wildcard) {
            if let Some(mutating) = self.actions.iter().find(|a| !a.is_read_only()) {
                return Err(ValidationError::WildcardMutatingAction(mutating.to_string()));
            }
        }
        Ok(())
    }

    pub fn to_property(&self, sid: Option<String>) -> PropertyValue {
        let mut map = BTreeMap::new();
        if let Some(sid) = sid {
            map.insert("sid".to_string(), PropertyValue::from(sid));
        }
        map.insert("effect".to_string(), PropertyValue::from("Allow"));
        map.insert(
            "actions".to_string(),
            PropertyValue::List(self.actions.iter().map(|a| PropertyValue::from(a.as_str())).collect()),
        );
        map.insert(
            "resources".to_string(),
            PropertyValue::List(self.resources.iter().map(ResourceScope::to_property).collect()),
        );
        PropertyValue::Map(map)
    }
}

/// Ordered set of statements with generated statement ids
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDocument {
    pub statements: Vec<PolicyStatement>,
}

impl PolicyDocument {
    pub fn new(statements: Vec<PolicyStatement>) -> Result<Self, ValidationError> {
        for statement in &statements {
            statement.validate()?;
        }
        Ok(Self { statements })
    }

    /// Every action granted by the document
    pub fn actions(&self) -> impl Iterator<Item = &Action> {
        self.statements.iter().flat_map(|s| s.actions.iter())
    }

    /// Render with sequential statement ids
    pub fn to_property(&self) -> PropertyValue {
        PropertyValue::List(
            self.statements
                .iter()
                .enumerate()
                .map(|(i, s)| s.to_property(Some(i.to_string())))
                .collect(),
        )
    }
}

/// String comparison applied to a claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConditionOperator {
    /// Exact match
    StringEquals,
    /// Glob match (`*` any run, `?` any single character)
    StringLike,
}

impl fmt::Display for ConditionOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StringEquals => write!(f, "StringEquals"),
            Self::StringLike => write!(f, "StringLike"),
        }
    }
}

/// Condition on one claim of a federated identity token
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubjectCondition {
    pub operator: ConditionOperator,
    pub claim: String,
    pub value: String,
}

impl SubjectCondition {
    pub fn to_property(&self) -> PropertyValue {
        let mut claim = BTreeMap::new();
        claim.insert(self.claim.clone(), PropertyValue::from(self.value.as_str()));
        let mut map = BTreeMap::new();
        map.insert(self.operator.to_string(), PropertyValue::Map(claim));
        PropertyValue::Map(map)
    }
}

/// Which external repositories may assume the automation role
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "match", rename_all = "snake_case")]
pub enum SubjectMatch {
    /// Any repository of the organization
    #[default]
    Organization,
    /// Any ref of the configured repository
    Repository,
    /// Exactly one branch of the configured repository
    Branch { branch: String },
}

impl SubjectMatch {
    /// Build the `sub` claim condition for `issuer_host`
    pub fn condition(&self, issuer_host: &str, organization: &str, repository: &str) -> SubjectCondition {
        let claim = format!("{}:sub", issuer_host);
        let (operator, value) = match self {
            Self::Organization => (ConditionOperator::StringLike, format!("repo:{}/*", organization)),
            Self::Repository => (
                ConditionOperator::StringLike,
                format!("repo:{}/{}:*", organization, repository),
            ),
            Self::Branch { branch } => (
                ConditionOperator::StringEquals,
                format!("repo:{}/{}:ref:refs/heads/{}", organization, repository, branch),
            ),
        };
        SubjectCondition {
            operator,
            claim,
            value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NodeId;

    #[test]
    fn test_action_parsing() {
        let action = Action::new("ec2:DescribeInstances").unwrap();
        assert_eq!(action.service(), "ec2");
        assert_eq!(action.operation(), "DescribeInstances");
        assert!(action.is_read_only());

        assert!(!Action::new("s3:PutObject").unwrap().is_read_only());
        assert!(!Action::new("s3:Get*").unwrap().is_read_only());
        assert!(Action::new("PutObject").is_err());
        assert!(Action::new("s3:").is_err());
    }

    #[test]
    fn test_wildcard_scope_only_for_read_only_actions() {
        assert!(PolicyStatement::allow(
            ["secretsmanager:GetSecretValue", "ssm:GetParameter"],
            vec![ResourceScope::Any],
        )
        .is_ok());

        let err = PolicyStatement::allow(["s3:PutObject"], vec![ResourceScope::Any]).unwrap_err();
        assert_eq!(err, ValidationError::WildcardMutatingAction("s3:PutObject".into()));

        let store_arn = AttributeRef::new(NodeId::new("tpb-web-store").unwrap(), "Arn");
        assert!(PolicyStatement::allow(["s3:PutObject"], vec![ResourceScope::ObjectsOf(store_arn)]).is_ok());
    }

    #[test]
    fn test_empty_statement_rejected() {
        let none: [&str; 0] = [];
        assert_eq!(
            PolicyStatement::allow(none, vec![ResourceScope::Any]),
            Err(ValidationError::MissingActions)
        );
        assert_eq!(
            PolicyStatement::allow(["sts:AssumeRole"], vec![]),
            Err(ValidationError::MissingResources)
        );
    }

    #[test]
    fn test_subject_match_narrowing() {
        let host = "token.actions.githubusercontent.com";
        let org = SubjectMatch::Organization.condition(host, "phipson", "taskify");
        let repo = SubjectMatch::Repository.condition(host, "phipson", "taskify");
        let branch = SubjectMatch::Branch { branch: "main".into() }.condition(host, "phipson", "taskify");

        assert_eq!(org.claim, "token.actions.githubusercontent.com:sub");
        assert_eq!(org.value, "repo:phipson/*");
        assert_eq!(org.operator, ConditionOperator::StringLike);

        assert_eq!(repo.operator, ConditionOperator::StringLike);
        assert_eq!(repo.value, "repo:phipson/taskify:*");

        assert_eq!(branch.operator, ConditionOperator::StringEquals);
        assert_eq!(branch.value, "repo:phipson/taskify:ref:refs/heads/main");
    }
}
