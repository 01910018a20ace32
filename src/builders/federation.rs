// Copyright (c) 2025 - Cowboy AI, Inc.
//! Identity Federation Builder
//!
//! Lets CI workflows of one organization assume a narrowly scoped automation
//! role through the CI provider's OIDC tokens:
//!
//! 1. federation provider trusting the token issuer for one audience
//! 2. trust principal restricted by a `sub` claim condition
//! 3. automation role with a bounded session and an explicit allow-list
//!
//! The optional user directory is declared in the same stage by
//! [`UserDirectoryBuilder`](super::UserDirectoryBuilder).

use tracing::debug;

use super::{logical_id, relate, ResourceBuilder, StoreHandle};
use crate::config::FederationPlan;
use crate::domain::{PolicyDocument, PolicyStatement, ResourceKind, ResourceScope};
use crate::errors::{FieldContext, SynthesisResult};
use crate::graph::{EdgeKind, NodeHandle, PropertyValue, ResourceGraph, ResourceNode};

/// CI identity token issuer
pub const ISSUER_URL: &str = "https://token.actions.githubusercontent.com";

/// Audience the tokens are minted for
pub const AUDIENCE: &str = "sts.amazonaws.com";

/// Account placeholder resolved by the backend when no account is configured
pub const ACCOUNT_TOKEN: &str = "${AWS::AccountId}";

pub struct FederationBuilder<'a> {
    plan: &'a FederationPlan,
    prefix: &'a str,
    account_id: Option<&'a str>,
    store: &'a StoreHandle,
}

#[derive(Debug, Clone)]
pub struct FederationHandle {
    pub provider: NodeHandle,
    pub principal: NodeHandle,
    pub role: NodeHandle,
}

impl<'a> FederationBuilder<'a> {
    pub fn new(
        prefix: &'a str,
        plan: &'a FederationPlan,
        account_id: Option<&'a str>,
        store: &'a StoreHandle,
    ) -> Self {
        Self {
            plan,
            prefix,
            account_id,
            store,
        }
    }

    fn issuer_host() -> &'static str {
        ISSUER_URL.trim_start_matches("https://")
    }

    /// Deployment-role assumption, artifact upload, optional introspection
    pub fn automation_policy(&self) -> SynthesisResult<PolicyDocument> {
        let account = self.account_id.unwrap_or(ACCOUNT_TOKEN);

        let mut statements = vec![
            PolicyStatement::allow(
                ["sts:AssumeRole"],
                vec![ResourceScope::Pattern(format!("arn:aws:iam::{}:role/cdk-*", account))],
            ),
            PolicyStatement::allow(
                ["s3:PutObject"],
                vec![ResourceScope::ObjectsOf(self.store.store.attr("Arn"))],
            ),
        ];
        if self.plan.allow_introspection {
            statements.push(PolicyStatement::allow(
                ["ec2:DescribeInstances", "ssm:GetParameter"],
                vec![ResourceScope::Any],
            ));
        }

        let statements = statements
            .into_iter()
            .collect::<Result<Vec<_>, _>>()
            .field("federation.policy")?;
        PolicyDocument::new(statements).field("federation.policy")
    }
}

impl ResourceBuilder for FederationBuilder<'_> {
    type Output = FederationHandle;
    const NAME: &'static str = "federation";

    fn build(self, graph: &mut ResourceGraph) -> SynthesisResult<FederationHandle> {
        let policy = self.automation_policy()?;

        let provider = graph.add_node(
            ResourceNode::new(logical_id(self.prefix, "ci-federation-provider")?, ResourceKind::FederationProvider)
                .with_property("url", ISSUER_URL)
                .with_property("client_ids", vec![AUDIENCE]),
        )?;

        let condition = self.plan.subject_match.condition(
            Self::issuer_host(),
            &self.plan.organization,
            &self.plan.repository,
        );
        let principal = graph.add_node(
            ResourceNode::new(logical_id(self.prefix, "ci-trust-principal")?, ResourceKind::TrustPrincipal)
                .with_property("provider_arn", provider.reference("Arn"))
                .with_property("conditions", condition.to_property()),
        )?;
        relate(graph, &provider, &principal, EdgeKind::TrustGrant)?;

        let role = graph.add_node(
            ResourceNode::new(logical_id(self.prefix, "ci-automation-role")?, ResourceKind::IdentityRole)
                .with_property("role_name", self.plan.role_name.as_str())
                .with_property("description", "Role assumed by GitHub actions for CD Runners.")
                .with_property("assumed_by", principal.reference("PrincipalId"))
                .with_property(
                    "max_session_duration_secs",
                    u64::from(self.plan.session_duration_hours) * 3600,
                )
                .with_property("policy_name", "CdkDeploymentPolicy")
                .with_property("policy", policy.to_property()),
        )?;
        relate(graph, &principal, &role, EdgeKind::TrustGrant)?;
        relate(graph, &role, &self.store.store, EdgeKind::TrustGrant)?;

        debug!(
            role = %role.id(),
            subject = %condition.value,
            operator = %condition.operator,
            "federation declared"
        );

        Ok(FederationHandle {
            provider,
            principal,
            role,
        })
    }
}

/// Property of the trust principal's `sub` claim condition, for inspection
pub fn subject_condition_value(node: &ResourceNode) -> Option<&PropertyValue> {
    match node.property("conditions")? {
        PropertyValue::Map(by_operator) => match by_operator.values().next()? {
            PropertyValue::Map(by_claim) => by_claim.values().next(),
            _ => None,
        },
        _ => None,
    }
}
