// Copyright (c) 2025 - Cowboy AI, Inc.
//! User Directory Builder
//!
//! Email-based user pool for the web application plus the app client the
//! frontend signs in through. Only declared when user directory settings are
//! configured.

use super::{logical_id, relate, ResourceBuilder};
use crate::config::UserDirectoryPlan;
use crate::domain::{RemovalPolicy, ResourceKind};
use crate::errors::SynthesisResult;
use crate::graph::{EdgeKind, NodeHandle, PropertyValue, ResourceGraph, ResourceNode};

/// Standard attributes the client may read
const READ_ATTRIBUTES: [&str; 13] = [
    "given_name",
    "family_name",
    "email",
    "email_verified",
    "address",
    "birthdate",
    "gender",
    "phone_number",
    "phone_number_verified",
    "picture",
    "preferred_username",
    "zoneinfo",
    "updated_at",
];

/// Attributes only the directory itself may set
const SERVER_OWNED_ATTRIBUTES: [&str; 2] = ["email_verified", "phone_number_verified"];

pub struct UserDirectoryBuilder<'a> {
    prefix: &'a str,
    plan: &'a UserDirectoryPlan,
}

#[derive(Debug, Clone)]
pub struct DirectoryHandle {
    pub directory: NodeHandle,
    pub client: NodeHandle,
}

impl<'a> UserDirectoryBuilder<'a> {
    pub fn new(prefix: &'a str, plan: &'a UserDirectoryPlan) -> Self {
        Self { prefix, plan }
    }

    fn password_policy(&self) -> PropertyValue {
        PropertyValue::Map(
            [
                ("min_length", PropertyValue::from(u32::from(self.plan.password_min_length))),
                ("require_lowercase", PropertyValue::from(true)),
                ("require_digits", PropertyValue::from(true)),
                ("require_uppercase", PropertyValue::from(false)),
                ("require_symbols", PropertyValue::from(false)),
            ]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect(),
        )
    }
}

impl ResourceBuilder for UserDirectoryBuilder<'_> {
    type Output = DirectoryHandle;
    const NAME: &'static str = "user-directory";

    fn build(self, graph: &mut ResourceGraph) -> SynthesisResult<DirectoryHandle> {
        let directory = graph.add_node(
            ResourceNode::new(logical_id(self.prefix, "user-directory")?, ResourceKind::UserDirectory)
                .with_property("user_pool_name", format!("{}-user-pool", self.prefix))
                .with_property("self_sign_up", self.plan.self_sign_up)
                .with_property("sign_in_aliases", vec!["email"])
                .with_property("auto_verify", vec!["email"])
                .with_property("required_attributes", vec!["given_name", "family_name"])
                .with_property("password_policy", self.password_policy())
                .with_property("account_recovery", "email_only")
                .with_removal_policy(RemovalPolicy::Destroy),
        )?;

        let write_attributes: Vec<&str> = READ_ATTRIBUTES
            .iter()
            .copied()
            .filter(|a| !SERVER_OWNED_ATTRIBUTES.contains(a))
            .collect();

        let client = graph.add_node(
            ResourceNode::new(logical_id(self.prefix, "user-directory-client")?, ResourceKind::UserDirectoryClient)
                .with_property("user_pool_id", directory.reference("UserPoolId"))
                .with_property("auth_flows", vec!["custom", "user_srp"])
                .with_property("identity_providers", vec!["COGNITO"])
                .with_property("read_attributes", READ_ATTRIBUTES.to_vec())
                .with_property("write_attributes", write_attributes)
                .with_property("callback_urls", self.plan.callback_urls.clone())
                .with_property("logout_urls", self.plan.logout_urls.clone()),
        )?;
        relate(graph, &client, &directory, EdgeKind::Association)?;

        Ok(DirectoryHandle { directory, client })
    }
}
