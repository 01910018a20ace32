// Copyright (c) 2025 - Cowboy AI, Inc.
//! Data Store Builder
//!
//! The database boundary is declared empty. Its single ingress rule names the
//! compute boundary as source and is added by the assembler's wiring stage,
//! together with the matching trust-grant edge.

use tracing::debug;

use super::{attach_boundary, logical_id, NetworkHandle, ResourceBuilder};
use crate::config::DatabasePlan;
use crate::domain::{Port, RemovalPolicy, ResourceKind};
use crate::errors::{SynthesisError, SynthesisResult};
use crate::graph::{NodeHandle, PropertyValue, ResourceGraph, ResourceNode};

pub struct DatabaseBuilder<'a> {
    prefix: &'a str,
    plan: &'a DatabasePlan,
    network: &'a NetworkHandle,
}

#[derive(Debug, Clone)]
pub struct DatabaseHandle {
    pub boundary: NodeHandle,
    pub database: NodeHandle,
    /// Listening port, the only port the boundary will admit
    pub port: Port,
}

impl<'a> DatabaseBuilder<'a> {
    pub fn new(prefix: &'a str, plan: &'a DatabasePlan, network: &'a NetworkHandle) -> Self {
        Self {
            prefix,
            plan,
            network,
        }
    }

    /// Generated credential, held by the secret store under a fixed name
    fn credentials(&self) -> PropertyValue {
        PropertyValue::Map(
            [
                ("username".to_string(), PropertyValue::from(self.plan.username.as_str())),
                ("generated_secret".to_string(), PropertyValue::from(true)),
                (
                    "secret_name".to_string(),
                    PropertyValue::from(format!("{}-rds-credentials", self.prefix)),
                ),
            ]
            .into_iter()
            .collect(),
        )
    }
}

impl ResourceBuilder for DatabaseBuilder<'_> {
    type Output = DatabaseHandle;
    const NAME: &'static str = "database";

    fn build(self, graph: &mut ResourceGraph) -> SynthesisResult<DatabaseHandle> {
        let subnets: Vec<PropertyValue> = self
            .network
            .subnets
            .iter()
            .map(|(_, subnet)| subnet.reference("SubnetId"))
            .collect();
        if subnets.is_empty() {
            return Err(SynthesisError::configuration(
                "network.subnets",
                "the database needs at least one subnet",
            ));
        }

        let boundary = graph.add_node(
            ResourceNode::new(logical_id(self.prefix, "database-boundary")?, ResourceKind::SecurityBoundary)
                .with_property("group_name", format!("{}-db-security-group", self.prefix))
                .with_property("vpc_id", self.network.network.reference("VpcId")),
        )?;

        let database = graph.add_node(
            ResourceNode::new(logical_id(self.prefix, "database")?, ResourceKind::ManagedDatabase)
                .with_property("instance_identifier", format!("{}-db", self.prefix))
                .with_property("engine", self.plan.engine.as_str())
                .with_property("instance_class", self.plan.instance_class.as_str())
                .with_property("port", self.plan.port.value())
                .with_property("credentials", self.credentials())
                .with_property("multi_az", false)
                .with_property("allocated_storage_gib", self.plan.allocated_storage_gib)
                .with_property("subnet_ids", PropertyValue::List(subnets))
                .with_property(
                    "security_group_ids",
                    PropertyValue::List(vec![boundary.reference("GroupId")]),
                )
                .with_removal_policy(RemovalPolicy::Destroy),
        )?;
        attach_boundary(graph, &boundary, &database)?;

        debug!(database = %database.id(), port = %self.plan.port, "database declared");

        Ok(DatabaseHandle {
            boundary,
            database,
            port: self.plan.port,
        })
    }
}
