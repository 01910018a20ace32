// Copyright (c) 2025 - Cowboy AI, Inc.
//! Dry-run backend
//!
//! Walks the manifest exactly as a real backend would, without creating
//! anything. Physical ids and attribute values are derived from logical ids,
//! so two runs over structurally equal manifests produce identical results.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, info, warn};

use super::{
    provisioning_order, requested_attributes, resolve_properties, split_rules, ProvisionError,
    ProvisionedResource, ProvisionedStack, ProvisioningBackend,
};
use crate::assembler::StackManifest;
use crate::graph::{NodeId, ResourceNode};
use crate::state_machine::{NodeLifecycleInput, StateMachine};

/// Attribute every provisioned node exposes
pub const ID_ATTRIBUTE: &str = "Id";

/// In-memory backend with deterministic identifiers
#[derive(Debug, Default)]
pub struct DryRunBackend {
    fail_on: BTreeSet<NodeId>,
    last_run: Option<ProvisionedStack>,
}

impl DryRunBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make provisioning of `node` fail, for exercising partial runs
    pub fn fail_on(mut self, node: NodeId) -> Self {
        self.fail_on.insert(node);
        self
    }

    /// Result of the last successful run
    pub fn last_run(&self) -> Option<&ProvisionedStack> {
        self.last_run.as_ref()
    }

    fn physical_id(node: &ResourceNode) -> String {
        format!("dry-run/{}/{}", node.kind.as_str(), node.id)
    }
}

#[async_trait]
impl ProvisioningBackend for DryRunBackend {
    type Error = ProvisionError;

    async fn provision(&mut self, manifest: &StackManifest) -> Result<ProvisionedStack, ProvisionError> {
        let run_id = manifest.metadata.run_id;
        let order = provisioning_order(manifest)?;
        let requested = requested_attributes(manifest);

        let mut attributes: HashMap<NodeId, BTreeMap<String, String>> = HashMap::new();
        let mut resources = Vec::with_capacity(order.len());
        let mut deferred_rules = Vec::new();

        for node in order {
            if self.fail_on.contains(&node.id) {
                warn!(node = %node.id, provisioned = resources.len(), "injected failure");
                return Err(ProvisionError::NodeFailed {
                    node: node.id.clone(),
                    reason: "failure injected by dry run".to_string(),
                });
            }

            let properties = resolve_properties(node, &attributes)?;
            let (_, deferred) = split_rules(node);
            deferred_rules.extend(deferred);

            let physical_id = Self::physical_id(node);
            let produced: BTreeMap<String, String> = requested
                .get(&node.id)
                .into_iter()
                .flatten()
                .map(String::as_str)
                .chain(std::iter::once(ID_ATTRIBUTE))
                .map(|attr| (attr.to_string(), format!("{}.{}", physical_id, attr)))
                .collect();

            let (state, output) = node.state.transition(&NodeLifecycleInput::Provision)?;
            for warning in output.warnings {
                debug!(node = %node.id, "{}", warning);
            }

            attributes.insert(node.id.clone(), produced.clone());
            resources.push(ProvisionedResource {
                id: node.id.clone(),
                kind: node.kind,
                physical_id,
                attributes: produced,
                properties,
                removal_policy: node.removal_policy,
                state,
            });
        }

        info!(
            %run_id,
            resources = resources.len(),
            deferred_rules = deferred_rules.len(),
            "dry run complete"
        );

        let stack = ProvisionedStack {
            run_id,
            backend: self.name().to_string(),
            resources,
            deferred_rules,
            relationships: manifest.graph.edges().to_vec(),
        };
        self.last_run = Some(stack.clone());
        Ok(stack)
    }

    async fn health_check(&self) -> Result<(), ProvisionError> {
        Ok(())
    }

    fn name(&self) -> &str {
        "dry-run"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::GraphAssembler;
    use crate::config::StackConfig;
    use crate::graph::NodeState;

    fn manifest() -> StackManifest {
        let config = StackConfig::builder("tpb-key", "tpb_db_user", 17388, "phipson", "taskify").build_unchecked();
        GraphAssembler::synthesize(&config).unwrap().manifest
    }

    #[tokio::test]
    async fn test_every_node_provisioned_in_order() {
        let manifest = manifest();
        let mut backend = DryRunBackend::new();
        let stack = backend.provision(&manifest).await.unwrap();

        assert_eq!(stack.resources.len(), manifest.graph.len());
        assert!(stack.resources.iter().all(|r| r.state == NodeState::Provisioned));

        let order: Vec<NodeId> = stack.resources.iter().map(|r| r.id.clone()).collect();
        assert!(crate::graph::topology::is_topological(manifest.graph.nodes(), &order));
        assert!(backend.last_run().is_some());
    }

    #[tokio::test]
    async fn test_injected_failure_stops_the_run() {
        let manifest = manifest();
        let target = NodeId::new("tpb-database").unwrap();
        let mut backend = DryRunBackend::new().fail_on(target.clone());

        let err = backend.provision(&manifest).await.unwrap_err();
        assert!(matches!(err, ProvisionError::NodeFailed { node, .. } if node == target));
        assert!(backend.last_run().is_none());
    }
}
