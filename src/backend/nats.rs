// Copyright (c) 2025 - Cowboy AI, Inc.
//! NATS provisioning backend
//!
//! Hands each node to a provisioner service over NATS request/reply, then
//! publishes the relationship set once every node exists.
//!
//! # Subjects
//!
//! ```text
//! infrastructure.provision.{kind}           request/reply, one per node
//! infrastructure.provision.relationships    publish, once per run
//! ```

use async_nats::{Client, ConnectOptions};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tracing::{debug, info, info_span, Instrument};
use uuid::Uuid;

use super::{
    provisioning_order, resolve_properties, split_rules, DeferredRule, ProvisionError,
    ProvisionedResource, ProvisionedStack, ProvisioningBackend,
};
use crate::assembler::StackManifest;
use crate::domain::{IngressRule, RemovalPolicy, ResourceKind};
use crate::graph::{Edge, NodeId};
use crate::state_machine::{NodeLifecycleInput, StateMachine};

/// Root of every provisioning subject
pub const PROVISION_ROOT: &str = "infrastructure.provision";

/// Subject a node of `kind` is provisioned on
pub fn provision_subject(kind: ResourceKind) -> String {
    format!("{}.{}", PROVISION_ROOT, kind.as_str())
}

/// Subject the relationship set is published on
pub fn relationships_subject() -> String {
    format!("{}.relationships", PROVISION_ROOT)
}

/// Configuration for NATS connection
#[derive(Debug, Clone)]
pub struct NatsConfig {
    /// NATS server URLs
    pub servers: Vec<String>,
    /// Client name
    pub name: String,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Request timeout, per node
    pub request_timeout: Duration,
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            servers: vec!["nats://localhost:4222".to_string()],
            name: "tpb-synth".to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// NATS client wrapper
#[derive(Clone)]
pub struct NatsClient {
    client: Client,
}

impl NatsClient {
    /// Create a new NATS client with the given configuration
    pub async fn new(config: &NatsConfig) -> Result<Self, ProvisionError> {
        let connect_options = ConnectOptions::new()
            .name(&config.name)
            .connection_timeout(config.connect_timeout)
            .request_timeout(Some(config.request_timeout));

        let client = async_nats::connect_with_options(config.servers.join(","), connect_options)
            .await
            .map_err(|e| ProvisionError::Unavailable(e.to_string()))?;

        info!("Connected to NATS at {:?}", config.servers);

        Ok(Self { client })
    }

    /// Publish a message to a subject
    pub async fn publish<T>(&self, subject: &str, message: &T) -> Result<(), ProvisionError>
    where
        T: Serialize,
    {
        let payload = serde_json::to_vec(message)?;

        self.client
            .publish(subject.to_string(), payload.into())
            .await
            .map_err(|e| ProvisionError::Transport(e.to_string()))?;

        debug!("Published message to subject: {}", subject);
        Ok(())
    }

    /// Request-reply pattern
    pub async fn request<T, R>(&self, subject: &str, request: &T) -> Result<R, ProvisionError>
    where
        T: Serialize,
        R: for<'de> Deserialize<'de>,
    {
        let payload = serde_json::to_vec(request)?;

        let response = self
            .client
            .request(subject.to_string(), payload.into())
            .await
            .map_err(|e| ProvisionError::Transport(e.to_string()))?;

        Ok(serde_json::from_slice(&response.payload)?)
    }

    /// Get the underlying NATS client for advanced operations
    pub fn inner(&self) -> &Client {
        &self.client
    }
}

/// Creation request for one node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvisionRequest {
    pub run_id: Uuid,
    pub node: NodeId,
    pub kind: ResourceKind,
    pub properties: BTreeMap<String, serde_json::Value>,
    /// Rules whose source needs no other node
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ingress_rules: Vec<IngressRule>,
    pub removal_policy: RemovalPolicy,
}

/// Provisioner's answer to a [`ProvisionRequest`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionReply {
    #[serde(default)]
    pub physical_id: Option<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Published once every node exists
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipSet {
    pub run_id: Uuid,
    pub physical_ids: BTreeMap<NodeId, String>,
    pub edges: Vec<Edge>,
    pub deferred_rules: Vec<DeferredRule>,
}

/// Backend delegating node creation to a provisioner service
pub struct NatsProvisioningBackend {
    client: NatsClient,
}

impl NatsProvisioningBackend {
    pub fn new(client: NatsClient) -> Self {
        Self { client }
    }

    pub async fn connect(config: &NatsConfig) -> Result<Self, ProvisionError> {
        Ok(Self::new(NatsClient::new(config).await?))
    }

    fn accept(node: &NodeId, reply: ProvisionReply) -> Result<(String, BTreeMap<String, String>), ProvisionError> {
        if let Some(reason) = reply.error {
            return Err(ProvisionError::NodeFailed {
                node: node.clone(),
                reason,
            });
        }
        let physical_id = reply.physical_id.ok_or_else(|| ProvisionError::NodeFailed {
            node: node.clone(),
            reason: "provisioner returned no physical id".to_string(),
        })?;
        Ok((physical_id, reply.attributes))
    }
}

#[async_trait]
impl ProvisioningBackend for NatsProvisioningBackend {
    type Error = ProvisionError;

    async fn provision(&mut self, manifest: &StackManifest) -> Result<ProvisionedStack, ProvisionError> {
        let run_id = manifest.metadata.run_id;
        let order = provisioning_order(manifest)?;

        let mut attributes: HashMap<NodeId, BTreeMap<String, String>> = HashMap::new();
        let mut resources = Vec::with_capacity(order.len());
        let mut deferred_rules = Vec::new();

        for node in order {
            let properties = resolve_properties(node, &attributes)?;
            let (ingress_rules, deferred) = split_rules(node);
            deferred_rules.extend(deferred);

            let request = ProvisionRequest {
                run_id,
                node: node.id.clone(),
                kind: node.kind,
                properties: properties.clone(),
                ingress_rules,
                removal_policy: node.removal_policy,
            };
            let subject = provision_subject(node.kind);
            let reply: ProvisionReply = self
                .client
                .request(&subject, &request)
                .instrument(info_span!("provision", node = %node.id, %subject))
                .await
                .map_err(|e| match e {
                    ProvisionError::Transport(reason) => ProvisionError::NodeFailed {
                        node: node.id.clone(),
                        reason,
                    },
                    other => other,
                })?;

            let (physical_id, produced) = Self::accept(&node.id, reply)?;
            let (state, _) = node.state.transition(&NodeLifecycleInput::Provision)?;
            debug!(node = %node.id, %physical_id, "node provisioned");

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

        let relationships = RelationshipSet {
            run_id,
            physical_ids: resources
                .iter()
                .map(|r| (r.id.clone(), r.physical_id.clone()))
                .collect(),
            edges: manifest.graph.edges().to_vec(),
            deferred_rules: deferred_rules.clone(),
        };
        self.client
            .publish(&relationships_subject(), &relationships)
            .await?;

        info!(%run_id, resources = resources.len(), "stack provisioned over NATS");

        Ok(ProvisionedStack {
            run_id,
            backend: self.name().to_string(),
            resources,
            deferred_rules,
            relationships: relationships.edges,
        })
    }

    async fn health_check(&self) -> Result<(), ProvisionError> {
        self.client
            .inner()
            .flush()
            .await
            .map_err(|e| ProvisionError::Unavailable(e.to_string()))
    }

    fn name(&self) -> &str {
        "nats"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subjects() {
        assert_eq!(
            provision_subject(ResourceKind::ManagedDatabase),
            format!("infrastructure.provision.{}", ResourceKind::ManagedDatabase.as_str())
        );
        assert_eq!(relationships_subject(), "infrastructure.provision.relationships");
    }

    #[test]
    fn test_reply_with_error_fails_the_node() {
        let node = NodeId::new("tpb-vpc").unwrap();
        let reply = ProvisionReply {
            physical_id: None,
            attributes: BTreeMap::new(),
            error: Some("quota exceeded".into()),
        };
        let err = NatsProvisioningBackend::accept(&node, reply).unwrap_err();
        assert_eq!(
            err,
            ProvisionError::NodeFailed {
                node,
                reason: "quota exceeded".into()
            }
        );
    }

    #[test]
    fn test_reply_without_physical_id_is_rejected() {
        let node = NodeId::new("tpb-vpc").unwrap();
        let reply: ProvisionReply = serde_json::from_str(r#"{"attributes":{"VpcId":"vpc-1"}}"#).unwrap();
        assert!(NatsProvisioningBackend::accept(&node, reply).is_err());
    }

    #[test]
    fn test_default_config() {
        let config = NatsConfig::default();
        assert_eq!(config.servers, vec!["nats://localhost:4222".to_string()]);
        assert_eq!(config.name, "tpb-synth");
    }
}
