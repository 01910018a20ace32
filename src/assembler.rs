// Copyright (c) 2025 - Cowboy AI, Inc.
//! Graph Assembler
//!
//! Single entry point turning a [`StackConfig`] into a finished, validated
//! [`StackManifest`]. Builders run strictly in stage order, each consuming the
//! handles of the stages before it:
//!
//! ```text
//! Configured ─BuildNetwork─▶ NetworkBuilt ─BuildCompute─▶ ComputeBuilt
//!   ─BuildStore─▶ StoreBuilt ─BuildDatabase─▶ DatabaseBuilt
//!   ─BuildEdge─▶ EdgeBuilt ─BuildFederation─▶ FederationBuilt
//!   ─Wire─▶ Wired ─Finish─▶ Done
//! ```
//!
//! Wiring is its own stage because the cross-builder trust edges need both
//! endpoints declared. Any error discards the partial graph; the assembler
//! has no external effects to undo.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span, warn};
use uuid::Uuid;

use crate::builders::{
    ComputeBuilder, ComputeHandle, DatabaseBuilder, DatabaseHandle, DirectoryHandle, EdgeBuilder,
    EdgeHandle, FederationBuilder, FederationHandle, LoadBalancerHandle, NetworkBuilder,
    NetworkHandle, ResourceBuilder, StoreBuilder, StoreHandle, UserDirectoryBuilder,
};
use crate::config::{StackConfig, StackPlan};
use crate::domain::{IngressRule, Port, PortConstraint, SourceScope};
use crate::errors::SynthesisResult;
use crate::graph::{Edge, EdgeKind, NodeHandle, NodeId, ResourceGraph};
use crate::state_machine::{AssemblyStage, AssemblyStep, StateMachineWithHistory, Transition};

/// Stack name used when the configuration does not set one
pub const DEFAULT_STACK_NAME: &str = "TaskProgressInfraStack";

/// Run metadata; excluded from structural comparisons
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestMetadata {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub stack_name: String,
    pub resource_prefix: String,
}

/// Finished graph handed to a provisioning backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackManifest {
    pub metadata: ManifestMetadata,
    pub graph: ResourceGraph,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl StackManifest {
    /// Same nodes, edges and warnings, ignoring run metadata
    pub fn structurally_eq(&self, other: &StackManifest) -> bool {
        self.graph == other.graph && self.warnings == other.warnings
    }

    pub fn to_json_pretty(&self) -> SynthesisResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Handles for every declared stage
#[derive(Debug, Clone)]
pub struct StackHandles {
    pub network: NetworkHandle,
    pub compute: ComputeHandle,
    pub store: StoreHandle,
    pub database: DatabaseHandle,
    pub edge: EdgeHandle,
    pub federation: FederationHandle,
    pub directory: Option<DirectoryHandle>,
}

/// Result of a synthesis run
#[derive(Debug, Clone)]
pub struct SynthesizedStack {
    pub manifest: StackManifest,
    pub handles: StackHandles,
    pub history: Vec<Transition<AssemblyStage, AssemblyStep>>,
}

impl SynthesizedStack {
    pub fn graph(&self) -> &ResourceGraph {
        &self.manifest.graph
    }
}

/// Sequential graph assembler
pub struct GraphAssembler {
    stage: StateMachineWithHistory<AssemblyStage>,
    graph: ResourceGraph,
    warnings: Vec<String>,
}

impl GraphAssembler {
    fn new() -> Self {
        Self {
            stage: StateMachineWithHistory::new(AssemblyStage::Configured),
            graph: ResourceGraph::new(),
            warnings: Vec::new(),
        }
    }

    /// Validate the configuration and build the full stack graph
    pub fn synthesize(config: &StackConfig) -> SynthesisResult<SynthesizedStack> {
        let run_id = Uuid::now_v7();
        let span = info_span!("synthesize", %run_id, prefix = %config.resource_prefix);
        let _guard = span.enter();

        let plan = config.validate()?;
        let mut assembler = Self::new();
        assembler.warnings.extend(plan.warnings.iter().cloned());

        let handles = assembler.assemble(&plan)?;

        let stack_name = plan
            .stack_name
            .clone()
            .unwrap_or_else(|| DEFAULT_STACK_NAME.to_string());

        info!(
            nodes = assembler.graph.len(),
            edges = assembler.graph.edges().len(),
            warnings = assembler.warnings.len(),
            "synthesized stack {}",
            stack_name
        );

        Ok(SynthesizedStack {
            manifest: StackManifest {
                metadata: ManifestMetadata {
                    run_id,
                    generated_at: Utc::now(),
                    stack_name,
                    resource_prefix: plan.prefix.clone(),
                },
                graph: assembler.graph,
                warnings: assembler.warnings,
            },
            handles,
            history: assembler.stage.history,
        })
    }

    fn assemble(&mut self, plan: &StackPlan) -> SynthesisResult<StackHandles> {
        let prefix = plan.prefix.as_str();

        let network = self.run(AssemblyStep::BuildNetwork, NetworkBuilder::new(prefix, &plan.network))?;
        let compute = self.run(
            AssemblyStep::BuildCompute,
            ComputeBuilder::new(prefix, &plan.compute, &network),
        )?;
        let store = self.run(AssemblyStep::BuildStore, StoreBuilder::new(prefix))?;
        let database = self.run(
            AssemblyStep::BuildDatabase,
            DatabaseBuilder::new(prefix, &plan.database, &network),
        )?;
        let edge = self.run(
            AssemblyStep::BuildEdge {
                asset_distribution: plan.asset_distribution.is_some(),
                load_balancer: plan.load_balancer.is_some(),
            },
            EdgeBuilder::new(plan, &network, &compute, &store),
        )?;

        let federation = FederationBuilder::new(prefix, &plan.federation, plan.account_id.as_deref(), &store)
            .build(&mut self.graph)?;
        let directory = plan
            .user_directory
            .as_ref()
            .map(|settings| UserDirectoryBuilder::new(prefix, settings).build(&mut self.graph))
            .transpose()?;
        self.advance(AssemblyStep::BuildFederation {
            user_directory: directory.is_some(),
        })?;

        wire_database(&mut self.graph, &compute.boundary, &database)?;
        if let Some(lb) = &edge.load_balancer {
            wire_load_balancer(&mut self.graph, lb, &compute.boundary)?;
        }
        self.advance(AssemblyStep::Wire)?;

        self.graph.resolve()?;
        self.advance(AssemblyStep::Finish)?;

        Ok(StackHandles {
            network,
            compute,
            store,
            database,
            edge,
            federation,
            directory,
        })
    }

    fn run<B: ResourceBuilder>(&mut self, step: AssemblyStep, builder: B) -> SynthesisResult<B::Output> {
        let _span = info_span!("stage", builder = B::NAME).entered();
        let before = self.graph.len();
        let output = builder.build(&mut self.graph)?;
        debug!(declared = self.graph.len() - before, "builder finished");
        self.advance(step)?;
        Ok(output)
    }

    fn advance(&mut self, step: AssemblyStep) -> SynthesisResult<()> {
        let output = self.stage.transition_with_history(step, Utc::now())?;
        for warning in output.warnings {
            warn!(stage = %self.stage.current_state(), "{}", warning);
            self.warnings.push(warning);
        }
        debug!(stage = %self.stage.current_state(), "stage reached");
        Ok(())
    }
}

/// Admit `port` on `target` from members of `source`, with the matching edge
fn grant_boundary_ingress(
    graph: &mut ResourceGraph,
    source: &NodeId,
    target: &NodeId,
    port: Port,
    kind: EdgeKind,
    description: &str,
) -> SynthesisResult<()> {
    graph.add_ingress_rule(
        target,
        IngressRule::tcp(port, SourceScope::Boundary(source.clone()), description),
    )?;
    graph.add_edge(
        Edge::new(source.clone(), target.clone(), kind).with_constraint(PortConstraint::tcp(port)),
    )?;
    Ok(())
}

/// Compute boundary may reach the database on its listening port, nothing else
fn wire_database(
    graph: &mut ResourceGraph,
    compute_boundary: &NodeHandle,
    database: &DatabaseHandle,
) -> SynthesisResult<()> {
    grant_boundary_ingress(
        graph,
        compute_boundary.id(),
        database.boundary.id(),
        database.port,
        EdgeKind::TrustGrant,
        "Allow database connections from the compute boundary.",
    )
}

/// Load balancer may reach the instance on 80 and 443
fn wire_load_balancer(
    graph: &mut ResourceGraph,
    lb: &LoadBalancerHandle,
    compute_boundary: &NodeHandle,
) -> SynthesisResult<()> {
    for port in [Port::HTTP, Port::HTTPS] {
        grant_boundary_ingress(
            graph,
            lb.boundary.id(),
            compute_boundary.id(),
            port,
            EdgeKind::NetworkIngress,
            "Allow traffic from the load balancer.",
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoadBalancerSettings;
    use crate::domain::ResourceKind;

    fn config() -> crate::config::StackConfigBuilder {
        StackConfig::builder("tpb-key", "tpb_db_user", 17388, "phipson", "taskify")
    }

    #[test]
    fn test_history_covers_every_stage() {
        let stack = GraphAssembler::synthesize(&config().build_unchecked()).unwrap();
        let reached: Vec<AssemblyStage> = stack.history.iter().map(|t| t.to).collect();
        assert_eq!(reached, AssemblyStage::SEQUENCE[1..].to_vec());
        assert!(stack.graph().is_resolved());
    }

    #[test]
    fn test_skipped_builders_become_warnings() {
        let stack = GraphAssembler::synthesize(&config().build_unchecked()).unwrap();
        assert!(stack
            .manifest
            .warnings
            .iter()
            .any(|w| w.contains("asset distribution skipped")));
        assert!(stack.handles.directory.is_none());
    }

    #[test]
    fn test_load_balancer_wiring() {
        let stack = GraphAssembler::synthesize(
            &config()
                .api_certificate("arn:api")
                .load_balancer(LoadBalancerSettings::default())
                .build_unchecked(),
        )
        .unwrap();
        let graph = stack.graph();
        let lb_boundary = stack.handles.edge.load_balancer.as_ref().unwrap().boundary.id();

        let ingress: Vec<u16> = graph
            .edges_of_kind(EdgeKind::NetworkIngress)
            .filter(|e| &e.source == lb_boundary)
            .filter_map(|e| e.constraint.map(|c| c.port.value()))
            .collect();
        assert_eq!(ingress, vec![80, 443]);

        let compute_boundary = graph.node(stack.handles.compute.boundary.id()).unwrap();
        assert_eq!(
            compute_boundary
                .ingress_rules
                .iter()
                .filter(|r| r.source_boundary() == Some(lb_boundary))
                .count(),
            2
        );
        assert_eq!(graph.nodes_of_kind(ResourceKind::LoadBalancer).count(), 1);
    }

    #[test]
    fn test_invalid_config_declares_nothing() {
        let err = GraphAssembler::synthesize(
            &config().domain_names(["taskify.phipson.co.za"]).build_unchecked(),
        )
        .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_manifest_json_roundtrip_is_structural() {
        let stack = GraphAssembler::synthesize(&config().build_unchecked()).unwrap();
        let json = stack.manifest.to_json_pretty().unwrap();
        let back: StackManifest = serde_json::from_str(&json).unwrap();
        assert!(back.structurally_eq(&stack.manifest));
        assert_eq!(back.metadata.stack_name, DEFAULT_STACK_NAME);
    }
}
