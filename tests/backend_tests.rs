// Copyright (c) 2025 - Cowboy AI, Inc.
//! Integration tests for manifest handoff to provisioning backends
//!
//! Uses the dry-run backend; the NATS backend shares the same ordering and
//! reference binding and needs a running provisioner.

mod fixtures;

use pretty_assertions::assert_eq;

use tpb_infrastructure::backend::{DeferredRule, ProvisionError};
use tpb_infrastructure::domain::SourceScope;
use tpb_infrastructure::graph::{AttributeRef, NodeState};
use tpb_infrastructure::{DryRunBackend, NodeId, ProvisioningBackend, ResourceGraph, StackManifest};

use fixtures::*;

fn manifest() -> StackManifest {
    synthesize(full()).manifest
}

#[tokio::test]
async fn test_every_reference_is_bound() {
    let manifest = manifest();
    let mut backend = DryRunBackend::new();
    let provisioned = backend.provision(&manifest).await.unwrap();

    for node in manifest.graph.nodes() {
        for reference in node.references() {
            assert!(
                provisioned.attribute(reference).is_some(),
                "{} left unbound for {}",
                reference,
                node.id
            );
        }
    }
    assert!(provisioned
        .resources
        .iter()
        .all(|r| r.state == NodeState::Provisioned));
}

#[tokio::test]
async fn test_api_origin_bound_to_instance_address() {
    let stack = synthesize(full());
    let mut backend = DryRunBackend::new();
    let provisioned = backend.provision(&stack.manifest).await.unwrap();

    let address = stack.handles.compute.address.attr("PublicDnsName");
    let bound = provisioned.attribute(&address).unwrap().to_string();

    let api = provisioned
        .resource(stack.handles.edge.api.distribution.id())
        .unwrap();
    let origin = api.properties["origin"].to_string();
    assert!(origin.contains(&bound), "{} does not contain {}", origin, bound);
}

#[tokio::test]
async fn test_boundary_sourced_rules_are_deferred() {
    let stack = synthesize(full());
    let mut backend = DryRunBackend::new();
    let provisioned = backend.provision(&stack.manifest).await.unwrap();

    // Database rule from compute, plus two load balancer rules on compute
    assert_eq!(provisioned.deferred_rules.len(), 3);
    assert!(provisioned.deferred_rules.iter().all(|DeferredRule { rule, .. }| matches!(
        rule.source,
        SourceScope::Boundary(_)
    )));
    assert!(provisioned
        .deferred_rules
        .iter()
        .any(|d| &d.boundary == stack.handles.database.boundary.id()));
}

#[tokio::test]
async fn test_unresolved_manifest_is_rejected() {
    let mut manifest = manifest();
    let mut graph = ResourceGraph::new();
    for node in manifest.graph.nodes() {
        let mut node = node.clone();
        node.state = NodeState::Declared;
        graph.add_node(node).unwrap();
    }
    for edge in manifest.graph.edges() {
        graph.add_edge(edge.clone()).unwrap();
    }
    manifest.graph = graph;

    let err = DryRunBackend::new().provision(&manifest).await.unwrap_err();
    assert!(matches!(err, ProvisionError::NotResolved(_)));
}

#[tokio::test]
async fn test_failure_reports_the_node() {
    let manifest = manifest();
    let target = NodeId::new("tpb-compute-instance").unwrap();
    let mut backend = DryRunBackend::new().fail_on(target.clone());

    match backend.provision(&manifest).await {
        Err(ProvisionError::NodeFailed { node, .. }) => assert_eq!(node, target),
        other => panic!("expected node failure, got {:?}", other),
    }
}

#[test]
fn test_dry_run_is_deterministic() {
    let manifest = manifest();
    let first = tokio_test::block_on(DryRunBackend::new().provision(&manifest)).unwrap();
    let second = tokio_test::block_on(DryRunBackend::new().provision(&manifest)).unwrap();

    assert_eq!(first, second);
    assert_eq!(
        first.attribute(&AttributeRef::new(NodeId::new("tpb-vpc").unwrap(), "VpcId")),
        Some("dry-run/network/tpb-vpc.VpcId")
    );
}

#[test]
fn test_health_check() {
    let backend = DryRunBackend::new();
    assert!(tokio_test::block_on(backend.health_check()).is_ok());
    assert_eq!(backend.name(), "dry-run");
}
