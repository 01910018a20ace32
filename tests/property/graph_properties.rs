// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests for Synthesized Graphs
//!
//! Generates configurations across prefixes, database ports, subnet layouts
//! and optional features, and checks the invariants every manifest must hold
//! before it is handed to a backend.

use proptest::prelude::*;
use std::collections::BTreeSet;

use tpb_infrastructure::config::{
    LoadBalancerSettings, NetworkSettings, StackConfigBuilder, SubnetSettings, UserDirectorySettings,
};
use tpb_infrastructure::domain::{PortConstraint, Port, ResourceKind, SubnetKind};
use tpb_infrastructure::graph::topology;
use tpb_infrastructure::{EdgeKind, GraphAssembler, NodeId, StackConfig};

use crate::fixtures;

// ============================================================================
// Generators
// ============================================================================

#[derive(Debug, Clone)]
struct Features {
    domains: bool,
    load_balancer: bool,
    directory: bool,
}

fn arb_features() -> impl Strategy<Value = Features> {
    (any::<bool>(), any::<bool>(), any::<bool>()).prop_map(|(domains, load_balancer, directory)| Features {
        domains,
        load_balancer,
        directory,
    })
}

fn arb_network() -> impl Strategy<Value = NetworkSettings> {
    (1usize..=4, 0usize..=4)
        .prop_flat_map(|(public, isolated)| (Just(public), Just(isolated), 0..=public as u8))
        .prop_map(|(public, isolated, nat_gateways)| {
            let subnets = (1..=public)
                .map(|i| SubnetSettings {
                    name: format!("public-subnet-{}", i),
                    kind: SubnetKind::Public,
                })
                .chain((1..=isolated).map(|i| SubnetSettings {
                    name: format!("isolated-subnet-{}", i),
                    kind: SubnetKind::Isolated,
                }))
                .collect();
            NetworkSettings {
                subnets,
                nat_gateways,
                ..NetworkSettings::default()
            }
        })
}

fn arb_config() -> impl Strategy<Value = StackConfig> {
    (
        "[a-z][a-z0-9]{0,8}",
        1024u32..=65535,
        "[a-z][a-z0-9_]{0,15}",
        arb_network(),
        arb_features(),
    )
        .prop_map(|(prefix, db_port, db_user, network, features)| {
            let mut builder: StackConfigBuilder = StackConfig::builder(
                fixtures::KEY_PAIR,
                db_user,
                db_port,
                fixtures::ORGANIZATION,
                fixtures::REPOSITORY,
            )
            .resource_prefix(prefix)
            .network(network);

            if features.domains {
                builder = builder
                    .domain_names([fixtures::ASSET_DOMAIN])
                    .certificate(fixtures::ASSET_CERTIFICATE)
                    .api_domain_names([fixtures::API_DOMAIN])
                    .api_certificate(fixtures::API_CERTIFICATE);
            }
            if features.load_balancer {
                builder = builder.load_balancer(LoadBalancerSettings {
                    certificate: Some(fixtures::API_CERTIFICATE.to_string()),
                    ..LoadBalancerSettings::default()
                });
            }
            if features.directory {
                builder = builder.user_directory(UserDirectorySettings::new(vec![
                    "http://localhost:5500".to_string(),
                ]));
            }
            builder.build_unchecked()
        })
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    /// Property: every generated configuration synthesizes a valid graph
    #[test]
    fn prop_synthesized_graph_validates(config in arb_config()) {
        let stack = GraphAssembler::synthesize(&config).unwrap();
        prop_assert!(stack.graph().validate().is_ok());
        prop_assert!(stack.graph().is_resolved());
    }

    /// Property: no reference or edge names a node outside the graph
    #[test]
    fn prop_no_dangling_references(config in arb_config()) {
        let stack = GraphAssembler::synthesize(&config).unwrap();
        let graph = stack.graph();
        let ids: BTreeSet<&NodeId> = graph.nodes().iter().map(|n| &n.id).collect();

        for node in graph.nodes() {
            for producer in node.dependencies() {
                prop_assert!(ids.contains(producer));
            }
        }
        for edge in graph.edges() {
            prop_assert!(ids.contains(&edge.source));
            prop_assert!(ids.contains(&edge.target));
            prop_assert_ne!(&edge.source, &edge.target);
        }
    }

    /// Property: provisioning order puts producers before consumers
    #[test]
    fn prop_topological_order(config in arb_config()) {
        let stack = GraphAssembler::synthesize(&config).unwrap();
        let graph = stack.graph();
        let order = graph.topological_order().unwrap();

        prop_assert_eq!(order.len(), graph.len());
        prop_assert!(topology::is_topological(graph.nodes(), &order));
    }

    /// Property: the database trusts exactly the compute boundary on its port
    #[test]
    fn prop_database_trust_is_narrow(config in arb_config()) {
        let stack = GraphAssembler::synthesize(&config).unwrap();
        let graph = stack.graph();
        let db_boundary = graph.node(stack.handles.database.boundary.id()).unwrap();
        let port = Port::new(config.database.port).unwrap();

        prop_assert_eq!(db_boundary.ingress_rules.len(), 1);
        prop_assert_eq!(
            db_boundary.ingress_rules[0].source_boundary(),
            Some(stack.handles.compute.boundary.id())
        );

        let grants: Vec<_> = graph
            .edges_of_kind(EdgeKind::TrustGrant)
            .filter(|e| e.target == db_boundary.id)
            .collect();
        prop_assert_eq!(grants.len(), 1);
        prop_assert_eq!(grants[0].constraint, Some(PortConstraint::tcp(port)));
    }

    /// Property: one subnet node per configured subnet, all inside the network block
    #[test]
    fn prop_subnets_declared(config in arb_config()) {
        let stack = GraphAssembler::synthesize(&config).unwrap();
        prop_assert_eq!(
            stack.graph().nodes_of_kind(ResourceKind::Subnet).count(),
            config.network.subnets.len()
        );
        prop_assert_eq!(stack.handles.network.subnets.len(), config.network.subnets.len());
    }

    /// Property: optional features appear exactly when configured
    #[test]
    fn prop_optional_features(config in arb_config()) {
        let stack = GraphAssembler::synthesize(&config).unwrap();
        let graph = stack.graph();
        let domains = config.distribution.domain_names.is_some();

        prop_assert_eq!(stack.handles.edge.asset.is_some(), domains);
        prop_assert_eq!(
            graph.nodes_of_kind(ResourceKind::ContentDistribution).count(),
            if domains { 2 } else { 1 }
        );
        prop_assert_eq!(
            graph.nodes_of_kind(ResourceKind::LoadBalancer).count(),
            usize::from(config.load_balancer.is_some())
        );
        prop_assert_eq!(stack.handles.directory.is_some(), config.user_directory.is_some());
    }

    /// Property: synthesis is idempotent up to run metadata
    #[test]
    fn prop_synthesis_idempotent(config in arb_config()) {
        let first = GraphAssembler::synthesize(&config).unwrap();
        let second = GraphAssembler::synthesize(&config).unwrap();
        prop_assert!(first.manifest.structurally_eq(&second.manifest));
    }
}
