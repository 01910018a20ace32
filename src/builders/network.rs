// Copyright (c) 2025 - Cowboy AI, Inc.
//! Network Topology Builder
//!
//! One network node plus one subnet node per planned partition. Subnet ids
//! live under `<prefix>-subnet-` so a subnet name can never take the id of
//! another stage's node.

use tracing::debug;

use super::{logical_id, ResourceBuilder};
use crate::config::NetworkPlan;
use crate::domain::{ResourceKind, SubnetKind};
use crate::errors::{SynthesisError, SynthesisResult};
use crate::graph::{NodeHandle, NodeId, ResourceGraph, ResourceNode};

pub struct NetworkBuilder<'a> {
    prefix: &'a str,
    plan: &'a NetworkPlan,
}

/// Network node plus its subnets in partition order
#[derive(Debug, Clone)]
pub struct NetworkHandle {
    pub network: NodeHandle,
    pub subnets: Vec<(SubnetKind, NodeHandle)>,
}

impl NetworkHandle {
    /// First public-routable subnet, where internet-facing nodes live
    pub fn first_public_subnet(&self) -> Option<&NodeHandle> {
        self.subnets
            .iter()
            .find(|(kind, _)| kind.is_public_routable())
            .map(|(_, subnet)| subnet)
    }

    pub fn subnets_of_kind(&self, kind: SubnetKind) -> impl Iterator<Item = &NodeHandle> {
        self.subnets
            .iter()
            .filter(move |(k, _)| *k == kind)
            .map(|(_, subnet)| subnet)
    }
}

/// Logical id `<prefix>-subnet-<name>`
fn subnet_id(prefix: &str, name: &str) -> SynthesisResult<NodeId> {
    logical_id(prefix, &format!("subnet-{}", name))
}

impl<'a> NetworkBuilder<'a> {
    pub fn new(prefix: &'a str, plan: &'a NetworkPlan) -> Self {
        Self { prefix, plan }
    }
}

impl ResourceBuilder for NetworkBuilder<'_> {
    type Output = NetworkHandle;
    const NAME: &'static str = "network";

    fn build(self, graph: &mut ResourceGraph) -> SynthesisResult<NetworkHandle> {
        for (i, subnet) in self.plan.subnets.iter().enumerate() {
            if !self.plan.cidr.contains(&subnet.cidr) {
                return Err(SynthesisError::configuration(
                    format!("network.subnets[{}]", i),
                    format!("{} lies outside {}", subnet.cidr, self.plan.cidr),
                ));
            }
            if let Some(other) = self.plan.subnets[..i].iter().find(|s| s.cidr.overlaps(&subnet.cidr)) {
                return Err(SynthesisError::configuration(
                    format!("network.subnets[{}]", i),
                    format!("{} overlaps {}", subnet.cidr, other.cidr),
                ));
            }
        }

        let network = graph.add_node(
            ResourceNode::new(logical_id(self.prefix, "vpc")?, ResourceKind::Network)
                .with_property("cidr_block", self.plan.cidr.to_string())
                .with_property("nat_gateways", u32::from(self.plan.nat_gateways)),
        )?;

        let mut subnets = Vec::with_capacity(self.plan.subnets.len());
        for subnet in &self.plan.subnets {
            let handle = graph.add_node(
                ResourceNode::new(subnet_id(self.prefix, &subnet.name)?, ResourceKind::Subnet)
                    .with_property("vpc_id", network.reference("VpcId"))
                    .with_property("cidr_block", subnet.cidr.to_string())
                    .with_property("subnet_type", subnet.kind.as_str())
                    .with_property("map_public_ip_on_launch", subnet.kind.is_public_routable()),
            )?;
            debug!(subnet = %handle.id(), cidr = %subnet.cidr, kind = %subnet.kind, "subnet declared");
            subnets.push((subnet.kind, handle));
        }

        Ok(NetworkHandle { network, subnets })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SubnetPlan;
    use crate::domain::Ipv4Cidr;

    fn plan(subnets: &[(&str, SubnetKind)], mask: u8) -> NetworkPlan {
        let cidr = Ipv4Cidr::new("10.0.0.0/24").unwrap();
        let blocks = cidr.partition(mask, subnets.len()).unwrap();
        NetworkPlan {
            cidr,
            subnets: subnets
                .iter()
                .zip(blocks)
                .map(|((name, kind), block)| SubnetPlan {
                    name: name.to_string(),
                    kind: *kind,
                    cidr: block,
                })
                .collect(),
            nat_gateways: 1,
        }
    }

    #[test]
    fn test_subnets_reference_network() {
        let plan = plan(
            &[("public-subnet-1", SubnetKind::Public), ("isolated-subnet-1", SubnetKind::Isolated)],
            28,
        );
        let mut graph = ResourceGraph::new();
        let handle = NetworkBuilder::new("tpb", &plan).build(&mut graph).unwrap();

        assert_eq!(graph.len(), 3);
        assert_eq!(handle.network.id().as_str(), "tpb-vpc");
        assert_eq!(handle.first_public_subnet().unwrap().id().as_str(), "tpb-subnet-public-subnet-1");
        assert_eq!(handle.subnets_of_kind(SubnetKind::Isolated).count(), 1);

        let isolated = graph
            .node(handle.subnets[1].1.id())
            .unwrap();
        assert_eq!(isolated.property("cidr_block"), Some(&"10.0.0.16/28".into()));
        assert!(isolated.dependencies().contains(handle.network.id()));
    }

    #[test]
    fn test_overlapping_subnets_rejected() {
        let mut plan = plan(&[("a", SubnetKind::Public), ("b", SubnetKind::Public)], 28);
        plan.subnets[1].cidr = plan.subnets[0].cidr;

        let mut graph = ResourceGraph::new();
        let err = NetworkBuilder::new("tpb", &plan).build(&mut graph).unwrap_err();
        assert_eq!(err.field(), Some("network.subnets[1]"));
        assert!(graph.is_empty());
    }

    #[test]
    fn test_subnet_named_like_a_stage_node() {
        let plan = plan(&[("vpc", SubnetKind::Public), ("compute-boundary", SubnetKind::Isolated)], 28);
        let mut graph = ResourceGraph::new();
        let handle = NetworkBuilder::new("tpb", &plan).build(&mut graph).unwrap();

        assert_eq!(graph.len(), 3);
        assert_eq!(handle.network.id().as_str(), "tpb-vpc");
        assert_eq!(handle.subnets[0].1.id().as_str(), "tpb-subnet-vpc");
        assert_eq!(handle.subnets[1].1.id().as_str(), "tpb-subnet-compute-boundary");
    }
}
