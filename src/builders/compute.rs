// Copyright (c) 2025 - Cowboy AI, Inc.
//! Compute Resource Builder
//!
//! Declares, in order: the instance security boundary, the instance identity
//! role, the instance itself and its static public address. The instance
//! properties reference the boundary and role, so neither can be declared
//! after it.

use tracing::debug;

use super::{attach_boundary, logical_id, relate, NetworkHandle, ResourceBuilder};
use crate::config::ComputePlan;
use crate::domain::{IngressRule, PolicyDocument, PolicyStatement, Port, ResourceKind, ResourceScope, SourceScope};
use crate::errors::{FieldContext, SynthesisError, SynthesisResult};
use crate::graph::{EdgeKind, NodeHandle, PropertyValue, ResourceGraph, ResourceNode};

/// Service principal allowed to assume the instance role
pub const COMPUTE_SERVICE_PRINCIPAL: &str = "ec2.amazonaws.com";

pub struct ComputeBuilder<'a> {
    prefix: &'a str,
    plan: &'a ComputePlan,
    network: &'a NetworkHandle,
}

#[derive(Debug, Clone)]
pub struct ComputeHandle {
    pub boundary: NodeHandle,
    pub role: NodeHandle,
    pub instance: NodeHandle,
    /// Static address bound to the instance; the stable public endpoint
    pub address: NodeHandle,
}

impl<'a> ComputeBuilder<'a> {
    pub fn new(prefix: &'a str, plan: &'a ComputePlan, network: &'a NetworkHandle) -> Self {
        Self {
            prefix,
            plan,
            network,
        }
    }

    fn ingress_rules(&self) -> [IngressRule; 3] {
        [
            IngressRule::tcp(Port::SSH, SourceScope::AnyIpv4, "Allow SSH Connections."),
            IngressRule::tcp(self.plan.app_port, SourceScope::AnyIpv4, "Allow API Requests."),
            IngressRule::tcp(Port::HTTPS, SourceScope::AnyIpv4, "Allow HTTPS Requests."),
        ]
    }

    fn role_policy() -> SynthesisResult<PolicyDocument> {
        let statement = PolicyStatement::allow(
            ["secretsmanager:GetSecretValue", "ssm:GetParameter"],
            vec![ResourceScope::Any],
        )
        .field("compute.role_policy")?;
        PolicyDocument::new(vec![statement]).field("compute.role_policy")
    }
}

impl ResourceBuilder for ComputeBuilder<'_> {
    type Output = ComputeHandle;
    const NAME: &'static str = "compute";

    fn build(self, graph: &mut ResourceGraph) -> SynthesisResult<ComputeHandle> {
        let subnet = self.network.first_public_subnet().ok_or_else(|| {
            SynthesisError::configuration("network.subnets", "no public subnet for the compute instance")
        })?;

        let boundary = self.ingress_rules().into_iter().fold(
            ResourceNode::new(logical_id(self.prefix, "compute-boundary")?, ResourceKind::SecurityBoundary)
                .with_property("group_name", format!("{}-ec2-security-group", self.prefix))
                .with_property("vpc_id", self.network.network.reference("VpcId")),
            ResourceNode::with_ingress_rule,
        );
        let boundary = graph.add_node(boundary)?;

        let role = graph.add_node(
            ResourceNode::new(logical_id(self.prefix, "compute-role")?, ResourceKind::IdentityRole)
                .with_property("role_name", format!("{}-ec2-role", self.prefix))
                .with_property("assumed_by", COMPUTE_SERVICE_PRINCIPAL)
                .with_property("policy", Self::role_policy()?.to_property()),
        )?;

        let instance = graph.add_node(
            ResourceNode::new(logical_id(self.prefix, "compute-instance")?, ResourceKind::ComputeInstance)
                .with_property("instance_name", format!("{}-ec2-instance", self.prefix))
                .with_property("instance_type", self.plan.instance_type.as_str())
                .with_property("machine_image", self.plan.machine_image.as_str())
                .with_property("key_pair", self.plan.key_pair.as_str())
                .with_property("subnet_id", subnet.reference("SubnetId"))
                .with_property(
                    "security_group_ids",
                    PropertyValue::List(vec![boundary.reference("GroupId")]),
                )
                .with_property("iam_role", role.reference("RoleName"))
                .with_optional_property("user_data", self.plan.bootstrap_script.as_deref()),
        )?;
        attach_boundary(graph, &boundary, &instance)?;

        let address = graph.add_node(
            ResourceNode::new(logical_id(self.prefix, "compute-address")?, ResourceKind::StaticAddress)
                .with_property("instance_id", instance.reference("InstanceId")),
        )?;
        relate(graph, &instance, &address, EdgeKind::Association)?;

        debug!(
            instance = %instance.id(),
            subnet = %subnet.id(),
            app_port = %self.plan.app_port,
            "compute declared"
        );

        Ok(ComputeHandle {
            boundary,
            role,
            instance,
            address,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{NetworkPlan, SubnetPlan};
    use crate::domain::{Ipv4Cidr, Protocol, SubnetKind};
    use crate::builders::NetworkBuilder;

    fn network(graph: &mut ResourceGraph, kind: SubnetKind) -> NetworkHandle {
        let cidr = Ipv4Cidr::new("10.0.0.0/24").unwrap();
        let plan = NetworkPlan {
            cidr,
            subnets: vec![SubnetPlan {
                name: "subnet-1".into(),
                kind,
                cidr: cidr.partition(28, 1).unwrap()[0],
            }],
            nat_gateways: 0,
        };
        NetworkBuilder::new("tpb", &plan).build(graph).unwrap()
    }

    fn plan() -> ComputePlan {
        ComputePlan {
            key_pair: "tpb-key".into(),
            instance_type: "t2.micro".into(),
            machine_image: "amazon-linux-2".into(),
            app_port: Port::new(5000).unwrap(),
            bootstrap_script: Some("./lib/user-data.sh".into()),
        }
    }

    #[test]
    fn test_instance_follows_boundary_and_role() {
        let mut graph = ResourceGraph::new();
        let net = network(&mut graph, SubnetKind::Public);
        let plan = plan();
        let handle = ComputeBuilder::new("tpb", &plan, &net).build(&mut graph).unwrap();

        let order = graph.declaration_order();
        let pos = |h: &NodeHandle| order.iter().position(|id| id == h.id()).unwrap();
        assert!(pos(&handle.boundary) < pos(&handle.instance));
        assert!(pos(&handle.role) < pos(&handle.instance));
        assert!(pos(&handle.instance) < pos(&handle.address));

        let instance = graph.node(handle.instance.id()).unwrap();
        assert!(instance.dependencies().contains(handle.boundary.id()));
        assert!(instance.dependencies().contains(handle.role.id()));
        assert_eq!(instance.property("user_data"), Some(&"./lib/user-data.sh".into()));
    }

    #[test]
    fn test_boundary_rules() {
        let mut graph = ResourceGraph::new();
        let net = network(&mut graph, SubnetKind::Public);
        let plan = plan();
        let handle = ComputeBuilder::new("tpb", &plan, &net).build(&mut graph).unwrap();

        let boundary = graph.node(handle.boundary.id()).unwrap();
        let ports: Vec<u16> = boundary.ingress_rules.iter().map(|r| r.port.value()).collect();
        assert_eq!(ports, vec![22, 5000, 443]);
        assert!(boundary
            .ingress_rules
            .iter()
            .all(|r| r.protocol == Protocol::Tcp && r.source == SourceScope::AnyIpv4));

        assert_eq!(graph.edges_of_kind(EdgeKind::Association).count(), 1);
        assert!(graph.validate().is_ok());
    }

    #[test]
    fn test_isolated_only_network_rejected() {
        let mut graph = ResourceGraph::new();
        let net = network(&mut graph, SubnetKind::Isolated);
        let plan = plan();
        let before = graph.len();
        let err = ComputeBuilder::new("tpb", &plan, &net).build(&mut graph).unwrap_err();
        assert_eq!(err.field(), Some("network.subnets"));
        assert_eq!(graph.len(), before);
    }
}
