// Copyright (c) 2025 - Cowboy AI, Inc.
//! Edge and Content Builder
//!
//! Two independent distributions share nothing but the stack:
//!
//! - the **asset distribution** serves the private object store through an
//!   origin access identity with a bounded, positive cache window, and only
//!   exists when domain names are configured;
//! - the **API distribution** always exists and fronts the compute instance's
//!   static address over plain HTTP on the application port with caching
//!   disabled and every request attribute forwarded.
//!
//! The object store itself is declared by [`StoreBuilder`] one stage earlier so
//! the automation role can reference it whether or not the asset distribution
//! is built. The optional load balancer variant is declared here as well.

use std::collections::BTreeMap;
use std::time::Duration;

use tracing::{debug, info};

use super::{attach_boundary, logical_id, relate, ComputeHandle, NetworkHandle, ResourceBuilder};
use crate::config::{AliasPlan, ApiDistributionPlan, LoadBalancerPlan, StackPlan};
use crate::domain::{
    AllowedMethods, Forwarding, IngressRule, OriginProtocolPolicy, PolicyDocument, PolicyStatement,
    Port, ResourceKind, ResourceScope, SourceScope, TtlWindow, ViewerProtocolPolicy,
};
use crate::errors::{FieldContext, SynthesisResult};
use crate::graph::{EdgeKind, NodeHandle, PropertyValue, ResourceGraph, ResourceNode};

/// Asset cache window: 5 min <= 10 min <= 10 min
pub const ASSET_CACHE_MIN_TTL: Duration = Duration::from_secs(5 * 60);
pub const ASSET_CACHE_DEFAULT_TTL: Duration = Duration::from_secs(10 * 60);
pub const ASSET_CACHE_MAX_TTL: Duration = Duration::from_secs(10 * 60);

pub const DEFAULT_ROOT_OBJECT: &str = "index.html";

/// Declares the private object store
pub struct StoreBuilder<'a> {
    prefix: &'a str,
}

#[derive(Debug, Clone)]
pub struct StoreHandle {
    pub store: NodeHandle,
}

impl<'a> StoreBuilder<'a> {
    pub fn new(prefix: &'a str) -> Self {
        Self { prefix }
    }
}

impl ResourceBuilder for StoreBuilder<'_> {
    type Output = StoreHandle;
    const NAME: &'static str = "store";

    fn build(self, graph: &mut ResourceGraph) -> SynthesisResult<StoreHandle> {
        let store = graph.add_node(
            ResourceNode::new(logical_id(self.prefix, "web-store")?, ResourceKind::ObjectStore)
                .with_property("bucket_name", format!("{}-web-bucket", self.prefix))
                .with_property("access_control", "private"),
        )?;
        Ok(StoreHandle { store })
    }
}

/// Declares the distributions and the optional load balancer
pub struct EdgeBuilder<'a> {
    plan: &'a StackPlan,
    network: &'a NetworkHandle,
    compute: &'a ComputeHandle,
    store: &'a StoreHandle,
}

#[derive(Debug, Clone)]
pub struct AssetDistributionHandle {
    pub access_identity: NodeHandle,
    pub cache_policy: NodeHandle,
    pub distribution: NodeHandle,
}

#[derive(Debug, Clone)]
pub struct ApiDistributionHandle {
    pub cache_policy: NodeHandle,
    pub origin_request_policy: NodeHandle,
    pub distribution: NodeHandle,
}

#[derive(Debug, Clone)]
pub struct LoadBalancerHandle {
    pub boundary: NodeHandle,
    pub target_group: NodeHandle,
    pub load_balancer: NodeHandle,
}

#[derive(Debug, Clone)]
pub struct EdgeHandle {
    pub asset: Option<AssetDistributionHandle>,
    pub api: ApiDistributionHandle,
    pub load_balancer: Option<LoadBalancerHandle>,
}

impl<'a> EdgeBuilder<'a> {
    pub fn new(
        plan: &'a StackPlan,
        network: &'a NetworkHandle,
        compute: &'a ComputeHandle,
        store: &'a StoreHandle,
    ) -> Self {
        Self {
            plan,
            network,
            compute,
            store,
        }
    }

    fn id(&self, suffix: &str) -> SynthesisResult<crate::graph::NodeId> {
        logical_id(&self.plan.prefix, suffix)
    }

    fn build_asset(&self, graph: &mut ResourceGraph, aliases: &AliasPlan) -> SynthesisResult<AssetDistributionHandle> {
        let store = &self.store.store;

        let read_grant = PolicyDocument::new(vec![PolicyStatement::allow(
            ["s3:GetObject"],
            vec![ResourceScope::ObjectsOf(store.attr("Arn"))],
        )
        .field("distribution.read_grant")?])
        .field("distribution.read_grant")?;

        let access_identity = graph.add_node(
            ResourceNode::new(self.id("asset-access-identity")?, ResourceKind::IdentityDelegation)
                .with_property("comment", "Origin access identity for the asset store")
                .with_property("grants", read_grant.to_property()),
        )?;
        relate(graph, &access_identity, store, EdgeKind::TrustGrant)?;

        let ttl = TtlWindow::new(ASSET_CACHE_MIN_TTL, ASSET_CACHE_DEFAULT_TTL, ASSET_CACHE_MAX_TTL)
            .field("distribution.cache_policy")?;
        let cache_policy = graph.add_node(cache_policy_node(
            self.id("asset-cache-policy")?,
            format!("{}-cache-policy", self.plan.prefix),
            "Custom cache policy for the asset distribution",
            ttl,
        ))?;

        let mut origin = BTreeMap::new();
        origin.insert("domain_name".to_string(), store.reference("RegionalDomainName"));
        origin.insert(
            "origin_access_identity".to_string(),
            access_identity.reference("Id"),
        );

        let distribution = graph.add_node(
            with_aliases(
                ResourceNode::new(self.id("asset-distribution")?, ResourceKind::ContentDistribution),
                aliases,
            )
            .with_property("default_root_object", DEFAULT_ROOT_OBJECT)
            .with_property("origin", PropertyValue::Map(origin))
            .with_property(
                "viewer_protocol_policy",
                ViewerProtocolPolicy::RedirectToHttps.as_str(),
            )
            .with_property("cache_policy_id", cache_policy.reference("Id")),
        )?;
        relate(graph, &distribution, store, EdgeKind::OriginBinding)?;

        Ok(AssetDistributionHandle {
            access_identity,
            cache_policy,
            distribution,
        })
    }

    fn build_api(&self, graph: &mut ResourceGraph, plan: &ApiDistributionPlan) -> SynthesisResult<ApiDistributionHandle> {
        let cache_policy = graph.add_node(cache_policy_node(
            self.id("api-cache-policy")?,
            format!("{}-api-cache-policy", self.plan.prefix),
            "API Cache Policy",
            TtlWindow::zero(),
        ))?;

        let origin_request_policy = graph.add_node(
            ResourceNode::new(self.id("api-origin-request-policy")?, ResourceKind::OriginRequestPolicy)
                .with_property("comment", "API Origin Request Policy")
                .with_property("query_string_behavior", Forwarding::All.as_str())
                .with_property("cookie_behavior", Forwarding::All.as_str())
                .with_property("header_behavior", Forwarding::All.as_str()),
        )?;

        let address = &self.compute.address;
        let mut origin = BTreeMap::new();
        origin.insert("domain_name".to_string(), address.reference("PublicDnsName"));
        origin.insert(
            "protocol_policy".to_string(),
            PropertyValue::from(OriginProtocolPolicy::HttpOnly.as_str()),
        );
        origin.insert("http_port".to_string(), PropertyValue::from(plan.app_port.value()));

        let mut node = ResourceNode::new(self.id("api-distribution")?, ResourceKind::ContentDistribution)
            .with_property("origin", PropertyValue::Map(origin))
            .with_property("cache_policy_id", cache_policy.reference("Id"))
            .with_property("origin_request_policy_id", origin_request_policy.reference("Id"))
            .with_property("compress", true)
            .with_property(
                "allowed_methods",
                AllowedMethods::All.methods().iter().copied().map(PropertyValue::from).collect::<Vec<_>>(),
            )
            .with_property(
                "viewer_protocol_policy",
                ViewerProtocolPolicy::RedirectToHttps.as_str(),
            );
        if let Some(aliases) = &plan.aliases {
            node = with_aliases(node, aliases);
        }

        let distribution = graph.add_node(node)?;
        relate(graph, &distribution, address, EdgeKind::OriginBinding)?;

        Ok(ApiDistributionHandle {
            cache_policy,
            origin_request_policy,
            distribution,
        })
    }

    fn build_load_balancer(
        &self,
        graph: &mut ResourceGraph,
        plan: &LoadBalancerPlan,
    ) -> SynthesisResult<LoadBalancerHandle> {
        let vpc = self.network.network.reference("VpcId");

        let boundary = [
            IngressRule::tcp(Port::HTTP, SourceScope::AnyIpv4, "Allow HTTP from anywhere"),
            IngressRule::tcp(Port::HTTPS, SourceScope::AnyIpv4, "Allow HTTPS from anywhere"),
        ]
        .into_iter()
        .fold(
            ResourceNode::new(self.id("lb-boundary")?, ResourceKind::SecurityBoundary)
                .with_property("group_name", format!("{}-lb-security-group", self.plan.prefix))
                .with_property("vpc_id", vpc.clone()),
            ResourceNode::with_ingress_rule,
        );
        let boundary = graph.add_node(boundary)?;

        let target_group = graph.add_node(
            ResourceNode::new(self.id("target-group")?, ResourceKind::TargetGroup)
                .with_property("target_group_name", format!("{}-target-group", self.plan.prefix))
                .with_property("port", plan.target_port.value())
                .with_property("protocol", "HTTP")
                .with_property("target_type", "instance")
                .with_property("vpc_id", vpc)
                .with_property(
                    "targets",
                    PropertyValue::List(vec![self.compute.instance.reference("InstanceId")]),
                ),
        )?;
        relate(graph, &target_group, &self.compute.instance, EdgeKind::OriginBinding)?;

        let https_listener = listener(
            Port::HTTPS,
            "HTTPS",
            [
                ("certificate", PropertyValue::from(plan.certificate.as_str())),
                ("forward_to", target_group.reference("TargetGroupArn")),
            ],
        );
        let http_listener = listener(
            Port::HTTP,
            "HTTP",
            [
                ("redirect_protocol", PropertyValue::from("HTTPS")),
                ("redirect_port", PropertyValue::from(Port::HTTPS.value())),
            ],
        );

        let subnets = self
            .network
            .subnets
            .iter()
            .filter(|(kind, _)| kind.is_public_routable())
            .map(|(_, subnet)| subnet.reference("SubnetId"))
            .collect::<Vec<_>>();

        let load_balancer = graph.add_node(
            ResourceNode::new(self.id("load-balancer")?, ResourceKind::LoadBalancer)
                .with_property("internet_facing", true)
                .with_property("subnet_ids", PropertyValue::List(subnets))
                .with_property(
                    "security_group_ids",
                    PropertyValue::List(vec![boundary.reference("GroupId")]),
                )
                .with_property("listeners", PropertyValue::List(vec![https_listener, http_listener])),
        )?;
        attach_boundary(graph, &boundary, &load_balancer)?;
        relate(graph, &load_balancer, &target_group, EdgeKind::OriginBinding)?;

        Ok(LoadBalancerHandle {
            boundary,
            target_group,
            load_balancer,
        })
    }
}

impl ResourceBuilder for EdgeBuilder<'_> {
    type Output = EdgeHandle;
    const NAME: &'static str = "edge";

    fn build(self, graph: &mut ResourceGraph) -> SynthesisResult<EdgeHandle> {
        let asset = match &self.plan.asset_distribution {
            Some(aliases) => Some(self.build_asset(graph, aliases)?),
            None => {
                info!("no asset domain names configured, skipping asset distribution");
                None
            }
        };

        let api = self.build_api(graph, &self.plan.api_distribution)?;

        let load_balancer = self
            .plan
            .load_balancer
            .as_ref()
            .map(|lb| self.build_load_balancer(graph, lb))
            .transpose()?;

        debug!(
            asset = asset.is_some(),
            load_balancer = load_balancer.is_some(),
            "edge declared"
        );

        Ok(EdgeHandle {
            asset,
            api,
            load_balancer,
        })
    }
}

fn cache_policy_node(
    id: crate::graph::NodeId,
    name: String,
    comment: &str,
    ttl: TtlWindow,
) -> ResourceNode {
    ResourceNode::new(id, ResourceKind::CachePolicy)
        .with_property("cache_policy_name", name)
        .with_property("comment", comment)
        .with_property("min_ttl_secs", ttl.min().as_secs())
        .with_property("default_ttl_secs", ttl.default_ttl().as_secs())
        .with_property("max_ttl_secs", ttl.max().as_secs())
        .with_property("cookie_behavior", Forwarding::None.as_str())
        .with_property("header_behavior", Forwarding::None.as_str())
        .with_property("query_string_behavior", Forwarding::None.as_str())
}

fn with_aliases(node: ResourceNode, aliases: &AliasPlan) -> ResourceNode {
    node.with_property(
        "domain_names",
        aliases
            .domain_names
            .iter()
            .map(|name| PropertyValue::from(name.as_str()))
            .collect::<Vec<_>>(),
    )
    .with_property("certificate", aliases.certificate.as_str())
}

fn listener<const N: usize>(port: Port, protocol: &str, action: [(&str, PropertyValue); N]) -> PropertyValue {
    let mut map: BTreeMap<String, PropertyValue> = action
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
    map.insert("port".to_string(), PropertyValue::from(port.value()));
    map.insert("protocol".to_string(), PropertyValue::from(protocol));
    PropertyValue::Map(map)
}
