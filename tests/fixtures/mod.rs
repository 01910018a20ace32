// Copyright (c) 2025 - Cowboy AI, Inc.
//! Test Fixtures for tpb-infrastructure
//!
//! Provides deterministic stack configurations for synthesis and provisioning
//! tests. Every fixture goes through the public builder, never through the
//! plan types directly.

#![allow(dead_code)]

use tpb_infrastructure::config::{LoadBalancerSettings, StackConfigBuilder, UserDirectorySettings};
use tpb_infrastructure::{GraphAssembler, StackConfig, SynthesizedStack};

pub const KEY_PAIR: &str = "tpb-key";
pub const DB_USERNAME: &str = "tpb_db_user";
pub const DB_PORT: u32 = 17388;
pub const ORGANIZATION: &str = "phipson";
pub const REPOSITORY: &str = "taskify";

pub const ASSET_DOMAIN: &str = "taskify.phipson.co.za";
pub const API_DOMAIN: &str = "api.taskify.phipson.co.za";
pub const ASSET_CERTIFICATE: &str = "arn:aws:acm:us-east-1:123456789012:certificate/assets";
pub const API_CERTIFICATE: &str = "arn:aws:acm:us-east-1:123456789012:certificate/api";

/// Required fields only
pub fn minimal() -> StackConfigBuilder {
    StackConfig::builder(KEY_PAIR, DB_USERNAME, DB_PORT, ORGANIZATION, REPOSITORY)
}

/// Both distributions aliased, each with its own certificate
pub fn with_domains() -> StackConfigBuilder {
    minimal()
        .domain_names([ASSET_DOMAIN])
        .certificate(ASSET_CERTIFICATE)
        .api_domain_names([API_DOMAIN])
        .api_certificate(API_CERTIFICATE)
}

/// Every optional feature enabled
pub fn full() -> StackConfigBuilder {
    with_domains()
        .account_id("123456789012")
        .user_directory(UserDirectorySettings::new(vec![
            format!("https://{}", ASSET_DOMAIN),
            "http://localhost:5500".to_string(),
        ]))
        .load_balancer(LoadBalancerSettings::default())
}

pub fn synthesize(builder: StackConfigBuilder) -> SynthesizedStack {
    let config = builder.build().expect("fixture configuration is valid");
    GraphAssembler::synthesize(&config).expect("fixture configuration synthesizes")
}
