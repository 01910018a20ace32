// Copyright (c) 2025 - Cowboy AI, Inc.
//! Stack Synthesizer
//!
//! Builds the resource graph from configuration, prints the manifest as JSON
//! and hands it to a provisioning backend.
//!
//! Configuration comes from a JSON file (`STACK_CONFIG`) or from `TPB_*`
//! environment variables. With `NATS_URL` set the manifest is provisioned over
//! NATS; otherwise a dry run reports what would be created.
//!
//! Run with: cargo run --bin tpb-synth
//!
//! Required without `STACK_CONFIG`:
//! - TPB_KEY_PAIR, TPB_DB_USERNAME, TPB_DB_PORT, TPB_ORG, TPB_REPO

use anyhow::{Context, Result};
use std::time::Duration;
use tpb_infrastructure::{
    backend::ProvisioningBackend, DryRunBackend, GraphAssembler, NatsConfig,
    NatsProvisioningBackend, ProvisionedStack, StackConfig, StackManifest,
};
use tracing::{info, warn};

/// Configuration for the synthesizer
#[derive(Debug, Clone)]
struct SynthConfig {
    stack: StackConfig,
    /// NATS server URL; dry run when absent
    nats_url: Option<String>,
    request_timeout: Duration,
    /// Only print the manifest
    synth_only: bool,
}

fn env_list(name: &str) -> Option<Vec<String>> {
    std::env::var(name).ok().map(|value| {
        value
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    })
}

fn required(name: &str) -> Result<String> {
    std::env::var(name).with_context(|| format!("{} not set (or set STACK_CONFIG)", name))
}

impl SynthConfig {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        let stack = match std::env::var("STACK_CONFIG") {
            Ok(path) => StackConfig::from_json_file(&path)
                .with_context(|| format!("Failed to load stack configuration from {}", path))?,
            Err(_) => Self::stack_from_env()?,
        };

        let request_timeout = std::env::var("NATS_REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or_else(|| NatsConfig::default().request_timeout);

        Ok(Self {
            stack,
            nats_url: std::env::var("NATS_URL").ok(),
            request_timeout,
            synth_only: std::env::var("TPB_SYNTH_ONLY").is_ok(),
        })
    }

    fn stack_from_env() -> Result<StackConfig> {
        let db_port = required("TPB_DB_PORT")?
            .parse::<u32>()
            .context("TPB_DB_PORT is not a number")?;

        let mut builder = StackConfig::builder(
            required("TPB_KEY_PAIR")?,
            required("TPB_DB_USERNAME")?,
            db_port,
            required("TPB_ORG")?,
            required("TPB_REPO")?,
        );

        if let Ok(prefix) = std::env::var("TPB_PREFIX") {
            builder = builder.resource_prefix(prefix);
        }
        if let Ok(account) = std::env::var("TPB_ACCOUNT_ID") {
            builder = builder.account_id(account);
        }
        if let Some(names) = env_list("TPB_DOMAIN_NAMES") {
            builder = builder.domain_names(names);
        }
        if let Ok(certificate) = std::env::var("TPB_CERTIFICATE") {
            builder = builder.certificate(certificate);
        }
        if let Some(names) = env_list("TPB_API_DOMAIN_NAMES") {
            builder = builder.api_domain_names(names);
        }
        if let Ok(certificate) = std::env::var("TPB_API_CERTIFICATE") {
            builder = builder.api_certificate(certificate);
        }

        Ok(builder.build_unchecked())
    }
}

async fn provision<B>(backend: &mut B, manifest: &StackManifest) -> Result<ProvisionedStack>
where
    B: ProvisioningBackend,
    B::Error: 'static,
{
    backend
        .health_check()
        .await
        .with_context(|| format!("Backend {} is not ready", backend.name()))?;
    backend
        .provision(manifest)
        .await
        .with_context(|| format!("Provisioning through {} failed", backend.name()))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = SynthConfig::from_env()?;
    info!(
        prefix = %config.stack.resource_prefix,
        nats = config.nats_url.as_deref().unwrap_or("dry-run"),
        "configuration loaded"
    );

    let stack = GraphAssembler::synthesize(&config.stack).context("Synthesis failed")?;
    for warning in &stack.manifest.warnings {
        warn!("{}", warning);
    }
    println!("{}", stack.manifest.to_json_pretty()?);

    if config.synth_only {
        return Ok(());
    }

    let provisioned = match &config.nats_url {
        Some(url) => {
            let nats = NatsConfig {
                servers: vec![url.clone()],
                request_timeout: config.request_timeout,
                ..NatsConfig::default()
            };
            let mut backend = NatsProvisioningBackend::connect(&nats)
                .await
                .context("Failed to connect to NATS")?;
            provision(&mut backend, &stack.manifest).await?
        }
        None => provision(&mut DryRunBackend::new(), &stack.manifest).await?,
    };

    info!(
        run_id = %provisioned.run_id,
        backend = %provisioned.backend,
        resources = provisioned.resources.len(),
        deferred_rules = provisioned.deferred_rules.len(),
        "stack provisioned"
    );
    for resource in &provisioned.resources {
        info!("  {} → {}", resource.id, resource.physical_id);
    }

    Ok(())
}
