// Copyright (c) 2025 - Cowboy AI, Inc.
//! Stack Configuration
//!
//! One immutable input schema for every variant of the stack. Optional
//! sections are the only feature-flag mechanism: when a section is absent the
//! builder depending on it is skipped entirely.
//!
//! [`StackConfig`] carries raw, serde-friendly values. [`StackConfig::validate`]
//! checks every field up front and produces a typed [`StackPlan`], so a bad
//! configuration is rejected before any node is declared and the error names
//! the offending field.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

use crate::domain::invariants::{
    validate_identifier, validate_non_blank, validate_password_length, validate_session_duration,
    validate_subject_name, validate_url,
};
use crate::domain::{CertificateRef, DomainName, Ipv4Cidr, Port, SubjectMatch, SubnetKind};
use crate::errors::{FieldContext, SynthesisError, SynthesisResult};

fn default_resource_prefix() -> String {
    "tpb".to_string()
}

fn default_cidr() -> String {
    "10.0.0.0/24".to_string()
}

fn default_subnet_mask() -> u8 {
    28
}

fn default_subnets() -> Vec<SubnetSettings> {
    vec![SubnetSettings {
        name: "public-subnet-1".to_string(),
        kind: SubnetKind::Public,
    }]
}

fn default_nat_gateways() -> u8 {
    1
}

fn default_instance_type() -> String {
    "t2.micro".to_string()
}

fn default_machine_image() -> String {
    "amazon-linux-2".to_string()
}

fn default_app_port() -> u32 {
    5000
}

fn default_engine() -> String {
    "sqlserver-ex-16".to_string()
}

fn default_instance_class() -> String {
    "t3.micro".to_string()
}

fn default_allocated_storage() -> u32 {
    20
}

fn default_true() -> bool {
    true
}

fn default_session_hours() -> u32 {
    1
}

fn default_role_name() -> String {
    "github-actions-role".to_string()
}

fn default_password_length() -> u8 {
    8
}

fn default_target_port() -> u32 {
    80
}

/// Complete stack configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackConfig {
    /// Prefix of every logical id and physical name
    #[serde(default = "default_resource_prefix")]
    pub resource_prefix: String,

    #[serde(default)]
    pub stack_name: Option<String>,

    /// Account used in deployment-role ARNs; a provider token when absent
    #[serde(default)]
    pub account_id: Option<String>,

    #[serde(default)]
    pub network: NetworkSettings,

    pub compute: ComputeSettings,
    pub database: DatabaseSettings,
    pub federation: FederationSettings,

    #[serde(default)]
    pub distribution: DistributionSettings,

    #[serde(default)]
    pub user_directory: Option<UserDirectorySettings>,

    #[serde(default)]
    pub load_balancer: Option<LoadBalancerSettings>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSettings {
    #[serde(default = "default_cidr")]
    pub cidr: String,

    /// Mask shared by every subnet
    #[serde(default = "default_subnet_mask")]
    pub subnet_mask: u8,

    #[serde(default = "default_subnets")]
    pub subnets: Vec<SubnetSettings>,

    #[serde(default = "default_nat_gateways")]
    pub nat_gateways: u8,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            cidr: default_cidr(),
            subnet_mask: default_subnet_mask(),
            subnets: default_subnets(),
            nat_gateways: default_nat_gateways(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubnetSettings {
    pub name: String,
    pub kind: SubnetKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputeSettings {
    pub key_pair: String,

    #[serde(default = "default_instance_type")]
    pub instance_type: String,

    #[serde(default = "default_machine_image")]
    pub machine_image: String,

    /// Port the application listens on
    #[serde(default = "default_app_port")]
    pub app_port: u32,

    /// Opaque reference to instance bootstrap content
    #[serde(default)]
    pub bootstrap_script: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    pub username: String,
    pub port: u32,

    #[serde(default = "default_engine")]
    pub engine: String,

    #[serde(default = "default_instance_class")]
    pub instance_class: String,

    #[serde(default = "default_allocated_storage")]
    pub allocated_storage_gib: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FederationSettings {
    pub organization: String,
    pub repository: String,

    #[serde(default)]
    pub subject_match: SubjectMatch,

    /// Grant read-only compute and parameter introspection
    #[serde(default = "default_true")]
    pub allow_introspection: bool,

    #[serde(default = "default_session_hours")]
    pub session_duration_hours: u32,

    #[serde(default = "default_role_name")]
    pub role_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionSettings {
    /// Aliases of the static asset distribution
    #[serde(default)]
    pub domain_names: Option<Vec<String>>,

    #[serde(default)]
    pub certificate: Option<String>,

    /// Aliases of the API distribution
    #[serde(default)]
    pub api_domain_names: Option<Vec<String>>,

    #[serde(default)]
    pub api_certificate: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDirectorySettings {
    pub callback_urls: Vec<String>,

    #[serde(default)]
    pub logout_urls: Vec<String>,

    #[serde(default = "default_password_length")]
    pub password_min_length: u8,

    #[serde(default = "default_true")]
    pub self_sign_up: bool,
}

impl UserDirectorySettings {
    pub fn new(callback_urls: Vec<String>) -> Self {
        Self {
            logout_urls: callback_urls.clone(),
            callback_urls,
            password_min_length: default_password_length(),
            self_sign_up: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadBalancerSettings {
    /// Listener certificate; falls back to the API certificate
    #[serde(default)]
    pub certificate: Option<String>,

    #[serde(default = "default_target_port")]
    pub target_port: u32,
}

impl Default for LoadBalancerSettings {
    fn default() -> Self {
        Self {
            certificate: None,
            target_port: default_target_port(),
        }
    }
}

impl StackConfig {
    /// Start a configuration from the required fields
    pub fn builder(
        key_pair: impl Into<String>,
        db_username: impl Into<String>,
        db_port: u32,
        organization: impl Into<String>,
        repository: impl Into<String>,
    ) -> StackConfigBuilder {
        StackConfigBuilder::new(
            key_pair.into(),
            db_username.into(),
            db_port,
            organization.into(),
            repository.into(),
        )
    }

    pub fn from_json_str(json: &str) -> SynthesisResult<Self> {
        serde_json::from_str(json).field("config")
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> SynthesisResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).field(&path.display().to_string())?;
        Self::from_json_str(&content)
    }

    /// Check every field and derive the typed plan the builders consume
    pub fn validate(&self) -> SynthesisResult<StackPlan> {
        validate_identifier(&self.resource_prefix).field("resource_prefix")?;

        if let Some(account) = &self.account_id {
            if account.len() != 12 || !account.chars().all(|c| c.is_ascii_digit()) {
                return Err(SynthesisError::configuration(
                    "account_id",
                    format!("`{}` is not a 12 digit account number", account),
                ));
            }
        }

        let mut warnings = Vec::new();

        let network = self.validate_network()?;
        let compute = self.validate_compute()?;
        let app_port = compute.app_port;
        let database = self.validate_database()?;
        let federation = self.validate_federation()?;

        let asset_distribution = validate_aliases(
            self.distribution.domain_names.as_deref(),
            self.distribution.certificate.as_deref(),
            "distribution.domain_names",
            "distribution.certificate",
            &mut warnings,
        )?;
        let api_aliases = validate_aliases(
            self.distribution.api_domain_names.as_deref(),
            self.distribution.api_certificate.as_deref(),
            "distribution.api_domain_names",
            "distribution.api_certificate",
            &mut warnings,
        )?;

        let user_directory = self
            .user_directory
            .as_ref()
            .map(validate_user_directory)
            .transpose()?;

        let load_balancer = self
            .load_balancer
            .as_ref()
            .map(|lb| self.validate_load_balancer(lb))
            .transpose()?;

        for warning in &warnings {
            warn!(prefix = %self.resource_prefix, "{}", warning);
        }

        Ok(StackPlan {
            prefix: self.resource_prefix.clone(),
            stack_name: self.stack_name.clone(),
            account_id: self.account_id.clone(),
            network,
            compute,
            database,
            federation,
            asset_distribution,
            api_distribution: ApiDistributionPlan {
                app_port,
                aliases: api_aliases,
            },
            user_directory,
            load_balancer,
            warnings,
        })
    }

    fn validate_network(&self) -> SynthesisResult<NetworkPlan> {
        let settings = &self.network;
        let cidr = Ipv4Cidr::new(&settings.cidr).field("network.cidr")?;

        for (i, subnet) in settings.subnets.iter().enumerate() {
            validate_identifier(&subnet.name).field(&format!("network.subnets[{}].name", i))?;
            if settings.subnets[..i].iter().any(|s| s.name == subnet.name) {
                return Err(SynthesisError::configuration(
                    format!("network.subnets[{}].name", i),
                    format!("duplicate subnet name `{}`", subnet.name),
                ));
            }
        }

        let blocks = cidr
            .partition(settings.subnet_mask, settings.subnets.len())
            .field("network.subnet_mask")?;

        let public = settings
            .subnets
            .iter()
            .filter(|s| s.kind.is_public_routable())
            .count();
        if public == 0 {
            return Err(SynthesisError::configuration(
                "network.subnets",
                "at least one public subnet is required for the compute instance",
            ));
        }
        if usize::from(settings.nat_gateways) > public {
            return Err(SynthesisError::configuration(
                "network.nat_gateways",
                format!(
                    "{} NAT gateways requested but only {} public subnets exist",
                    settings.nat_gateways, public
                ),
            ));
        }

        Ok(NetworkPlan {
            cidr,
            subnets: settings
                .subnets
                .iter()
                .zip(blocks)
                .map(|(s, block)| SubnetPlan {
                    name: s.name.clone(),
                    kind: s.kind,
                    cidr: block,
                })
                .collect(),
            nat_gateways: settings.nat_gateways,
        })
    }

    fn validate_compute(&self) -> SynthesisResult<ComputePlan> {
        let settings = &self.compute;
        validate_non_blank(&settings.key_pair).field("compute.key_pair")?;
        validate_non_blank(&settings.instance_type).field("compute.instance_type")?;
        validate_non_blank(&settings.machine_image).field("compute.machine_image")?;
        if let Some(script) = &settings.bootstrap_script {
            validate_non_blank(script).field("compute.bootstrap_script")?;
        }

        Ok(ComputePlan {
            key_pair: settings.key_pair.clone(),
            instance_type: settings.instance_type.clone(),
            machine_image: settings.machine_image.clone(),
            app_port: Port::new(settings.app_port).field("compute.app_port")?,
            bootstrap_script: settings.bootstrap_script.clone(),
        })
    }

    fn validate_database(&self) -> SynthesisResult<DatabasePlan> {
        let settings = &self.database;
        validate_non_blank(&settings.username).field("database.username")?;

        let mut chars = settings.username.chars();
        let well_formed = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
            && settings.username.len() <= 63;
        if !well_formed {
            return Err(SynthesisError::configuration(
                "database.username",
                format!(
                    "`{}` must start with a letter and contain only letters, digits or '_'",
                    settings.username
                ),
            ));
        }

        let port = Port::new(settings.port).field("database.port")?;
        validate_non_blank(&settings.engine).field("database.engine")?;
        validate_non_blank(&settings.instance_class).field("database.instance_class")?;
        if settings.allocated_storage_gib == 0 {
            return Err(SynthesisError::configuration(
                "database.allocated_storage_gib",
                "allocated storage must be positive",
            ));
        }

        Ok(DatabasePlan {
            username: settings.username.clone(),
            port,
            engine: settings.engine.clone(),
            instance_class: settings.instance_class.clone(),
            allocated_storage_gib: settings.allocated_storage_gib,
        })
    }

    fn validate_federation(&self) -> SynthesisResult<FederationPlan> {
        let settings = &self.federation;
        validate_subject_name(&settings.organization).field("federation.organization")?;
        validate_subject_name(&settings.repository).field("federation.repository")?;
        if let SubjectMatch::Branch { branch } = &settings.subject_match {
            validate_non_blank(branch).field("federation.subject_match.branch")?;
            if branch.contains(['*', '?']) {
                return Err(SynthesisError::configuration(
                    "federation.subject_match.branch",
                    "branch match is exact and must not contain wildcards",
                ));
            }
        }
        validate_session_duration(settings.session_duration_hours)
            .field("federation.session_duration_hours")?;
        validate_non_blank(&settings.role_name).field("federation.role_name")?;

        Ok(FederationPlan {
            organization: settings.organization.clone(),
            repository: settings.repository.clone(),
            subject_match: settings.subject_match.clone(),
            allow_introspection: settings.allow_introspection,
            session_duration_hours: settings.session_duration_hours,
            role_name: settings.role_name.clone(),
        })
    }

    fn validate_load_balancer(&self, settings: &LoadBalancerSettings) -> SynthesisResult<LoadBalancerPlan> {
        let certificate = settings
            .certificate
            .as_deref()
            .or(self.distribution.api_certificate.as_deref())
            .ok_or_else(|| {
                SynthesisError::configuration(
                    "load_balancer.certificate",
                    "HTTPS listener needs a certificate and no API certificate is configured",
                )
            })?;

        Ok(LoadBalancerPlan {
            certificate: CertificateRef::new(certificate).field("load_balancer.certificate")?,
            target_port: Port::new(settings.target_port).field("load_balancer.target_port")?,
        })
    }
}

/// Domain names gate the distribution; a certificate is mandatory alongside them
fn validate_aliases(
    domain_names: Option<&[String]>,
    certificate: Option<&str>,
    names_field: &str,
    certificate_field: &str,
    warnings: &mut Vec<String>,
) -> SynthesisResult<Option<AliasPlan>> {
    let names = match domain_names {
        Some(names) if !names.is_empty() => names,
        _ => {
            if certificate.is_some() {
                warnings.push(format!(
                    "`{}` is set without `{}`; the certificate is unused",
                    certificate_field, names_field
                ));
            }
            return Ok(None);
        }
    };

    let certificate = certificate.ok_or_else(|| {
        SynthesisError::configuration(
            certificate_field,
            format!("`{}` supplied without a certificate reference", names_field),
        )
    })?;

    let domain_names = names
        .iter()
        .enumerate()
        .map(|(i, name)| DomainName::new(name.as_str()).field(&format!("{}[{}]", names_field, i)))
        .collect::<SynthesisResult<Vec<_>>>()?;

    Ok(Some(AliasPlan {
        domain_names,
        certificate: CertificateRef::new(certificate).field(certificate_field)?,
    }))
}

fn validate_user_directory(settings: &UserDirectorySettings) -> SynthesisResult<UserDirectoryPlan> {
    if settings.callback_urls.is_empty() {
        return Err(SynthesisError::configuration(
            "user_directory.callback_urls",
            "at least one callback URL is required",
        ));
    }
    for (i, url) in settings.callback_urls.iter().enumerate() {
        validate_url(url).field(&format!("user_directory.callback_urls[{}]", i))?;
    }
    for (i, url) in settings.logout_urls.iter().enumerate() {
        validate_url(url).field(&format!("user_directory.logout_urls[{}]", i))?;
    }
    validate_password_length(settings.password_min_length).field("user_directory.password_min_length")?;

    Ok(UserDirectoryPlan {
        callback_urls: settings.callback_urls.clone(),
        logout_urls: settings.logout_urls.clone(),
        password_min_length: settings.password_min_length,
        self_sign_up: settings.self_sign_up,
    })
}

/// Fluent construction of a [`StackConfig`]
#[derive(Debug, Clone)]
pub struct StackConfigBuilder {
    config: StackConfig,
}

impl StackConfigBuilder {
    fn new(
        key_pair: String,
        db_username: String,
        db_port: u32,
        organization: String,
        repository: String,
    ) -> Self {
        Self {
            config: StackConfig {
                resource_prefix: default_resource_prefix(),
                stack_name: None,
                account_id: None,
                network: NetworkSettings::default(),
                compute: ComputeSettings {
                    key_pair,
                    instance_type: default_instance_type(),
                    machine_image: default_machine_image(),
                    app_port: default_app_port(),
                    bootstrap_script: None,
                },
                database: DatabaseSettings {
                    username: db_username,
                    port: db_port,
                    engine: default_engine(),
                    instance_class: default_instance_class(),
                    allocated_storage_gib: default_allocated_storage(),
                },
                federation: FederationSettings {
                    organization,
                    repository,
                    subject_match: SubjectMatch::default(),
                    allow_introspection: true,
                    session_duration_hours: default_session_hours(),
                    role_name: default_role_name(),
                },
                distribution: DistributionSettings::default(),
                user_directory: None,
                load_balancer: None,
            },
        }
    }

    pub fn resource_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.resource_prefix = prefix.into();
        self
    }

    pub fn stack_name(mut self, name: impl Into<String>) -> Self {
        self.config.stack_name = Some(name.into());
        self
    }

    pub fn account_id(mut self, account: impl Into<String>) -> Self {
        self.config.account_id = Some(account.into());
        self
    }

    pub fn network(mut self, network: NetworkSettings) -> Self {
        self.config.network = network;
        self
    }

    pub fn app_port(mut self, port: u32) -> Self {
        self.config.compute.app_port = port;
        self
    }

    pub fn bootstrap_script(mut self, reference: impl Into<String>) -> Self {
        self.config.compute.bootstrap_script = Some(reference.into());
        self
    }

    pub fn domain_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.distribution.domain_names = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn certificate(mut self, certificate: impl Into<String>) -> Self {
        self.config.distribution.certificate = Some(certificate.into());
        self
    }

    pub fn api_domain_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.distribution.api_domain_names = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn api_certificate(mut self, certificate: impl Into<String>) -> Self {
        self.config.distribution.api_certificate = Some(certificate.into());
        self
    }

    pub fn subject_match(mut self, subject_match: SubjectMatch) -> Self {
        self.config.federation.subject_match = subject_match;
        self
    }

    pub fn allow_introspection(mut self, allow: bool) -> Self {
        self.config.federation.allow_introspection = allow;
        self
    }

    pub fn session_duration_hours(mut self, hours: u32) -> Self {
        self.config.federation.session_duration_hours = hours;
        self
    }

    pub fn user_directory(mut self, settings: UserDirectorySettings) -> Self {
        self.config.user_directory = Some(settings);
        self
    }

    pub fn load_balancer(mut self, settings: LoadBalancerSettings) -> Self {
        self.config.load_balancer = Some(settings);
        self
    }

    /// Validate and return the configuration
    pub fn build(self) -> SynthesisResult<StackConfig> {
        self.config.validate()?;
        Ok(self.config)
    }

    /// Return the configuration without validating it
    pub fn build_unchecked(self) -> StackConfig {
        self.config
    }
}

/// Validated, typed view of a [`StackConfig`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackPlan {
    pub prefix: String,
    pub stack_name: Option<String>,
    pub account_id: Option<String>,
    pub network: NetworkPlan,
    pub compute: ComputePlan,
    pub database: DatabasePlan,
    pub federation: FederationPlan,
    /// Present only when asset domain names are configured
    pub asset_distribution: Option<AliasPlan>,
    pub api_distribution: ApiDistributionPlan,
    pub user_directory: Option<UserDirectoryPlan>,
    pub load_balancer: Option<LoadBalancerPlan>,
    /// Non-fatal findings, e.g. an unused certificate
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkPlan {
    pub cidr: Ipv4Cidr,
    pub subnets: Vec<SubnetPlan>,
    pub nat_gateways: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubnetPlan {
    pub name: String,
    pub kind: SubnetKind,
    pub cidr: Ipv4Cidr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComputePlan {
    pub key_pair: String,
    pub instance_type: String,
    pub machine_image: String,
    pub app_port: Port,
    pub bootstrap_script: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabasePlan {
    pub username: String,
    pub port: Port,
    pub engine: String,
    pub instance_class: String,
    pub allocated_storage_gib: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FederationPlan {
    pub organization: String,
    pub repository: String,
    pub subject_match: SubjectMatch,
    pub allow_introspection: bool,
    pub session_duration_hours: u32,
    pub role_name: String,
}

/// Custom domain names plus the certificate covering them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasPlan {
    pub domain_names: Vec<DomainName>,
    pub certificate: CertificateRef,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiDistributionPlan {
    pub app_port: Port,
    pub aliases: Option<AliasPlan>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserDirectoryPlan {
    pub callback_urls: Vec<String>,
    pub logout_urls: Vec<String>,
    pub password_min_length: u8,
    pub self_sign_up: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadBalancerPlan {
    pub certificate: CertificateRef,
    pub target_port: Port,
}
