//! azurerm backend initializer
//!
//! Backs remote state with a blob in an Azure storage account. Before the
//! infrastructure tool can use the backend, the resource group, storage
//! account and container must exist.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use stateroot_core::{
    BackendSnapshot, ConfigMap, DecodeError, RemoteState, configs_equal, decode, strip_keys,
};
use stateroot_provider_azure::{ApiConnector, ApiResult, Provisioner};

use crate::backend::{
    BackendError, BackendResult, InitOptions, RemoteStateInitializer, with_deadline,
};
use crate::lock::AccountLocks;

/// Backend type handled by this initializer
pub const BACKEND_TYPE: &str = "azurerm";

/// Keys consumed here that the infrastructure tool does not understand
pub const TOOL_ONLY_KEYS: [&str; 5] = [
    "resource_group_location",
    "storage_account_location",
    "skip_resource_group_creation",
    "skip_storage_account_creation",
    "skip_container_creation",
];

/// Backend settings shared with the infrastructure tool
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AzureRmConfig {
    pub tenant_id: String,
    pub subscription_id: String,
    pub resource_group_name: String,
    pub storage_account_name: String,
    pub container_name: String,
    /// Blob path of the state file
    pub key: String,
}

impl AzureRmConfig {
    pub fn parse(config: &ConfigMap) -> Result<Self, DecodeError> {
        decode(BACKEND_TYPE, config)
    }

    /// Check the keys needed to probe the backend resources
    fn validate_for_probe(&self) -> BackendResult<()> {
        let missing: Vec<&str> = [
            ("subscription_id", &self.subscription_id),
            ("resource_group_name", &self.resource_group_name),
            ("storage_account_name", &self.storage_account_name),
            ("container_name", &self.container_name),
        ]
        .into_iter()
        .filter(|(_, value)| value.is_empty())
        .map(|(name, _)| name)
        .collect();

        missing_keys(missing)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ToolOnlyFields {
    resource_group_location: String,
    storage_account_location: String,
    skip_resource_group_creation: bool,
    skip_storage_account_creation: bool,
    skip_container_creation: bool,
}

/// Backend settings plus the provisioning-only extensions
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtendedAzureRmConfig {
    pub remote_state: AzureRmConfig,
    /// Only used when creating the resource group; never updated afterwards
    pub resource_group_location: String,
    /// Falls back to the resource group's location when empty
    pub storage_account_location: String,
    pub skip_resource_group_creation: bool,
    pub skip_storage_account_creation: bool,
    pub skip_container_creation: bool,
}

impl ExtendedAzureRmConfig {
    pub fn parse(config: &ConfigMap) -> Result<Self, DecodeError> {
        let remote_state = AzureRmConfig::parse(config)?;
        let extra: ToolOnlyFields = decode(BACKEND_TYPE, config)?;

        Ok(Self {
            remote_state,
            resource_group_location: extra.resource_group_location,
            storage_account_location: extra.storage_account_location,
            skip_resource_group_creation: extra.skip_resource_group_creation,
            skip_storage_account_creation: extra.skip_storage_account_creation,
            skip_container_creation: extra.skip_container_creation,
        })
    }

    /// Check that every key provisioning relies on is set
    pub fn validate(&self) -> BackendResult<()> {
        let base = &self.remote_state;
        let mut required = vec![
            ("subscription_id", &base.subscription_id),
            ("resource_group_name", &base.resource_group_name),
            ("storage_account_name", &base.storage_account_name),
            ("container_name", &base.container_name),
            ("key", &base.key),
        ];
        if !self.skip_resource_group_creation {
            required.push(("resource_group_location", &self.resource_group_location));
        }

        let missing = required
            .into_iter()
            .filter(|(_, value)| value.is_empty())
            .map(|(name, _)| name)
            .collect();

        missing_keys(missing)
    }

    /// Location for a new storage account
    pub fn storage_account_location_or<'a>(&'a self, resource_group_location: &'a str) -> &'a str {
        if self.storage_account_location.is_empty() {
            resource_group_location
        } else {
            &self.storage_account_location
        }
    }
}

fn missing_keys(missing: Vec<&str>) -> BackendResult<()> {
    if missing.is_empty() {
        Ok(())
    } else {
        Err(BackendError::configuration(format!(
            "Missing required {} attribute(s): {}",
            BACKEND_TYPE,
            missing.join(", ")
        )))
    }
}

/// Copy of `config` without the tool-only keys
pub fn filter_tool_only_keys(config: &ConfigMap) -> ConfigMap {
    strip_keys(config, &TOOL_ONLY_KEYS)
}

/// Whether `config` targets the same backend as `existing`
pub fn azurerm_configs_equal(config: &ConfigMap, existing: Option<&BackendSnapshot>) -> bool {
    configs_equal(config, existing, BACKEND_TYPE, &TOOL_ONLY_KEYS)
}

/// Why a backend needs initialization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitReason {
    ConfigChanged,
    ResourceGroupMissing,
    StorageAccountMissing,
    ContainerMissing,
}

/// Outcome of the read-only check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitDecision {
    NotNeeded,
    Needed(InitReason),
}

impl InitDecision {
    pub fn is_needed(&self) -> bool {
        matches!(self, InitDecision::Needed(_))
    }
}

/// Maps a probe response to whether the resource exists
fn exists<T>(probe: ApiResult<T>) -> BackendResult<bool> {
    match probe {
        Ok(_) => Ok(true),
        Err(err) if err.is_not_found() => Ok(false),
        Err(err) => Err(err.into()),
    }
}

/// Initializer for the `azurerm` backend
pub struct AzureRmInitializer {
    connector: Arc<dyn ApiConnector>,
    locks: Arc<AccountLocks>,
}

impl AzureRmInitializer {
    /// Initializer sharing the process-wide account locks
    pub fn new(connector: Arc<dyn ApiConnector>) -> Self {
        Self::with_locks(connector, AccountLocks::global())
    }

    pub fn with_locks(connector: Arc<dyn ApiConnector>, locks: Arc<AccountLocks>) -> Self {
        Self { connector, locks }
    }

    /// Decide whether `remote_state` needs initialization, and why
    pub async fn decide(
        &self,
        remote_state: &RemoteState,
        existing: Option<&BackendSnapshot>,
    ) -> BackendResult<InitDecision> {
        if !azurerm_configs_equal(&remote_state.config, existing) {
            return Ok(InitDecision::Needed(InitReason::ConfigChanged));
        }

        let config = AzureRmConfig::parse(&remote_state.config)?;
        config.validate_for_probe()?;

        let api = self
            .connector
            .connect(&config.tenant_id, &config.subscription_id)?;

        if !api
            .resource_group_exists(&config.resource_group_name)
            .await?
        {
            return Ok(InitDecision::Needed(InitReason::ResourceGroupMissing));
        }

        if !exists(
            api.get_storage_account(&config.resource_group_name, &config.storage_account_name)
                .await,
        )? {
            return Ok(InitDecision::Needed(InitReason::StorageAccountMissing));
        }

        if !exists(
            api.get_blob_container(
                &config.resource_group_name,
                &config.storage_account_name,
                &config.container_name,
            )
            .await,
        )? {
            return Ok(InitDecision::Needed(InitReason::ContainerMissing));
        }

        Ok(InitDecision::NotNeeded)
    }

    /// Ensure resource group, storage account and container, in that order
    async fn provision(
        &self,
        config: &ExtendedAzureRmConfig,
        options: &InitOptions,
    ) -> BackendResult<()> {
        let base = &config.remote_state;
        let api = self
            .connector
            .connect(&base.tenant_id, &base.subscription_id)?;
        let provisioner = Provisioner::new(api).with_poll_options(options.poll.clone());

        let group = provisioner
            .ensure_resource_group(
                &base.resource_group_name,
                &config.resource_group_location,
                !config.skip_resource_group_creation,
            )
            .await?;

        provisioner
            .ensure_storage_account(
                &base.resource_group_name,
                &base.storage_account_name,
                config.storage_account_location_or(&group.location),
                config.skip_storage_account_creation,
            )
            .await?;

        provisioner
            .ensure_blob_container(
                &base.resource_group_name,
                &base.storage_account_name,
                &base.container_name,
                config.skip_container_creation,
            )
            .await?;

        Ok(())
    }
}

#[async_trait]
impl RemoteStateInitializer for AzureRmInitializer {
    async fn needs_initialization(
        &self,
        remote_state: &RemoteState,
        existing: Option<&BackendSnapshot>,
        options: &InitOptions,
    ) -> BackendResult<bool> {
        let decision = with_deadline(
            options.deadline,
            "checking azurerm backend",
            self.decide(remote_state, existing),
        )
        .await?;

        log::debug!("azurerm backend decision: {:?}", decision);
        Ok(decision.is_needed())
    }

    async fn initialize(
        &self,
        remote_state: &RemoteState,
        options: &InitOptions,
    ) -> BackendResult<()> {
        let config = ExtendedAzureRmConfig::parse(&remote_state.config)?;
        config.validate()?;

        let account = &config.remote_state.storage_account_name;
        let work = self
            .locks
            .with_account_lock(account, "initialize", self.provision(&config, options));

        with_deadline(options.deadline, "initializing azurerm backend", work).await?;
        log::debug!("azurerm backend for storage account {} is ready", account);
        Ok(())
    }

    fn backend_init_args(&self, config: &ConfigMap) -> ConfigMap {
        filter_tool_only_keys(config)
    }
}
