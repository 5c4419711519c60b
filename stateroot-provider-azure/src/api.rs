//! Management API - Trait abstracting the Azure Resource Manager calls
//!
//! Provisioning only needs a narrow slice of the management plane: resource
//! groups, storage accounts and blob containers. Implementations are bound to
//! a single subscription.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Error type for management API calls
#[derive(Debug, Clone, PartialEq)]
pub struct ApiError {
    /// HTTP status, when the service answered
    pub status: Option<u16>,
    /// Service error code (e.g., "ResourceGroupNotFound")
    pub code: Option<String>,
    pub message: String,
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.status, &self.code) {
            (Some(status), Some(code)) => write!(f, "[{} {}] {}", status, code, self.message),
            (Some(status), None) => write!(f, "[{}] {}", status, self.message),
            (None, Some(code)) => write!(f, "[{}] {}", code, self.message),
            (None, None) => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for ApiError {}

impl ApiError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            code: None,
            message: message.into(),
        }
    }

    /// A 404 response for the named resource
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(message).with_status(404)
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Whether the service reported the resource as missing
    pub fn is_not_found(&self) -> bool {
        self.status == Some(404)
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        let error = ApiError::new(err.to_string());
        match err.status() {
            Some(status) => error.with_status(status.as_u16()),
            None => error,
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// A resource group as returned by the service
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ResourceGroup {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    /// Resolved location (e.g., "northeurope")
    pub location: String,
}

/// Result of a storage account name availability check
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NameAvailability {
    pub name_available: bool,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl NameAvailability {
    pub fn available() -> Self {
        Self {
            name_available: true,
            reason: None,
            message: None,
        }
    }

    pub fn taken(reason: impl Into<String>) -> Self {
        Self {
            name_available: false,
            reason: Some(reason.into()),
            message: None,
        }
    }
}

/// Storage account kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageKind {
    /// General-purpose v2
    StorageV2,
}

/// Storage account SKU name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkuName {
    /// Standard locally-redundant storage
    #[serde(rename = "Standard_LRS")]
    StandardLrs,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sku {
    pub name: SkuName,
}

/// Parameters for creating a storage account
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StorageAccountCreate {
    pub kind: StorageKind,
    pub location: String,
    pub sku: Sku,
}

impl StorageAccountCreate {
    /// General-purpose v2 account with standard locally-redundant storage
    pub fn general_purpose_v2(location: impl Into<String>) -> Self {
        Self {
            kind: StorageKind::StorageV2,
            location: location.into(),
            sku: Sku {
                name: SkuName::StandardLrs,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageAccountProperties {
    #[serde(default)]
    pub provisioning_state: Option<String>,
}

/// A storage account as returned by the service
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StorageAccount {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    pub location: String,
    #[serde(default)]
    pub properties: StorageAccountProperties,
}

/// A storage account creation that the service is still processing
#[derive(Debug, Clone, PartialEq)]
pub struct PendingOperation {
    /// Storage account being created
    pub account_name: String,
    /// Resource group of the account
    pub resource_group: String,
    /// Status monitor URL returned by the service, if any
    pub status_url: Option<String>,
    /// Delay requested by the service before the next status check
    pub retry_after: Option<Duration>,
}

/// Public access level of a blob container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PublicAccess {
    None,
    Blob,
    Container,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_access: Option<PublicAccess>,
}

/// A blob container as returned by the service
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BlobContainer {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub properties: ContainerProperties,
}

/// Management-plane operations used to provision a state backend
///
/// All operations are async and involve side effects on the remote service.
/// Missing resources surface as an `ApiError` with status 404.
#[async_trait]
pub trait ManagementApi: Send + Sync {
    /// Returns whether the resource group exists
    async fn resource_group_exists(&self, name: &str) -> ApiResult<bool>;

    async fn get_resource_group(&self, name: &str) -> ApiResult<ResourceGroup>;

    /// Create the resource group, or update it in place if it already exists
    async fn create_or_update_resource_group(
        &self,
        name: &str,
        location: &str,
    ) -> ApiResult<ResourceGroup>;

    /// Check whether a storage account name is still free across the service
    async fn check_storage_account_name(&self, name: &str) -> ApiResult<NameAvailability>;

    /// Start creating a storage account
    async fn begin_create_storage_account(
        &self,
        resource_group: &str,
        name: &str,
        params: &StorageAccountCreate,
    ) -> ApiResult<PendingOperation>;

    /// Wait for a storage account creation to finish
    ///
    /// `interval` is used between status checks unless the service asks for a
    /// different delay.
    async fn poll_until_done(
        &self,
        operation: &PendingOperation,
        interval: Duration,
    ) -> ApiResult<StorageAccount>;

    async fn get_storage_account(&self, resource_group: &str, name: &str)
    -> ApiResult<StorageAccount>;

    async fn get_blob_container(
        &self,
        resource_group: &str,
        account_name: &str,
        name: &str,
    ) -> ApiResult<BlobContainer>;

    async fn create_blob_container(
        &self,
        resource_group: &str,
        account_name: &str,
        name: &str,
        public_access: PublicAccess,
    ) -> ApiResult<BlobContainer>;
}

/// Produces authenticated management clients
pub trait ApiConnector: Send + Sync {
    /// Connect to `subscription_id`, authenticating against `tenant_id`
    ///
    /// An empty `tenant_id` lets the connector choose its default tenant.
    fn connect(&self, tenant_id: &str, subscription_id: &str)
    -> ApiResult<Arc<dyn ManagementApi>>;
}
