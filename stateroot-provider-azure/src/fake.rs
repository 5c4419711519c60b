//! In-memory management API for tests
//!
//! Keeps resource groups, storage accounts and containers in memory and
//! records every call so tests can assert on the exact traffic.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use crate::api::{
    ApiConnector, ApiError, ApiResult, BlobContainer, ContainerProperties, ManagementApi,
    NameAvailability, PendingOperation, PublicAccess, ResourceGroup, StorageAccount,
    StorageAccountCreate, StorageAccountProperties,
};

/// A call observed by [`FakeManagementApi`]
#[derive(Debug, Clone, PartialEq)]
pub enum ApiCall {
    ResourceGroupExists(String),
    GetResourceGroup(String),
    CreateOrUpdateResourceGroup {
        name: String,
        location: String,
    },
    CheckStorageAccountName(String),
    BeginCreateStorageAccount {
        resource_group: String,
        name: String,
        location: String,
    },
    PollUntilDone(String),
    GetStorageAccount {
        resource_group: String,
        name: String,
    },
    GetBlobContainer {
        resource_group: String,
        account_name: String,
        name: String,
    },
    CreateBlobContainer {
        resource_group: String,
        account_name: String,
        name: String,
        public_access: PublicAccess,
    },
}

#[derive(Default)]
struct Inner {
    resource_groups: HashMap<String, String>,
    /// account name -> (resource group, location)
    storage_accounts: HashMap<String, (String, String)>,
    reserved_names: HashSet<String>,
    containers: HashSet<(String, String, String)>,
    failures: HashMap<&'static str, ApiError>,
    calls: Vec<ApiCall>,
}

/// Management API backed by in-memory maps
#[derive(Default)]
pub struct FakeManagementApi {
    inner: Mutex<Inner>,
    latency: Duration,
    provisioning_delay: Duration,
}

impl FakeManagementApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long inside every call
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Sleep this long before a storage account creation completes
    pub fn with_provisioning_delay(mut self, delay: Duration) -> Self {
        self.provisioning_delay = delay;
        self
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panicking test thread must not hide the calls recorded so far
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn add_resource_group(&self, name: &str, location: &str) {
        self.lock()
            .resource_groups
            .insert(name.to_string(), location.to_string());
    }

    pub fn add_storage_account(&self, resource_group: &str, name: &str, location: &str) {
        self.lock().storage_accounts.insert(
            name.to_string(),
            (resource_group.to_string(), location.to_string()),
        );
    }

    /// Mark a storage account name as taken elsewhere
    pub fn reserve_storage_account_name(&self, name: &str) {
        self.lock().reserved_names.insert(name.to_string());
    }

    pub fn add_blob_container(&self, resource_group: &str, account_name: &str, name: &str) {
        self.lock().containers.insert((
            resource_group.to_string(),
            account_name.to_string(),
            name.to_string(),
        ));
    }

    /// Fail the next call to `operation` (the trait method name) with `error`
    pub fn fail_next(&self, operation: &'static str, error: ApiError) {
        self.lock().failures.insert(operation, error);
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        self.lock().calls.clone()
    }

    pub fn count(&self, predicate: impl Fn(&ApiCall) -> bool) -> usize {
        self.lock().calls.iter().filter(|c| predicate(c)).count()
    }

    pub fn resource_group_location(&self, name: &str) -> Option<String> {
        self.lock().resource_groups.get(name).cloned()
    }

    pub fn storage_account_location(&self, name: &str) -> Option<String> {
        self.lock()
            .storage_accounts
            .get(name)
            .map(|(_, location)| location.clone())
    }

    pub fn has_blob_container(&self, resource_group: &str, account_name: &str, name: &str) -> bool {
        self.lock().containers.contains(&(
            resource_group.to_string(),
            account_name.to_string(),
            name.to_string(),
        ))
    }

    /// Record `call`, apply latency and any injected failure
    async fn enter(&self, operation: &'static str, call: ApiCall) -> ApiResult<()> {
        let failure = {
            let mut inner = self.lock();
            inner.calls.push(call);
            inner.failures.remove(operation)
        };

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        match failure {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ManagementApi for FakeManagementApi {
    async fn resource_group_exists(&self, name: &str) -> ApiResult<bool> {
        self.enter(
            "resource_group_exists",
            ApiCall::ResourceGroupExists(name.to_string()),
        )
        .await?;
        Ok(self.lock().resource_groups.contains_key(name))
    }

    async fn get_resource_group(&self, name: &str) -> ApiResult<ResourceGroup> {
        self.enter(
            "get_resource_group",
            ApiCall::GetResourceGroup(name.to_string()),
        )
        .await?;
        let location = self.lock().resource_groups.get(name).cloned();
        location
            .map(|location| ResourceGroup {
                id: None,
                name: name.to_string(),
                location,
            })
            .ok_or_else(|| {
                ApiError::not_found(format!("Resource group '{}' could not be found", name))
                    .with_code("ResourceGroupNotFound")
            })
    }

    async fn create_or_update_resource_group(
        &self,
        name: &str,
        location: &str,
    ) -> ApiResult<ResourceGroup> {
        self.enter(
            "create_or_update_resource_group",
            ApiCall::CreateOrUpdateResourceGroup {
                name: name.to_string(),
                location: location.to_string(),
            },
        )
        .await?;
        self.add_resource_group(name, location);
        Ok(ResourceGroup {
            id: None,
            name: name.to_string(),
            location: location.to_string(),
        })
    }

    async fn check_storage_account_name(&self, name: &str) -> ApiResult<NameAvailability> {
        self.enter(
            "check_storage_account_name",
            ApiCall::CheckStorageAccountName(name.to_string()),
        )
        .await?;
        let inner = self.lock();
        if inner.storage_accounts.contains_key(name) || inner.reserved_names.contains(name) {
            Ok(NameAvailability::taken("AlreadyExists"))
        } else {
            Ok(NameAvailability::available())
        }
    }

    async fn begin_create_storage_account(
        &self,
        resource_group: &str,
        name: &str,
        params: &StorageAccountCreate,
    ) -> ApiResult<PendingOperation> {
        self.enter(
            "begin_create_storage_account",
            ApiCall::BeginCreateStorageAccount {
                resource_group: resource_group.to_string(),
                name: name.to_string(),
                location: params.location.clone(),
            },
        )
        .await?;
        self.add_storage_account(resource_group, name, &params.location);
        Ok(PendingOperation {
            account_name: name.to_string(),
            resource_group: resource_group.to_string(),
            status_url: None,
            retry_after: None,
        })
    }

    async fn poll_until_done(
        &self,
        operation: &PendingOperation,
        _interval: Duration,
    ) -> ApiResult<StorageAccount> {
        self.enter(
            "poll_until_done",
            ApiCall::PollUntilDone(operation.account_name.clone()),
        )
        .await?;
        if !self.provisioning_delay.is_zero() {
            tokio::time::sleep(self.provisioning_delay).await;
        }
        let location = self
            .storage_account_location(&operation.account_name)
            .unwrap_or_default();
        Ok(StorageAccount {
            id: None,
            name: operation.account_name.clone(),
            location,
            properties: StorageAccountProperties {
                provisioning_state: Some("Succeeded".to_string()),
            },
        })
    }

    async fn get_storage_account(
        &self,
        resource_group: &str,
        name: &str,
    ) -> ApiResult<StorageAccount> {
        self.enter(
            "get_storage_account",
            ApiCall::GetStorageAccount {
                resource_group: resource_group.to_string(),
                name: name.to_string(),
            },
        )
        .await?;
        let found = self.lock().storage_accounts.get(name).cloned();
        match found {
            Some((group, location)) if group == resource_group => Ok(StorageAccount {
                id: None,
                name: name.to_string(),
                location,
                properties: StorageAccountProperties {
                    provisioning_state: Some("Succeeded".to_string()),
                },
            }),
            _ => Err(ApiError::not_found(format!(
                "The Resource 'Microsoft.Storage/storageAccounts/{}' under resource group '{}' was not found",
                name, resource_group
            ))
            .with_code("ResourceNotFound")),
        }
    }

    async fn get_blob_container(
        &self,
        resource_group: &str,
        account_name: &str,
        name: &str,
    ) -> ApiResult<BlobContainer> {
        self.enter(
            "get_blob_container",
            ApiCall::GetBlobContainer {
                resource_group: resource_group.to_string(),
                account_name: account_name.to_string(),
                name: name.to_string(),
            },
        )
        .await?;
        if self.has_blob_container(resource_group, account_name, name) {
            Ok(BlobContainer {
                id: None,
                name: name.to_string(),
                properties: ContainerProperties {
                    public_access: Some(PublicAccess::None),
                },
            })
        } else {
            Err(ApiError::not_found("The specified container does not exist.")
                .with_code("ContainerNotFound"))
        }
    }

    async fn create_blob_container(
        &self,
        resource_group: &str,
        account_name: &str,
        name: &str,
        public_access: PublicAccess,
    ) -> ApiResult<BlobContainer> {
        self.enter(
            "create_blob_container",
            ApiCall::CreateBlobContainer {
                resource_group: resource_group.to_string(),
                account_name: account_name.to_string(),
                name: name.to_string(),
                public_access,
            },
        )
        .await?;
        self.add_blob_container(resource_group, account_name, name);
        Ok(BlobContainer {
            id: None,
            name: name.to_string(),
            properties: ContainerProperties {
                public_access: Some(public_access),
            },
        })
    }
}

/// Connector handing out one shared [`FakeManagementApi`]
pub struct FakeConnector {
    api: Arc<FakeManagementApi>,
    connections: Mutex<Vec<(String, String)>>,
}

impl FakeConnector {
    pub fn new(api: Arc<FakeManagementApi>) -> Self {
        Self {
            api,
            connections: Mutex::new(Vec::new()),
        }
    }

    /// `(tenant_id, subscription_id)` of every connection made
    pub fn connections(&self) -> Vec<(String, String)> {
        self.connections
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl ApiConnector for FakeConnector {
    fn connect(
        &self,
        tenant_id: &str,
        subscription_id: &str,
    ) -> ApiResult<Arc<dyn ManagementApi>> {
        self.connections
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((tenant_id.to_string(), subscription_id.to_string()));
        Ok(self.api.clone())
    }
}
