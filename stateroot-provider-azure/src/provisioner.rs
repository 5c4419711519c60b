//! Idempotent provisioning of the state backend resources
//!
//! Each `ensure_*` operation checks for the resource before creating it, so
//! the whole sequence can be rerun safely after a partial failure. Nothing is
//! ever deleted or updated beyond the resource group upsert.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::api::{ApiError, ManagementApi, PublicAccess, ResourceGroup, StorageAccountCreate};

/// Errors that can occur while provisioning
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// A resource that was not to be created does not exist
    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    /// The management API rejected or failed a call
    #[error(transparent)]
    Api(#[from] ApiError),

    /// An asynchronous creation did not finish in time
    #[error("Timed out after {elapsed:?} waiting for {what}")]
    Timeout { what: String, elapsed: Duration },
}

pub type ProvisionResult<T> = Result<T, ProvisionError>;

/// How long-running creations are awaited
#[derive(Debug, Clone)]
pub struct PollOptions {
    /// Delay between status checks when the service does not suggest one
    pub interval: Duration,
    /// Upper bound on the whole wait
    pub timeout: Duration,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            timeout: Duration::from_secs(600),
        }
    }
}

/// Runs the ensure operations against one subscription
pub struct Provisioner {
    api: Arc<dyn ManagementApi>,
    poll: PollOptions,
}

impl Provisioner {
    pub fn new(api: Arc<dyn ManagementApi>) -> Self {
        Self {
            api,
            poll: PollOptions::default(),
        }
    }

    pub fn with_poll_options(mut self, poll: PollOptions) -> Self {
        self.poll = poll;
        self
    }

    /// Make sure the resource group exists
    ///
    /// With `create_if_missing` the group is upserted in `location`; otherwise
    /// it is only fetched and must already exist.
    pub async fn ensure_resource_group(
        &self,
        name: &str,
        location: &str,
        create_if_missing: bool,
    ) -> ProvisionResult<ResourceGroup> {
        if !create_if_missing {
            return self.api.get_resource_group(name).await.map_err(|err| {
                if err.is_not_found() {
                    ProvisionError::NotFound {
                        kind: "Resource group",
                        name: name.to_string(),
                    }
                } else {
                    ProvisionError::Api(err)
                }
            });
        }

        log::info!("Ensuring resource group {} in {}", name, location);
        Ok(self
            .api
            .create_or_update_resource_group(name, location)
            .await?)
    }

    /// Make sure the storage account exists, creating it when its name is free
    ///
    /// Storage account names are unique across the whole service, so an
    /// unavailable name is taken to mean the account already exists. An
    /// account with that name owned by someone else is not detected here; the
    /// container step will fail against it instead.
    pub async fn ensure_storage_account(
        &self,
        resource_group: &str,
        name: &str,
        location: &str,
        skip: bool,
    ) -> ProvisionResult<()> {
        if skip {
            return Ok(());
        }

        let availability = self.api.check_storage_account_name(name).await?;
        if !availability.name_available {
            log::debug!(
                "Storage account name {} is taken ({}), assuming it exists",
                name,
                availability.reason.as_deref().unwrap_or("no reason given")
            );
            return Ok(());
        }

        log::info!(
            "Creating storage account {} in resource group {} ({})",
            name,
            resource_group,
            location
        );
        let operation = self
            .api
            .begin_create_storage_account(
                resource_group,
                name,
                &StorageAccountCreate::general_purpose_v2(location),
            )
            .await?;

        match tokio::time::timeout(
            self.poll.timeout,
            self.api.poll_until_done(&operation, self.poll.interval),
        )
        .await
        {
            Ok(result) => {
                result?;
                Ok(())
            }
            Err(_) => Err(ProvisionError::Timeout {
                what: format!("storage account {}", name),
                elapsed: self.poll.timeout,
            }),
        }
    }

    /// Make sure the blob container exists, creating it without public access
    pub async fn ensure_blob_container(
        &self,
        resource_group: &str,
        account_name: &str,
        name: &str,
        skip: bool,
    ) -> ProvisionResult<()> {
        if skip {
            return Ok(());
        }

        match self
            .api
            .get_blob_container(resource_group, account_name, name)
            .await
        {
            Ok(_) => Ok(()),
            Err(err) if err.is_not_found() => {
                log::info!(
                    "Creating blob container {} in storage account {}",
                    name,
                    account_name
                );
                self.api
                    .create_blob_container(resource_group, account_name, name, PublicAccess::None)
                    .await?;
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }
}
