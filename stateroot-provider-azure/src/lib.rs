//! Stateroot Azure Provider
//!
//! Talks to Azure Resource Manager to provision the resources backing an
//! `azurerm` remote state: a resource group, a storage account and a blob
//! container.
//!
//! # Overview
//!
//! - **ManagementApi**: the management-plane calls provisioning needs
//! - **ArmClient**: REST implementation of `ManagementApi`
//! - **TokenCredential**: bearer token sources for the client
//! - **Provisioner**: idempotent `ensure_*` operations over a `ManagementApi`

pub mod api;
pub mod client;
pub mod credential;
#[cfg(any(test, feature = "test-util"))]
pub mod fake;
pub mod provisioner;

pub use api::{
    ApiConnector, ApiError, ApiResult, BlobContainer, ManagementApi, NameAvailability,
    PendingOperation, PublicAccess, ResourceGroup, StorageAccount, StorageAccountCreate,
};
pub use client::{ArmClient, ArmConnector};
pub use credential::{ClientSecretCredential, StaticTokenCredential, TokenCredential};
pub use provisioner::{PollOptions, ProvisionError, ProvisionResult, Provisioner};
