//! Backend initializer implementations

mod azurerm;

pub use azurerm::{
    AzureRmConfig, AzureRmInitializer, ExtendedAzureRmConfig, InitDecision, InitReason,
    TOOL_ONLY_KEYS, azurerm_configs_equal, filter_tool_only_keys,
};

use std::sync::Arc;

use stateroot_provider_azure::ApiConnector;

use crate::backend::{BackendError, BackendResult, RemoteStateInitializer};
use crate::lock::AccountLocks;

/// Create the initializer for a backend type
///
/// This function dispatches to the appropriate initializer implementation
/// based on the backend type of a remote state configuration.
pub fn initializer_for(
    backend_type: &str,
    connector: Arc<dyn ApiConnector>,
    locks: Arc<AccountLocks>,
) -> BackendResult<Box<dyn RemoteStateInitializer>> {
    match backend_type {
        azurerm::BACKEND_TYPE => Ok(Box::new(AzureRmInitializer::with_locks(connector, locks))),
        // "s3" and "gcs" backends are provisioned by the infrastructure tool itself
        other => Err(BackendError::unsupported_backend(other)),
    }
}
