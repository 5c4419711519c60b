//! Remote state initializer trait and error types

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use stateroot_core::{BackendSnapshot, ConfigMap, DecodeError, RemoteState};
use stateroot_provider_azure::{ApiError, PollOptions, ProvisionError};
use thiserror::Error;

use crate::lock::LockInfo;

/// Errors that can occur when checking or initializing a backend
#[derive(Debug, Error)]
pub enum BackendError {
    /// The configuration could not be decoded into its typed form
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Required configuration is missing or inconsistent
    #[error("Backend configuration error: {0}")]
    Configuration(String),

    /// A resource that was not to be created does not exist
    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    /// A management API call failed
    #[error("Azure API error: {0}")]
    Api(#[from] ApiError),

    /// The operation did not finish before its deadline
    #[error("Timed out: {0}")]
    Timeout(String),

    /// The storage account is being provisioned by another process
    #[error("Storage account is locked by {who} (lock ID: {lock_id}, operation: {operation})")]
    Locked {
        lock_id: String,
        who: String,
        operation: String,
    },

    /// The backend type is not supported
    #[error("Unsupported backend type: {0}")]
    UnsupportedBackend(String),

    /// Network or I/O error
    #[error("I/O error: {0}")]
    Io(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl BackendError {
    /// Create a Locked error from a LockInfo
    pub fn locked(lock: &LockInfo) -> Self {
        Self::Locked {
            lock_id: lock.id.clone(),
            who: lock.who.clone(),
            operation: lock.operation.clone(),
        }
    }

    /// Create an unsupported backend error
    pub fn unsupported_backend(backend_type: impl Into<String>) -> Self {
        Self::UnsupportedBackend(backend_type.into())
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}

impl From<ProvisionError> for BackendError {
    fn from(err: ProvisionError) -> Self {
        match err {
            ProvisionError::NotFound { kind, name } => Self::NotFound { kind, name },
            ProvisionError::Api(err) => Self::Api(err),
            ProvisionError::Timeout { what, elapsed } => {
                Self::Timeout(format!("waiting for {} after {:?}", what, elapsed))
            }
        }
    }
}

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Per-call options
#[derive(Debug, Clone, Default)]
pub struct InitOptions {
    /// Bound on the whole call; `None` waits as long as the API does
    pub deadline: Option<Duration>,
    /// How long-running creations are awaited
    pub poll: PollOptions,
}

/// Trait for remote state backend initializers
///
/// One implementation exists per backend kind. Callers persist the new
/// backend snapshot themselves after a successful `initialize`.
#[async_trait]
pub trait RemoteStateInitializer: Send + Sync {
    /// Decide whether the backend must be (re)initialized
    ///
    /// This only reads remote state; nothing is created.
    async fn needs_initialization(
        &self,
        remote_state: &RemoteState,
        existing: Option<&BackendSnapshot>,
        options: &InitOptions,
    ) -> BackendResult<bool>;

    /// Create whatever backing resources are missing
    ///
    /// Safe to call repeatedly; resources created before a failure are kept
    /// and reused on the next call.
    async fn initialize(&self, remote_state: &RemoteState, options: &InitOptions)
    -> BackendResult<()>;

    /// Configuration to hand to the infrastructure tool's backend block
    fn backend_init_args(&self, config: &ConfigMap) -> ConfigMap;
}

/// Run `work`, failing with `Timeout` once `deadline` elapses
pub(crate) async fn with_deadline<T>(
    deadline: Option<Duration>,
    what: &str,
    work: impl Future<Output = BackendResult<T>>,
) -> BackendResult<T> {
    match deadline {
        Some(limit) => tokio::time::timeout(limit, work).await.map_err(|_| {
            BackendError::Timeout(format!("{} did not finish within {:?}", what, limit))
        })?,
        None => work.await,
    }
}
