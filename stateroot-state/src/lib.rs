//! Stateroot State Backends
//!
//! Decides whether a remote state backend has to be (re)initialized and
//! provisions the cloud resources it stores state in.
//!
//! # Overview
//!
//! - **RemoteStateInitializer**: per backend kind, checks and initializes
//! - **AzureRmInitializer**: the `azurerm` backend (resource group, storage
//!   account and blob container)
//! - **AccountLocks**: serialises provisioning per storage account
//!
//! # Example
//!
//! ```ignore
//! use stateroot_state::{AccountLocks, InitOptions, initializer_for};
//!
//! let connector = Arc::new(ArmConnector::from_env());
//! let initializer = initializer_for(&remote_state.backend, connector, AccountLocks::global())?;
//!
//! if initializer.needs_initialization(&remote_state, snapshot.as_ref(), &options).await? {
//!     initializer.initialize(&remote_state, &options).await?;
//! }
//!
//! let args = initializer.backend_init_args(&remote_state.config);
//! ```

pub mod backend;
pub mod backends;
pub mod lock;

// Re-export main types for convenience
pub use backend::{BackendError, BackendResult, InitOptions, RemoteStateInitializer};
pub use backends::{AzureRmInitializer, InitDecision, InitReason, initializer_for};
pub use lock::{AccountLocks, LockFileOptions, LockInfo};
