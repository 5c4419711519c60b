//! Stateroot Core
//!
//! Backend configuration model shared by every remote-state backend kind:
//! untyped configuration maps, typed decoding, previously recorded backend
//! snapshots and drift detection between the two.

pub mod config;
pub mod differ;
pub mod snapshot;

pub use config::{ConfigMap, DecodeError, RemoteState, decode, strip_keys, strip_nulls};
pub use differ::{ConfigDiff, configs_equal, diff_config};
pub use snapshot::{BackendSnapshot, SnapshotError};
