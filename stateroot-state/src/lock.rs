//! Account-level provisioning locks
//!
//! Provisioning for a storage account is serialised per account name. Within
//! a process this is a map of per-account async mutexes; across processes an
//! optional lock file per account carries a [`LockInfo`].

use std::collections::HashMap;
use std::future::Future;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::backend::{BackendError, BackendResult};

/// Default lock timeout in seconds (15 minutes)
pub const DEFAULT_LOCK_TIMEOUT_SECS: i64 = 900;

/// Information about a held account lock
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockInfo {
    /// Unique identifier for this lock
    pub id: String,
    /// Storage account the lock protects
    pub account: String,
    /// The operation being performed (e.g., "initialize")
    pub operation: String,
    /// Who acquired the lock (username@hostname)
    pub who: String,
    /// When the lock was created
    pub created: DateTime<Utc>,
    /// When the lock expires
    pub expires: DateTime<Utc>,
}

impl LockInfo {
    /// Create a new lock for an operation on `account`
    pub fn new(account: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::with_timeout(account, operation, DEFAULT_LOCK_TIMEOUT_SECS)
    }

    /// Create a new lock with a custom timeout
    pub fn with_timeout(
        account: impl Into<String>,
        operation: impl Into<String>,
        timeout_secs: i64,
    ) -> Self {
        let now = Utc::now();

        Self {
            id: uuid::Uuid::new_v4().to_string(),
            account: account.into(),
            operation: operation.into(),
            who: get_lock_owner(),
            created: now,
            expires: now + chrono::Duration::seconds(timeout_secs),
        }
    }

    /// Check if the lock has expired
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires
    }
}

/// Get the lock owner string (username@hostname)
fn get_lock_owner() -> String {
    let username = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string());

    let hostname = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string());

    format!("{}@{}", username, hostname)
}

/// Settings for cross-process lock files
#[derive(Debug, Clone)]
pub struct LockFileOptions {
    /// Directory holding one `<account>.lock` file per held lock
    pub dir: PathBuf,
    /// How long to wait for another process to finish
    pub wait_timeout: Duration,
    /// Delay between attempts while waiting
    pub retry_interval: Duration,
    /// Lifetime written into each lock; older locks are taken over
    pub lock_timeout_secs: i64,
}

impl LockFileOptions {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            wait_timeout: Duration::from_secs(DEFAULT_LOCK_TIMEOUT_SECS as u64),
            retry_interval: Duration::from_secs(1),
            lock_timeout_secs: DEFAULT_LOCK_TIMEOUT_SECS,
        }
    }

    fn path_for(&self, account: &str) -> PathBuf {
        let file_name: String = account
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        self.dir.join(format!("{}.lock", file_name))
    }
}

/// Keyed mutual exclusion for storage account provisioning
///
/// One registry is meant to live for the whole process; share it through an
/// `Arc` or use [`AccountLocks::global`]. Per-account entries are created on
/// first use and kept for the registry's lifetime.
#[derive(Default)]
pub struct AccountLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    lock_files: Option<LockFileOptions>,
}

static GLOBAL_LOCKS: OnceLock<Arc<AccountLocks>> = OnceLock::new();

impl AccountLocks {
    /// In-process locking only
    pub fn new() -> Self {
        Self::default()
    }

    /// Also exclude other processes through lock files
    pub fn with_lock_files(options: LockFileOptions) -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
            lock_files: Some(options),
        }
    }

    /// The process-wide registry, created on first use
    pub fn global() -> Arc<AccountLocks> {
        GLOBAL_LOCKS
            .get_or_init(|| Arc::new(AccountLocks::new()))
            .clone()
    }

    fn entry(&self, account_key: &str) -> Arc<tokio::sync::Mutex<()>> {
        // The map is only touched for lookups, a poisoned guard is still consistent
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks
            .entry(account_key.to_string())
            .or_default()
            .clone()
    }

    /// Run `work` while holding the lock for `account_key`
    ///
    /// The lock is released when `work` finishes, fails, panics or is
    /// dropped before completion.
    pub async fn with_account_lock<F, T>(
        &self,
        account_key: &str,
        operation: &str,
        work: F,
    ) -> BackendResult<T>
    where
        F: Future<Output = BackendResult<T>>,
    {
        let mutex = self.entry(account_key);
        let _guard = mutex.lock().await;
        log::debug!("Acquired provisioning lock for storage account {}", account_key);

        let _file = match &self.lock_files {
            Some(options) => Some(LockFile::acquire(options, account_key, operation).await?),
            None => None,
        };

        let result = work.await;
        log::debug!("Releasing provisioning lock for storage account {}", account_key);
        result
    }
}

/// A lock file owned by this process, removed on drop
struct LockFile {
    path: PathBuf,
    lock: LockInfo,
}

/// Raw content of a lock file found on disk
struct Observed {
    bytes: Vec<u8>,
    lock: Option<LockInfo>,
}

impl LockFile {
    async fn acquire(
        options: &LockFileOptions,
        account: &str,
        operation: &str,
    ) -> BackendResult<Self> {
        tokio::fs::create_dir_all(&options.dir)
            .await
            .map_err(|e| BackendError::Io(format!("Failed to create lock directory: {}", e)))?;

        let path = options.path_for(account);
        let started = Instant::now();

        loop {
            let lock = LockInfo::with_timeout(account, operation, options.lock_timeout_secs);
            if publish(&options.dir, &path, &lock).await? {
                return Ok(Self { path, lock });
            }

            // Released between our attempt and the read
            let Some(existing) = observe(&path).await? else {
                continue;
            };

            if is_stale(&path, &existing, options).await {
                take_over(&path, &existing).await?;
                continue;
            }

            if started.elapsed() >= options.wait_timeout {
                return Err(match existing.lock {
                    Some(existing) => BackendError::locked(&existing),
                    None => BackendError::Locked {
                        lock_id: "unknown".to_string(),
                        who: "unknown".to_string(),
                        operation: "unknown".to_string(),
                    },
                });
            }

            tokio::time::sleep(options.retry_interval).await;
        }
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        // Leave the file alone if another process took it over after expiry
        match read_lock(&self.path) {
            Some(current) if current.id == self.lock.id => {
                if let Err(e) = remove_lock(&self.path) {
                    log::warn!("{}", e);
                }
            }
            _ => log::warn!(
                "Lock file {} no longer holds lock {}",
                self.path.display(),
                self.lock.id
            ),
        }
    }
}

/// Write `lock` to a temporary file and move it into place unless `path` exists
///
/// Returns false when another lock already occupies `path`. Readers never see
/// a partially written lock.
async fn publish(dir: &Path, path: &Path, lock: &LockInfo) -> BackendResult<bool> {
    let content = serde_json::to_vec_pretty(lock)
        .map_err(|e| BackendError::Serialization(format!("Failed to serialize lock: {}", e)))?;
    let dir = dir.to_path_buf();
    let path = path.to_path_buf();

    tokio::task::spawn_blocking(move || -> std::io::Result<bool> {
        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(&content)?;
        match tmp.persist_noclobber(&path) {
            Ok(_) => Ok(true),
            Err(e) if e.error.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(e.error),
        }
    })
    .await
    .map_err(|e| BackendError::Io(format!("Lock file task failed: {}", e)))?
    .map_err(|e| BackendError::Io(format!("Failed to create lock file: {}", e)))
}

async fn observe(path: &Path) -> BackendResult<Option<Observed>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => {
            let lock = serde_json::from_slice(&bytes).ok();
            Ok(Some(Observed { bytes, lock }))
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(BackendError::Io(format!("Failed to read lock file: {}", e))),
    }
}

/// An expired lock, or an unreadable one older than the lock lifetime
async fn is_stale(path: &Path, existing: &Observed, options: &LockFileOptions) -> bool {
    if let Some(lock) = &existing.lock {
        return lock.is_expired();
    }

    let Ok(modified) = tokio::fs::metadata(path).await.and_then(|m| m.modified()) else {
        return false;
    };
    let age = modified.elapsed().unwrap_or(Duration::ZERO);
    age >= Duration::from_secs(options.lock_timeout_secs.max(0) as u64)
}

/// Remove the stale lock `existing`, leaving any newer lock in place
///
/// The file is renamed aside first so that only one process can claim it. If
/// what was moved is not the lock judged stale, it is linked back.
async fn take_over(path: &Path, existing: &Observed) -> BackendResult<()> {
    let aside = path.with_extension(format!("stale-{}", uuid::Uuid::new_v4()));
    match tokio::fs::rename(path, &aside).await {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(BackendError::Io(format!("Failed to move stale lock: {}", e))),
    }

    let moved = tokio::fs::read(&aside)
        .await
        .map_err(|e| BackendError::Io(format!("Failed to read stale lock: {}", e)))?;
    if moved == existing.bytes {
        match &existing.lock {
            Some(lock) => log::debug!("Taking over expired lock {} held by {}", lock.id, lock.who),
            None => log::debug!("Taking over unreadable lock file {}", path.display()),
        }
    } else if let Err(e) = tokio::fs::hard_link(&aside, path).await {
        log::warn!("Failed to restore lock file {}: {}", path.display(), e);
    }

    match tokio::fs::remove_file(&aside).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(BackendError::Io(format!("Failed to remove stale lock: {}", e))),
    }
}

/// Read a lock file; unreadable files yield `None`
fn read_lock(path: &Path) -> Option<LockInfo> {
    let content = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&content).ok()
}

fn remove_lock(path: &Path) -> BackendResult<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(BackendError::Io(format!("Failed to remove lock file: {}", e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    #[test]
    fn test_lock_info_new() {
        let lock = LockInfo::new("sa1", "initialize");
        assert_eq!(lock.account, "sa1");
        assert_eq!(lock.operation, "initialize");
        assert!(!lock.id.is_empty());
        assert!(lock.expires > lock.created);
        assert!(!lock.is_expired());
    }

    #[test]
    fn test_lock_info_expired() {
        let lock = LockInfo::with_timeout("sa1", "initialize", -1);
        assert!(lock.is_expired());
    }

    #[test]
    fn test_lock_owner_format() {
        let who = get_lock_owner();
        assert!(who.contains('@'));
    }

    #[test]
    fn test_lock_file_name_is_sanitised() {
        let options = LockFileOptions::new("/tmp/locks");
        assert_eq!(
            options.path_for("sa1/../x"),
            PathBuf::from("/tmp/locks/sa1____x.lock")
        );
    }

    async fn hold(locks: &AccountLocks, key: &str, active: &AtomicUsize, peak: &AtomicUsize) {
        locks
            .with_account_lock(key, "test", async {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                active.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_same_account_is_serialised() {
        let locks = AccountLocks::new();
        let active = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);

        tokio::join!(
            hold(&locks, "sa1", &active, &peak),
            hold(&locks, "sa1", &active, &peak),
            hold(&locks, "sa1", &active, &peak),
        );

        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_distinct_accounts_do_not_block() {
        let locks = AccountLocks::new();
        let active = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);

        tokio::join!(
            hold(&locks, "sa1", &active, &peak),
            hold(&locks, "sa2", &active, &peak),
        );

        assert_eq!(peak.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_lock_released_on_error() {
        let locks = AccountLocks::new();
        let result: BackendResult<()> = locks
            .with_account_lock("sa1", "test", async {
                Err(BackendError::configuration("boom"))
            })
            .await;
        assert!(result.is_err());

        let value = locks
            .with_account_lock("sa1", "test", async { Ok(42) })
            .await
            .unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn test_lock_released_when_dropped() {
        let locks = AccountLocks::new();
        let pending = locks.with_account_lock("sa1", "test", async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        });
        // Start the work, then abandon it while it holds the lock
        let abandoned = tokio::time::timeout(Duration::from_millis(10), pending).await;
        assert!(abandoned.is_err());

        let value = tokio::time::timeout(
            Duration::from_secs(1),
            locks.with_account_lock("sa1", "test", async { Ok(1) }),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(value, 1);
    }

    #[test]
    fn test_global_registry_is_shared() {
        assert!(Arc::ptr_eq(&AccountLocks::global(), &AccountLocks::global()));
    }

    #[tokio::test]
    async fn test_lock_file_created_and_removed() {
        let dir = tempdir().unwrap();
        let options = LockFileOptions::new(dir.path());
        let path = options.path_for("sa1");
        let locks = AccountLocks::with_lock_files(options);

        let seen = locks
            .with_account_lock("sa1", "initialize", async {
                Ok(read_lock(&path).map(|lock| lock.operation))
            })
            .await
            .unwrap();

        assert_eq!(seen.as_deref(), Some("initialize"));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_foreign_lock_file_times_out() {
        let dir = tempdir().unwrap();
        let mut options = LockFileOptions::new(dir.path());
        options.wait_timeout = Duration::from_millis(30);
        options.retry_interval = Duration::from_millis(5);
        let path = options.path_for("sa1");

        let foreign = LockInfo::new("sa1", "initialize");
        std::fs::write(&path, serde_json::to_string(&foreign).unwrap()).unwrap();

        let locks = AccountLocks::with_lock_files(options);
        let result = locks
            .with_account_lock("sa1", "initialize", async { Ok(()) })
            .await;

        match result {
            Err(BackendError::Locked { lock_id, .. }) => assert_eq!(lock_id, foreign.id),
            other => panic!("Expected Locked error, got {:?}", other),
        }
        // The foreign lock is untouched
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_expired_lock_file_is_taken_over() {
        let dir = tempdir().unwrap();
        let options = LockFileOptions::new(dir.path());
        let path = options.path_for("sa1");

        let stale = LockInfo::with_timeout("sa1", "initialize", -60);
        std::fs::write(&path, serde_json::to_string(&stale).unwrap()).unwrap();

        let locks = AccountLocks::with_lock_files(options);
        let holder = locks
            .with_account_lock("sa1", "initialize", async {
                Ok(read_lock(&path).map(|lock| lock.id))
            })
            .await
            .unwrap();

        assert!(holder.is_some());
        assert_ne!(holder.unwrap(), stale.id);
        assert!(!path.exists());
        // No temporary or set-aside files are left behind
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_empty_lock_file_is_reclaimed_after_lifetime() {
        let dir = tempdir().unwrap();
        let mut options = LockFileOptions::new(dir.path());
        options.wait_timeout = Duration::from_millis(50);
        options.retry_interval = Duration::from_millis(5);
        options.lock_timeout_secs = 0;
        let path = options.path_for("sa1");
        // Left behind by a process that died before writing its lock
        std::fs::write(&path, b"").unwrap();

        let locks = AccountLocks::with_lock_files(options);
        let operation = locks
            .with_account_lock("sa1", "initialize", async {
                Ok(read_lock(&path).map(|lock| lock.operation))
            })
            .await
            .unwrap();

        assert_eq!(operation.as_deref(), Some("initialize"));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_recent_unreadable_lock_file_is_respected() {
        let dir = tempdir().unwrap();
        let mut options = LockFileOptions::new(dir.path());
        options.wait_timeout = Duration::from_millis(30);
        options.retry_interval = Duration::from_millis(5);
        let path = options.path_for("sa1");
        std::fs::write(&path, b"").unwrap();

        let locks = AccountLocks::with_lock_files(options);
        let result = locks
            .with_account_lock("sa1", "initialize", async { Ok(()) })
            .await;

        assert!(matches!(result, Err(BackendError::Locked { .. })));
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_take_over_keeps_replacement_lock() {
        let dir = tempdir().unwrap();
        let options = LockFileOptions::new(dir.path());
        let path = options.path_for("sa1");

        // What this process saw and judged stale
        let stale = LockInfo::with_timeout("sa1", "initialize", -60);
        let seen = Observed {
            bytes: serde_json::to_vec(&stale).unwrap(),
            lock: Some(stale),
        };
        // Another process already replaced it with a fresh lock
        let fresh = LockInfo::new("sa1", "initialize");
        std::fs::write(&path, serde_json::to_vec(&fresh).unwrap()).unwrap();

        take_over(&path, &seen).await.unwrap();

        assert_eq!(read_lock(&path).map(|lock| lock.id), Some(fresh.id));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_publish_does_not_overwrite() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sa1.lock");
        let first = LockInfo::new("sa1", "initialize");
        let second = LockInfo::new("sa1", "initialize");

        assert!(publish(dir.path(), &path, &first).await.unwrap());
        assert!(!publish(dir.path(), &path, &second).await.unwrap());
        assert_eq!(read_lock(&path).map(|lock| lock.id), Some(first.id));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
