//! Durable keyed storage for session records.
//!
//! One pretty-printed JSON file per session id, plus one lock file per
//! session for the exclusive-execution discipline around step runs. Expired
//! records are treated as nonexistent and purged lazily on read.

use crate::errors::StoreError;
use crate::session::{Session, SessionUpdate};
use chrono::Utc;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::debug;

/// File-backed session store with sliding expiry and per-session locking.
pub struct SessionStore {
    dir: PathBuf,
    ttl_secs: u64,
}

/// Holds the OS-level exclusive lock on a session until dropped.
///
/// Dropping the guard releases the lock on every exit path, including
/// panics and early returns inside the locked closure.
struct LockGuard {
    file: File,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

impl SessionStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>, ttl_secs: u64) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| StoreError::WriteFailed {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir, ttl_secs })
    }

    /// The sliding-expiry window applied on every update.
    pub fn ttl_secs(&self) -> u64 {
        self.ttl_secs
    }

    fn record_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    fn lock_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.lock"))
    }

    /// Session ids are path components; anything else is treated as missing.
    fn validate_id(id: &str) -> Result<(), StoreError> {
        let ok = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if ok {
            Ok(())
        } else {
            Err(StoreError::NotFound { id: id.to_string() })
        }
    }

    /// Persist a new session record.
    pub fn create(&self, session: &Session) -> Result<(), StoreError> {
        Self::validate_id(&session.id)?;
        self.save(session)
    }

    /// Load a session. An expired record behaves identically to a missing
    /// one and is purged eagerly.
    pub fn get(&self, id: &str) -> Result<Session, StoreError> {
        Self::validate_id(id)?;
        let path = self.record_path(id);
        if !path.exists() {
            return Err(StoreError::NotFound { id: id.to_string() });
        }

        let content = fs::read_to_string(&path).map_err(|source| StoreError::ReadFailed {
            path: path.clone(),
            source,
        })?;
        let session: Session =
            serde_json::from_str(&content).map_err(|source| StoreError::Corrupt {
                path: path.clone(),
                source,
            })?;

        if session.is_expired_at(Utc::now()) {
            debug!(id, "reaping expired session");
            let _ = fs::remove_file(&path);
            let _ = fs::remove_file(self.lock_path(id));
            return Err(StoreError::NotFound { id: id.to_string() });
        }

        Ok(session)
    }

    /// Apply a partial update: scalars overwrite, stats merge by addition,
    /// and the expiry window is refreshed. Returns the updated session.
    pub fn update(&self, id: &str, update: SessionUpdate) -> Result<Session, StoreError> {
        let mut session = self.get(id)?;
        update.apply(&mut session);
        session.refresh_expiry(Utc::now(), self.ttl_secs);
        self.save(&session)?;
        Ok(session)
    }

    /// Remove a session record. Returns whether a live record existed.
    pub fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let existed = self.get(id).is_ok();
        let path = self.record_path(id);
        if path.exists() {
            fs::remove_file(&path).map_err(|source| StoreError::WriteFailed {
                path: path.clone(),
                source,
            })?;
        }
        let _ = fs::remove_file(self.lock_path(id));
        Ok(existed)
    }

    /// Run `f` while holding the exclusive per-session lock.
    ///
    /// The acquire blocks with no timeout; at most one closure runs per
    /// session id at a time, across threads and processes. An acquisition
    /// failure at the OS level maps to `LockUnavailable`.
    pub fn with_lock<T>(&self, id: &str, f: impl FnOnce() -> T) -> Result<T, StoreError> {
        Self::validate_id(id)?;
        let path = self.lock_path(id);
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|source| StoreError::LockUnavailable {
                id: id.to_string(),
                source,
            })?;
        file.lock_exclusive()
            .map_err(|source| StoreError::LockUnavailable {
                id: id.to_string(),
                source,
            })?;
        let _guard = LockGuard { file };
        Ok(f())
    }

    /// Ids of all records currently on disk, including expired ones.
    pub fn list_ids(&self) -> Result<Vec<String>, StoreError> {
        let entries = fs::read_dir(&self.dir).map_err(|source| StoreError::ReadFailed {
            path: self.dir.clone(),
            source,
        })?;
        let mut ids: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().into_owned();
                name.strip_suffix(".json").map(|s| s.to_string())
            })
            .collect();
        ids.sort();
        Ok(ids)
    }

    /// Purge every expired record. Returns how many were removed.
    pub fn reap_expired(&self) -> Result<usize, StoreError> {
        let mut reaped = 0;
        for id in self.list_ids()? {
            match self.get(&id) {
                Ok(_) => {}
                Err(StoreError::NotFound { .. }) => reaped += 1,
                Err(err) => return Err(err),
            }
        }
        Ok(reaped)
    }

    fn save(&self, session: &Session) -> Result<(), StoreError> {
        let path = self.record_path(&session.id);
        let json = serde_json::to_string_pretty(session).map_err(|source| StoreError::Corrupt {
            path: path.clone(),
            source,
        })?;
        write_atomic(&path, json.as_bytes()).map_err(|source| StoreError::WriteFailed {
            path: path.clone(),
            source,
        })
    }
}

/// Write via a temp file and rename so readers never observe a partial record.
fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)
}
