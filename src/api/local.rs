//! Purpose: Device-local key-value state: the logged-in session and the deletion ledger.
//! Exports: `LocalStore`, `Session`, `DeletionCount`, `DeletionLedger`, `default_state_dir`.
//! Role: Remembers who is logged in and how often products were deleted between runs.
//! Invariants: Each key is one JSON file under the state directory, replaced atomically.
//! Invariants: Absent or unparsable values read as `None` (logged out / empty ledger).
//! Invariants: Ledger entries are keyed by product name, not id.
#![allow(clippy::result_large_err)]

use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};

use super::store::ApiResult;
use crate::core::error::{Error, ErrorKind};
use crate::core::product::{Actor, Warehouseman};

pub const SESSION_KEY: &str = "warehouseman";
pub const LEDGER_KEY: &str = "deletion_counts";

pub fn default_state_dir() -> PathBuf {
    let home = std::env::var_os("HOME").unwrap_or_default();
    PathBuf::from(home).join(".stockroom")
}

/// Logged-in identity. The secret code is not persisted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub warehouse_id: u64,
    pub logged_in_at: String,
}

impl Session {
    pub fn from_user(user: &Warehouseman, logged_in_at: impl Into<String>) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            city: user.city.clone(),
            warehouse_id: user.warehouse_id,
            logged_in_at: logged_in_at.into(),
        }
    }

    pub fn actor(&self) -> Actor {
        Actor::new(self.id)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletionCount {
    pub name: String,
    pub count: u64,
    pub last_deleted_at: String,
}

pub type DeletionLedger = BTreeMap<String, DeletionCount>;

#[derive(Clone, Debug)]
pub struct LocalStore {
    dir: PathBuf,
}

impl LocalStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> ApiResult<Option<T>> {
        let path = self.key_path(key)?;
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == IoErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(Error::new(ErrorKind::Internal)
                    .with_message(format!("failed to read {}", path.display()))
                    .with_source(err));
            }
        };
        match serde_json::from_str(&text) {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                tracing::warn!(key, error = %err, "ignoring unparsable local value");
                Ok(None)
            }
        }
    }

    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> ApiResult<()> {
        let path = self.key_path(key)?;
        fs::create_dir_all(&self.dir).map_err(|err| io_error("failed to create state dir", &self.dir, err))?;
        let json = serde_json::to_vec_pretty(value).map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("failed to encode local value")
                .with_source(err)
        })?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|err| io_error("failed to write", &tmp, err))?;
        fs::rename(&tmp, &path).map_err(|err| io_error("failed to replace", &path, err))
    }

    pub fn remove(&self, key: &str) -> ApiResult<()> {
        let path = self.key_path(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == IoErrorKind::NotFound => Ok(()),
            Err(err) => Err(io_error("failed to remove", &path, err)),
        }
    }

    pub fn session(&self) -> ApiResult<Option<Session>> {
        self.get(SESSION_KEY)
    }

    pub fn save_session(&self, session: &Session) -> ApiResult<()> {
        self.set(SESSION_KEY, session)
    }

    pub fn clear_session(&self) -> ApiResult<()> {
        self.remove(SESSION_KEY)
    }

    /// Session actor, or the fallback actor when nobody is logged in.
    pub fn actor(&self) -> ApiResult<Actor> {
        Ok(self
            .session()?
            .map(|session| session.actor())
            .unwrap_or_else(Actor::fallback))
    }

    pub fn ledger(&self) -> ApiResult<DeletionLedger> {
        Ok(self.get(LEDGER_KEY)?.unwrap_or_default())
    }

    /// Bumps the deletion count for `name` under an exclusive lock.
    pub fn record_deletion(&self, name: &str, at: &str) -> ApiResult<DeletionCount> {
        let _guard = self.lock_ledger()?;
        let mut ledger = self.ledger()?;
        let entry = ledger
            .entry(name.to_string())
            .or_insert_with(|| DeletionCount {
                name: name.to_string(),
                count: 0,
                last_deleted_at: String::new(),
            });
        entry.count += 1;
        entry.last_deleted_at = at.to_string();
        let updated = entry.clone();
        self.set(LEDGER_KEY, &ledger)?;
        Ok(updated)
    }

    fn lock_ledger(&self) -> ApiResult<LedgerLock> {
        fs::create_dir_all(&self.dir).map_err(|err| io_error("failed to create state dir", &self.dir, err))?;
        let path = self.dir.join(format!("{LEDGER_KEY}.lock"));
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(|err| io_error("failed to open lock", &path, err))?;
        file.lock_exclusive()
            .map_err(|err| io_error("failed to lock", &path, err))?;
        Ok(LedgerLock { file })
    }

    fn key_path(&self, key: &str) -> ApiResult<PathBuf> {
        if key.is_empty() || key.contains('/') || key.contains('\\') {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("local keys must be non-empty and must not contain path separators"));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

struct LedgerLock {
    file: File,
}

impl Drop for LedgerLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

fn io_error(action: &str, path: &Path, err: std::io::Error) -> Error {
    let kind = match err.kind() {
        IoErrorKind::PermissionDenied => ErrorKind::Permission,
        _ => ErrorKind::Internal,
    };
    Error::new(kind)
        .with_message(format!("{action} {}", path.display()))
        .with_source(err)
}

#[cfg(test)]
mod tests {
    use super::{LocalStore, SESSION_KEY, Session};
    use crate::core::error::ErrorKind;
    use crate::core::product::{Actor, Warehouseman};

    fn user() -> Warehouseman {
        Warehouseman {
            id: 4,
            name: "Amina".to_string(),
            dob: "1990-04-01".to_string(),
            city: "Casablanca".to_string(),
            secret_key: "SK-4".to_string(),
            warehouse_id: 2,
        }
    }

    #[test]
    fn missing_session_is_logged_out_with_fallback_actor() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = LocalStore::new(temp.path().join("state"));
        assert!(store.session().expect("read").is_none());
        assert_eq!(store.actor().expect("actor"), Actor::fallback());
    }

    #[test]
    fn session_round_trip_omits_secret() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = LocalStore::new(temp.path());
        let session = Session::from_user(&user(), "2025-05-05T10:00:00Z");
        store.save_session(&session).expect("save");
        assert_eq!(store.session().expect("read"), Some(session));
        assert_eq!(store.actor().expect("actor"), Actor::new(4));

        let raw = std::fs::read_to_string(temp.path().join("warehouseman.json")).expect("raw");
        assert!(!raw.contains("SK-4"));

        store.clear_session().expect("clear");
        store.clear_session().expect("clear twice");
        assert!(store.session().expect("read").is_none());
    }

    #[test]
    fn unparsable_session_reads_as_logged_out() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = LocalStore::new(temp.path());
        std::fs::write(temp.path().join(format!("{SESSION_KEY}.json")), "{not json").expect("write");
        assert!(store.session().expect("read").is_none());
    }

    #[test]
    fn ledger_counts_by_name() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = LocalStore::new(temp.path());
        store.record_deletion("Hammer", "2025-01-01T00:00:00Z").expect("record");
        let second = store.record_deletion("Hammer", "2025-01-02T00:00:00Z").expect("record");
        store.record_deletion("Saw", "2025-01-03T00:00:00Z").expect("record");
        assert_eq!(second.count, 2);
        assert_eq!(second.last_deleted_at, "2025-01-02T00:00:00Z");

        let ledger = store.ledger().expect("ledger");
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger["Saw"].count, 1);
    }

    #[test]
    fn keys_with_separators_are_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = LocalStore::new(temp.path());
        let err = store.remove("../etc").expect_err("rejected");
        assert_eq!(err.kind(), ErrorKind::Usage);
    }
}
