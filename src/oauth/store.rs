use keyring::Entry;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::oauth::credential::{Credential, UserKey};

pub const KEYRING_SERVICE_NAME: &str = "gplus-credentials";
const STORE_SUBDIR: &str = ".store/plus";

/// Durable cache of credentials keyed by user.
pub trait CredentialStore: Send + Sync {
    /// Returns `None` if nothing is stored for the key or the entry cannot
    /// be read back.
    fn load(&self, key: &UserKey) -> Option<Credential>;

    /// Overwrites any previous entry for the key.
    fn save(&self, key: &UserKey, credential: &Credential) -> Result<(), StoreError>;

    /// Returns `false` when there was nothing to delete.
    fn delete(&self, key: &UserKey) -> Result<bool, StoreError>;
}

/// One JSON file per user key under a per-application directory.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    dir: PathBuf,
}

impl FileCredentialStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `~/.store/plus`, or `None` if the home directory cannot be found.
    pub fn default_dir() -> Option<PathBuf> {
        directories::BaseDirs::new().map(|dirs| dirs.home_dir().join(STORE_SUBDIR))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &UserKey) -> PathBuf {
        let file_stem: String =
            url::form_urlencoded::byte_serialize(key.as_str().as_bytes()).collect();
        self.dir.join(format!("{}.json", file_stem))
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self, key: &UserKey) -> Option<Credential> {
        let path = self.entry_path(key);
        let data = match std::fs::read_to_string(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read stored credential");
                return None;
            }
        };
        match serde_json::from_str(&data) {
            Ok(credential) => Some(credential),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring corrupt stored credential");
                None
            }
        }
    }

    fn save(&self, key: &UserKey, credential: &Credential) -> Result<(), StoreError> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.entry_path(key);
        let data = serde_json::to_vec_pretty(credential)?;

        // Write beside the target and rename so readers never see a partial file.
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(&data)?;
        tmp.as_file().sync_all()?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(tmp.path(), std::fs::Permissions::from_mode(0o600))?;
        }

        tmp.persist(&path).map_err(|e| StoreError::Io(e.error))?;
        debug!(user = %key, path = %path.display(), "saved credential");
        Ok(())
    }

    fn delete(&self, key: &UserKey) -> Result<bool, StoreError> {
        match std::fs::remove_file(self.entry_path(key)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

// Keyring operations sit behind a trait so they can be mocked
#[cfg_attr(test, mockall::automock)]
pub trait KeyringEntry: Send + Sync {
    fn get_password(&self) -> Result<String, keyring::Error>;
    fn set_password(&self, password: &str) -> Result<(), keyring::Error>;
    fn delete_password(&self) -> Result<(), keyring::Error>;
}

impl KeyringEntry for Entry {
    fn get_password(&self) -> Result<String, keyring::Error> {
        Entry::get_password(self)
    }
    fn set_password(&self, password: &str) -> Result<(), keyring::Error> {
        Entry::set_password(self, password)
    }
    fn delete_password(&self) -> Result<(), keyring::Error> {
        Entry::delete_password(self)
    }
}

type EntryFactory =
    dyn Fn(&UserKey) -> Result<Box<dyn KeyringEntry>, keyring::Error> + Send + Sync;

/// Stores each user's credential JSON as a system keyring password.
pub struct KeyringCredentialStore {
    open_entry: Box<EntryFactory>,
}

impl KeyringCredentialStore {
    pub fn new() -> Self {
        Self::with_entries(|key| {
            let entry = Entry::new(KEYRING_SERVICE_NAME, key.as_str())?;
            Ok(Box::new(entry) as Box<dyn KeyringEntry>)
        })
    }

    /// Uses `open_entry` to resolve the keyring entry for a user key.
    pub fn with_entries<F>(open_entry: F) -> Self
    where
        F: Fn(&UserKey) -> Result<Box<dyn KeyringEntry>, keyring::Error> + Send + Sync + 'static,
    {
        Self {
            open_entry: Box::new(open_entry),
        }
    }
}

impl Default for KeyringCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStore for KeyringCredentialStore {
    fn load(&self, key: &UserKey) -> Option<Credential> {
        let entry = match (self.open_entry)(key) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(user = %key, error = %e, "failed to open keyring entry");
                return None;
            }
        };
        let json = match entry.get_password() {
            Ok(json) => json,
            Err(keyring::Error::NoEntry) => return None,
            Err(e) => {
                warn!(user = %key, error = %e, "failed to read keyring entry");
                return None;
            }
        };
        serde_json::from_str(&json)
            .map_err(|e| warn!(user = %key, error = %e, "ignoring corrupt keyring credential"))
            .ok()
    }

    fn save(&self, key: &UserKey, credential: &Credential) -> Result<(), StoreError> {
        let json = serde_json::to_string(credential)?;
        (self.open_entry)(key)?.set_password(&json)?;
        debug!(user = %key, "saved credential to keyring");
        Ok(())
    }

    fn delete(&self, key: &UserKey) -> Result<bool, StoreError> {
        match (self.open_entry)(key)?.delete_password() {
            Ok(()) => Ok(true),
            Err(keyring::Error::NoEntry) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
