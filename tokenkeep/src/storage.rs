use dashmap::DashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::AuthError;

/// Namespaced key/value persistence used by the credential store.
pub trait CredentialStorage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, AuthError>;
    fn set(&self, key: &str, value: &str) -> Result<(), AuthError>;
    fn remove(&self, key: &str) -> Result<(), AuthError>;
}

/// One JSON file per key inside a directory.
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, AuthError> {
        let dir = dir.into();

        if !dir.exists() {
            fs::create_dir_all(&dir).map_err(|e| {
                AuthError::TokenStorage(format!("Failed to create storage directory: {}", e))
            })?;
        }

        Ok(Self { dir })
    }

    /// Storage under the platform data directory, e.g. `~/.local/share/tokenkeep`.
    pub fn in_data_dir() -> Result<Self, AuthError> {
        let dir = dirs::data_dir()
            .ok_or_else(|| AuthError::Configuration("Could not find data directory".to_string()))?
            .join("tokenkeep");
        Self::new(dir)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, AuthError> {
        if key.is_empty() || key.contains(['/', '\\']) || key.starts_with('.') {
            return Err(AuthError::TokenStorage(format!("Invalid storage key: {:?}", key)));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

impl CredentialStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, AuthError> {
        let path = self.path_for(key)?;
        if !path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(&path)
            .map_err(|e| AuthError::TokenStorage(format!("Failed to read {}: {}", key, e)))?;
        Ok(Some(contents))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), AuthError> {
        let path = self.path_for(key)?;
        // Keys never start with '.', so this cannot collide with another key's file
        let staging = self.dir.join(format!(".{}.json.tmp", key));

        write_private(&staging, value)
            .and_then(|()| fs::rename(&staging, &path))
            .map_err(|e| {
                let _ = fs::remove_file(&staging);
                AuthError::TokenStorage(format!("Failed to write {}: {}", key, e))
            })
    }

    fn remove(&self, key: &str) -> Result<(), AuthError> {
        let path = self.path_for(key)?;
        if path.exists() {
            fs::remove_file(&path)
                .map_err(|e| AuthError::TokenStorage(format!("Failed to delete {}: {}", key, e)))?;
        }
        Ok(())
    }
}

/// Write `value` to a fresh file that only the owner can read.
fn write_private(path: &Path, value: &str) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => return Err(e),
        _ => {}
    }

    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    file.write_all(value.as_bytes())?;
    file.sync_all()
}

/// Process-local storage; nothing survives a restart.
#[derive(Default)]
pub struct MemoryStorage {
    entries: DashMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, AuthError> {
        Ok(self.entries.get(key).map(|v| v.clone()))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), AuthError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), AuthError> {
        self.entries.remove(key);
        Ok(())
    }
}
