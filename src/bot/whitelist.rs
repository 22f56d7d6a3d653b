//! Broadcast recipients, persisted as a JSON array of chat ids.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use tracing::info;

#[derive(Debug)]
pub enum WhitelistError {
    ReadFile { path: PathBuf, source: std::io::Error },
    ParseJson { path: PathBuf, source: serde_json::Error },
    WriteFile { path: PathBuf, source: std::io::Error },
}

impl fmt::Display for WhitelistError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadFile { path, source } => {
                write!(f, "failed to read whitelist '{}': {}", path.display(), source)
            }
            Self::ParseJson { path, source } => {
                write!(f, "failed to parse whitelist '{}': {}", path.display(), source)
            }
            Self::WriteFile { path, source } => {
                write!(f, "failed to write whitelist '{}': {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for WhitelistError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ReadFile { source, .. } | Self::WriteFile { source, .. } => Some(source),
            Self::ParseJson { source, .. } => Some(source),
        }
    }
}

/// Ordered, deduplicated set of recipient chat ids.
pub trait WhitelistStore: Send + Sync {
    fn load(&self) -> Result<Vec<i64>, WhitelistError>;
    /// No-op when `id` is already present.
    fn add(&self, id: i64) -> Result<(), WhitelistError>;
    /// No-op when `id` is absent. Remaining ids keep their order.
    fn remove(&self, id: i64) -> Result<(), WhitelistError>;
}

pub struct FileWhitelist {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileWhitelist {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    fn read(&self) -> Result<Vec<i64>, WhitelistError> {
        let data = match std::fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(WhitelistError::ReadFile { path: self.path.clone(), source: e }),
        };
        if data.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&data)
            .map_err(|e| WhitelistError::ParseJson { path: self.path.clone(), source: e })
    }

    fn write(&self, ids: &[i64]) -> Result<(), WhitelistError> {
        // Serializing a slice of integers cannot fail.
        let data = serde_json::to_string(ids).unwrap_or_else(|_| "[]".to_string());
        std::fs::write(&self.path, data)
            .map_err(|e| WhitelistError::WriteFile { path: self.path.clone(), source: e })
    }
}

impl WhitelistStore for FileWhitelist {
    fn load(&self) -> Result<Vec<i64>, WhitelistError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.read()
    }

    fn add(&self, id: i64) -> Result<(), WhitelistError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut ids = self.read()?;
        if ids.contains(&id) {
            return Ok(());
        }
        ids.push(id);
        self.write(&ids)?;
        info!("➕ Whitelisted chat {id}");
        Ok(())
    }

    fn remove(&self, id: i64) -> Result<(), WhitelistError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut ids = self.read()?;
        let before = ids.len();
        ids.retain(|&v| v != id);
        if ids.len() == before {
            return Ok(());
        }
        self.write(&ids)?;
        info!("➖ Removed chat {id} from whitelist");
        Ok(())
    }
}

/// One id per line.
pub fn format_whitelist(ids: &[i64]) -> String {
    ids.iter().map(i64::to_string).collect::<Vec<_>>().join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, FileWhitelist) {
        let dir = TempDir::new().unwrap();
        let store = FileWhitelist::new(dir.path().join("whitelist.json"));
        (dir, store)
    }

    #[test]
    fn test_missing_file_is_empty() {
        let (_dir, store) = store();
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_add_is_idempotent_and_ordered() {
        let (_dir, store) = store();
        store.add(3).unwrap();
        store.add(-100).unwrap();
        store.add(3).unwrap();
        store.add(7).unwrap();
        assert_eq!(store.load().unwrap(), vec![3, -100, 7]);
    }

    #[test]
    fn test_remove_keeps_order_and_ignores_absent() {
        let (_dir, store) = store();
        for id in [1, 2, 3] {
            store.add(id).unwrap();
        }
        store.remove(2).unwrap();
        store.remove(42).unwrap();
        assert_eq!(store.load().unwrap(), vec![1, 3]);
    }

    #[test]
    fn test_persists_as_json_array() {
        let (dir, store) = store();
        store.add(5).unwrap();
        store.add(6).unwrap();
        let raw = std::fs::read_to_string(dir.path().join("whitelist.json")).unwrap();
        assert_eq!(raw, "[5,6]");
        assert_eq!(FileWhitelist::new(dir.path().join("whitelist.json")).load().unwrap(), vec![5, 6]);
    }

    #[test]
    fn test_corrupt_file_is_error() {
        let (dir, store) = store();
        std::fs::write(dir.path().join("whitelist.json"), "{nope").unwrap();
        assert!(matches!(store.load(), Err(WhitelistError::ParseJson { .. })));
        assert!(store.add(1).is_err());
    }

    #[test]
    fn test_empty_file_is_empty_list() {
        let (dir, store) = store();
        std::fs::write(dir.path().join("whitelist.json"), "").unwrap();
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_format_whitelist() {
        assert_eq!(format_whitelist(&[1, -2, 3]), "1\n-2\n3");
        assert_eq!(format_whitelist(&[]), "");
    }
}
