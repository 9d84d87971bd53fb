use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::{
    ACCESS_TOKEN_KEY, CredentialError, REFRESH_TOKEN_KEY, TokenPair, TokenStore, non_empty,
};

/// Token pair persisted as a small JSON object on disk.
///
/// The file holds the same two fixed keys the browser store uses. Every write
/// goes to a sibling temp file and is renamed into place, so readers never see
/// a pair with one half updated.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, String>, CredentialError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(CredentialError::Io(format!("read {:?}: {e}", self.path))),
        };
        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&raw).map_err(|e| CredentialError::Corrupt(e.to_string()))
    }

    fn save(&self, values: &BTreeMap<String, String>) -> Result<(), CredentialError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| CredentialError::Io(format!("create {parent:?}: {e}")))?;
        }
        let raw = serde_json::to_string_pretty(values)
            .map_err(|e| CredentialError::Io(e.to_string()))?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, raw).map_err(|e| CredentialError::Io(format!("write {tmp:?}: {e}")))?;
        std::fs::rename(&tmp, &self.path)
            .map_err(|e| CredentialError::Io(format!("rename {tmp:?}: {e}")))?;
        debug!(path = ?self.path, "token file written");
        Ok(())
    }
}

impl TokenStore for FileTokenStore {
    fn access_token(&self) -> Result<Option<String>, CredentialError> {
        Ok(non_empty(self.load()?.remove(ACCESS_TOKEN_KEY)))
    }

    fn refresh_token(&self) -> Result<Option<String>, CredentialError> {
        Ok(non_empty(self.load()?.remove(REFRESH_TOKEN_KEY)))
    }

    fn store_pair(&mut self, pair: &TokenPair) -> Result<(), CredentialError> {
        let mut values = BTreeMap::new();
        values.insert(ACCESS_TOKEN_KEY.to_string(), pair.access.clone());
        values.insert(REFRESH_TOKEN_KEY.to_string(), pair.refresh.clone());
        self.save(&values)
    }

    fn store_access(&mut self, access: &str) -> Result<(), CredentialError> {
        let mut values = self.load()?;
        values.insert(ACCESS_TOKEN_KEY.to_string(), access.to_string());
        self.save(&values)
    }

    fn clear(&mut self) -> Result<(), CredentialError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CredentialError::Io(format!("remove {:?}: {e}", self.path))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn missing_file_means_no_tokens() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("tokens.json"));
        assert_eq!(store.pair().unwrap(), None);
    }

    #[test]
    fn pair_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("tokens.json");
        let mut store = FileTokenStore::new(&path);
        store.store_pair(&TokenPair::new("acc", "ref")).unwrap();

        let reopened = FileTokenStore::new(&path);
        assert_eq!(reopened.pair().unwrap(), Some(TokenPair::new("acc", "ref")));

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"access_token\""));
        assert!(raw.contains("\"refresh_token\""));
    }

    #[test]
    fn store_access_preserves_refresh() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileTokenStore::new(dir.path().join("tokens.json"));
        store.store_pair(&TokenPair::new("a1", "r1")).unwrap();
        store.store_access("a2").unwrap();
        assert_eq!(store.pair().unwrap(), Some(TokenPair::new("a2", "r1")));
    }

    #[test]
    fn clear_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileTokenStore::new(dir.path().join("tokens.json"));
        store.store_pair(&TokenPair::new("a1", "r1")).unwrap();
        store.clear().unwrap();
        store.clear().unwrap();
        assert_eq!(store.access_token().unwrap(), None);
    }

    #[test]
    fn garbage_file_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        std::fs::write(&path, "not json").unwrap();
        let store = FileTokenStore::new(&path);
        assert!(matches!(
            store.access_token(),
            Err(CredentialError::Corrupt(_))
        ));
    }
}
