use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

mod file;
pub mod jwt;

pub use file::FileTokenStore;

/// Storage key for the short-lived access token.
pub const ACCESS_TOKEN_KEY: &str = "access_token";
/// Storage key for the long-lived refresh token.
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

impl TokenPair {
    pub fn new(access: impl Into<String>, refresh: impl Into<String>) -> Self {
        Self {
            access: access.into(),
            refresh: refresh.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    NotFound,
    StorageUnavailable,
    Corrupt(String),
    Io(String),
}

impl std::fmt::Display for CredentialError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CredentialError::NotFound => write!(f, "credential not found"),
            CredentialError::StorageUnavailable => write!(f, "token storage unavailable"),
            CredentialError::Corrupt(msg) => write!(f, "token storage corrupt: {msg}"),
            CredentialError::Io(msg) => write!(f, "token storage error: {msg}"),
        }
    }
}

impl std::error::Error for CredentialError {}

/// Persistent home of the access/refresh pair.
///
/// Writers never leave a half-updated pair behind: `store_pair` sets both keys,
/// `store_access` replaces the access token and keeps the refresh token.
pub trait TokenStore: Send {
    fn access_token(&self) -> Result<Option<String>, CredentialError>;
    fn refresh_token(&self) -> Result<Option<String>, CredentialError>;
    fn store_pair(&mut self, pair: &TokenPair) -> Result<(), CredentialError>;
    fn store_access(&mut self, access: &str) -> Result<(), CredentialError>;
    fn clear(&mut self) -> Result<(), CredentialError>;

    fn pair(&self) -> Result<Option<TokenPair>, CredentialError> {
        match (self.access_token()?, self.refresh_token()?) {
            (Some(access), Some(refresh)) => Ok(Some(TokenPair { access, refresh })),
            _ => Ok(None),
        }
    }
}

/// Treat blank strings as missing; storage backends hand these back after partial clears.
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[derive(Debug, Default)]
pub struct InMemoryTokenStore {
    values: BTreeMap<&'static str, String>,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pair(pair: &TokenPair) -> Self {
        let mut store = Self::new();
        store.values.insert(ACCESS_TOKEN_KEY, pair.access.clone());
        store.values.insert(REFRESH_TOKEN_KEY, pair.refresh.clone());
        store
    }
}

impl TokenStore for InMemoryTokenStore {
    fn access_token(&self) -> Result<Option<String>, CredentialError> {
        Ok(non_empty(self.values.get(ACCESS_TOKEN_KEY).cloned()))
    }

    fn refresh_token(&self) -> Result<Option<String>, CredentialError> {
        Ok(non_empty(self.values.get(REFRESH_TOKEN_KEY).cloned()))
    }

    fn store_pair(&mut self, pair: &TokenPair) -> Result<(), CredentialError> {
        self.values.insert(ACCESS_TOKEN_KEY, pair.access.clone());
        self.values.insert(REFRESH_TOKEN_KEY, pair.refresh.clone());
        Ok(())
    }

    fn store_access(&mut self, access: &str) -> Result<(), CredentialError> {
        self.values.insert(ACCESS_TOKEN_KEY, access.to_string());
        Ok(())
    }

    fn clear(&mut self) -> Result<(), CredentialError> {
        self.values.clear();
        Ok(())
    }
}

#[cfg(target_arch = "wasm32")]
mod wasm_storage {
    use super::{
        ACCESS_TOKEN_KEY, CredentialError, REFRESH_TOKEN_KEY, TokenPair, TokenStore, non_empty,
    };

    /// Browser `localStorage` under the fixed token keys.
    #[derive(Debug, Default)]
    pub struct LocalStorageTokenStore;

    impl LocalStorageTokenStore {
        pub fn new() -> Result<Self, CredentialError> {
            // Fail early if the page has no storage (private mode, sandboxed iframe).
            window_local_storage()?;
            Ok(Self)
        }

        fn get(&self, key: &str) -> Result<Option<String>, CredentialError> {
            let storage = window_local_storage()?;
            let raw = storage
                .get_item(key)
                .map_err(|e| CredentialError::Io(format!("get_item({key}) failed: {:?}", e)))?;
            Ok(non_empty(raw))
        }

        fn set(&self, key: &str, value: &str) -> Result<(), CredentialError> {
            let storage = window_local_storage()?;
            storage
                .set_item(key, value)
                .map_err(|e| CredentialError::Io(format!("set_item({key}) failed: {:?}", e)))
        }
    }

    impl TokenStore for LocalStorageTokenStore {
        fn access_token(&self) -> Result<Option<String>, CredentialError> {
            self.get(ACCESS_TOKEN_KEY)
        }

        fn refresh_token(&self) -> Result<Option<String>, CredentialError> {
            self.get(REFRESH_TOKEN_KEY)
        }

        fn store_pair(&mut self, pair: &TokenPair) -> Result<(), CredentialError> {
            self.set(ACCESS_TOKEN_KEY, &pair.access)?;
            if let Err(err) = self.set(REFRESH_TOKEN_KEY, &pair.refresh) {
                // Do not leave a new access token paired with a stale refresh token.
                let _ = self.clear();
                return Err(err);
            }
            Ok(())
        }

        fn store_access(&mut self, access: &str) -> Result<(), CredentialError> {
            self.set(ACCESS_TOKEN_KEY, access)
        }

        fn clear(&mut self) -> Result<(), CredentialError> {
            let storage = window_local_storage()?;
            let _ = storage.remove_item(ACCESS_TOKEN_KEY);
            let _ = storage.remove_item(REFRESH_TOKEN_KEY);
            Ok(())
        }
    }

    fn window_local_storage() -> Result<web_sys::Storage, CredentialError> {
        let win = web_sys::window().ok_or(CredentialError::StorageUnavailable)?;
        win.local_storage()
            .map_err(|e| CredentialError::Io(format!("localStorage error: {:?}", e)))?
            .ok_or(CredentialError::StorageUnavailable)
    }
}

#[cfg(target_arch = "wasm32")]
pub use wasm_storage::LocalStorageTokenStore;

#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug)]
pub struct LocalStorageTokenStore;

#[cfg(not(target_arch = "wasm32"))]
impl LocalStorageTokenStore {
    pub fn new() -> Result<Self, CredentialError> {
        Err(CredentialError::StorageUnavailable)
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl TokenStore for LocalStorageTokenStore {
    fn access_token(&self) -> Result<Option<String>, CredentialError> {
        Err(CredentialError::StorageUnavailable)
    }

    fn refresh_token(&self) -> Result<Option<String>, CredentialError> {
        Err(CredentialError::StorageUnavailable)
    }

    fn store_pair(&mut self, _pair: &TokenPair) -> Result<(), CredentialError> {
        Err(CredentialError::StorageUnavailable)
    }

    fn store_access(&mut self, _access: &str) -> Result<(), CredentialError> {
        Err(CredentialError::StorageUnavailable)
    }

    fn clear(&mut self) -> Result<(), CredentialError> {
        Err(CredentialError::StorageUnavailable)
    }
}
