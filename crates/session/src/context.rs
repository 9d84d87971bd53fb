use std::sync::Arc;

use credentials::{CredentialError, TokenPair, TokenStore};
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::events::SessionEvent;
use crate::refresh::RefreshCoordinator;

/// Shared, process-wide session state.
///
/// The token pair is the only cross-cutting mutable state. It is written by
/// login, refresh and logout only, and never half-updated.
pub struct SessionContext {
    tokens: Mutex<Box<dyn TokenStore>>,
    refresh: RefreshCoordinator,
    events: broadcast::Sender<SessionEvent>,
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("refreshing", &self.refresh.is_refreshing())
            .finish_non_exhaustive()
    }
}

impl SessionContext {
    pub fn new(store: impl TokenStore + 'static) -> Arc<Self> {
        let (events, _) = broadcast::channel(64);
        Arc::new(Self {
            tokens: Mutex::new(Box::new(store)),
            refresh: RefreshCoordinator::new(),
            events,
        })
    }

    pub fn refresh(&self) -> &RefreshCoordinator {
        &self.refresh
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub(crate) fn emit(&self, event: SessionEvent) {
        info!(event = event.kind(), "session event");
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Current access token; an unreadable store reads as "no token".
    pub fn access_token(&self) -> Option<String> {
        match self.tokens.lock().access_token() {
            Ok(token) => token,
            Err(err) => {
                warn!("access token unreadable: {err}");
                None
            }
        }
    }

    pub fn refresh_token(&self) -> Option<String> {
        match self.tokens.lock().refresh_token() {
            Ok(token) => token,
            Err(err) => {
                warn!("refresh token unreadable: {err}");
                None
            }
        }
    }

    pub fn tokens(&self) -> Result<Option<TokenPair>, CredentialError> {
        self.tokens.lock().pair()
    }

    pub fn is_authenticated(&self) -> bool {
        self.access_token().is_some()
    }

    pub(crate) fn store_pair(&self, pair: &TokenPair) -> Result<(), CredentialError> {
        self.tokens.lock().store_pair(pair)
    }

    pub(crate) fn store_access(&self, access: &str) -> Result<(), CredentialError> {
        self.tokens.lock().store_access(access)
    }

    pub(crate) fn clear_tokens(&self) {
        if let Err(err) = self.tokens.lock().clear() {
            warn!("clearing tokens failed: {err}");
        }
    }

    /// Fatal for the session: drop the tokens and tell the shell to re-authenticate.
    ///
    /// `Expired` goes out once per session. A store that is already empty
    /// means an earlier expiry or logout has told the shell.
    pub(crate) fn expire(&self, reason: impl Into<String>) {
        let reason = reason.into();
        let had_tokens = {
            let mut store = self.tokens.lock();
            let had = !matches!(store.access_token(), Ok(None))
                || !matches!(store.refresh_token(), Ok(None));
            if let Err(err) = store.clear() {
                warn!("clearing tokens failed: {err}");
            }
            had
        };
        if !had_tokens {
            debug!("session already expired: {reason}");
            return;
        }
        warn!("session expired: {reason}");
        self.emit(SessionEvent::Expired { reason });
    }
}
