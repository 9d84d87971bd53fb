use std::collections::VecDeque;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::debug;

use crate::error::ApiError;

pub type RefreshResult = Result<String, ApiError>;

#[derive(Debug, Default)]
struct RefreshState {
    refreshing: bool,
    waiters: VecDeque<oneshot::Sender<RefreshResult>>,
}

/// Serializes token refreshes: the first caller to find no refresh in flight
/// becomes the refresher, everyone after it parks until that refresh settles.
///
/// The lock is only held for the check-and-set and for draining waiters, never
/// across the network call.
#[derive(Debug, Default)]
pub struct RefreshCoordinator {
    state: Mutex<RefreshState>,
}

pub enum Role<'a> {
    /// A refresh already finished since the rejected request was sent; replay
    /// with this token instead of refreshing again.
    Replay(String),
    /// Caller must perform the refresh and hand the result to the ticket.
    Refresher(RefreshTicket<'a>),
    /// Another caller is refreshing; the receiver resolves with its result.
    Waiter(oneshot::Receiver<RefreshResult>),
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decides the caller's role for one rejected request.
    ///
    /// `replay_token` runs under the coordinator lock and only when no refresh
    /// is in flight. Returning `Some(token)` short-circuits to [`Role::Replay`].
    pub fn begin(&self, replay_token: impl FnOnce() -> Option<String>) -> Role<'_> {
        let mut state = self.state.lock();
        if state.refreshing {
            let (tx, rx) = oneshot::channel();
            state.waiters.push_back(tx);
            debug!(queued = state.waiters.len(), "request parked behind refresh");
            return Role::Waiter(rx);
        }
        if let Some(token) = replay_token() {
            return Role::Replay(token);
        }
        state.refreshing = true;
        Role::Refresher(RefreshTicket {
            coordinator: self,
            settled: false,
        })
    }

    pub fn is_refreshing(&self) -> bool {
        self.state.lock().refreshing
    }

    pub fn queued(&self) -> usize {
        self.state.lock().waiters.len()
    }

    fn settle(&self, result: RefreshResult) {
        let waiters = {
            let mut state = self.state.lock();
            state.refreshing = false;
            std::mem::take(&mut state.waiters)
        };
        debug!(
            waiters = waiters.len(),
            ok = result.is_ok(),
            "refresh settled"
        );
        // FIFO: arrival order is resumption order.
        for tx in waiters {
            let _ = tx.send(result.clone());
        }
    }
}

/// Proof that the holder is the one in-flight refresher.
///
/// Dropping it unsettled (the refreshing future was cancelled) releases the
/// waiters with an error and clears the flag, so nothing stays parked forever.
pub struct RefreshTicket<'a> {
    coordinator: &'a RefreshCoordinator,
    settled: bool,
}

impl RefreshTicket<'_> {
    pub fn finish(mut self, result: RefreshResult) {
        self.settled = true;
        self.coordinator.settle(result);
    }
}

impl Drop for RefreshTicket<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.coordinator
                .settle(Err(ApiError::Transport("refresh cancelled".to_string())));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expect_refresher(role: Role<'_>) -> RefreshTicket<'_> {
        match role {
            Role::Refresher(t) => t,
            _ => panic!("expected refresher"),
        }
    }

    fn expect_waiter(role: Role<'_>) -> oneshot::Receiver<RefreshResult> {
        match role {
            Role::Waiter(rx) => rx,
            _ => panic!("expected waiter"),
        }
    }

    #[test]
    fn first_caller_refreshes_rest_wait() {
        let c = RefreshCoordinator::new();
        let ticket = expect_refresher(c.begin(|| None));
        let mut a = expect_waiter(c.begin(|| None));
        let mut b = expect_waiter(c.begin(|| Some("ignored".into())));
        assert!(c.is_refreshing());
        assert_eq!(c.queued(), 2);

        ticket.finish(Ok("new".to_string()));
        assert!(!c.is_refreshing());
        assert_eq!(a.try_recv().unwrap(), Ok("new".to_string()));
        assert_eq!(b.try_recv().unwrap(), Ok("new".to_string()));
    }

    #[test]
    fn failure_rejects_every_waiter() {
        let c = RefreshCoordinator::new();
        let ticket = expect_refresher(c.begin(|| None));
        let mut rx = expect_waiter(c.begin(|| None));
        ticket.finish(Err(ApiError::SessionInvalid));
        assert_eq!(rx.try_recv().unwrap(), Err(ApiError::SessionInvalid));
    }

    #[test]
    fn dropped_ticket_releases_waiters() {
        let c = RefreshCoordinator::new();
        let ticket = expect_refresher(c.begin(|| None));
        let mut rx = expect_waiter(c.begin(|| None));
        drop(ticket);
        assert!(!c.is_refreshing());
        assert!(matches!(rx.try_recv().unwrap(), Err(ApiError::Transport(_))));
    }

    #[test]
    fn stale_token_replays_without_refresh() {
        let c = RefreshCoordinator::new();
        match c.begin(|| Some("fresh".to_string())) {
            Role::Replay(token) => assert_eq!(token, "fresh"),
            _ => panic!("expected replay"),
        }
        assert!(!c.is_refreshing());
    }
}
