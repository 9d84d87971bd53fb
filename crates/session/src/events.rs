/// Session lifecycle notifications for the application shell.
///
/// `Expired` is the "send the user back to the login screen" signal: the
/// refresh token was rejected (or missing) and the stored tokens are gone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    LoggedIn { username: String },
    Registered { username: String },
    TokenRefreshed,
    LoggedOut,
    Expired { reason: String },
}

impl SessionEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            SessionEvent::LoggedIn { .. } => "logged_in",
            SessionEvent::Registered { .. } => "registered",
            SessionEvent::TokenRefreshed => "token_refreshed",
            SessionEvent::LoggedOut => "logged_out",
            SessionEvent::Expired { .. } => "expired",
        }
    }

    pub fn requires_login(&self) -> bool {
        matches!(self, SessionEvent::Expired { .. } | SessionEvent::LoggedOut)
    }
}
