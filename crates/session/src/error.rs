use credentials::CredentialError;

/// Everything a backend call can end in, after the client has done what it
/// can on its own.
///
/// An expired access token never shows up here: the first 401 is absorbed by
/// the refresh cycle. `Unauthorized` means the replayed request was rejected
/// too; `SessionInvalid` means the refresh token itself is gone or rejected
/// and the stored tokens have been cleared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    Unauthorized,
    SessionInvalid,
    NotFound,
    Timeout,
    Status { status: u16, body: String },
    Transport(String),
    Decode(String),
    Storage(CredentialError),
    Invalid(String),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Unauthorized => Some(401),
            ApiError::NotFound => Some(404),
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_auth_failure(&self) -> bool {
        matches!(self, ApiError::Unauthorized | ApiError::SessionInvalid)
            || matches!(self, ApiError::Status { status: 403, .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ApiError::Timeout)
    }

    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout
        } else if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Transport(err.to_string())
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::Unauthorized => write!(f, "request rejected: not authorized"),
            ApiError::SessionInvalid => write!(f, "session expired, sign in again"),
            ApiError::NotFound => write!(f, "resource not found"),
            ApiError::Timeout => write!(f, "request timeout"),
            ApiError::Status { status, body } if body.is_empty() => {
                write!(f, "backend returned HTTP {status}")
            }
            ApiError::Status { status, body } => {
                write!(f, "backend returned HTTP {status}: {body}")
            }
            ApiError::Transport(msg) => write!(f, "network error: {msg}"),
            ApiError::Decode(msg) => write!(f, "unexpected response: {msg}"),
            ApiError::Storage(err) => write!(f, "{err}"),
            ApiError::Invalid(msg) => write!(f, "invalid input: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ApiError::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<CredentialError> for ApiError {
    fn from(err: CredentialError) -> Self {
        ApiError::Storage(err)
    }
}
