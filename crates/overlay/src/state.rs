use foundation::GeoBounds;
use layers::LayerId;
use session::ApiError;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExtractPhase {
    /// Waiting on the extraction endpoint.
    Primary,
    /// Render triggered; `attempt` metadata polls have been issued so far.
    Fallback { attempt: u32 },
}

/// Lifecycle of the overlay for the current selection.
///
/// Idle → Resolving → (Extracting →) Fetching → Displayed
///
/// `Failed` and `Unavailable` end a selection; only a new selection or a
/// retry leaves them.
#[derive(Debug, Clone, PartialEq)]
pub enum OverlayState {
    Idle,
    Resolving,
    Extracting { phase: ExtractPhase },
    Fetching { bounds: GeoBounds },
    Displayed { bounds: GeoBounds, layer: LayerId },
    Failed(OverlayFailure),
    Unavailable,
}

impl OverlayState {
    pub fn name(&self) -> &'static str {
        match self {
            OverlayState::Idle => "idle",
            OverlayState::Resolving => "resolving",
            OverlayState::Extracting { .. } => "extracting",
            OverlayState::Fetching { .. } => "fetching",
            OverlayState::Displayed { .. } => "displayed",
            OverlayState::Failed(_) => "failed",
            OverlayState::Unavailable => "unavailable",
        }
    }

    /// True while a request for the current selection is outstanding.
    pub fn is_loading(&self) -> bool {
        matches!(
            self,
            OverlayState::Resolving | OverlayState::Extracting { .. } | OverlayState::Fetching { .. }
        )
    }

    pub fn bounds(&self) -> Option<GeoBounds> {
        match self {
            OverlayState::Fetching { bounds } | OverlayState::Displayed { bounds, .. } => {
                Some(*bounds)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FailureReason {
    Authentication,
    NotFound,
    Timeout,
    Generic,
}

impl FailureReason {
    pub fn classify(err: &ApiError) -> Self {
        if err.is_auth_failure() {
            FailureReason::Authentication
        } else if err.is_timeout() {
            FailureReason::Timeout
        } else if matches!(err, ApiError::NotFound) {
            FailureReason::NotFound
        } else {
            FailureReason::Generic
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            FailureReason::Authentication => "Authentication failed. Please sign in again.",
            FailureReason::NotFound => "Image file not found on the server.",
            FailureReason::Timeout => "Request timeout. The image may be too large.",
            FailureReason::Generic => "Failed to load the satellite image.",
        }
    }
}

/// What the inline banner shows, plus the underlying error for logs.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayFailure {
    pub reason: FailureReason,
    pub detail: String,
}

impl OverlayFailure {
    pub fn message(&self) -> &'static str {
        self.reason.message()
    }
}

impl From<&ApiError> for OverlayFailure {
    fn from(err: &ApiError) -> Self {
        Self {
            reason: FailureReason::classify(err),
            detail: err.to_string(),
        }
    }
}

impl std::fmt::Display for OverlayFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message(), self.detail)
    }
}
