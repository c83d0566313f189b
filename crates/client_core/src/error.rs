use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request rejected by the instrument's origin policy")]
    Rejected,
    #[error("instrument rejected the payload: {0}")]
    Validation(String),
    #[error("instrument returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl TransportError {
    /// Failures that behave like a request that never got an answer.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(error) => error.is_connect() || error.is_timeout(),
            _ => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("connection rejected by the instrument (origin not allowed)")]
    ConnectionRejected,
    #[error("'{route}' request timed out after {attempts} attempts")]
    Timeout { route: &'static str, attempts: u32 },
    #[error("invalid payload: {0}")]
    Validation(String),
    #[error("a run is already in progress")]
    RunInProgress,
    #[error("no run is in progress")]
    NoActiveRun,
    #[error(transparent)]
    Transport(TransportError),
}

impl From<TransportError> for ControllerError {
    fn from(value: TransportError) -> Self {
        match value {
            TransportError::Rejected => Self::ConnectionRejected,
            TransportError::Validation(message) => Self::Validation(message),
            other => Self::Transport(other),
        }
    }
}
