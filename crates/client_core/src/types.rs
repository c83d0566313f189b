use std::time::Duration;

use shared::domain::{ReadingRecord, WellId};

const DEFAULT_RUN_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);
const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(9);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunState {
    #[default]
    Idle,
    AwaitingAck,
    Polling,
    Cancelling,
    Complete,
}

impl RunState {
    /// A run is between submission and its final response.
    pub fn is_active(self) -> bool {
        matches!(self, Self::AwaitingAck | Self::Polling | Self::Cancelling)
    }
}

/// How often a timed-out `/run` or `/results` request is resent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetryPolicy {
    /// Resend until the run is cancelled.
    #[default]
    Unbounded,
    /// Give up after this many resends and report a timeout.
    Limited(u32),
}

impl RetryPolicy {
    pub fn allows_retry(self, attempts_so_far: u32) -> bool {
        match self {
            Self::Unbounded => true,
            Self::Limited(max_retries) => attempts_so_far <= max_retries,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub server_url: String,
    pub origin: String,
    pub run_timeout: Duration,
    pub poll_interval: Duration,
    pub poll_timeout: Duration,
    pub retry: RetryPolicy,
}

impl ControllerConfig {
    pub fn new(server_url: impl Into<String>, origin: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            origin: origin.into(),
            run_timeout: DEFAULT_RUN_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }
}

/// Reconciled run state pushed to progress and chart displays.
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    Started {
        selection: Vec<WellId>,
        current_well: Option<WellId>,
    },
    /// `run_wells` holds the wells with readings so far; `pending` the wells
    /// not yet delivered.
    Progress {
        run_wells: Vec<WellId>,
        pending: Vec<WellId>,
        blank_wells: Vec<WellId>,
        current_well: Option<WellId>,
    },
    /// The full aggregate result list so far.
    Results { results: Vec<ReadingRecord> },
    Complete,
    Cancelled,
    Error(String),
}
