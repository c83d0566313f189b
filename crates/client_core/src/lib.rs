use std::{collections::HashSet, future::Future, sync::Arc, time::Duration};

use shared::{
    domain::{sort_wells, unique_sorted_wells, ReadingRecord, WellId},
    protocol::{results_route, run_route, EjectResponse, ResultsResponse},
    reconcile::difference,
};
use tokio::{
    sync::{broadcast, watch, Mutex},
    task::JoinHandle,
    time::{sleep, sleep_until, timeout_at, Instant},
};
use tracing::{debug, info, warn};

pub mod error;
pub mod transport;
pub mod types;

pub use error::{ControllerError, TransportError};
pub use transport::{HttpTransport, RunTransport};
pub use types::{ControllerConfig, RetryPolicy, RunEvent, RunState};

const EVENT_CAPACITY: usize = 256;

/// Client-side view of the current run, rebuilt from every server response.
#[derive(Debug, Default)]
struct RunProgress {
    state: RunState,
    selection: Vec<WellId>,
    pending: Vec<WellId>,
    blank_wells: Vec<WellId>,
    current_well: Option<WellId>,
    results: Vec<ReadingRecord>,
    seen: HashSet<(WellId, String)>,
}

#[derive(Debug, Default, PartialEq, Eq)]
struct Reconciled {
    wells_changed: bool,
    results_changed: bool,
    complete: bool,
}

impl RunProgress {
    fn start(selection: Vec<WellId>) -> Self {
        Self {
            state: RunState::AwaitingAck,
            pending: selection.clone(),
            selection,
            ..Self::default()
        }
    }

    fn acknowledge(&mut self, mut pending: Vec<WellId>) {
        sort_wells(&mut pending);
        pending.dedup();
        self.pending = pending;
        self.current_well = self.pending.first().copied();
        if self.state == RunState::AwaitingAck {
            self.state = RunState::Polling;
        }
    }

    fn reconcile(&mut self, response: ResultsResponse) -> Reconciled {
        let server_pending = unique_sorted_wells(&response.pending);
        let unexpected = difference(&server_pending, &self.pending);
        if !unexpected.is_empty() {
            warn!(
                ?unexpected,
                local = ?self.pending,
                "server reports wells pending that were not pending locally; adopting server list"
            );
        }

        let delivered: HashSet<WellId> = difference(&self.pending, &server_pending)
            .into_iter()
            .collect();
        let mut outcome = Reconciled::default();

        for entry in response.results {
            if !delivered.contains(&entry.well) {
                debug!(well = %entry.well, "ignoring results for a well that was not delivered");
                continue;
            }
            if entry.is_blank() {
                if !self.blank_wells.contains(&entry.well) {
                    self.blank_wells.push(entry.well);
                    sort_wells(&mut self.blank_wells);
                    outcome.wells_changed = true;
                }
                continue;
            }
            for record in entry.records() {
                if self.seen.insert((record.well, record.analyte.clone())) {
                    self.results.push(record);
                    outcome.results_changed = true;
                }
            }
        }

        if server_pending != self.pending {
            outcome.wells_changed = true;
        }
        self.pending = server_pending;
        self.current_well = self.pending.first().copied();
        outcome.complete = self.pending.is_empty();
        outcome
    }

    /// Wells that have delivered at least one reading, in canonical order.
    fn run_wells(&self) -> Vec<WellId> {
        unique_sorted_wells(self.results.iter().map(|record| &record.well))
    }

    fn progress_event(&self) -> RunEvent {
        RunEvent::Progress {
            run_wells: self.run_wells(),
            pending: self.pending.clone(),
            blank_wells: self.blank_wells.clone(),
            current_well: self.current_well,
        }
    }
}

fn publish(events: &broadcast::Sender<RunEvent>, progress: &RunProgress, outcome: &Reconciled) {
    if outcome.wells_changed || outcome.results_changed {
        let _ = events.send(progress.progress_event());
    }
    if outcome.results_changed {
        let _ = events.send(RunEvent::Results {
            results: progress.results.clone(),
        });
    }
}

struct ActiveRun {
    cancel: watch::Sender<bool>,
    driver: JoinHandle<()>,
}

/// Drives one run: submit, then poll until nothing is pending or the run
/// is cancelled. Requests are strictly sequential.
pub struct RunController<T: RunTransport = HttpTransport> {
    transport: Arc<T>,
    config: ControllerConfig,
    progress: Arc<Mutex<RunProgress>>,
    active: Mutex<Option<ActiveRun>>,
    events: broadcast::Sender<RunEvent>,
}

impl RunController<HttpTransport> {
    pub fn new(config: ControllerConfig) -> Arc<Self> {
        let transport = HttpTransport::new(config.server_url.clone(), config.origin.clone());
        Self::with_transport(transport, config)
    }
}

impl<T: RunTransport> RunController<T> {
    pub fn with_transport(transport: T, config: ControllerConfig) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Arc::new(Self {
            transport: Arc::new(transport),
            config,
            progress: Arc::new(Mutex::new(RunProgress::default())),
            active: Mutex::new(None),
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<RunEvent> {
        self.events.subscribe()
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub async fn state(&self) -> RunState {
        self.progress.lock().await.state
    }

    pub async fn selection(&self) -> Vec<WellId> {
        self.progress.lock().await.selection.clone()
    }

    /// Wells already read, excluding blanks.
    pub async fn run_wells(&self) -> Vec<WellId> {
        self.progress.lock().await.run_wells()
    }

    /// Wells still waiting for results, in canonical order.
    pub async fn pending(&self) -> Vec<WellId> {
        self.progress.lock().await.pending.clone()
    }

    pub async fn blank_wells(&self) -> Vec<WellId> {
        self.progress.lock().await.blank_wells.clone()
    }

    pub async fn current_well(&self) -> Option<WellId> {
        self.progress.lock().await.current_well
    }

    pub async fn results(&self) -> Vec<ReadingRecord> {
        self.progress.lock().await.results.clone()
    }

    pub async fn can_eject(&self) -> bool {
        !self.progress.lock().await.state.is_active()
    }

    /// Submits a new run and returns once the driver task is started.
    pub async fn send_run(&self, selection: Vec<WellId>) -> Result<(), ControllerError> {
        let selection = unique_sorted_wells(&selection);
        let mut active = self.active.lock().await;
        {
            let mut progress = self.progress.lock().await;
            if progress.state.is_active() {
                return Err(ControllerError::RunInProgress);
            }
            *progress = RunProgress::start(selection.clone());
        }
        info!(wells = selection.len(), "submitting run");

        let (cancel, cancelled) = watch::channel(false);
        let driver = RunDriver {
            transport: Arc::clone(&self.transport),
            config: self.config.clone(),
            progress: Arc::clone(&self.progress),
            events: self.events.clone(),
            cancelled,
        };
        let driver = tokio::spawn(driver.run(selection));
        *active = Some(ActiveRun { cancel, driver });
        Ok(())
    }

    /// Stops the run: no further polls or retries are scheduled, a request
    /// already in flight is allowed to finish, then `/cancel` collects
    /// whatever was read in the meantime.
    pub async fn cancel_run(&self) -> Result<(), ControllerError> {
        {
            let mut progress = self.progress.lock().await;
            if !matches!(progress.state, RunState::AwaitingAck | RunState::Polling) {
                return Err(ControllerError::NoActiveRun);
            }
            progress.state = RunState::Cancelling;
        }
        info!("cancelling run");

        if let Some(active) = self.active.lock().await.take() {
            let _ = active.cancel.send(true);
            if let Err(error) = active.driver.await {
                warn!(%error, "run driver ended abnormally");
            }
        }

        let pending = {
            let progress = self.progress.lock().await;
            if progress.state == RunState::Complete {
                debug!("run completed before the cancel took effect");
                return Ok(());
            }
            progress.pending.clone()
        };

        let response = match self.transport.cancel(&pending).await {
            Ok(response) => response,
            Err(error) => {
                let error = ControllerError::from(error);
                self.progress.lock().await.state = RunState::Idle;
                let _ = self.events.send(RunEvent::Error(error.to_string()));
                return Err(error);
            }
        };

        let mut progress = self.progress.lock().await;
        let outcome = progress.reconcile(response);
        progress.current_well = None;
        progress.state = RunState::Idle;
        publish(&self.events, &progress, &outcome);
        let _ = self.events.send(RunEvent::Cancelled);
        info!(
            delivered = progress.results.len(),
            abandoned = progress.pending.len(),
            "run cancelled"
        );
        Ok(())
    }

    /// Asks the instrument to move the plate carrier. Never retried.
    pub async fn eject_plate<D, E>(&self, on_done: D, on_error: E)
    where
        D: FnOnce(),
        E: FnOnce(String),
    {
        match self.transport.eject().await {
            Ok(EjectResponse::Ejected {}) => {
                info!("carrier moved");
                on_done();
            }
            Ok(EjectResponse::Failed { error }) => {
                warn!(%error, "eject refused");
                on_error(error);
            }
            Err(error) => {
                warn!(%error, "eject request failed");
                on_error(error.to_string());
            }
        }
    }

    /// Forgets the current run entirely, as a page reload would.
    pub async fn reset(&self) {
        if let Some(active) = self.active.lock().await.take() {
            let _ = active.cancel.send(true);
            active.driver.abort();
        }
        *self.progress.lock().await = RunProgress::default();
    }
}

struct RunDriver<T> {
    transport: Arc<T>,
    config: ControllerConfig,
    progress: Arc<Mutex<RunProgress>>,
    events: broadcast::Sender<RunEvent>,
    cancelled: watch::Receiver<bool>,
}

impl<T: RunTransport> RunDriver<T> {
    async fn run(self, selection: Vec<WellId>) {
        let Err(error) = self.drive(selection).await else {
            return;
        };
        let mut progress = self.progress.lock().await;
        if progress.state == RunState::Cancelling {
            warn!(%error, "run request failed while cancelling");
            return;
        }
        warn!(%error, "run failed");
        progress.state = RunState::Idle;
        progress.current_well = None;
        let _ = self.events.send(RunEvent::Error(error.to_string()));
    }

    async fn drive(&self, selection: Vec<WellId>) -> Result<(), ControllerError> {
        let transport = Arc::clone(&self.transport);
        let request = selection.clone();
        let ack = self
            .request_with_retry(run_route(), self.config.run_timeout, || {
                let transport = Arc::clone(&transport);
                let wells = request.clone();
                async move { transport.run(&wells).await }
            })
            .await?;
        let Some(ack) = ack else {
            return Ok(());
        };

        {
            let mut progress = self.progress.lock().await;
            progress.acknowledge(ack.pending);
            info!(pending = progress.pending.len(), "run acknowledged");
            let _ = self.events.send(RunEvent::Started {
                selection,
                current_well: progress.current_well,
            });
        }

        loop {
            if !self.wait_poll_interval().await {
                return Ok(());
            }
            let pending = self.progress.lock().await.pending.clone();
            let response = self
                .request_with_retry(results_route(), self.config.poll_timeout, || {
                    let transport = Arc::clone(&transport);
                    let wells = pending.clone();
                    async move { transport.results(&wells).await }
                })
                .await?;
            let Some(response) = response else {
                return Ok(());
            };

            let mut progress = self.progress.lock().await;
            let outcome = progress.reconcile(response);
            publish(&self.events, &progress, &outcome);
            debug!(pending = progress.pending.len(), "poll reconciled");
            if outcome.complete {
                progress.state = RunState::Complete;
                progress.current_well = None;
                info!(results = progress.results.len(), "run complete");
                let _ = self.events.send(RunEvent::Complete);
                return Ok(());
            }
        }
    }

    fn is_cancelled(&self) -> bool {
        *self.cancelled.borrow()
    }

    async fn until_cancelled(&self) {
        let mut cancelled = self.cancelled.clone();
        // A dropped sender means the controller is gone, which also ends the run.
        let _ = cancelled.wait_for(|flag| *flag).await;
    }

    /// Returns `false` when the run was cancelled during the wait.
    async fn wait_poll_interval(&self) -> bool {
        if self.is_cancelled() {
            return false;
        }
        tokio::select! {
            _ = sleep(self.config.poll_interval) => !self.is_cancelled(),
            _ = self.until_cancelled() => false,
        }
    }

    /// Sends the same request until it is answered within `timeout`.
    /// `Ok(None)` means the run was cancelled before an answer arrived.
    async fn request_with_retry<R, F, Fut>(
        &self,
        route: &'static str,
        timeout: Duration,
        mut send: F,
    ) -> Result<Option<R>, ControllerError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<R, TransportError>>,
    {
        let mut attempts = 0u32;
        loop {
            if self.is_cancelled() {
                return Ok(None);
            }
            attempts += 1;
            let deadline = Instant::now() + timeout;
            match timeout_at(deadline, send()).await {
                Ok(Ok(response)) => return Ok(Some(response)),
                Ok(Err(error)) if error.is_retryable() => {
                    warn!(route, attempts, %error, "request failed; retrying after timeout");
                    tokio::select! {
                        _ = sleep_until(deadline) => {}
                        _ = self.until_cancelled() => return Ok(None),
                    }
                }
                Ok(Err(error)) => return Err(error.into()),
                Err(_) => warn!(route, attempts, "request timed out"),
            }
            if !self.config.retry.allows_retry(attempts) {
                return Err(ControllerError::Timeout { route, attempts });
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
