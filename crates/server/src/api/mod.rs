//! Run protocol operations behind the HTTP routes.

use std::{future::Future, time::Duration};

use shared::{
    domain::WellId,
    error::{ApiError, ErrorCode},
    protocol::{EjectResponse, ResultsResponse, RunResponse},
};
use tracing::info;

use crate::{app_state::AppState, session::spawn_reader};

/// Parses a request body that must be a JSON array of well names.
pub(crate) fn parse_wells(body: &[u8]) -> Result<Vec<WellId>, ApiError> {
    serde_json::from_slice::<Vec<WellId>>(body).map_err(|e| {
        ApiError::new(
            ErrorCode::Validation,
            format!("expected a JSON array of well names: {e}"),
        )
    })
}

/// Runs `continuation` on its own task once `delay` has elapsed.
///
/// The state change happens even if the caller stops waiting for the response.
async fn after_delay<T, F, Fut>(delay: Duration, continuation: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        continuation().await
    })
    .await
    .map_err(|e| ApiError::new(ErrorCode::Internal, format!("delayed response failed: {e}")))
}

/// Acknowledges a run after the simulated start-up delay and starts reading.
///
/// A run that arrives while another is active replaces it outright.
pub(crate) async fn start_run(state: &AppState, wells: Vec<WellId>) -> Result<RunResponse, ApiError> {
    info!(wells = wells.len(), "'/run' request received");
    let state = state.clone();
    after_delay(state.timing.run_delay, move || async move {
        let mut session = state.session.lock().await;
        let run_id = session.begin_run(wells.clone());
        let reader = spawn_reader(state.session.clone(), run_id, state.timing.read_interval);
        session.attach_reader(reader);

        info!(%run_id, pending = wells.len(), "run acknowledged; reading started");
        RunResponse { pending: wells }
    })
    .await
}

/// Reports every pending well that has been read since the client last asked.
pub(crate) async fn collect_results(state: &AppState, pending: Vec<WellId>) -> ResultsResponse {
    let session = state.session.lock().await;
    let (delivered, still_pending) = session.reconcile(&pending);
    info!(
        run_id = ?session.run_id(),
        delivered = delivered.len(),
        pending = still_pending.len(),
        "'/results' request answered"
    );
    ResultsResponse {
        pending: still_pending,
        results: state.fixture.group_by_well(&delivered),
    }
}

/// Stops the run after the simulated cancel delay. Wells read during the delay
/// are still delivered.
pub(crate) async fn cancel_run(
    state: &AppState,
    pending: Vec<WellId>,
) -> Result<ResultsResponse, ApiError> {
    info!(pending = pending.len(), "'/cancel' request received");
    let state = state.clone();
    after_delay(state.timing.cancel_delay, move || async move {
        let mut session = state.session.lock().await;
        session.halt();
        let (delivered, still_pending) = session.reconcile(&pending);
        info!(
            run_id = ?session.run_id(),
            delivered = delivered.len(),
            pending = still_pending.len(),
            unread = session.simulator.queued_wells().count(),
            "run cancelled"
        );
        ResultsResponse {
            pending: still_pending,
            results: state.fixture.group_by_well(&delivered),
        }
    })
    .await
}

/// Moves the carrier out. Only the first eject after a plate is loaded takes time.
///
/// Runs are not consulted; a read in progress keeps going.
pub(crate) async fn eject(state: &AppState) -> Result<EjectResponse, ApiError> {
    let delay = {
        let mut session = state.session.lock().await;
        info!(reading = session.simulator.is_reading(), "'/eject' request received");
        if session.ejecting() {
            return Ok(EjectResponse::failed("carrier is already moving"));
        }
        session.begin_eject();
        if session.carrier_in() {
            state.timing.eject_delay
        } else {
            Duration::ZERO
        }
    };

    let session = state.session.clone();
    after_delay(delay, move || async move {
        session.lock().await.finish_eject();
        info!(?delay, "carrier ejected");
        EjectResponse::ejected()
    })
    .await
}

#[cfg(test)]
#[path = "tests/mod_tests.rs"]
mod tests;
