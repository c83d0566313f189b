use std::{sync::Arc, time::Duration};

use shared::{domain::WellId, reconcile::split_delivered};
use tokio::{sync::Mutex, task::JoinHandle};
use tracing::{debug, info};
use uuid::Uuid;

use crate::simulator::{ReadSimulator, TickOutcome};

pub(crate) type SharedSession = Arc<Mutex<RunSession>>;

/// Everything the simulator knows about the current run and the plate carrier.
#[derive(Debug)]
pub(crate) struct RunSession {
    pub(crate) simulator: ReadSimulator,
    run_id: Option<Uuid>,
    carrier_in: bool,
    ejecting: bool,
    reader: Option<JoinHandle<()>>,
}

impl Default for RunSession {
    fn default() -> Self {
        Self {
            simulator: ReadSimulator::new(),
            run_id: None,
            carrier_in: true,
            ejecting: false,
            reader: None,
        }
    }
}

impl RunSession {
    /// Replaces whatever run was active with a fresh one and starts reading.
    pub(crate) fn begin_run(&mut self, wells: Vec<WellId>) -> Uuid {
        self.abort_reader();
        let run_id = Uuid::new_v4();
        self.run_id = Some(run_id);
        self.simulator.init_run(wells);
        self.simulator.start();
        run_id
    }

    pub(crate) fn attach_reader(&mut self, handle: JoinHandle<()>) {
        self.abort_reader();
        self.reader = Some(handle);
    }

    /// Splits the client's pending view into delivered and still-pending wells.
    pub(crate) fn reconcile(&self, client_pending: &[WellId]) -> (Vec<WellId>, Vec<WellId>) {
        split_delivered(client_pending, self.simulator.read_wells())
    }

    pub(crate) fn halt(&mut self) {
        self.simulator.stop();
        self.abort_reader();
    }

    pub(crate) fn run_id(&self) -> Option<Uuid> {
        self.run_id
    }

    pub(crate) fn carrier_in(&self) -> bool {
        self.carrier_in
    }

    pub(crate) fn ejecting(&self) -> bool {
        self.ejecting
    }

    pub(crate) fn begin_eject(&mut self) {
        self.ejecting = true;
    }

    pub(crate) fn finish_eject(&mut self) {
        self.ejecting = false;
        self.carrier_in = false;
    }

    fn abort_reader(&mut self) {
        if let Some(handle) = self.reader.take() {
            handle.abort();
        }
    }
}

/// Spawns the tick chain for `run_id`: one read per `interval` until the queue drains,
/// the run is stopped, or a newer run replaces it.
pub(crate) fn spawn_reader(session: SharedSession, run_id: Uuid, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;

            let mut guard = session.lock().await;
            if guard.run_id != Some(run_id) {
                break;
            }
            let outcome = guard.simulator.tick();
            if let Some(well) = guard.simulator.read_wells().last() {
                debug!(
                    %run_id,
                    %well,
                    next = ?guard.simulator.current_well(),
                    ?outcome,
                    "simulated well read"
                );
            }
            match outcome {
                TickOutcome::Continue => {}
                TickOutcome::Finished => {
                    info!(%run_id, wells = guard.simulator.read_wells().len(), "run finished reading");
                    break;
                }
                TickOutcome::Idle => break,
            }
        }
    })
}
