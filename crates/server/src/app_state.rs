use std::sync::Arc;

use anyhow::Context;
use axum::http::HeaderValue;
use shared::fixture::ResultsFixture;
use tokio::sync::Mutex;

use crate::{
    config::{Settings, SimTiming},
    session::{RunSession, SharedSession},
};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) session: SharedSession,
    pub(crate) fixture: Arc<ResultsFixture>,
    pub(crate) timing: SimTiming,
    pub(crate) dashboard_origin: String,
    pub(crate) allow_origin: HeaderValue,
}

impl AppState {
    pub(crate) fn new(fixture: ResultsFixture, settings: &Settings) -> anyhow::Result<Self> {
        let allow_origin = HeaderValue::from_str(&settings.dashboard_origin)
            .with_context(|| format!("dashboard origin '{}'", settings.dashboard_origin))?;
        Ok(Self {
            session: Arc::new(Mutex::new(RunSession::default())),
            fixture: Arc::new(fixture),
            timing: settings.timing(),
            dashboard_origin: settings.dashboard_origin.clone(),
            allow_origin,
        })
    }

    /// Stops any in-flight read so no tick task outlives the server.
    pub(crate) async fn shutdown(&self) {
        self.session.lock().await.halt();
    }
}
