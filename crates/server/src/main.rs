use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::{
    body::Bytes,
    extract::State,
    http::{header, Method, StatusCode},
    middleware,
    routing::{get, post},
    Json, Router,
};
use shared::{
    error::ApiError,
    fixture::ResultsFixture,
    protocol::{
        cancel_route, eject_route, results_route, run_route, EjectResponse, ResultsResponse,
        RunResponse,
    },
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod api;
mod app_state;
mod config;
mod origin;
mod session;
mod simulator;

use app_state::AppState;
use config::load_settings;
use origin::require_dashboard_origin;

const MAX_BODY_BYTES: usize = 64 * 1024;

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = load_settings()?;
    if !settings.simulate {
        warn!("simulation disabled; no instrument endpoint to serve");
        return Ok(());
    }

    let text = tokio::fs::read_to_string(&settings.results_fixture)
        .await
        .with_context(|| {
            format!(
                "failed to read results fixture '{}'",
                settings.results_fixture.display()
            )
        })?;
    let fixture = ResultsFixture::parse(&text).with_context(|| {
        format!(
            "failed to parse results fixture '{}'",
            settings.results_fixture.display()
        )
    })?;
    info!(
        records = fixture.len(),
        wells = fixture.wells().len(),
        "loaded results fixture"
    );

    let state = Arc::new(AppState::new(fixture, &settings)?);
    let app = build_router(state.clone());

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, origin = %settings.dashboard_origin, "read simulator listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.shutdown().await;
    info!("read simulator stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(%error, "failed to listen for ctrl-c; shutting down");
    }
}

fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(state.allow_origin.clone())
        .allow_methods([Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    let protocol = Router::new()
        .route(run_route(), post(http_run))
        .route(results_route(), post(http_results))
        .route(cancel_route(), post(http_cancel))
        .route(eject_route(), post(http_eject))
        .layer(cors)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            require_dashboard_origin,
        ))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES));

    Router::new()
        .route("/healthz", get(healthz))
        .merge(protocol)
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

fn rejected(error: ApiError) -> (StatusCode, Json<ApiError>) {
    let status = match error.code {
        shared::error::ErrorCode::Validation => StatusCode::BAD_REQUEST,
        shared::error::ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    };
    warn!(code = ?error.code, message = %error.message, "request rejected");
    (status, Json(error))
}

async fn http_run(State(state): State<Arc<AppState>>, body: Bytes) -> ApiResult<RunResponse> {
    let wells = api::parse_wells(&body).map_err(rejected)?;
    let response = api::start_run(&state, wells).await.map_err(rejected)?;
    Ok(Json(response))
}

async fn http_results(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> ApiResult<ResultsResponse> {
    let pending = api::parse_wells(&body).map_err(rejected)?;
    Ok(Json(api::collect_results(&state, pending).await))
}

async fn http_cancel(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> ApiResult<ResultsResponse> {
    let pending = api::parse_wells(&body).map_err(rejected)?;
    let response = api::cancel_run(&state, pending).await.map_err(rejected)?;
    Ok(Json(response))
}

async fn http_eject(State(state): State<Arc<AppState>>) -> ApiResult<EjectResponse> {
    let response = api::eject(&state).await.map_err(rejected)?;
    Ok(Json(response))
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
