use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

use crate::{app_state::AppState, config::declared_origin};

/// Rejects any request whose declared `Origin` is not the dashboard origin.
///
/// Rejections carry no body so nothing about the instrument leaks to foreign pages.
pub(crate) async fn require_dashboard_origin(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let declared = request
        .headers()
        .get(header::ORIGIN)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);

    let allowed = declared
        .as_deref()
        .and_then(|raw| declared_origin(raw).ok())
        .is_some_and(|origin| origin == state.dashboard_origin);

    if allowed {
        next.run(request).await
    } else {
        warn!(
            origin = declared.as_deref().unwrap_or("<missing>"),
            path = %request.uri().path(),
            "access denied by origin policy"
        );
        StatusCode::FORBIDDEN.into_response()
    }
}
