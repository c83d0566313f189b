use async_trait::async_trait;
use reqwest::{header, Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use shared::{
    domain::WellId,
    error::ApiError,
    protocol::{
        cancel_route, eject_route, results_route, run_route, EjectResponse, ResultsResponse,
        RunResponse,
    },
};

use crate::error::TransportError;

/// The four instrument RPCs the run controller depends on.
#[async_trait]
pub trait RunTransport: Send + Sync + 'static {
    async fn run(&self, wells: &[WellId]) -> Result<RunResponse, TransportError>;
    async fn results(&self, pending: &[WellId]) -> Result<ResultsResponse, TransportError>;
    async fn cancel(&self, pending: &[WellId]) -> Result<ResultsResponse, TransportError>;
    async fn eject(&self) -> Result<EjectResponse, TransportError>;
}

/// JSON-over-HTTP transport that declares the dashboard origin on every call.
pub struct HttpTransport {
    http: Client,
    server_url: String,
    origin: String,
}

impl HttpTransport {
    pub fn new(server_url: impl Into<String>, origin: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            server_url: server_url.into().trim_end_matches('/').to_string(),
            origin: origin.into(),
        }
    }

    fn post(&self, route: &str) -> RequestBuilder {
        self.http
            .post(format!("{}{route}", self.server_url))
            .header(header::ORIGIN, &self.origin)
    }

    async fn send<R: DeserializeOwned>(&self, request: RequestBuilder) -> Result<R, TransportError> {
        let response = request.send().await?;
        match response.status() {
            StatusCode::FORBIDDEN => Err(TransportError::Rejected),
            StatusCode::BAD_REQUEST => {
                let body = response.text().await?;
                let message = serde_json::from_str::<ApiError>(&body)
                    .map(|error| error.message)
                    .unwrap_or(body);
                Err(TransportError::Validation(message))
            }
            status if !status.is_success() => Err(TransportError::Status {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            }),
            _ => {
                let body = response.bytes().await?;
                serde_json::from_slice(&body)
                    .map_err(|error| TransportError::Validation(error.to_string()))
            }
        }
    }
}

#[async_trait]
impl RunTransport for HttpTransport {
    async fn run(&self, wells: &[WellId]) -> Result<RunResponse, TransportError> {
        self.send(self.post(run_route()).json(wells)).await
    }

    async fn results(&self, pending: &[WellId]) -> Result<ResultsResponse, TransportError> {
        self.send(self.post(results_route()).json(pending)).await
    }

    async fn cancel(&self, pending: &[WellId]) -> Result<ResultsResponse, TransportError> {
        self.send(self.post(cancel_route()).json(pending)).await
    }

    async fn eject(&self) -> Result<EjectResponse, TransportError> {
        self.send(self.post(eject_route())).await
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
