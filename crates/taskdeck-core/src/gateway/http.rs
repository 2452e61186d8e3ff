//! REST gateway for a remote board backend.
//!
//! - `GET  {base}/projects/{id}/board` returns a [`BoardSnapshot`]
//! - `POST {base}/projects/{id}/commands` takes a [`BoardCommand`] and returns an [`Ack`]

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{debug, warn};

use super::{Ack, BoardGateway, GatewayError, Rejection, RejectionKind};
use crate::board::command::BoardCommand;
use crate::board::model::BoardSnapshot;

#[derive(Clone)]
pub struct HttpBoardGateway {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBoardGateway {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        debug!(base_url = %base_url, "HttpBoardGateway initialized");
        Self {
            client: build_client(timeout),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn board_url(&self, project_id: &str) -> String {
        format!("{}/projects/{}/board", self.base_url, project_id)
    }

    fn commands_url(&self, project_id: &str) -> String {
        format!("{}/projects/{}/commands", self.base_url, project_id)
    }
}

fn build_client(timeout: Duration) -> reqwest::Client {
    match reqwest::Client::builder().timeout(timeout).build() {
        Ok(client) => client,
        Err(e) => {
            warn!(
                error = %e,
                timeout_ms = timeout.as_millis() as u64,
                "HTTP client build failed; falling back to a client without request timeout"
            );
            reqwest::Client::default()
        }
    }
}

/// Map an HTTP failure status to the rejection kind surfaced to callers.
pub fn classify_status(status: StatusCode) -> RejectionKind {
    match status {
        StatusCode::BAD_REQUEST | StatusCode::NOT_FOUND | StatusCode::UNPROCESSABLE_ENTITY => {
            RejectionKind::Validation
        }
        StatusCode::CONFLICT | StatusCode::PRECONDITION_FAILED => RejectionKind::Conflict,
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => RejectionKind::Timeout,
        _ => RejectionKind::Network,
    }
}

#[async_trait]
impl BoardGateway for HttpBoardGateway {
    async fn fetch_board(&self, project_id: &str) -> Result<BoardSnapshot, GatewayError> {
        let url = self.board_url(project_id);
        debug!(url = %url, "Fetching board");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(GatewayError::NotFound(project_id.to_string()));
        }
        if !status.is_success() {
            return Err(GatewayError::Transport(format!("HTTP {}", status)));
        }

        response
            .json::<BoardSnapshot>()
            .await
            .map_err(|e| GatewayError::Decode(e.to_string()))
    }

    async fn submit_command(&self, project_id: &str, command: &BoardCommand) -> Result<Ack, Rejection> {
        let url = self.commands_url(project_id);
        debug!(url = %url, command = %command, "Submitting command");

        let response = self.client.post(&url).json(command).send().await.map_err(|e| {
            if e.is_timeout() {
                Rejection::timeout(e.to_string())
            } else {
                Rejection::network(e.to_string())
            }
        })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status.is_success() {
            if body.trim().is_empty() {
                return Ok(Ack::default());
            }
            return serde_json::from_str(&body)
                .map_err(|e| Rejection::network(format!("unreadable acknowledgment: {}", e)));
        }

        let kind = classify_status(status);
        warn!(
            command = %command,
            status_code = %status,
            kind = %kind,
            "Command rejected by backend"
        );
        let message = if body.trim().is_empty() {
            format!("HTTP {}", status)
        } else {
            body
        };
        Err(Rejection::new(kind, message))
    }
}
