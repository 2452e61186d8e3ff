//! Remote board gateways: the source of truth behind a board store.

pub mod http;
pub mod redis;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::board::command::BoardCommand;
use crate::board::model::{BoardSnapshot, TaskId};
use crate::config::{Backend, TaskdeckConfig};
use crate::error::BoardResult;

pub use self::http::HttpBoardGateway;
pub use self::redis::RedisBoardGateway;

/// Failure to fetch a board snapshot.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("project not found: {0}")]
    NotFound(String),

    #[error("malformed board payload: {0}")]
    Decode(String),
}

/// Why the gateway refused a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionKind {
    Validation,
    Network,
    Conflict,
    Timeout,
}

impl RejectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Network => "network",
            Self::Conflict => "conflict",
            Self::Timeout => "timeout",
        }
    }
}

impl fmt::Display for RejectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct Rejection {
    pub kind: RejectionKind,
    pub message: String,
}

impl Rejection {
    pub fn new(kind: RejectionKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(RejectionKind::Validation, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(RejectionKind::Network, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(RejectionKind::Conflict, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(RejectionKind::Timeout, message)
    }
}

/// Gateway acknowledgment, carrying any canonical fields the server assigned.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ack {
    /// Canonical id for a created task, when it differs from the provisional one.
    #[serde(default)]
    pub assigned_id: Option<TaskId>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait BoardGateway: Send + Sync {
    async fn fetch_board(&self, project_id: &str) -> Result<BoardSnapshot, GatewayError>;

    async fn submit_command(&self, project_id: &str, command: &BoardCommand) -> Result<Ack, Rejection>;
}

/// Build the gateway selected by the configuration.
pub async fn connect(config: &TaskdeckConfig) -> BoardResult<Arc<dyn BoardGateway>> {
    match config.backend {
        Backend::Redis => {
            let gateway = RedisBoardGateway::connect(&config.redis_url).await?;
            Ok(Arc::new(gateway))
        }
        Backend::Http => Ok(Arc::new(HttpBoardGateway::new(&config.api_url, config.mutation_timeout()))),
    }
}
