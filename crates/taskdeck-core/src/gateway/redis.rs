//! Redis-backed board gateway.
//!
//! Commands are validated and applied with the same planner the optimistic
//! engine uses, then the touched rows are written in one transaction.

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::Utc;
use taskdeck_redis::boards::{self, BoardChanges};
use taskdeck_redis::RedisPool;
use tracing::debug;

use super::{Ack, BoardGateway, GatewayError, Rejection};
use crate::board::command::BoardCommand;
use crate::board::effect::{plan, PlanError};
use crate::board::model::{BoardSnapshot, Sprint};
use crate::board::state::{BoardState, MutationEffect};
use crate::error::BoardResult;

#[derive(Clone)]
pub struct RedisBoardGateway {
    pool: RedisPool,
}

impl RedisBoardGateway {
    pub async fn connect(redis_url: &str) -> BoardResult<Self> {
        let pool = taskdeck_redis::init_pool(redis_url).await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: RedisPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &RedisPool {
        &self.pool
    }

    async fn read_board(&self, project_id: &str) -> taskdeck_redis::RedisResult<BoardSnapshot> {
        let sprints = boards::list_sprints(&self.pool, project_id).await?;
        let tasks = boards::list_tasks(&self.pool, project_id).await?;
        Ok(BoardSnapshot::from_rows(project_id, sprints, tasks))
    }

    /// Overwrite a project's stored board with a snapshot.
    pub async fn import(&self, snapshot: &BoardSnapshot) -> BoardResult<()> {
        let sprints: Vec<_> = snapshot.sprints.iter().map(Sprint::to_row).collect();
        let tasks: Vec<_> = snapshot.tasks.iter().map(|t| t.to_row()).collect();
        boards::replace_board(&self.pool, &snapshot.project_id, &sprints, &tasks).await?;
        debug!(
            project_id = %snapshot.project_id,
            sprints = sprints.len(),
            tasks = tasks.len(),
            "Board imported"
        );
        Ok(())
    }
}

/// Rows to persist after `effect` has been applied to `state`.
fn changes_for(state: &BoardState, effect: &MutationEffect) -> BoardChanges {
    let touched: BTreeSet<&str> = effect.touched_tasks().collect();
    BoardChanges {
        tasks: touched
            .into_iter()
            .filter_map(|id| state.tasks.get(id))
            .map(|t| t.to_row())
            .collect(),
        removed_tasks: effect.removed_tasks.clone(),
        sprints: effect
            .sprints
            .as_ref()
            .map(|sprints| sprints.iter().map(Sprint::to_row).collect())
            .unwrap_or_default(),
    }
}

#[async_trait]
impl BoardGateway for RedisBoardGateway {
    async fn fetch_board(&self, project_id: &str) -> Result<BoardSnapshot, GatewayError> {
        self.read_board(project_id)
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))
    }

    async fn submit_command(&self, project_id: &str, command: &BoardCommand) -> Result<Ack, Rejection> {
        let snapshot = self
            .read_board(project_id)
            .await
            .map_err(|e| Rejection::network(e.to_string()))?;
        let mut state = BoardState::from_snapshot(snapshot);

        let now = Utc::now();
        let planned = plan(&state, command, now).map_err(|e| match e {
            PlanError::Stale(entity) => Rejection::conflict(format!("{} no longer exists", entity)),
            PlanError::Invalid(msg) => Rejection::validation(msg),
        })?;
        state.apply(&planned.effect);

        let changes = changes_for(&state, &planned.effect);
        boards::apply_changes(&self.pool, project_id, &changes)
            .await
            .map_err(|e| Rejection::network(e.to_string()))?;

        debug!(project_id = %project_id, command = %command, "Command persisted");
        Ok(Ack {
            assigned_id: None,
            updated_at: Some(now),
        })
    }
}
