//! Board store: the in-memory sprints and tasks of one project.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::command::BoardCommand;
use super::effect::{plan, PlanError};
use super::events::{BoardEvent, BoardEventSender};
use super::model::{BoardSnapshot, Sprint, Task, TaskId};
use super::state::{BoardState, MutationEffect};
use crate::error::{BoardError, BoardResult};
use crate::gateway::{Ack, BoardGateway, GatewayError};

struct StoreInner {
    state: BoardState,
    /// Bumped by every load. Rollbacks from older generations are dropped;
    /// accepted commands from them are replayed.
    generation: u64,
    loaded: bool,
    last_error: Option<String>,
}

pub struct BoardStore {
    project_id: String,
    gateway: Arc<dyn BoardGateway>,
    events: BoardEventSender,
    inner: RwLock<StoreInner>,
}

impl BoardStore {
    pub fn new(project_id: &str, gateway: Arc<dyn BoardGateway>, events: BoardEventSender) -> Self {
        Self {
            project_id: project_id.to_string(),
            gateway,
            events,
            inner: RwLock::new(StoreInner {
                state: BoardState::empty(project_id),
                generation: 0,
                loaded: false,
                last_error: None,
            }),
        }
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreInner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreInner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Replace the board. A seed is used verbatim; without one the board is
    /// fetched from the gateway.
    pub async fn load(&self, initial_data: Option<BoardSnapshot>) -> BoardResult<()> {
        let snapshot = match initial_data {
            Some(seed) => {
                if seed.project_id != self.project_id {
                    return Err(BoardError::validation(format!(
                        "Seed data belongs to project '{}', not '{}'",
                        seed.project_id, self.project_id
                    )));
                }
                debug!(project_id = %self.project_id, "Loading board from seed data");
                seed
            }
            None => {
                debug!(project_id = %self.project_id, "Fetching board from gateway");
                let fetched = self
                    .gateway
                    .fetch_board(&self.project_id)
                    .await
                    .and_then(|snapshot| {
                        if snapshot.project_id == self.project_id {
                            Ok(snapshot)
                        } else {
                            Err(GatewayError::Decode(format!(
                                "gateway returned board for project '{}'",
                                snapshot.project_id
                            )))
                        }
                    });
                match fetched {
                    Ok(snapshot) => snapshot,
                    Err(source) => {
                        warn!(project_id = %self.project_id, error = %source, "Board load failed");
                        self.replace(BoardState::empty(&self.project_id), Some(source.to_string()));
                        let _ = self.events.send(BoardEvent::LoadFailed {
                            project_id: self.project_id.clone(),
                            reason: source.to_string(),
                        });
                        return Err(BoardError::Load {
                            project_id: self.project_id.clone(),
                            source,
                        });
                    }
                }
            }
        };

        let (sprints, tasks) = (snapshot.sprints.len(), snapshot.tasks.len());
        self.replace(BoardState::from_snapshot(snapshot), None);
        info!(project_id = %self.project_id, sprints, tasks, "Board loaded");
        let _ = self.events.send(BoardEvent::Loaded {
            project_id: self.project_id.clone(),
            sprints,
            tasks,
        });
        Ok(())
    }

    fn replace(&self, state: BoardState, error: Option<String>) {
        let mut inner = self.write();
        inner.state = state;
        inner.generation += 1;
        inner.loaded = error.is_none();
        inner.last_error = error;
    }

    /// Sprints ordered by position.
    pub fn sprints(&self) -> Vec<Sprint> {
        self.read().state.sprints.clone()
    }

    /// Tasks of one sprint (`None` = backlog), grouped by status then position.
    pub fn tasks_by_sprint(&self, sprint_id: Option<&str>) -> Vec<Task> {
        let inner = self.read();
        let mut tasks: Vec<Task> = inner
            .state
            .tasks
            .values()
            .filter(|t| t.sprint_id.as_deref() == sprint_id)
            .cloned()
            .collect();
        tasks.sort_by(|a, b| {
            a.status
                .cmp(&b.status)
                .then(a.position.cmp(&b.position))
                .then_with(|| a.id.cmp(&b.id))
        });
        tasks
    }

    /// Tasks in one status column, ordered by sprint (backlog last) then position.
    pub fn tasks_by_status(&self, status: &str) -> Vec<Task> {
        let inner = self.read();
        let sprint_rank = |sprint_id: &Option<String>| -> usize {
            sprint_id
                .as_deref()
                .and_then(|id| inner.state.sprints.iter().position(|s| s.id == id))
                .unwrap_or(usize::MAX)
        };
        let mut tasks: Vec<Task> = inner
            .state
            .tasks
            .values()
            .filter(|t| t.status == status)
            .cloned()
            .collect();
        tasks.sort_by(|a, b| {
            sprint_rank(&a.sprint_id)
                .cmp(&sprint_rank(&b.sprint_id))
                .then(a.position.cmp(&b.position))
                .then_with(|| a.id.cmp(&b.id))
        });
        tasks
    }

    pub fn task(&self, id: &str) -> Option<Task> {
        self.read().state.tasks.get(id).cloned()
    }

    pub fn snapshot(&self) -> BoardSnapshot {
        self.read().state.to_snapshot()
    }

    pub fn is_loaded(&self) -> bool {
        self.read().loaded
    }

    /// Reason of the last failed load, cleared by the next successful one.
    pub fn last_error(&self) -> Option<String> {
        self.read().last_error.clone()
    }

    pub fn generation(&self) -> u64 {
        self.read().generation
    }

    pub(crate) fn with_state<R>(&self, f: impl FnOnce(&BoardState) -> R) -> R {
        f(&self.read().state)
    }

    /// Plan and apply a command under one write lock. Returns the inverse
    /// effect and the generation it was applied in.
    pub(crate) fn plan_and_apply(
        &self,
        command: &BoardCommand,
        now: DateTime<Utc>,
    ) -> Result<(MutationEffect, u64), PlanError> {
        let mut inner = self.write();
        let planned = plan(&inner.state, command, now)?;
        inner.state.apply(&planned.effect);
        Ok((planned.inverse, inner.generation))
    }

    /// Apply one effect to the board synchronously, unless a reload has
    /// replaced the board since `generation`.
    pub(crate) fn apply_local(&self, effect: &MutationEffect, generation: u64) -> bool {
        let mut inner = self.write();
        if inner.generation != generation {
            debug!(project_id = %self.project_id, "Skipping effect against reloaded board");
            return false;
        }
        inner.state.apply(effect);
        true
    }

    /// Fold an accepted command into the board and return the id of the task
    /// it touched.
    ///
    /// A command applied before the latest reload is planned again against
    /// the reloaded board; a plan error there means the reload already
    /// carries the change. Only a create adopts `ack.assigned_id`, and never
    /// when that id already names another task.
    pub(crate) fn reconcile(&self, command: &BoardCommand, ack: &Ack, generation: u64) -> Option<TaskId> {
        let mut inner = self.write();
        if inner.generation != generation {
            let on_board = command
                .created_task()
                .and(ack.assigned_id.as_deref())
                .is_some_and(|assigned| inner.state.tasks.contains_key(assigned));
            if on_board {
                return ack.assigned_id.clone();
            }
            match plan(&inner.state, command, Utc::now()) {
                Ok(planned) => {
                    inner.state.apply(&planned.effect);
                    debug!(command = %command, "Replayed accepted command on reloaded board");
                }
                Err(reason) => {
                    debug!(command = %command, reason = %reason, "Reloaded board already reflects command");
                }
            }
        }

        let mut id = command.task_id()?.to_string();
        if let (Some(provisional), Some(assigned)) = (command.created_task(), ack.assigned_id.as_deref()) {
            if assigned != provisional {
                if inner.state.rename_task(provisional, assigned) {
                    debug!(provisional = %provisional, canonical = %assigned, "Task id reconciled");
                    id = assigned.to_string();
                } else {
                    warn!(
                        project_id = %self.project_id,
                        provisional = %provisional,
                        assigned = %assigned,
                        "Assigned id already names another task; keeping provisional id"
                    );
                }
            }
        }
        if let Some(updated_at) = ack.updated_at {
            if let Some(task) = inner.state.tasks.get_mut(&id) {
                task.updated_at = updated_at;
            }
        }
        Some(id)
    }

    /// Drop all board data; used when the owning context is disposed.
    pub(crate) fn clear(&self) {
        let mut inner = self.write();
        inner.state = BoardState::empty(&self.project_id);
        inner.generation += 1;
        inner.loaded = false;
    }
}
