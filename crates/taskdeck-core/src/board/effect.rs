//! Pure planning of board commands.
//!
//! [`plan`] turns a command into the forward effect and its exact inverse,
//! computed against the current state. Positions inside every touched bucket
//! are renumbered densely (`0..n`).

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::command::{BoardCommand, EntityKey, FieldEdit, TaskDraft};
use super::model::{BucketKey, SprintStatus, Task, TaskId};
use super::state::{BoardState, MutationEffect, TaskEdit};
use crate::error::BoardError;

/// Why a command cannot be applied to the current state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("{0} is no longer on the board")]
    Stale(String),

    #[error("{0}")]
    Invalid(String),
}

impl From<PlanError> for BoardError {
    fn from(err: PlanError) -> Self {
        match err {
            PlanError::Stale(entity) => BoardError::stale(entity),
            PlanError::Invalid(msg) => BoardError::validation(msg),
        }
    }
}

/// Forward effect plus the pre-image needed to undo it.
#[derive(Debug, Clone, PartialEq)]
pub struct Planned {
    pub effect: MutationEffect,
    pub inverse: MutationEffect,
}

fn stale_task(id: &str) -> PlanError {
    PlanError::Stale(format!("task {}", id))
}

fn existing_task<'a>(state: &'a BoardState, id: &str) -> Result<&'a Task, PlanError> {
    state.tasks.get(id).ok_or_else(|| stale_task(id))
}

fn check_sprint(state: &BoardState, sprint_id: Option<&str>) -> Result<(), PlanError> {
    match sprint_id {
        Some(id) if state.sprint(id).is_none() => Err(PlanError::Stale(format!("sprint {}", id))),
        _ => Ok(()),
    }
}

fn check_status(status: &str) -> Result<(), PlanError> {
    if status.trim().is_empty() {
        return Err(PlanError::Invalid("Status must not be empty".to_string()));
    }
    Ok(())
}

fn push_unique(keys: &mut Vec<EntityKey>, key: EntityKey) {
    if !keys.contains(&key) {
        keys.push(key);
    }
}

/// Entities a command must hold exclusively while it is pending.
pub fn entity_keys(state: &BoardState, command: &BoardCommand) -> Result<Vec<EntityKey>, PlanError> {
    let mut keys = Vec::with_capacity(3);
    match command {
        BoardCommand::MoveTask {
            task_id,
            status,
            sprint_id,
            ..
        } => {
            let task = existing_task(state, task_id)?;
            push_unique(&mut keys, EntityKey::Task(task_id.clone()));
            push_unique(&mut keys, EntityKey::Bucket(task.bucket()));
            push_unique(&mut keys, EntityKey::Bucket(BucketKey::new(sprint_id.as_deref(), status)));
        }
        BoardCommand::EditTaskField { task_id, .. } => {
            existing_task(state, task_id)?;
            keys.push(EntityKey::Task(task_id.clone()));
        }
        BoardCommand::CreateTask { draft } => {
            keys.push(EntityKey::Task(draft.id.clone()));
            keys.push(EntityKey::Bucket(BucketKey::new(draft.sprint_id.as_deref(), &draft.status)));
        }
        BoardCommand::DeleteTask { task_id } => {
            let task = existing_task(state, task_id)?;
            keys.push(EntityKey::Task(task_id.clone()));
            keys.push(EntityKey::Bucket(task.bucket()));
        }
        BoardCommand::ReorderSprint { .. } | BoardCommand::SetSprintStatus { .. } => {
            keys.push(EntityKey::SprintOrder);
        }
    }
    Ok(keys)
}

/// Compute the effect of `command` on `state` without touching it.
pub fn plan(state: &BoardState, command: &BoardCommand, now: DateTime<Utc>) -> Result<Planned, PlanError> {
    let mut planned = Planned {
        effect: MutationEffect::default(),
        inverse: MutationEffect::default(),
    };

    match command {
        BoardCommand::MoveTask {
            task_id,
            status,
            sprint_id,
            position,
        } => {
            check_status(status)?;
            let task = existing_task(state, task_id)?;
            check_sprint(state, sprint_id.as_deref())?;

            let source = task.bucket();
            let target = BucketKey::new(sprint_id.as_deref(), status);

            let mut source_order = state.bucket_order(&source);
            source_order.retain(|id| id != task_id);
            let mut target_order = if source == target {
                source_order.clone()
            } else {
                state.bucket_order(&target)
            };
            let slot = (*position as usize).min(target_order.len());
            target_order.insert(slot, task_id.clone());

            let mut moved = task.clone();
            moved.status = status.clone();
            moved.sprint_id = sprint_id.clone();
            moved.position = slot as u32;
            moved.updated_at = now;
            planned.effect.upserted_tasks.push(moved);
            planned.inverse.upserted_tasks.push(task.clone());

            if source != target {
                renumber(state, &source_order, None, &mut planned);
            }
            renumber(state, &target_order, Some(task_id), &mut planned);
        }

        BoardCommand::ReorderSprint {
            sprint_id,
            position,
        } => {
            let index = state
                .sprints
                .iter()
                .position(|s| s.id == *sprint_id)
                .ok_or_else(|| PlanError::Stale(format!("sprint {}", sprint_id)))?;

            let mut order = state.sprints.clone();
            let sprint = order.remove(index);
            let slot = (*position as usize).min(order.len());
            order.insert(slot, sprint);
            for (i, sprint) in order.iter_mut().enumerate() {
                sprint.position = i as u32;
            }
            planned.effect.sprints = Some(order);
            planned.inverse.sprints = Some(state.sprints.clone());
        }

        BoardCommand::SetSprintStatus { sprint_id, status } => {
            if state.sprint(sprint_id).is_none() {
                return Err(PlanError::Stale(format!("sprint {}", sprint_id)));
            }
            if *status == SprintStatus::Active {
                if let Some(active) = state
                    .sprints
                    .iter()
                    .find(|s| s.status == SprintStatus::Active && s.id != *sprint_id)
                {
                    return Err(PlanError::Invalid(format!(
                        "Sprint '{}' is already active; complete it before starting another",
                        active.name
                    )));
                }
            }

            let mut order = state.sprints.clone();
            if let Some(sprint) = order.iter_mut().find(|s| s.id == *sprint_id) {
                sprint.status = *status;
            }
            planned.effect.sprints = Some(order);
            planned.inverse.sprints = Some(state.sprints.clone());
        }

        BoardCommand::EditTaskField { task_id, edit } => {
            let task = existing_task(state, task_id)?;
            let previous = match edit {
                FieldEdit::Title(title) => {
                    if title.trim().is_empty() {
                        return Err(PlanError::Invalid("Task title must not be empty".to_string()));
                    }
                    FieldEdit::Title(task.title.clone())
                }
                FieldEdit::Description(_) => FieldEdit::Description(task.description.clone()),
                FieldEdit::Assignee(_) => FieldEdit::Assignee(task.assignee.clone()),
                FieldEdit::Priority(_) => FieldEdit::Priority(task.priority),
            };
            planned.effect.edits.push(TaskEdit {
                task_id: task_id.clone(),
                edit: edit.clone(),
                updated_at: now,
            });
            planned.inverse.edits.push(TaskEdit {
                task_id: task_id.clone(),
                edit: previous,
                updated_at: task.updated_at,
            });
        }

        BoardCommand::CreateTask { draft } => {
            if state.tasks.contains_key(&draft.id) {
                return Err(PlanError::Invalid(format!("Task '{}' already exists", draft.id)));
            }
            if draft.title.trim().is_empty() {
                return Err(PlanError::Invalid("Task title must not be empty".to_string()));
            }
            check_status(&draft.status)?;
            check_sprint(state, draft.sprint_id.as_deref())?;

            let target = BucketKey::new(draft.sprint_id.as_deref(), &draft.status);
            let mut order = state.bucket_order(&target);
            let slot = draft.position.map_or(order.len(), |p| (p as usize).min(order.len()));
            order.insert(slot, draft.id.clone());

            planned
                .effect
                .upserted_tasks
                .push(task_from_draft(&state.project_id, draft, slot as u32, now));
            planned.inverse.removed_tasks.push(draft.id.clone());
            renumber(state, &order, Some(&draft.id), &mut planned);
        }

        BoardCommand::DeleteTask { task_id } => {
            let task = existing_task(state, task_id)?;
            let mut order = state.bucket_order(&task.bucket());
            order.retain(|id| id != task_id);

            planned.effect.removed_tasks.push(task_id.clone());
            planned.inverse.upserted_tasks.push(task.clone());
            renumber(state, &order, None, &mut planned);
        }
    }

    Ok(planned)
}

/// Record position changes for `order`, skipping the task the command owns.
fn renumber(state: &BoardState, order: &[TaskId], skip: Option<&str>, planned: &mut Planned) {
    for (index, id) in order.iter().enumerate() {
        if Some(id.as_str()) == skip {
            continue;
        }
        let Some(current) = state.tasks.get(id) else {
            continue;
        };
        let position = index as u32;
        if current.position != position {
            planned.effect.positions.push((id.clone(), position));
            planned.inverse.positions.push((id.clone(), current.position));
        }
    }
}

fn task_from_draft(project_id: &str, draft: &TaskDraft, position: u32, now: DateTime<Utc>) -> Task {
    Task {
        id: draft.id.clone(),
        project_id: project_id.to_string(),
        title: draft.title.clone(),
        description: draft.description.clone(),
        status: draft.status.clone(),
        assignee: draft.assignee.clone(),
        sprint_id: draft.sprint_id.clone(),
        position,
        priority: draft.priority,
        updated_at: now,
    }
}
