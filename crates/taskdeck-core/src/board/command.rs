//! Board commands and the entity keys they serialize on.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::model::{BucketKey, Priority, SprintId, SprintStatus, StatusId, TaskId};

/// A single board mutation, as sent to the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BoardCommand {
    MoveTask {
        task_id: TaskId,
        status: StatusId,
        sprint_id: Option<SprintId>,
        position: u32,
    },
    ReorderSprint {
        sprint_id: SprintId,
        position: u32,
    },
    EditTaskField {
        task_id: TaskId,
        edit: FieldEdit,
    },
    CreateTask {
        draft: TaskDraft,
    },
    DeleteTask {
        task_id: TaskId,
    },
    SetSprintStatus {
        sprint_id: SprintId,
        status: SprintStatus,
    },
}

/// Editable non-positional task fields. Status and sprint changes go
/// through [`BoardCommand::MoveTask`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum FieldEdit {
    Title(String),
    Description(Option<String>),
    Assignee(Option<String>),
    Priority(Option<Priority>),
}

impl FieldEdit {
    pub fn field_name(&self) -> &'static str {
        match self {
            Self::Title(_) => "title",
            Self::Description(_) => "description",
            Self::Assignee(_) => "assignee",
            Self::Priority(_) => "priority",
        }
    }
}

/// A task to be created. The id is provisional until the gateway acks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDraft {
    pub id: TaskId,
    pub title: String,
    pub status: StatusId,
    #[serde(default)]
    pub sprint_id: Option<SprintId>,
    /// Defaults to the end of the bucket.
    #[serde(default)]
    pub position: Option<u32>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub assignee: Option<String>,
    #[serde(default)]
    pub priority: Option<Priority>,
}

impl TaskDraft {
    pub fn new(title: &str, status: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.to_string(),
            status: status.to_string(),
            sprint_id: None,
            position: None,
            description: None,
            assignee: None,
            priority: None,
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = id.to_string();
        self
    }

    pub fn in_sprint(mut self, sprint_id: &str) -> Self {
        self.sprint_id = Some(sprint_id.to_string());
        self
    }

    pub fn at_position(mut self, position: u32) -> Self {
        self.position = Some(position);
        self
    }

    pub fn assigned_to(mut self, assignee: &str) -> Self {
        self.assignee = Some(assignee.to_string());
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }
}

/// What a pending mutation holds exclusively until it resolves.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKey {
    Task(TaskId),
    Bucket(BucketKey),
    /// Positions and statuses of all sprints in the project.
    SprintOrder,
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Task(id) => write!(f, "task {}", id),
            Self::Bucket(bucket) => write!(f, "bucket {}", bucket),
            Self::SprintOrder => write!(f, "sprint order"),
        }
    }
}

impl BoardCommand {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MoveTask { .. } => "move-task",
            Self::ReorderSprint { .. } => "reorder-sprint",
            Self::EditTaskField { .. } => "edit-task-field",
            Self::CreateTask { .. } => "create-task",
            Self::DeleteTask { .. } => "delete-task",
            Self::SetSprintStatus { .. } => "set-sprint-status",
        }
    }

    /// Id of the task or sprint the command is about.
    pub fn target(&self) -> &str {
        match self {
            Self::MoveTask { task_id, .. }
            | Self::EditTaskField { task_id, .. }
            | Self::DeleteTask { task_id } => task_id,
            Self::CreateTask { draft } => &draft.id,
            Self::ReorderSprint { sprint_id, .. } | Self::SetSprintStatus { sprint_id, .. } => {
                sprint_id
            }
        }
    }

    /// The task id this command brings into existence, if any.
    pub fn created_task(&self) -> Option<&str> {
        match self {
            Self::CreateTask { draft } => Some(&draft.id),
            _ => None,
        }
    }

    /// Task id the command touches, if it is a task command.
    pub fn task_id(&self) -> Option<&str> {
        match self {
            Self::ReorderSprint { .. } | Self::SetSprintStatus { .. } => None,
            _ => Some(self.target()),
        }
    }

    /// Rewrite references to a provisional task id with its canonical id.
    pub fn remap_task(&mut self, from: &str, to: &str) {
        let slot = match self {
            Self::MoveTask { task_id, .. }
            | Self::EditTaskField { task_id, .. }
            | Self::DeleteTask { task_id } => task_id,
            Self::CreateTask { draft } => &mut draft.id,
            Self::ReorderSprint { .. } | Self::SetSprintStatus { .. } => return,
        };
        if slot.as_str() == from {
            *slot = to.to_string();
        }
    }
}

impl fmt::Display for BoardCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MoveTask {
                task_id,
                status,
                sprint_id,
                position,
            } => write!(
                f,
                "move-task({}, {}, {}, {})",
                task_id,
                status,
                sprint_id.as_deref().unwrap_or("backlog"),
                position
            ),
            Self::ReorderSprint {
                sprint_id,
                position,
            } => write!(f, "reorder-sprint({}, {})", sprint_id, position),
            Self::EditTaskField { task_id, edit } => {
                write!(f, "edit-task-field({}, {})", task_id, edit.field_name())
            }
            Self::CreateTask { draft } => write!(f, "create-task({})", draft.id),
            Self::DeleteTask { task_id } => write!(f, "delete-task({})", task_id),
            Self::SetSprintStatus { sprint_id, status } => {
                write!(f, "set-sprint-status({}, {})", sprint_id, status.as_str())
            }
        }
    }
}
