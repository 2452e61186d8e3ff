//! Board domain models: sprints, tasks and whole-board snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use taskdeck_redis::boards::{SprintRow, TaskRow};

pub type ProjectId = String;
pub type SprintId = String;
pub type TaskId = String;
/// Column identifier, e.g. `todo`, `in_progress`, `done`.
pub type StatusId = String;

/// Sprint lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SprintStatus {
    Planned,
    Active,
    Completed,
}

impl SprintStatus {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "planned" => Some(Self::Planned),
            "active" => Some(Self::Active),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Planned => "planned",
            Self::Active => "active",
            Self::Completed => "completed",
        }
    }
}

/// Task priority levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sprint {
    pub id: SprintId,
    pub project_id: ProjectId,
    pub name: String,
    pub position: u32,
    pub status: SprintStatus,
}

impl Sprint {
    /// Create a Sprint from a storage row. Unknown statuses read as planned.
    pub fn from_row(row: SprintRow) -> Self {
        Self {
            status: SprintStatus::from_str(&row.status).unwrap_or(SprintStatus::Planned),
            id: row.id,
            project_id: row.project_id,
            name: row.name,
            position: row.position.max(0) as u32,
        }
    }

    pub fn to_row(&self) -> SprintRow {
        SprintRow {
            id: self.id.clone(),
            project_id: self.project_id.clone(),
            name: self.name.clone(),
            position: self.position as i32,
            status: self.status.as_str().to_string(),
        }
    }
}

/// The (sprint, status) pair a task is ordered within.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BucketKey {
    pub sprint_id: Option<SprintId>,
    pub status: StatusId,
}

impl BucketKey {
    pub fn new(sprint_id: Option<&str>, status: &str) -> Self {
        Self {
            sprint_id: sprint_id.map(str::to_string),
            status: status.to_string(),
        }
    }
}

impl std::fmt::Display for BucketKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.sprint_id {
            Some(sprint) => write!(f, "{}/{}", sprint, self.status),
            None => write!(f, "backlog/{}", self.status),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub project_id: ProjectId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub status: StatusId,
    #[serde(default)]
    pub assignee: Option<String>,
    /// `None` means the task sits in the backlog.
    #[serde(default)]
    pub sprint_id: Option<SprintId>,
    pub position: u32,
    #[serde(default)]
    pub priority: Option<Priority>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn bucket(&self) -> BucketKey {
        BucketKey {
            sprint_id: self.sprint_id.clone(),
            status: self.status.clone(),
        }
    }

    /// Create a Task from a storage row.
    pub fn from_row(row: TaskRow) -> Self {
        let updated_at = DateTime::parse_from_rfc3339(&row.updated_at)
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        Self {
            id: row.id,
            project_id: row.project_id,
            title: row.title,
            description: row.description,
            status: row.status,
            assignee: row.assignee,
            sprint_id: row.sprint_id,
            position: row.position.max(0) as u32,
            priority: row.priority.as_deref().and_then(Priority::from_str),
            updated_at,
        }
    }

    pub fn to_row(&self) -> TaskRow {
        TaskRow {
            id: self.id.clone(),
            project_id: self.project_id.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            status: self.status.clone(),
            assignee: self.assignee.clone(),
            sprint_id: self.sprint_id.clone(),
            position: self.position as i32,
            priority: self.priority.map(|p| p.as_str().to_string()),
            updated_at: self.updated_at.to_rfc3339(),
        }
    }
}

/// Sprints and tasks of one project, as exchanged with gateways and seeds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardSnapshot {
    pub project_id: ProjectId,
    #[serde(default)]
    pub sprints: Vec<Sprint>,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

impl BoardSnapshot {
    pub fn empty(project_id: &str) -> Self {
        Self {
            project_id: project_id.to_string(),
            sprints: Vec::new(),
            tasks: Vec::new(),
        }
    }

    pub fn from_rows(project_id: &str, sprints: Vec<SprintRow>, tasks: Vec<TaskRow>) -> Self {
        Self {
            project_id: project_id.to_string(),
            sprints: sprints.into_iter().map(Sprint::from_row).collect(),
            tasks: tasks.into_iter().map(Task::from_row).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sprints.is_empty() && self.tasks.is_empty()
    }
}
