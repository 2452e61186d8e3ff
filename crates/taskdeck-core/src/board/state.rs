//! Normalized in-memory board and the effects applied to it.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use super::command::FieldEdit;
use super::model::{BoardSnapshot, BucketKey, Sprint, Task, TaskId};

/// A single-field patch on an existing task.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskEdit {
    pub task_id: TaskId,
    pub edit: FieldEdit,
    pub updated_at: DateTime<Utc>,
}

impl TaskEdit {
    fn apply_to(&self, task: &mut Task) {
        match &self.edit {
            FieldEdit::Title(title) => task.title = title.clone(),
            FieldEdit::Description(description) => task.description = description.clone(),
            FieldEdit::Assignee(assignee) => task.assignee = assignee.clone(),
            FieldEdit::Priority(priority) => task.priority = *priority,
        }
        task.updated_at = self.updated_at;
    }
}

/// A set of concrete changes to a [`BoardState`].
///
/// Both the optimistic forward change and its inverse (the pre-image) are
/// expressed this way, so rollback is just applying the inverse.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MutationEffect {
    pub removed_tasks: Vec<TaskId>,
    pub upserted_tasks: Vec<Task>,
    /// Single-field patches; they never touch positions.
    pub edits: Vec<TaskEdit>,
    /// Position-only updates for neighbours renumbered by the change.
    pub positions: Vec<(TaskId, u32)>,
    /// Full replacement of the sprint list, when sprints were touched.
    pub sprints: Option<Vec<Sprint>>,
}

impl MutationEffect {
    /// Ids of every task this effect writes.
    pub fn touched_tasks(&self) -> impl Iterator<Item = &str> {
        self.upserted_tasks
            .iter()
            .map(|t| t.id.as_str())
            .chain(self.edits.iter().map(|e| e.task_id.as_str()))
            .chain(self.positions.iter().map(|(id, _)| id.as_str()))
    }
}

#[derive(Debug, Clone, Default)]
pub struct BoardState {
    pub project_id: String,
    /// Kept ordered by position.
    pub sprints: Vec<Sprint>,
    pub tasks: HashMap<TaskId, Task>,
}

impl BoardState {
    pub fn empty(project_id: &str) -> Self {
        Self {
            project_id: project_id.to_string(),
            sprints: Vec::new(),
            tasks: HashMap::new(),
        }
    }

    pub fn from_snapshot(snapshot: BoardSnapshot) -> Self {
        let mut sprints = snapshot.sprints;
        sprints.sort_by_key(|s| s.position);
        Self {
            project_id: snapshot.project_id,
            sprints,
            tasks: snapshot
                .tasks
                .into_iter()
                .map(|t| (t.id.clone(), t))
                .collect(),
        }
    }

    /// Sprints in order, tasks sorted by id, so equal boards compare equal.
    pub fn to_snapshot(&self) -> BoardSnapshot {
        let mut tasks: Vec<Task> = self.tasks.values().cloned().collect();
        tasks.sort_by(|a, b| a.id.cmp(&b.id));
        BoardSnapshot {
            project_id: self.project_id.clone(),
            sprints: self.sprints.clone(),
            tasks,
        }
    }

    pub fn sprint(&self, id: &str) -> Option<&Sprint> {
        self.sprints.iter().find(|s| s.id == id)
    }

    /// Task ids in a bucket, ordered by position (ties broken by id).
    pub fn bucket_order(&self, bucket: &BucketKey) -> Vec<TaskId> {
        let mut members: Vec<&Task> = self
            .tasks
            .values()
            .filter(|t| t.sprint_id == bucket.sprint_id && t.status == bucket.status)
            .collect();
        members.sort_by(|a, b| a.position.cmp(&b.position).then_with(|| a.id.cmp(&b.id)));
        members.into_iter().map(|t| t.id.clone()).collect()
    }

    pub fn apply(&mut self, effect: &MutationEffect) {
        for id in &effect.removed_tasks {
            self.tasks.remove(id);
        }
        for task in &effect.upserted_tasks {
            self.tasks.insert(task.id.clone(), task.clone());
        }
        for edit in &effect.edits {
            if let Some(task) = self.tasks.get_mut(&edit.task_id) {
                edit.apply_to(task);
            }
        }
        for (id, position) in &effect.positions {
            if let Some(task) = self.tasks.get_mut(id) {
                task.position = *position;
            }
        }
        if let Some(sprints) = &effect.sprints {
            self.sprints = sprints.clone();
            self.sprints.sort_by_key(|s| s.position);
        }
    }

    /// Move a task to a new id, keeping its place on the board. Refused when
    /// `to` already names another task.
    pub fn rename_task(&mut self, from: &str, to: &str) -> bool {
        if self.tasks.contains_key(to) {
            return false;
        }
        match self.tasks.remove(from) {
            Some(mut task) => {
                task.id = to.to_string();
                self.tasks.insert(task.id.clone(), task);
                true
            }
            None => false,
        }
    }
}
