//! Board queries (sprints and tasks) for Redis.
//!
//! Layout per project:
//! - `td:{project}:sprint:{id}` hash, field `data` holds the JSON row
//! - `td:{project}:sprints:all` set of sprint ids
//! - `td:{project}:task:{id}` hash, fields `data` and `status`
//! - `td:{project}:tasks:all` set of task ids

use crate::client::{RedisPool, RedisResult};
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SprintRow {
    pub id: String,
    pub project_id: String,
    pub name: String,
    pub position: i32,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRow {
    pub id: String,
    pub project_id: String,
    pub title: String,
    pub description: Option<String>,
    pub status: String,
    pub assignee: Option<String>,
    pub sprint_id: Option<String>,
    pub position: i32,
    pub priority: Option<String>,
    pub updated_at: String,
}

/// A batch of row changes written atomically by [`apply_changes`].
#[derive(Debug, Clone, Default)]
pub struct BoardChanges {
    pub tasks: Vec<TaskRow>,
    pub removed_tasks: Vec<String>,
    pub sprints: Vec<SprintRow>,
}

impl BoardChanges {
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty() && self.removed_tasks.is_empty() && self.sprints.is_empty()
    }
}

fn sprint_key(project_id: &str, id: &str) -> String {
    format!("td:{}:sprint:{}", project_id, id)
}

fn sprints_set(project_id: &str) -> String {
    format!("td:{}:sprints:all", project_id)
}

fn task_key(project_id: &str, id: &str) -> String {
    format!("td:{}:task:{}", project_id, id)
}

fn tasks_set(project_id: &str) -> String {
    format!("td:{}:tasks:all", project_id)
}

// ─────────────────────────────── SPRINTS ───────────────────────────────

pub async fn list_sprints(pool: &RedisPool, project_id: &str) -> RedisResult<Vec<SprintRow>> {
    let mut conn = pool.clone();
    let ids: Vec<String> = conn.smembers(sprints_set(project_id)).await?;
    let mut sprints = Vec::with_capacity(ids.len());
    for id in ids {
        let json: Option<String> = conn.hget(sprint_key(project_id, &id), "data").await?;
        if let Some(j) = json {
            match serde_json::from_str::<SprintRow>(&j) {
                Ok(row) => sprints.push(row),
                Err(e) => tracing::warn!(sprint_id = %id, error = %e, "Skipping unreadable sprint row"),
            }
        }
    }
    sprints.sort_by_key(|s| s.position);
    Ok(sprints)
}

// ─────────────────────────────── TASKS ─────────────────────────────────

pub async fn list_tasks(pool: &RedisPool, project_id: &str) -> RedisResult<Vec<TaskRow>> {
    let mut conn = pool.clone();
    let ids: Vec<String> = conn.smembers(tasks_set(project_id)).await?;
    let mut tasks = Vec::with_capacity(ids.len());
    for id in ids {
        let json: Option<String> = conn.hget(task_key(project_id, &id), "data").await?;
        if let Some(j) = json {
            match serde_json::from_str::<TaskRow>(&j) {
                Ok(row) => tasks.push(row),
                Err(e) => tracing::warn!(task_id = %id, error = %e, "Skipping unreadable task row"),
            }
        }
    }
    Ok(tasks)
}

// ─────────────────────────────── BATCHES ───────────────────────────────

/// Write a batch of board changes in a single MULTI/EXEC transaction.
pub async fn apply_changes(
    pool: &RedisPool,
    project_id: &str,
    changes: &BoardChanges,
) -> RedisResult<()> {
    if changes.is_empty() {
        return Ok(());
    }

    let mut pipe = redis::pipe();
    pipe.atomic();

    for id in &changes.removed_tasks {
        pipe.del(task_key(project_id, id)).ignore();
        pipe.srem(tasks_set(project_id), id).ignore();
    }
    for row in &changes.tasks {
        let key = task_key(project_id, &row.id);
        pipe.hset(&key, "data", serde_json::to_string(row)?).ignore();
        pipe.hset(&key, "status", &row.status).ignore();
        pipe.sadd(tasks_set(project_id), &row.id).ignore();
    }
    for row in &changes.sprints {
        pipe.hset(sprint_key(project_id, &row.id), "data", serde_json::to_string(row)?)
            .ignore();
        pipe.sadd(sprints_set(project_id), &row.id).ignore();
    }

    let mut conn = pool.clone();
    let _: () = pipe.query_async(&mut conn).await?;
    tracing::debug!(
        project_id = %project_id,
        tasks = changes.tasks.len(),
        removed = changes.removed_tasks.len(),
        sprints = changes.sprints.len(),
        "Board changes persisted"
    );
    Ok(())
}

/// Replace a project's whole board with the given rows.
pub async fn replace_board(
    pool: &RedisPool,
    project_id: &str,
    sprints: &[SprintRow],
    tasks: &[TaskRow],
) -> RedisResult<()> {
    let mut conn = pool.clone();
    let old_sprints: Vec<String> = conn.smembers(sprints_set(project_id)).await?;
    let old_tasks: Vec<String> = conn.smembers(tasks_set(project_id)).await?;

    let mut pipe = redis::pipe();
    pipe.atomic();
    for id in &old_sprints {
        pipe.del(sprint_key(project_id, id)).ignore();
    }
    for id in &old_tasks {
        pipe.del(task_key(project_id, id)).ignore();
    }
    pipe.del(sprints_set(project_id)).ignore();
    pipe.del(tasks_set(project_id)).ignore();
    let _: () = pipe.query_async(&mut conn).await?;

    apply_changes(
        pool,
        project_id,
        &BoardChanges {
            tasks: tasks.to_vec(),
            removed_tasks: Vec::new(),
            sprints: sprints.to_vec(),
        },
    )
    .await
}
