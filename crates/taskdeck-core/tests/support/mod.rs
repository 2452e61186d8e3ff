//! Scripted in-memory gateway and board fixtures shared by the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{oneshot, Notify};

use taskdeck_core::board::{BoardCommand, BoardSnapshot, Sprint, SprintStatus, Task};
use taskdeck_core::gateway::{Ack, BoardGateway, GatewayError, Rejection};

/// How the gateway answers commands.
#[derive(Clone)]
pub enum Script {
    /// Each call waits for the test to call [`ScriptedGateway::respond`].
    Manual,
    Accept,
    Reject(Rejection),
    /// Never answers.
    Hang,
}

struct Call {
    command: BoardCommand,
    reply: Option<oneshot::Sender<Result<Ack, Rejection>>>,
}

pub struct ScriptedGateway {
    script: Script,
    board: Mutex<BoardSnapshot>,
    fail_fetch: AtomicBool,
    fetches: AtomicUsize,
    calls: Mutex<Vec<Call>>,
    notify: Notify,
}

impl ScriptedGateway {
    pub fn new(script: Script, board: BoardSnapshot) -> Arc<Self> {
        Arc::new(Self {
            script,
            board: Mutex::new(board),
            fail_fetch: AtomicBool::new(false),
            fetches: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
            notify: Notify::new(),
        })
    }

    pub fn set_fetch_failure(&self, fail: bool) {
        self.fail_fetch.store(fail, Ordering::SeqCst);
    }

    pub fn set_board(&self, board: BoardSnapshot) {
        *self.board.lock().unwrap() = board;
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn commands(&self) -> Vec<BoardCommand> {
        self.calls.lock().unwrap().iter().map(|c| c.command.clone()).collect()
    }

    /// Wait (bounded) until at least `n` commands reached the gateway.
    pub async fn wait_for_calls(&self, n: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let notified = self.notify.notified();
                if self.call_count() >= n {
                    return;
                }
                notified.await;
            }
        })
        .await
        .expect("gateway never received the expected commands");
    }

    /// Answer the `index`-th command (in arrival order).
    pub fn respond(&self, index: usize, result: Result<Ack, Rejection>) {
        let reply = self.calls.lock().unwrap()[index]
            .reply
            .take()
            .expect("command already answered");
        let _ = reply.send(result);
    }

    pub fn accept(&self, index: usize) {
        self.respond(index, Ok(Ack::default()));
    }

    pub fn reject(&self, index: usize, rejection: Rejection) {
        self.respond(index, Err(rejection));
    }
}

#[async_trait]
impl BoardGateway for ScriptedGateway {
    async fn fetch_board(&self, project_id: &str) -> Result<BoardSnapshot, GatewayError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(GatewayError::Transport("connection refused".to_string()));
        }
        let board = self.board.lock().unwrap().clone();
        if board.project_id == project_id {
            Ok(board)
        } else {
            Err(GatewayError::NotFound(project_id.to_string()))
        }
    }

    async fn submit_command(&self, _project_id: &str, command: &BoardCommand) -> Result<Ack, Rejection> {
        let (tx, rx) = oneshot::channel();
        self.calls.lock().unwrap().push(Call {
            command: command.clone(),
            reply: Some(tx),
        });
        self.notify.notify_waiters();

        match &self.script {
            Script::Manual => rx
                .await
                .unwrap_or_else(|_| Err(Rejection::network("scripted reply dropped"))),
            Script::Accept => Ok(Ack::default()),
            Script::Reject(rejection) => Err(rejection.clone()),
            Script::Hang => std::future::pending().await,
        }
    }
}

pub fn ts() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-03-01T09:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

pub fn sprint(id: &str, position: u32, status: SprintStatus) -> Sprint {
    Sprint {
        id: id.to_string(),
        project_id: "p1".to_string(),
        name: format!("Sprint {}", id),
        position,
        status,
    }
}

pub fn task(id: &str, status: &str, sprint_id: Option<&str>, position: u32) -> Task {
    Task {
        id: id.to_string(),
        project_id: "p1".to_string(),
        title: format!("Task {}", id),
        description: None,
        status: status.to_string(),
        assignee: None,
        sprint_id: sprint_id.map(str::to_string),
        position,
        priority: None,
        updated_at: ts(),
    }
}

/// Backlog `todo`: t0, t3, t1, t4. Backlog `done`: t2. Sprint s1 `todo`: t5, t6.
pub fn sample_board() -> BoardSnapshot {
    BoardSnapshot {
        project_id: "p1".to_string(),
        sprints: vec![
            sprint("s1", 0, SprintStatus::Active),
            sprint("s2", 1, SprintStatus::Planned),
        ],
        tasks: vec![
            task("t0", "todo", None, 0),
            task("t3", "todo", None, 1),
            task("t1", "todo", None, 2),
            task("t4", "todo", None, 3),
            task("t2", "done", None, 0),
            task("t5", "todo", Some("s1"), 0),
            task("t6", "todo", Some("s1"), 1),
        ],
    }
}

/// Board layout without timestamps: (id, status, sprint, position), sorted by id.
pub fn layout(snapshot: &BoardSnapshot) -> Vec<(String, String, Option<String>, u32)> {
    let mut rows: Vec<_> = snapshot
        .tasks
        .iter()
        .map(|t| (t.id.clone(), t.status.clone(), t.sprint_id.clone(), t.position))
        .collect();
    rows.sort();
    rows
}

pub fn move_task(id: &str, status: &str, sprint_id: Option<&str>, position: u32) -> BoardCommand {
    BoardCommand::MoveTask {
        task_id: id.to_string(),
        status: status.to_string(),
        sprint_id: sprint_id.map(str::to_string),
        position,
    }
}
