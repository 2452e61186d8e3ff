//! Optimistic mutation engine.
//!
//! A submitted command is applied to the store at once, then sent to the
//! gateway in the background. On acknowledgment the pending mutation is
//! dropped and server-assigned fields are folded in; on rejection (or
//! timeout) its inverse is applied.
//!
//! Commands that share an [`EntityKey`] run strictly in submission order: a
//! later one waits until the earlier one resolves and is then planned against
//! the board that resolution left behind. Disjoint commands run concurrently.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use super::command::{BoardCommand, EntityKey};
use super::effect::{entity_keys, PlanError};
use super::events::{BoardEvent, BoardEventSender, MutationId};
use super::model::TaskId;
use super::state::MutationEffect;
use super::store::BoardStore;
use crate::error::{BoardError, BoardResult};
use crate::gateway::{Ack, BoardGateway, Rejection};

/// Default upper bound on one gateway command.
pub const DEFAULT_MUTATION_TIMEOUT: Duration = Duration::from_secs(10);

/// Provisional ids remembered for commands that still name them.
const MAX_ALIASES: usize = 256;

#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub timeout: Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_MUTATION_TIMEOUT,
        }
    }
}

/// A command applied locally and awaiting the gateway.
#[derive(Debug, Clone)]
pub struct PendingMutation {
    pub id: MutationId,
    pub command: BoardCommand,
    pub keys: Vec<EntityKey>,
    /// Effect that restores the board to its pre-image.
    pub inverse: MutationEffect,
    pub submitted_at: DateTime<Utc>,
    /// Store generation the effect was applied in.
    pub generation: u64,
}

/// Outcome of a committed mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationReceipt {
    pub id: MutationId,
    pub command: BoardCommand,
    /// Canonical id of the task the command touched, after reconciliation.
    pub task_id: Option<TaskId>,
    /// Id the gateway assigned, as sent. Differs from `task_id` when it was
    /// not adopted (not a create, or already taken by another task).
    pub assigned_id: Option<TaskId>,
}

type Reply = oneshot::Sender<BoardResult<MutationReceipt>>;

/// Resolves once the gateway has answered for a submitted command.
#[derive(Debug)]
pub struct MutationHandle {
    id: MutationId,
    project_id: String,
    rx: oneshot::Receiver<BoardResult<MutationReceipt>>,
}

impl MutationHandle {
    pub fn id(&self) -> MutationId {
        self.id
    }

    pub async fn outcome(self) -> BoardResult<MutationReceipt> {
        match self.rx.await {
            Ok(result) => result,
            Err(_) => Err(BoardError::Disposed(self.project_id)),
        }
    }
}

struct Queued {
    id: MutationId,
    command: BoardCommand,
    reply: Reply,
}

struct InFlight {
    pending: PendingMutation,
    reply: Reply,
}

struct Dispatch {
    id: MutationId,
    command: BoardCommand,
}

#[derive(Default)]
struct MutationQueue {
    next_id: MutationId,
    in_flight: HashMap<MutationId, InFlight>,
    /// Keys held by in-flight mutations.
    held: HashSet<EntityKey>,
    waiting: VecDeque<Queued>,
    /// Provisional task id -> canonical id assigned by the gateway.
    aliases: HashMap<TaskId, TaskId>,
    /// Provisional ids in insertion order, oldest first.
    alias_order: VecDeque<TaskId>,
}

impl MutationQueue {
    fn add_alias(&mut self, provisional: &str, canonical: &str) {
        if self
            .aliases
            .insert(provisional.to_string(), canonical.to_string())
            .is_none()
        {
            self.alias_order.push_back(provisional.to_string());
        }
        while self.alias_order.len() > MAX_ALIASES {
            if let Some(oldest) = self.alias_order.pop_front() {
                self.aliases.remove(&oldest);
            }
        }
    }

    /// Drop aliases that resolve to a deleted task.
    fn forget_aliases_of(&mut self, canonical: &str) {
        self.aliases.retain(|_, to| to.as_str() != canonical);
        let aliases = &self.aliases;
        self.alias_order.retain(|from| aliases.contains_key(from));
    }

    fn resolve_alias(&self, command: &mut BoardCommand) {
        let canonical = command
            .task_id()
            .and_then(|id| self.aliases.get(id))
            .map(|canonical| (command.target().to_string(), canonical.clone()));
        if let Some((from, to)) = canonical {
            command.remap_task(&from, &to);
        }
    }
}

struct EngineInner {
    project_id: String,
    store: Arc<BoardStore>,
    gateway: Arc<dyn BoardGateway>,
    options: EngineOptions,
    events: BoardEventSender,
    queue: Mutex<MutationQueue>,
    disposed: AtomicBool,
}

impl EngineInner {
    fn lock(&self) -> MutexGuard<'_, MutationQueue> {
        self.queue.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    fn disposed_error(&self) -> BoardError {
        BoardError::Disposed(self.project_id.clone())
    }

    /// Apply every waiting command whose keys are free, in submission order.
    fn schedule(&self, queue: &mut MutationQueue) -> Vec<Dispatch> {
        let mut dispatches = Vec::new();
        let mut claimed: HashSet<EntityKey> = HashSet::new();
        let mut still_waiting = VecDeque::new();

        while let Some(queued) = queue.waiting.pop_front() {
            let keys = match self.store.with_state(|state| entity_keys(state, &queued.command)) {
                Ok(keys) => Some(keys),
                Err(PlanError::Stale(_)) => {
                    // The task may still appear (pending create) or come back (pending delete).
                    queued
                        .command
                        .task_id()
                        .map(|id| EntityKey::Task(id.to_string()))
                        .filter(|key| queue.held.contains(key) || claimed.contains(key))
                        .map(|key| vec![key])
                }
                Err(PlanError::Invalid(_)) => None,
            };

            if let Some(keys) = &keys {
                if keys.iter().any(|k| queue.held.contains(k) || claimed.contains(k)) {
                    claimed.extend(keys.iter().cloned());
                    still_waiting.push_back(queued);
                    continue;
                }
            }

            let command_label = queued.command.to_string();
            match self.store.plan_and_apply(&queued.command, Utc::now()) {
                Ok((inverse, generation)) => {
                    let keys = keys.unwrap_or_default();
                    queue.held.extend(keys.iter().cloned());
                    debug!(
                        mutation_id = queued.id,
                        command = %command_label,
                        keys = keys.len(),
                        "Mutation applied optimistically"
                    );
                    let _ = self.events.send(BoardEvent::Applied {
                        mutation_id: queued.id,
                        command: command_label,
                    });
                    dispatches.push(Dispatch {
                        id: queued.id,
                        command: queued.command.clone(),
                    });
                    queue.in_flight.insert(
                        queued.id,
                        InFlight {
                            pending: PendingMutation {
                                id: queued.id,
                                command: queued.command,
                                keys,
                                inverse,
                                submitted_at: Utc::now(),
                                generation,
                            },
                            reply: queued.reply,
                        },
                    );
                }
                Err(PlanError::Stale(entity)) => {
                    warn!(
                        project_id = %self.project_id,
                        command = %command_label,
                        entity = %entity,
                        "Command references an entity no longer on the board"
                    );
                    let _ = self.events.send(BoardEvent::StaleReference {
                        command: command_label,
                        entity: entity.clone(),
                    });
                    let _ = queued.reply.send(Err(BoardError::stale(entity)));
                }
                Err(PlanError::Invalid(msg)) => {
                    warn!(command = %command_label, reason = %msg, "Command rejected locally");
                    let _ = queued.reply.send(Err(BoardError::validation(msg)));
                }
            }
        }

        queue.waiting = still_waiting;
        dispatches
    }

    fn dispatch(inner: &Arc<EngineInner>, dispatch: Dispatch) {
        let engine = Arc::downgrade(inner);
        let gateway = Arc::clone(&inner.gateway);
        let project_id = inner.project_id.clone();
        let timeout = inner.options.timeout;

        tokio::spawn(async move {
            let sent = gateway.submit_command(&project_id, &dispatch.command);
            let result = match tokio::time::timeout(timeout, sent).await {
                Ok(result) => result,
                Err(_) => Err(Rejection::timeout(format!(
                    "no response within {}ms",
                    timeout.as_millis()
                ))),
            };
            match engine.upgrade() {
                Some(inner) => EngineInner::complete(&inner, dispatch.id, result),
                None => debug!(
                    mutation_id = dispatch.id,
                    "Gateway answered after the engine was dropped"
                ),
            }
        });
    }

    fn complete(inner: &Arc<EngineInner>, id: MutationId, result: Result<Ack, Rejection>) {
        let mut queue = inner.lock();
        let Some(InFlight { pending, reply }) = queue.in_flight.remove(&id) else {
            debug!(mutation_id = id, "Completion for a mutation no longer tracked");
            return;
        };
        for key in &pending.keys {
            queue.held.remove(key);
        }
        if inner.is_disposed() {
            let _ = reply.send(Err(inner.disposed_error()));
            return;
        }

        let command_label = pending.command.to_string();
        match result {
            Ok(ack) => {
                let task_id = inner.store.reconcile(&pending.command, &ack, pending.generation);
                if let (Some(provisional), Some(canonical)) = (pending.command.created_task(), task_id.as_deref()) {
                    if provisional != canonical {
                        queue.add_alias(provisional, canonical);
                        for waiting in queue.waiting.iter_mut() {
                            waiting.command.remap_task(provisional, canonical);
                        }
                    }
                }
                if let BoardCommand::DeleteTask { task_id } = &pending.command {
                    queue.forget_aliases_of(task_id);
                }

                info!(mutation_id = id, command = %command_label, "Mutation committed");
                let _ = inner.events.send(BoardEvent::Committed {
                    mutation_id: id,
                    command: command_label,
                });
                let _ = reply.send(Ok(MutationReceipt {
                    id,
                    command: pending.command,
                    task_id,
                    assigned_id: ack.assigned_id,
                }));
            }
            Err(rejection) => {
                let restored = inner.store.apply_local(&pending.inverse, pending.generation);
                warn!(
                    mutation_id = id,
                    command = %command_label,
                    kind = %rejection.kind,
                    reason = %rejection.message,
                    restored,
                    "Mutation rolled back"
                );
                let _ = inner.events.send(BoardEvent::RolledBack {
                    mutation_id: id,
                    command: command_label.clone(),
                    reason: rejection.to_string(),
                });
                let _ = reply.send(Err(BoardError::MutationFailed {
                    command: command_label,
                    reason: rejection,
                }));
            }
        }

        let dispatches = inner.schedule(&mut queue);
        drop(queue);
        for next in dispatches {
            EngineInner::dispatch(inner, next);
        }
    }
}

/// Cloneable handle; all clones share one queue.
#[derive(Clone)]
pub struct MutationEngine {
    inner: Arc<EngineInner>,
}

impl MutationEngine {
    pub fn new(
        store: Arc<BoardStore>,
        gateway: Arc<dyn BoardGateway>,
        events: BoardEventSender,
        options: EngineOptions,
    ) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                project_id: store.project_id().to_string(),
                store,
                gateway,
                options,
                events,
                queue: Mutex::new(MutationQueue::default()),
                disposed: AtomicBool::new(false),
            }),
        }
    }

    /// Apply `command` locally and queue it for the gateway.
    ///
    /// Must be called from within a tokio runtime.
    pub fn submit(&self, command: BoardCommand) -> MutationHandle {
        let (reply, rx) = oneshot::channel();
        let mut queue = self.inner.lock();
        let id = queue.next_id;
        queue.next_id += 1;

        let handle = MutationHandle {
            id,
            project_id: self.inner.project_id.clone(),
            rx,
        };
        if self.inner.is_disposed() {
            let _ = reply.send(Err(self.inner.disposed_error()));
            return handle;
        }

        let mut command = command;
        queue.resolve_alias(&mut command);
        debug!(mutation_id = id, command = %command, "Mutation submitted");
        queue.waiting.push_back(Queued { id, command, reply });

        let dispatches = self.inner.schedule(&mut queue);
        drop(queue);
        for dispatch in dispatches {
            EngineInner::dispatch(&self.inner, dispatch);
        }
        handle
    }

    /// In-flight mutations, oldest first.
    pub fn pending(&self) -> Vec<PendingMutation> {
        let queue = self.inner.lock();
        let mut pending: Vec<PendingMutation> =
            queue.in_flight.values().map(|f| f.pending.clone()).collect();
        pending.sort_by_key(|p| p.id);
        pending
    }

    pub fn pending_count(&self) -> usize {
        self.inner.lock().in_flight.len()
    }

    /// Commands waiting behind an in-flight mutation on a shared key.
    pub fn queued_count(&self) -> usize {
        self.inner.lock().waiting.len()
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.is_disposed()
    }

    /// Stop accepting work. Queued commands are dropped and every open
    /// handle resolves with [`BoardError::Disposed`]; late gateway answers
    /// are ignored.
    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut queue = self.inner.lock();
        let dropped = queue.waiting.len();
        let in_flight = queue.in_flight.len();
        for queued in queue.waiting.drain(..) {
            let _ = queued.reply.send(Err(self.inner.disposed_error()));
        }
        for (_, flight) in queue.in_flight.drain() {
            let _ = flight.reply.send(Err(self.inner.disposed_error()));
        }
        queue.held.clear();
        info!(
            project_id = %self.inner.project_id,
            dropped,
            in_flight,
            "Mutation engine disposed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::command::TaskDraft;
    use crate::board::events::create_event_channel;
    use crate::board::model::BoardSnapshot;
    use crate::gateway::GatewayError;
    use async_trait::async_trait;

    struct AcceptAll {
        assign: Option<String>,
    }

    #[async_trait]
    impl BoardGateway for AcceptAll {
        async fn fetch_board(&self, project_id: &str) -> Result<BoardSnapshot, GatewayError> {
            Ok(BoardSnapshot::empty(project_id))
        }

        async fn submit_command(&self, _project_id: &str, _command: &BoardCommand) -> Result<Ack, Rejection> {
            Ok(Ack {
                assigned_id: self.assign.clone(),
                updated_at: None,
            })
        }
    }

    async fn engine(assign: Option<&str>) -> (Arc<BoardStore>, MutationEngine) {
        let gateway: Arc<dyn BoardGateway> = Arc::new(AcceptAll {
            assign: assign.map(str::to_string),
        });
        let events = create_event_channel(16);
        let store = Arc::new(BoardStore::new("p1", Arc::clone(&gateway), events.clone()));
        store.load(Some(BoardSnapshot::empty("p1"))).await.unwrap();
        let engine = MutationEngine::new(Arc::clone(&store), gateway, events, EngineOptions::default());
        (store, engine)
    }

    #[tokio::test]
    async fn test_create_then_commit() {
        let (store, engine) = engine(None).await;
        let handle = engine.submit(BoardCommand::CreateTask {
            draft: TaskDraft::new("Write docs", "todo").with_id("t1"),
        });
        assert!(store.task("t1").is_some());

        let receipt = handle.outcome().await.unwrap();
        assert_eq!(receipt.task_id.as_deref(), Some("t1"));
        assert_eq!(engine.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_assigned_id_replaces_provisional() {
        let (store, engine) = engine(Some("srv-1")).await;
        let receipt = engine
            .submit(BoardCommand::CreateTask {
                draft: TaskDraft::new("Write docs", "todo").with_id("tmp"),
            })
            .outcome()
            .await
            .unwrap();
        assert_eq!(receipt.task_id.as_deref(), Some("srv-1"));
        assert!(store.task("tmp").is_none());
        assert!(store.task("srv-1").is_some());

        // Later commands naming the provisional id follow the alias.
        let receipt = engine
            .submit(BoardCommand::DeleteTask {
                task_id: "tmp".to_string(),
            })
            .outcome()
            .await
            .unwrap();
        assert_eq!(receipt.task_id.as_deref(), Some("srv-1"));
        assert!(store.task("srv-1").is_none());
    }

    #[test]
    fn test_alias_table_is_bounded() {
        let mut queue = MutationQueue::default();
        for n in 0..MAX_ALIASES + 10 {
            queue.add_alias(&format!("tmp-{}", n), &format!("srv-{}", n));
        }
        assert_eq!(queue.aliases.len(), MAX_ALIASES);
        assert_eq!(queue.alias_order.len(), MAX_ALIASES);
        assert!(!queue.aliases.contains_key("tmp-0"));
        assert_eq!(queue.aliases[&format!("tmp-{}", MAX_ALIASES + 9)], format!("srv-{}", MAX_ALIASES + 9));
    }

    #[tokio::test]
    async fn test_deleting_a_task_forgets_its_alias() {
        let (_store, engine) = engine(Some("srv-1")).await;
        engine
            .submit(BoardCommand::CreateTask {
                draft: TaskDraft::new("Write docs", "todo").with_id("tmp"),
            })
            .outcome()
            .await
            .unwrap();
        assert_eq!(engine.inner.lock().aliases.len(), 1);

        engine
            .submit(BoardCommand::DeleteTask {
                task_id: "tmp".to_string(),
            })
            .outcome()
            .await
            .unwrap();
        let queue = engine.inner.lock();
        assert!(queue.aliases.is_empty());
        assert!(queue.alias_order.is_empty());
    }

    #[tokio::test]
    async fn test_submit_after_dispose() {
        let (_store, engine) = engine(None).await;
        engine.dispose();
        let err = engine
            .submit(BoardCommand::DeleteTask {
                task_id: "t1".to_string(),
            })
            .outcome()
            .await
            .unwrap_err();
        assert!(matches!(err, BoardError::Disposed(_)));
    }

    #[tokio::test]
    async fn test_stale_reference_is_noop() {
        let (store, engine) = engine(None).await;
        let generation = store.generation();
        let err = engine
            .submit(BoardCommand::DeleteTask {
                task_id: "ghost".to_string(),
            })
            .outcome()
            .await
            .unwrap_err();
        assert!(matches!(err, BoardError::StaleReference { .. }));
        assert!(err.is_noop());
        assert_eq!(store.generation(), generation);
        assert_eq!(engine.pending_count(), 0);
    }
}
