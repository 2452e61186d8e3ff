//! Board context: the store and engine of one mounted project behind a
//! single shared handle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use super::command::BoardCommand;
use super::engine::{EngineOptions, MutationEngine, MutationHandle};
use super::events::{create_event_channel, BoardEvent, BoardEventReceiver, BoardEventSender};
use super::model::BoardSnapshot;
use super::store::BoardStore;
use crate::config::TaskdeckConfig;
use crate::error::{BoardError, BoardResult};
use crate::gateway::BoardGateway;

/// Settings shared by every context a provider mounts.
#[derive(Debug, Clone)]
pub struct ContextOptions {
    pub mutation_timeout: Duration,
    pub event_capacity: usize,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            mutation_timeout: super::engine::DEFAULT_MUTATION_TIMEOUT,
            event_capacity: 100,
        }
    }
}

impl From<&TaskdeckConfig> for ContextOptions {
    fn from(config: &TaskdeckConfig) -> Self {
        Self {
            mutation_timeout: config.mutation_timeout(),
            event_capacity: config.event_capacity,
        }
    }
}

struct ContextInner {
    project_id: String,
    store: Arc<BoardStore>,
    engine: MutationEngine,
    events: BoardEventSender,
    disposed: AtomicBool,
}

/// Shared handle to one project's board. Clones refer to the same board.
#[derive(Clone)]
pub struct BoardContext {
    inner: Arc<ContextInner>,
}

impl BoardContext {
    /// Build a context and load its board, from `initial_data` when given.
    ///
    /// A failed fetch does not fail the mount: the board stays empty with
    /// [`BoardStore::last_error`] set and a `LoadFailed` event sent.
    pub async fn mount(
        project_id: &str,
        initial_data: Option<BoardSnapshot>,
        gateway: Arc<dyn BoardGateway>,
        options: &ContextOptions,
    ) -> BoardResult<Self> {
        let events = create_event_channel(options.event_capacity);
        let store = Arc::new(BoardStore::new(project_id, Arc::clone(&gateway), events.clone()));
        let engine = MutationEngine::new(
            Arc::clone(&store),
            gateway,
            events.clone(),
            EngineOptions {
                timeout: options.mutation_timeout,
            },
        );

        match store.load(initial_data).await {
            Ok(()) | Err(BoardError::Load { .. }) => {}
            Err(err) => return Err(err),
        }
        info!(project_id = %project_id, loaded = store.is_loaded(), "Board context mounted");

        Ok(Self {
            inner: Arc::new(ContextInner {
                project_id: project_id.to_string(),
                store,
                engine,
                events,
                disposed: AtomicBool::new(false),
            }),
        })
    }

    pub fn project_id(&self) -> &str {
        &self.inner.project_id
    }

    pub fn store(&self) -> &BoardStore {
        &self.inner.store
    }

    pub fn engine(&self) -> &MutationEngine {
        &self.inner.engine
    }

    pub fn submit(&self, command: BoardCommand) -> MutationHandle {
        self.inner.engine.submit(command)
    }

    /// Refetch the board from the gateway.
    pub async fn reload(&self) -> BoardResult<()> {
        if self.is_disposed() {
            return Err(BoardError::Disposed(self.inner.project_id.clone()));
        }
        self.inner.store.load(None).await
    }

    pub fn subscribe(&self) -> BoardEventReceiver {
        self.inner.events.subscribe()
    }

    pub fn pending_count(&self) -> usize {
        self.inner.engine.pending_count()
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    /// Same board, same handle.
    pub fn ptr_eq(&self, other: &BoardContext) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.engine.dispose();
        self.inner.store.clear();
        let _ = self.inner.events.send(BoardEvent::Disposed {
            project_id: self.inner.project_id.clone(),
        });
        info!(project_id = %self.inner.project_id, "Board context disposed");
    }
}

/// Owns the context of the currently mounted project.
pub struct BoardProvider {
    gateway: Arc<dyn BoardGateway>,
    options: ContextOptions,
    current: tokio::sync::Mutex<Option<BoardContext>>,
}

impl BoardProvider {
    pub fn new(gateway: Arc<dyn BoardGateway>, options: ContextOptions) -> Self {
        Self {
            gateway,
            options,
            current: tokio::sync::Mutex::new(None),
        }
    }

    /// Mount `project_id`. The mounted context is returned as is when the
    /// project is unchanged (`initial_data` is then ignored); otherwise the
    /// old context is disposed and a fresh one built.
    pub async fn mount(&self, project_id: &str, initial_data: Option<BoardSnapshot>) -> BoardResult<BoardContext> {
        let mut current = self.current.lock().await;
        if let Some(context) = current.as_ref() {
            if context.project_id() == project_id && !context.is_disposed() {
                debug!(project_id = %project_id, "Board context already mounted");
                return Ok(context.clone());
            }
        }
        if let Some(previous) = current.take() {
            previous.dispose();
        }

        let context = BoardContext::mount(project_id, initial_data, Arc::clone(&self.gateway), &self.options).await?;
        *current = Some(context.clone());
        Ok(context)
    }

    pub async fn current(&self) -> Option<BoardContext> {
        self.current.lock().await.clone()
    }

    pub async fn unmount(&self) {
        if let Some(context) = self.current.lock().await.take() {
            context.dispose();
        }
    }
}
