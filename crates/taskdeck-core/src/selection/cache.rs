//! In-memory selection cache with a write-behind durable copy.
//!
//! Reads only ever see memory. Durable writes go through a single worker
//! task in the order they were issued, so the side-store converges to the
//! last in-memory state once the queue drains.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use super::side_store::SideStore;

/// What kind of entity a selection slot holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Company,
    Project,
    Ticket,
}

impl EntityKind {
    pub const ALL: [EntityKind; 3] = [Self::Company, Self::Project, Self::Ticket];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Company => "company",
            Self::Project => "project",
            Self::Ticket => "ticket",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "company" => Some(Self::Company),
            "project" => Some(Self::Project),
            "ticket" => Some(Self::Ticket),
            _ => None,
        }
    }

    /// Side-store key of this slot.
    pub fn durable_key(&self) -> String {
        format!("selection:{}", self.as_str())
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionEntry {
    pub kind: EntityKind,
    pub entity_id: String,
    pub entered_at: DateTime<Utc>,
}

enum DurableOp {
    Put { key: String, value: String },
    Remove { key: String },
    Flush(oneshot::Sender<()>),
}

pub struct SelectionCache {
    entries: RwLock<HashMap<EntityKind, SelectionEntry>>,
    side_store: Arc<dyn SideStore>,
    writes: mpsc::UnboundedSender<DurableOp>,
}

impl SelectionCache {
    /// Create the cache and start its durable writer.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(side_store: Arc<dyn SideStore>) -> Self {
        let (writes, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_writer(Arc::clone(&side_store), rx));
        Self {
            entries: RwLock::new(HashMap::new()),
            side_store,
            writes,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<EntityKind, SelectionEntry>> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<EntityKind, SelectionEntry>> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }

    fn enqueue(&self, op: DurableOp) {
        if self.writes.send(op).is_err() {
            warn!("Selection writer is gone; durable copy not updated");
        }
    }

    /// Make `entity_id` the current selection of its kind.
    pub fn select(&self, kind: EntityKind, entity_id: &str) -> SelectionEntry {
        let entry = SelectionEntry {
            kind,
            entity_id: entity_id.to_string(),
            entered_at: Utc::now(),
        };
        // Enqueue under the lock so durable order matches memory order.
        let mut entries = self.write();
        entries.insert(kind, entry.clone());
        match serde_json::to_string(&entry) {
            Ok(value) => self.enqueue(DurableOp::Put {
                key: kind.durable_key(),
                value,
            }),
            Err(e) => warn!(kind = %kind, error = %e, "Failed to encode selection"),
        }
        drop(entries);

        debug!(kind = %kind, entity_id = %entity_id, "Selection set");
        entry
    }

    /// Drop the selection of `kind`, returning what was there.
    pub fn clear(&self, kind: EntityKind) -> Option<SelectionEntry> {
        let mut entries = self.write();
        let previous = entries.remove(&kind);
        self.enqueue(DurableOp::Remove {
            key: kind.durable_key(),
        });
        drop(entries);

        if let Some(entry) = &previous {
            info!(kind = %kind, entity_id = %entry.entity_id, "Selection cleared");
        }
        previous
    }

    pub fn current(&self, kind: EntityKind) -> Option<SelectionEntry> {
        self.read().get(&kind).cloned()
    }

    pub fn current_id(&self, kind: EntityKind) -> Option<String> {
        self.read().get(&kind).map(|e| e.entity_id.clone())
    }

    /// Wait until every durable write issued so far has been attempted.
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        self.enqueue(DurableOp::Flush(done));
        let _ = wait.await;
    }

    /// Load the durable entry of `kind` into memory if the slot is empty.
    pub async fn restore(&self, kind: EntityKind) -> Option<SelectionEntry> {
        self.flush().await;
        if let Some(entry) = self.current(kind) {
            return Some(entry);
        }

        let raw = match self.side_store.get(&kind.durable_key()).await {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(kind = %kind, error = %e, "Failed to read durable selection");
                return None;
            }
        };
        let entry: SelectionEntry = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(kind = %kind, error = %e, "Ignoring unreadable durable selection");
                return None;
            }
        };
        if entry.kind != kind {
            warn!(kind = %kind, stored = %entry.kind, "Durable selection has the wrong kind");
            return None;
        }

        let mut entries = self.write();
        let restored = entries.entry(kind).or_insert(entry).clone();
        debug!(kind = %kind, entity_id = %restored.entity_id, "Selection restored");
        Some(restored)
    }
}

async fn run_writer(side_store: Arc<dyn SideStore>, mut rx: mpsc::UnboundedReceiver<DurableOp>) {
    while let Some(op) = rx.recv().await {
        match op {
            DurableOp::Put { key, value } => {
                if let Err(e) = side_store.put(&key, &value).await {
                    warn!(key = %key, error = %e, "Durable selection write failed");
                }
            }
            DurableOp::Remove { key } => {
                if let Err(e) = side_store.remove(&key).await {
                    warn!(key = %key, error = %e, "Durable selection removal failed");
                }
            }
            DurableOp::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
    debug!("Selection writer stopped");
}
