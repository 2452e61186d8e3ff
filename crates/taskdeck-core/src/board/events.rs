//! Broadcast channel for board change notifications.
//!
//! Every consumer of a board context can subscribe and re-read the store
//! when something changes, instead of polling.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Identifier of a mutation within one engine.
pub type MutationId = u64;

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(tag = "type", content = "data")]
pub enum BoardEvent {
    /// A snapshot replaced the board.
    Loaded { project_id: String, sprints: usize, tasks: usize },
    /// Fetching the board failed; the store is empty.
    LoadFailed { project_id: String, reason: String },
    /// A command was applied optimistically and sent to the gateway.
    Applied { mutation_id: MutationId, command: String },
    /// The gateway accepted a command.
    Committed { mutation_id: MutationId, command: String },
    /// The gateway rejected a command and its effect was undone.
    RolledBack { mutation_id: MutationId, command: String, reason: String },
    /// A command named something no longer on the board and was dropped.
    StaleReference { command: String, entity: String },
    /// The board context was unmounted.
    Disposed { project_id: String },
}

/// Type alias for the broadcast sender.
pub type BoardEventSender = broadcast::Sender<BoardEvent>;

/// Type alias for the broadcast receiver.
pub type BoardEventReceiver = broadcast::Receiver<BoardEvent>;

/// Create a new event channel with the given capacity.
pub fn create_event_channel(capacity: usize) -> BoardEventSender {
    let (tx, _rx) = broadcast::channel(capacity.max(1));
    tx
}
