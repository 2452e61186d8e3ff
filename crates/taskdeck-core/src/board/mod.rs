//! Project board state: sprints and tasks of one project, mutated
//! optimistically and kept in step with a remote gateway.

pub mod command;
pub mod effect;
pub mod engine;
pub mod events;
pub mod model;
pub mod provider;
pub mod state;
pub mod store;

pub use command::{BoardCommand, EntityKey, FieldEdit, TaskDraft};
pub use effect::{entity_keys, plan, PlanError, Planned};
pub use engine::{EngineOptions, MutationEngine, MutationHandle, MutationReceipt, PendingMutation};
pub use events::{create_event_channel, BoardEvent, BoardEventReceiver, BoardEventSender, MutationId};
pub use model::{
    BoardSnapshot, BucketKey, Priority, ProjectId, Sprint, SprintId, SprintStatus, StatusId, Task, TaskId,
};
pub use provider::{BoardContext, BoardProvider, ContextOptions};
pub use state::{BoardState, MutationEffect, TaskEdit};
pub use store::BoardStore;
