//! Taskdeck Redis Data Layer
//!
//! Async Redis persistence for project boards (sprints and tasks) and the
//! durable side-store behind the session selection cache.

pub mod client;
pub mod queries;

pub use client::{init_pool, RedisError, RedisPool, RedisResult};
pub use queries::boards;
pub use queries::session;
