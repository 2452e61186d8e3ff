//! Query modules for the entities Taskdeck keeps in Redis.

pub mod boards;
pub mod session;
