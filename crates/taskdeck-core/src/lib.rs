//! Taskdeck Core Library
//!
//! Client-side state for project boards (optimistic, gateway-backed) and the
//! session selection cache.

pub mod board;
pub mod config;
pub mod error;
pub mod gateway;
pub mod selection;

pub use error::{BoardError, BoardResult};
