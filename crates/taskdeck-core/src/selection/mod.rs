//! Session selection: the currently open company, project or ticket.

pub mod cache;
pub mod navigation;
pub mod side_store;

pub use cache::{EntityKind, SelectionCache, SelectionEntry};
pub use navigation::{is_within_section, SectionScope};
pub use side_store::{MemorySideStore, RedisSideStore, SideStore};
