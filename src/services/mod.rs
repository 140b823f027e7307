//! External service module
//!
//! This module contains the persistence gateway contract, the bundled
//! in-memory backend and the local snapshot fallback.

pub mod gateway;
pub mod memory;
pub mod snapshot;

// Re-export main types
pub use gateway::{ChangeEvent, ChangeFeed, ChangeKind, GatewayError, PersistenceGateway};
pub use memory::MemoryGateway;
pub use snapshot::{SnapshotError, SnapshotStore};
