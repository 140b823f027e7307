//! Background tasks module
//!
//! This module contains the tasks that run alongside the HTTP server: one
//! ticker per running timer, the change-feed reconciler and the persistence
//! writer.

pub mod persistence;
pub mod reconciler;
pub mod ticker;

// Re-export main functions
pub use persistence::persistence_task;
pub use reconciler::{reconciler_task, Reconciliation};
pub use ticker::{ticker_task, TickerRegistry};
