//! Modules layer - Infrastructure components for external integrations
//!
//! Contains the retention store (database) and the physical blob stores.

pub mod retention_store;
pub mod storage;
