//! Database layer for purser
//!
//! This module provides the storage layer using SQLite with:
//! - Schema migrations
//! - A key-value table holding JSON documents

pub mod repo;
pub mod schema;

pub use repo::{Database, CHANGE_HISTORY_KEY};
