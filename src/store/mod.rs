//! Persistence layer — libSQL-backed storage for subscriptions, offsets and captured posts.

pub mod libsql_backend;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use traits::{ChannelPost, Database};
