//! Event relay — forwards Telegram channel posts about local events to subscribers.

pub mod channels;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod poller;
pub mod store;
