//! Inbox Agent — email triage and auto-reply service.

pub mod api;
pub mod classify;
pub mod compose;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod mailbox;
pub mod mode;
pub mod poller;
pub mod store;

pub use error::{Error, Result};
