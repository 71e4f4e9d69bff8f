//! Shared domain types for the Postmind session core.
//!
//! This crate contains the types used across the session backbone:
//! sessions, chat message records, drafts, outbound wire events, runtime
//! configuration, and their associated error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod config;
pub mod draft;
pub mod error;
pub mod event;
pub mod session;
