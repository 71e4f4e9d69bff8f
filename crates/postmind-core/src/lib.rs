//! Session services and repository trait definitions for Postmind.
//!
//! This crate defines the "ports" (repository and transport traits) that the
//! infrastructure layer implements, plus the in-memory services built on
//! them: the connection registry, the bounded request queue, the chat
//! history store, the session validator/sweeper, and the draft store. It
//! depends only on `postmind-types` -- never on `postmind-infra` or any
//! database/IO crate.

pub mod chat;
pub mod connection;
pub mod draft;
pub mod queue;
