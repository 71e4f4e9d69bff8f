//! Versioned per-session draft state.

pub mod store;

pub use store::{DraftStats, DraftStore};
