//! Durable chat state: the repository port, the history store, and session
//! validity/cleanup.

pub mod history;
pub mod repository;
pub mod validator;

pub use history::ChatHistoryStore;
pub use repository::ChatRepository;
pub use validator::{is_valid, SessionSweeper};
