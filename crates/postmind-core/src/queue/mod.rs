//! Bounded, rate-limited request queue and its worker loop.

pub mod limiter;
pub mod request_queue;

pub use limiter::RateLimiter;
pub use request_queue::{QueueItem, RequestHandler, RequestQueue};
