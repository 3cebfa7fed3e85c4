//! Utility modules for safereads-api

pub mod retry;

pub use retry::{retry_on_rate_limit, RateLimitSignal};
