//! Per-client sliding-window rate limiting.
//!
//! Each (endpoint, client) pair owns a bucket of admission timestamps. A
//! request is admitted when, after pruning stamps older than the endpoint's
//! window, the bucket holds fewer stamps than the endpoint's ceiling;
//! admission appends the current instant, refusal appends nothing. The
//! window therefore slides continuously instead of resetting at fixed
//! boundaries, and a refused client cannot prolong its own lockout.
//!
//! # Components
//!
//! 1. **RateWindowStore** (`window.rs`): storage trait plus the in-memory
//!    implementation; prune-check-append is atomic per key.
//!
//! 2. **SlidingWindowLimiter** (`limiter.rs`): combines scope and client
//!    into the bucket key and carries the clock.
//!
//! 3. **Sweeper** (`sweeper.rs`): background task that forgets buckets of
//!    idle clients.
//!
//! # Example Usage
//!
//! ```ignore
//! use leadgate_lib::security::rate_limit::{RateDecision, SlidingWindowLimiter};
//!
//! match limiter.admit("newsletter", "192.168.1.1", rule) {
//!     RateDecision::Admitted { remaining, .. } => {
//!         // Process request...
//!     }
//!     RateDecision::Limited { retry_after, .. } => {
//!         // Return 429 Too Many Requests with retryAfter
//!     }
//! }
//! ```
//!
//! # Configuration
//!
//! Each endpoint carries its own rule via TOML:
//!
//! ```toml
//! [endpoints.consultation]
//! rate = { max_requests = 10, window_secs = 900 }
//!
//! [rate_limit]
//! sweep_interval_secs = 300
//! ```

mod limiter;
mod sweeper;
mod window;

pub use limiter::{RateDecision, SlidingWindowLimiter};
pub use sweeper::spawn_sweeper;
pub use window::{InMemoryRateStore, RateWindowStore};
