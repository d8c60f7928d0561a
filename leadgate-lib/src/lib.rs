#![forbid(unsafe_code)]

pub mod admission;
pub mod clock;
pub mod config;
pub mod dedup;
pub mod error;
pub mod security;
pub mod server;
pub mod store;
pub mod telemetry;

pub use admission::{Gatekeeper, Rejection};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{load_from_path, Config};
pub use dedup::{normalize_key, DedupPolicy, DedupVerdict, DuplicateGuard};
pub use error::{GateError, Result};
pub use security::rate_limit::{
    spawn_sweeper, InMemoryRateStore, RateWindowStore, SlidingWindowLimiter,
};
pub use security::{SecurityPolicy, Sanitizer};
pub use server::run;
pub use store::{MemoryStore, StoredSubmission, SubmissionStore};
