//! Submission persistence.
//!
//! The gate never talks to a concrete database; handlers and the duplicate
//! guard go through [`SubmissionStore`]. The in-memory implementation backs
//! the default build and the test suite, and the trait is the seam where a
//! real document store plugs in.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Collections the gate persists into, one per lead-capture flow.
pub const COLLECTIONS: [&str; 4] =
    ["newsletter_subscribers", "contact_messages", "roi_reports", "consultation_requests"];

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Unknown collection: {0}")]
    UnknownCollection(String),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// One persisted submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredSubmission {
    /// Normalized submitter email, the dedup key
    pub email: String,
    /// Creation stamp, milliseconds since the Unix epoch
    pub created_at_ms: u64,
    /// Full sanitized payload as received
    pub fields: Value,
}

/// Async document-store seam.
///
/// All operations address a named collection and fail with [`StoreError`];
/// an unknown collection is an error, not an empty result, so admin queries
/// can distinguish "nothing there" from a typo.
#[async_trait]
pub trait SubmissionStore: Send + Sync {
    /// Newest record for `email` created at or after `since_ms`.
    ///
    /// `since_ms = 0` matches any age.
    async fn find_recent(
        &self,
        collection: &str,
        email: &str,
        since_ms: u64,
    ) -> Result<Option<StoredSubmission>, StoreError>;

    async fn insert(
        &self,
        collection: &str,
        submission: StoredSubmission,
    ) -> Result<(), StoreError>;

    /// Delete every record for `email`; returns how many went away.
    async fn delete_where(&self, collection: &str, email: &str) -> Result<usize, StoreError>;

    async fn list(&self, collection: &str) -> Result<Vec<StoredSubmission>, StoreError>;
}
