//! Duplicate-submission guard.
//!
//! Both flavors of duplicate detection run through one check: the newsletter
//! path asks "was this email ever subscribed" (permanent), the consultation
//! path asks "did this email book inside the trailing window" (windowed).
//! What a duplicate MEANS (idempotent success vs. 409 conflict) and what a
//! store failure means (fail open vs. fail closed) is the caller's decision;
//! the guard only answers fresh-or-duplicate.

use std::sync::Arc;
use std::time::Duration;

use crate::config::DedupRule;
use crate::store::{StoreError, SubmissionStore};

/// How far back a submission key is held against new submissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupPolicy {
    /// A record of any age is a duplicate.
    Permanent,
    /// Only records inside the trailing window count.
    Windowed(Duration),
}

impl From<DedupRule> for DedupPolicy {
    fn from(rule: DedupRule) -> Self {
        match rule {
            DedupRule::Permanent { .. } => DedupPolicy::Permanent,
            DedupRule::Windowed { window_hours, .. } => {
                DedupPolicy::Windowed(Duration::from_secs(window_hours * 3600))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupVerdict {
    Fresh,
    Duplicate,
}

/// Normalize a dedup key: trimmed, lower-cased.
///
/// `"  Ada@Example.COM "` and `"ada@example.com"` are the same submitter.
pub fn normalize_key(raw: &str) -> String {
    raw.trim().to_lowercase()
}

pub struct DuplicateGuard {
    store: Arc<dyn SubmissionStore>,
}

impl DuplicateGuard {
    pub fn new(store: Arc<dyn SubmissionStore>) -> Self {
        Self { store }
    }

    /// Ask whether `key` already submitted to `collection` under `policy`.
    ///
    /// An empty key (after normalization) is never a duplicate; the field
    /// validation downstream owns rejecting it. Store failures propagate so
    /// the caller can apply the endpoint's failure policy.
    pub async fn check(
        &self,
        collection: &str,
        key: &str,
        policy: DedupPolicy,
        now_ms: u64,
    ) -> Result<DedupVerdict, StoreError> {
        let key = normalize_key(key);
        if key.is_empty() {
            return Ok(DedupVerdict::Fresh);
        }

        let since_ms = match policy {
            DedupPolicy::Permanent => 0,
            DedupPolicy::Windowed(window) => now_ms.saturating_sub(window.as_millis() as u64),
        };

        match self.store.find_recent(collection, &key, since_ms).await? {
            Some(_) => Ok(DedupVerdict::Duplicate),
            None => Ok(DedupVerdict::Fresh),
        }
    }
}
