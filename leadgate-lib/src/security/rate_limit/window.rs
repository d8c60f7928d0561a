//! Sliding-window stores.
//!
//! A store keeps one bucket of admission timestamps per key and performs the
//! prune-check-append sequence as a single atomic step for that key. The
//! in-memory store is the only implementation shipped; its counts are scoped
//! to the process (see the module docs in [`super`]).

use ahash::AHashMap;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::{Duration, Instant};

use super::RateDecision;
use crate::config::RateRule;

/// Storage abstraction behind the sliding-window limiter.
///
/// `admit` is the whole transaction: prune expired stamps for the key, then
/// either append `now` and admit, or refuse without appending. Implementations
/// must make that sequence atomic per key; different keys may proceed in
/// parallel.
pub trait RateWindowStore: Send + Sync {
    fn admit(&self, key: &str, rule: RateRule, now: Instant) -> RateDecision;

    /// Drop expired stamps in every bucket and forget empty buckets.
    fn sweep(&self, now: Instant);

    /// Number of live buckets.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct Bucket {
    stamps: VecDeque<Instant>,
    /// Window of the last rule applied to this key; the sweeper prunes by it.
    window: Duration,
}

impl Bucket {
    fn new(window: Duration) -> Self {
        Self { stamps: VecDeque::new(), window }
    }

    /// Remove stamps that have left the window.
    ///
    /// Expiry is strict: a stamp exactly `window` old no longer counts.
    fn prune(&mut self, now: Instant) {
        while let Some(&front) = self.stamps.front() {
            if front + self.window <= now {
                self.stamps.pop_front();
            } else {
                break;
            }
        }
    }
}

/// In-memory sliding-window store.
///
/// Map read-lock to locate a bucket, per-bucket mutex for the
/// prune-check-append step, so contention is per key rather than global.
#[derive(Default)]
pub struct InMemoryRateStore {
    buckets: RwLock<AHashMap<String, Arc<Mutex<Bucket>>>>,
}

impl InMemoryRateStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn bucket_for(&self, key: &str, window: Duration) -> Arc<Mutex<Bucket>> {
        if let Some(bucket) = read_lock(&self.buckets).get(key) {
            return bucket.clone();
        }
        write_lock(&self.buckets)
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(Bucket::new(window))))
            .clone()
    }
}

impl RateWindowStore for InMemoryRateStore {
    fn admit(&self, key: &str, rule: RateRule, now: Instant) -> RateDecision {
        let bucket = self.bucket_for(key, rule.window());
        let mut b = lock(&bucket);

        b.window = rule.window();
        b.prune(now);

        let limit = rule.max_requests;
        let count = b.stamps.len() as u32;

        if count >= limit {
            // Full window. The request leaves no trace: a client hammering
            // a closed gate must not push its own reset further out.
            let oldest = *b.stamps.front().unwrap_or(&now);
            let reset_after = (oldest + b.window).duration_since(now);
            RateDecision::Limited {
                limit,
                retry_after: Duration::from_secs(ceil_secs(reset_after).max(1)),
                reset_after,
            }
        } else {
            b.stamps.push_back(now);
            let oldest = *b.stamps.front().unwrap_or(&now);
            RateDecision::Admitted {
                limit,
                remaining: limit - (count + 1),
                reset_after: (oldest + b.window).duration_since(now),
            }
        }
    }

    fn sweep(&self, now: Instant) {
        let snapshot: Vec<(String, Arc<Mutex<Bucket>>)> = read_lock(&self.buckets)
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let mut dead = Vec::new();
        for (key, bucket) in snapshot {
            let mut b = lock(&bucket);
            b.prune(now);
            if b.stamps.is_empty() {
                dead.push(key);
            }
        }

        if dead.is_empty() {
            return;
        }

        let mut map = write_lock(&self.buckets);
        for key in dead {
            // with the map write-locked no new handle can be taken; a racing
            // admit that already cloned the Arc keeps the count above one and
            // the bucket survives until the next sweep
            let removable = match map.get(&key) {
                Some(bucket) => {
                    Arc::strong_count(bucket) == 1 && lock(bucket).stamps.is_empty()
                }
                None => false,
            };
            if removable {
                map.remove(&key);
            }
        }
    }

    fn len(&self) -> usize {
        read_lock(&self.buckets).len()
    }
}

fn ceil_secs(d: Duration) -> u64 {
    if d.subsec_nanos() > 0 {
        d.as_secs() + 1
    } else {
        d.as_secs()
    }
}

// Poisoned locks keep structurally valid data here and pruning self-heals,
// so recover the guard instead of propagating.
fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

fn read_lock<T>(l: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    l.read().unwrap_or_else(|e| e.into_inner())
}

fn write_lock<T>(l: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    l.write().unwrap_or_else(|e| e.into_inner())
}
