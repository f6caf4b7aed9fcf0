//! Wait-for-a-set-of-keys with a bounded wait.
//!
//! Every transport that learns about completion by looking (sentinel files,
//! a key-value store, a job table) shares this one primitive.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::{Duration, Instant};
use tracing::debug;

/// How long and how often to poll.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use u_blackopt::dispatch::PollPolicy;
///
/// let cluster = PollPolicy::bounded(Duration::from_secs(3600), Duration::from_secs(5));
/// let local = PollPolicy::unbounded(Duration::from_millis(10));
/// assert!(local.timeout.is_none());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollPolicy {
    /// Give up after this long. `None` waits forever.
    pub timeout: Option<Duration>,

    /// Pause between polls.
    pub interval: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            timeout: Some(Duration::from_secs(3600)),
            interval: Duration::from_secs(1),
        }
    }
}

impl PollPolicy {
    pub fn bounded(timeout: Duration, interval: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            interval,
        }
    }

    pub fn unbounded(interval: Duration) -> Self {
        Self {
            timeout: None,
            interval,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

/// Blocks until `is_ready` holds for every key, or the policy's timeout
/// elapses.
///
/// Each key is probed until it first reports ready and never again. On
/// timeout, returns the keys that never became ready.
pub fn wait_for_keys<K, F>(
    keys: impl IntoIterator<Item = K>,
    policy: &PollPolicy,
    mut is_ready: F,
) -> Result<(), BTreeSet<K>>
where
    K: Ord + std::fmt::Debug,
    F: FnMut(&K) -> bool,
{
    let start = Instant::now();
    let mut remaining: BTreeSet<K> = keys.into_iter().collect();
    let mut polls = 0usize;

    loop {
        remaining.retain(|k| !is_ready(k));
        polls += 1;
        if remaining.is_empty() {
            debug!(polls, "all keys ready");
            return Ok(());
        }

        let elapsed = start.elapsed();
        let sleep = match policy.timeout {
            Some(timeout) if elapsed >= timeout => {
                debug!(polls, remaining = remaining.len(), "poll timed out");
                return Err(remaining);
            }
            Some(timeout) => policy.interval.min(timeout - elapsed),
            None => policy.interval,
        };
        debug!(polls, remaining = remaining.len(), "waiting for keys");
        std::thread::sleep(sleep);
    }
}
