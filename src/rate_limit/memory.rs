use std::{collections::HashMap, sync::Mutex};

use chrono::{DateTime, DurationRound, Utc};

use super::{next_minute, RateLimitResult, RateLimiter};

/// A per-process rate limiter used when no Redis instance is configured.
///
/// Counts are kept per key for the current minute only, so the map never
/// holds more than one minute's worth of keys.
#[derive(Default)]
pub struct MemoryRateLimiter {
    hits: Mutex<(Option<DateTime<Utc>>, HashMap<String, u64>)>,
}

impl MemoryRateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    fn record_at(
        &self,
        key: &str,
        max_req_per_min: u64,
        now: DateTime<Utc>,
    ) -> anyhow::Result<RateLimitResult> {
        let minute = now.duration_trunc(chrono::Duration::minutes(1))?;

        let mut guard = self
            .hits
            .lock()
            .map_err(|_| anyhow::anyhow!("rate limiter lock poisoned"))?;
        let (current_minute, counts) = &mut *guard;

        if *current_minute != Some(minute) {
            *current_minute = Some(minute);
            counts.clear();
        }

        let count = counts.entry(key.to_owned()).or_insert(0);
        if *count >= max_req_per_min {
            return Ok(RateLimitResult::LimitedUntil(next_minute(now)));
        }

        *count += 1;

        Ok(RateLimitResult::NotLimited)
    }
}

impl RateLimiter for MemoryRateLimiter {
    fn is_limited(&self, key: &str, max_req_per_min: u64) -> anyhow::Result<RateLimitResult> {
        self.record_at(key, max_req_per_min, Utc::now())
    }
}
