use chrono::{DateTime, Utc};

use super::{next_minute, RateLimitResult, RateLimiter};

const KEY_PREFIX: &str = "rate-limit";

/// Counts requests in Redis so limits hold across server instances.
pub struct RedisRateLimiter {
    client: redis::Client,
}

impl RedisRateLimiter {
    /// # Arguments
    ///
    /// * `connection_uri` - The connection string used to connect to Redis.
    pub fn new(connection_uri: &str) -> anyhow::Result<Self> {
        Ok(Self {
            client: redis::Client::open(connection_uri)?,
        })
    }
}

/// Counter key for `key` during the minute containing `now`.
fn bucket_key(key: &str, now: DateTime<Utc>) -> String {
    format!("{}:{}:{}", KEY_PREFIX, key, now.format("%Y%m%d%H%M"))
}

impl RateLimiter for RedisRateLimiter {
    fn is_limited(&self, key: &str, max_req_per_min: u64) -> anyhow::Result<RateLimitResult> {
        let mut conn = self.client.get_connection()?;

        let now = Utc::now();
        let bucket = bucket_key(key, now);

        // Every attempt is counted, including rejected ones. The bucket only
        // needs to outlive its own minute.
        let (hits,): (u64,) = redis::pipe()
            .atomic()
            .incr(&bucket, 1)
            .expire(&bucket, 60)
            .ignore()
            .query(&mut conn)?;

        if hits > max_req_per_min {
            return Ok(RateLimitResult::LimitedUntil(next_minute(now)));
        }

        Ok(RateLimitResult::NotLimited)
    }
}

#[cfg(test)]
mod test {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn buckets_change_every_minute() {
        let first = Utc.with_ymd_and_hms(2024, 3, 1, 9, 15, 59).unwrap();
        let second = Utc.with_ymd_and_hms(2024, 3, 1, 9, 16, 0).unwrap();

        assert_eq!("rate-limit:login:202403010915", bucket_key("login", first));
        assert_ne!(bucket_key("login", first), bucket_key("login", second));
    }

    #[test]
    fn buckets_do_not_repeat_across_hours() {
        let first = Utc.with_ymd_and_hms(2024, 3, 1, 9, 15, 0).unwrap();
        let second = Utc.with_ymd_and_hms(2024, 3, 1, 10, 15, 0).unwrap();

        assert_ne!(bucket_key("login", first), bucket_key("login", second));
    }
}
