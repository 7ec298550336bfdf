/// Simple token bucket: refills at `rate_per_minute` and caps at that same
/// rate as its capacity, so a long idle period doesn't let the continuous
/// loop burst far beyond its configured target.
#[derive(Debug, Clone, Copy)]
pub struct TokenBucket {
    capacity: f64,
    tokens: f64,
    rate_per_minute: f64,
    last_refill_ms: i64,
}

impl TokenBucket {
    pub fn new(rate_per_minute: f64, now_ms: i64) -> Self {
        Self { capacity: rate_per_minute.max(1.0), tokens: rate_per_minute.max(1.0), rate_per_minute, last_refill_ms: now_ms }
    }

    fn refill(&mut self, now_ms: i64) {
        let elapsed_minutes = ((now_ms - self.last_refill_ms).max(0) as f64) / 60_000.0;
        self.tokens = (self.tokens + elapsed_minutes * self.rate_per_minute).min(self.capacity);
        self.last_refill_ms = now_ms;
    }

    /// Attempts to consume `n` tokens; returns whether enough were available.
    pub fn try_consume(&mut self, n: f64, now_ms: i64) -> bool {
        self.refill(now_ms);
        if self.tokens >= n {
            self.tokens -= n;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refuses_when_empty_then_refills_over_time() {
        let mut bucket = TokenBucket::new(60.0, 0);
        assert!(bucket.try_consume(60.0, 0));
        assert!(!bucket.try_consume(1.0, 0));
        assert!(bucket.try_consume(1.0, 60_000));
    }
}
