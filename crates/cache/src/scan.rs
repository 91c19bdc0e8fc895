//! Incremental cursor scan over the Redis key space.

use crate::Result;

/// Restartable `SCAN MATCH` iterator.
///
/// Redis guarantees that a scan started at cursor 0 and advanced until
/// the cursor returns to 0 visits every key that existed for the whole
/// duration of the scan, regardless of key-space size. Each round trip
/// fetches at most roughly `batch` keys (`COUNT` is a hint, not a hard
/// bound), so a full sweep of a large key space costs multiple round
/// trips but never an unbounded reply.
#[derive(Debug)]
pub struct KeyScan {
    pattern: String,
    batch: usize,
    cursor: u64,
    started: bool,
}

impl KeyScan {
    /// Start a fresh scan for keys matching `pattern`.
    pub fn new(pattern: impl Into<String>, batch: usize) -> Self {
        Self {
            pattern: pattern.into(),
            batch,
            cursor: 0,
            started: false,
        }
    }

    /// Resume a scan from a previously observed cursor token.
    ///
    /// Resuming from cursor 0 yields an already-exhausted scan.
    pub fn resume(pattern: impl Into<String>, batch: usize, cursor: u64) -> Self {
        Self {
            pattern: pattern.into(),
            batch,
            cursor,
            started: true,
        }
    }

    /// The cursor token to resume from after the last delivered batch.
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    /// Whether the scan has covered the full key space.
    pub fn is_exhausted(&self) -> bool {
        self.started && self.cursor == 0
    }

    /// Fetch the next batch of matching keys.
    ///
    /// Returns `Ok(None)` once the cursor has returned to 0. A batch may
    /// be empty while the scan is still in progress; callers must keep
    /// iterating until `None`.
    pub async fn next_batch<C>(&mut self, conn: &mut C) -> Result<Option<Vec<String>>>
    where
        C: redis::aio::ConnectionLike + Send,
    {
        if self.is_exhausted() {
            return Ok(None);
        }

        let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(self.cursor)
            .arg("MATCH")
            .arg(&self.pattern)
            .arg("COUNT")
            .arg(self.batch)
            .query_async(conn)
            .await?;

        self.started = true;
        self.cursor = next_cursor;

        Ok(Some(keys))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_scan_is_not_exhausted_at_cursor_zero() {
        let scan = KeyScan::new("books:*", 200);
        assert_eq!(scan.cursor(), 0);
        assert!(!scan.is_exhausted());
    }

    #[test]
    fn resumed_scan_at_cursor_zero_is_exhausted() {
        let scan = KeyScan::resume("books:*", 200, 0);
        assert!(scan.is_exhausted());
    }

    #[test]
    fn resumed_scan_with_live_cursor_continues() {
        let scan = KeyScan::resume("books:*", 200, 42);
        assert_eq!(scan.cursor(), 42);
        assert!(!scan.is_exhausted());
    }
}
