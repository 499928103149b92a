//! Trailing-edge debounce for the code editor contents.

use std::future::pending;
use std::time::Duration;

use tokio::time::{Instant, sleep_until};

/// Quiet interval before an edited snapshot is considered stable.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(1000);

/// Holds the latest value until it has stopped changing for `quiet`.
///
/// Every [`push`](Self::push) restarts the interval, so a value that keeps
/// changing is never emitted. [`settled`](Self::settled) is cancel-safe and can
/// sit in a `tokio::select!` loop next to the source of edits.
#[derive(Debug)]
pub struct Debouncer<T> {
    quiet: Duration,
    pending: Option<(T, Instant)>,
}

impl<T> Debouncer<T> {
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            pending: None,
        }
    }

    /// Replace the pending value and restart the quiet interval.
    pub fn push(&mut self, value: T) {
        self.pending = Some((value, Instant::now() + self.quiet));
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Drop the pending value without emitting it.
    pub fn clear(&mut self) {
        self.pending = None;
    }

    pub fn quiet(&self) -> Duration {
        self.quiet
    }

    /// Wait for the pending value to settle and take it.
    ///
    /// Pends forever while nothing is pending.
    pub async fn settled(&mut self) -> T {
        loop {
            match &self.pending {
                Some((_, deadline)) => sleep_until(*deadline).await,
                None => pending::<()>().await,
            }
            // A push during the sleep moved the deadline; keep waiting
            let due = matches!(&self.pending, Some((_, deadline)) if *deadline <= Instant::now());
            if due && let Some((value, _)) = self.pending.take() {
                return value;
            }
        }
    }
}

impl<T> Default for Debouncer<T> {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{advance, timeout};

    #[tokio::test(start_paused = true)]
    async fn test_emits_once_after_quiet_interval() {
        let mut debouncer = Debouncer::default();
        debouncer.push("a".to_string());
        debouncer.push("ab".to_string());

        let start = Instant::now();
        let value = debouncer.settled().await;
        assert_eq!(value, "ab");
        assert_eq!(start.elapsed(), DEFAULT_DEBOUNCE);
        assert!(!debouncer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_continuous_edits_never_emit() {
        let mut debouncer = Debouncer::default();
        for i in 0..20 {
            debouncer.push(i);
            // Each edit arrives before the previous one settles
            let waited = timeout(Duration::from_millis(999), debouncer.settled()).await;
            assert!(waited.is_err());
        }
        assert!(debouncer.is_pending());
        assert_eq!(debouncer.settled().await, 19);
    }

    #[tokio::test(start_paused = true)]
    async fn test_push_restarts_interval() {
        let mut debouncer = Debouncer::new(Duration::from_millis(100));
        debouncer.push(1);
        advance(Duration::from_millis(60)).await;
        debouncer.push(2);

        let start = Instant::now();
        assert_eq!(debouncer.settled().await, 2);
        assert_eq!(start.elapsed(), Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_debouncer_pends() {
        let mut debouncer: Debouncer<String> = Debouncer::default();
        let waited = timeout(Duration::from_secs(60), debouncer.settled()).await;
        assert!(waited.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_discards_pending_value() {
        let mut debouncer = Debouncer::default();
        debouncer.push("draft");
        debouncer.clear();
        let waited = timeout(Duration::from_secs(5), debouncer.settled()).await;
        assert!(waited.is_err());
    }
}
