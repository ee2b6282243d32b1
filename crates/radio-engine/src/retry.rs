//! Exponential reload backoff, one session per user-initiated load.
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Delay before reload attempt number `attempt` (1-based): `2^attempt`
/// seconds, never more than `cap`.
pub fn backoff_delay(attempt: u32, cap: Duration) -> Duration {
    let secs = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
    Duration::from_secs(secs).min(cap)
}

/// Retry bookkeeping for one Toggle/Load.  Replaced (and cancelled) whenever
/// the user starts or stops a stream.
#[derive(Debug)]
pub struct RetrySession {
    id: u64,
    token: CancellationToken,
    /// Reloads already issued in this session.
    attempts: u32,
    /// A backoff wait is in flight.
    pending: bool,
}

impl RetrySession {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            token: CancellationToken::new(),
            attempts: 0,
            pending: false,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Claim the next backoff slot.  `None` while a wait is already pending
    /// or once the session is cancelled.
    pub fn schedule(&mut self, cap: Duration) -> Option<Duration> {
        if self.pending || self.is_cancelled() {
            return None;
        }
        self.pending = true;
        Some(backoff_delay(self.attempts + 1, cap))
    }

    /// The wait finished and a reload is about to be issued.
    pub fn complete(&mut self) {
        self.pending = false;
        self.attempts += 1;
    }
}
