//! Linear volume ramps.
//!
//! A ramp is `FADE_STEPS` evenly spaced `set_property volume` commands; every
//! level sits on the 5-point volume grid.  The player runs the ramp and
//! checks the session token between steps.
use radio_proto::protocol::snap_volume;
use tokio_util::sync::CancellationToken;

pub const FADE_STEPS: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadeOutcome {
    Completed,
    Cancelled,
}

impl FadeOutcome {
    pub fn is_cancelled(self) -> bool {
        self == FadeOutcome::Cancelled
    }
}

/// One fade episode.  Remembers the volume from before the fade-out so the
/// fade-in (or a cancellation) can go back to it.
#[derive(Debug, Clone)]
pub struct FadeSession {
    id: u64,
    token: CancellationToken,
    saved_volume: u8,
}

impl FadeSession {
    pub(crate) fn new(id: u64, token: CancellationToken, saved_volume: u8) -> Self {
        Self {
            id,
            token,
            saved_volume,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn saved_volume(&self) -> u8 {
        self.saved_volume
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }
}

/// Volume levels applied after each step going from `from` to `to`.  The
/// last level is always `to`.
pub fn ramp(from: u8, to: u8, steps: u32) -> Vec<u8> {
    let steps = steps.max(1) as i32;
    let (from, to) = (from as i32, to as i32);
    (1..=steps)
        .map(|i| snap_volume(from + (to - from) * i / steps))
        .collect()
}
