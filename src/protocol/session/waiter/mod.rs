//! Adaptive response waiter.
//!
//! Polls the [`ResponseInbox`] with a growing interval: fast polls keep the
//! latency low for commands the appliance answers immediately, the cap keeps
//! wake-ups bounded for slow ones (firmware version, authentication).
use embassy_sync::blocking_mutex::raw::RawMutex;

use crate::protocol::transport::inbox::{Notification, ResponseInbox};
use crate::protocol::transport::traits::cooker_timer::CookerTimer;

/// First polling interval of every wait (ms).
pub const POLL_INTERVAL_MIN_MS: u32 = 50;
/// Polling interval ceiling (ms).
pub const POLL_INTERVAL_MAX_MS: u32 = 200;

/// Endless sequence of polling intervals: 50, 75, 112, 168, 200, 200, ...
#[derive(Debug, Clone, Copy)]
pub struct PollInterval {
    current: u32,
}

impl Default for PollInterval {
    fn default() -> Self {
        Self::new()
    }
}

impl PollInterval {
    pub const fn new() -> Self {
        Self {
            current: POLL_INTERVAL_MIN_MS,
        }
    }
}

impl Iterator for PollInterval {
    type Item = u32;

    fn next(&mut self) -> Option<Self::Item> {
        let interval = self.current;
        // Growth factor 1.5, integer arithmetic.
        self.current = (self.current + self.current / 2).min(POLL_INTERVAL_MAX_MS);
        Some(interval)
    }
}

/// What the caller makes of a frame pulled from the inbox.
#[derive(Debug)]
pub enum Verdict<R, E> {
    /// Answer to the outstanding exchange; stop waiting.
    Accept(R),
    /// Left over from an earlier exchange; drop it and keep polling.
    Stale,
    /// Broken frame; stop waiting and report it.
    Reject(E),
}

/// Why a wait ended without an accepted frame.
#[derive(Debug, PartialEq, Eq)]
pub enum WaitError<E> {
    /// The budget ran out.
    Elapsed,
    /// `classify` rejected a frame.
    Rejected(E),
}

/// Poll `inbox` until `classify` accepts a frame or `budget_ms` has elapsed.
///
/// The last sleep is shortened so the wait ends on the deadline, never after.
pub async fn wait_for_response<M, T, R, E, F, const N: usize>(
    inbox: &ResponseInbox<M, N>,
    timer: &mut T,
    budget_ms: u32,
    mut classify: F,
) -> Result<R, WaitError<E>>
where
    M: RawMutex,
    T: CookerTimer,
    F: FnMut(&Notification) -> Verdict<R, E>,
{
    let started = timer.now_ms();
    let deadline = started + budget_ms as u64;
    let mut intervals = PollInterval::new();

    loop {
        while let Some(frame) = inbox.try_take() {
            match classify(&frame) {
                Verdict::Accept(response) => return Ok(response),
                Verdict::Reject(err) => return Err(WaitError::Rejected(err)),
                Verdict::Stale => {
                    #[cfg(feature = "defmt")]
                    defmt::trace!("Discarding stale frame ({} bytes)", frame.len());
                }
            }
        }

        let now = timer.now_ms();
        if now >= deadline {
            return Err(WaitError::Elapsed);
        }

        let remaining = (deadline - now).min(u32::MAX as u64) as u32;
        let interval = intervals.next().unwrap_or(POLL_INTERVAL_MAX_MS);
        timer.delay_ms(interval.min(remaining)).await;
    }
}
