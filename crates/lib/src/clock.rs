//! Time source for node timestamps.
//!
//! Every [`Store`](crate::Store) owns a [`Clock`] that stamps `created_at`,
//! `modified_at` and `last_accessed_at` on the nodes it manages. Hosts plug in
//! their own wall clock; tests use [`FixedClock`] for deterministic ordering.
//!
//! # Example
//!
//! ```
//! use ctxsync::{Clock, FixedClock, SystemClock};
//!
//! let clock = SystemClock;
//! assert!(clock.now_millis() > 0);
//!
//! let fixed = FixedClock::new(1000);
//! assert_eq!(fixed.now_millis(), 1000);
//! assert_eq!(fixed.now_millis(), 1001);
//! ```

use std::fmt::Debug;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, TimeZone, Utc};

/// Milliseconds since the Unix epoch.
pub type Timestamp = u64;

/// A time provider for node timestamps.
pub trait Clock: Send + Sync + Debug {
    /// Returns the current time as milliseconds since Unix epoch.
    fn now_millis(&self) -> Timestamp;

    /// Returns the current time as an RFC3339-formatted string.
    fn now_rfc3339(&self) -> String {
        to_rfc3339(self.now_millis())
    }
}

/// Formats a millisecond timestamp as RFC3339.
pub fn to_rfc3339(millis: Timestamp) -> String {
    to_datetime(millis)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| "1970-01-01T00:00:00+00:00".to_string())
}

/// Converts a millisecond timestamp into a UTC datetime, if representable.
pub fn to_datetime(millis: Timestamp) -> Option<DateTime<Utc>> {
    let secs = (millis / 1000) as i64;
    let nanos = ((millis % 1000) * 1_000_000) as u32;
    Utc.timestamp_opt(secs, nanos).single()
}

/// Wall clock backed by [`std::time::SystemTime`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> Timestamp {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as Timestamp)
            .unwrap_or(0)
    }
}

/// Controllable clock that advances by one millisecond per reading.
///
/// Consecutive reads are strictly increasing, which gives every write in a
/// test a distinct `modified_at`. Use [`FixedClock::hold`] to freeze it when
/// two nodes must share a timestamp.
///
/// ```
/// use ctxsync::{Clock, FixedClock};
///
/// let clock = FixedClock::new(1000);
/// let same = {
///     let _hold = clock.hold();
///     (clock.now_millis(), clock.now_millis())
/// };
/// assert_eq!(same.0, same.1);
/// ```
pub struct FixedClock {
    state: Mutex<FixedClockState>,
}

struct FixedClockState {
    millis: Timestamp,
    held: bool,
}

/// RAII guard that freezes a [`FixedClock`] while held.
pub struct ClockHold<'a>(&'a FixedClock);

impl Drop for ClockHold<'_> {
    fn drop(&mut self) {
        self.0.with_state(|state| state.held = false);
    }
}

impl FixedClock {
    /// Create a clock starting at the given time in milliseconds.
    pub fn new(millis: Timestamp) -> Self {
        Self {
            state: Mutex::new(FixedClockState {
                millis,
                held: false,
            }),
        }
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut FixedClockState) -> R) -> R {
        // A poisoned lock only means another test thread panicked mid-read;
        // the counter itself is still consistent.
        let mut guard = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }

    /// Hold the clock, preventing auto-advance until the guard is dropped.
    pub fn hold(&self) -> ClockHold<'_> {
        self.with_state(|state| state.held = true);
        ClockHold(self)
    }

    /// Advance the clock by the given number of milliseconds.
    pub fn advance(&self, ms: Timestamp) {
        self.with_state(|state| state.millis += ms);
    }

    /// Set the clock to a specific time in milliseconds.
    pub fn set(&self, ms: Timestamp) {
        self.with_state(|state| state.millis = ms);
    }

    /// Current value without advancing.
    pub fn get(&self) -> Timestamp {
        self.with_state(|state| state.millis)
    }
}

impl Clock for FixedClock {
    fn now_millis(&self) -> Timestamp {
        self.with_state(|state| {
            let t = state.millis;
            if !state.held {
                state.millis += 1;
            }
            t
        })
    }
}

impl Default for FixedClock {
    fn default() -> Self {
        // 2024-01-01 00:00:00 UTC
        Self::new(1704067200000)
    }
}

impl Debug for FixedClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (millis, held) = self.with_state(|state| (state.millis, state.held));
        f.debug_struct("FixedClock")
            .field("millis", &millis)
            .field("held", &held)
            .finish()
    }
}
