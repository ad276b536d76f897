//! Injectable clock: owns "now" and "today" for the deck.
//!
//! RULE: deck timers and the daily reset never read the platform clock
//! directly. Production uses SystemClock; tests drive a ManualClock.

use crate::types::Millis;
use chrono::{DateTime, Local, NaiveDate, Utc};
use std::cell::Cell;
use std::rc::Rc;

pub trait Clock {
    /// Monotonic-enough milliseconds for timers and cooldowns.
    fn now_ms(&self) -> Millis;

    /// The user's calendar day, used as the persistence key.
    fn today(&self) -> NaiveDate;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> Millis {
        Utc::now().timestamp_millis().max(0) as Millis
    }

    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Hand-driven clock. Clones share the same time, so a test can keep one
/// handle while the deck owns another.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Rc<Cell<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn at(start: DateTime<Utc>) -> Self {
        Self { now: Rc::new(Cell::new(start)) }
    }

    /// Midnight UTC on the given day.
    pub fn on(date: NaiveDate) -> Self {
        let start = date.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc();
        Self::at(start)
    }

    pub fn advance(&self, ms: Millis) {
        let next = self.now.get() + chrono::Duration::milliseconds(ms as i64);
        self.now.set(next);
    }

    /// Jump to midnight of the next calendar day.
    pub fn roll_to_next_day(&self) {
        let today = self.today();
        let tomorrow = today.succ_opt().unwrap_or(today);
        let start = tomorrow.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc();
        self.now.set(start);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> Millis {
        self.now.get().timestamp_millis().max(0) as Millis
    }

    fn today(&self) -> NaiveDate {
        self.now.get().date_naive()
    }
}
