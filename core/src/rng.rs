//! Deterministic random number generation.
//!
//! RULE: Nothing in the curation pipeline may call any platform RNG.
//! All randomness flows through a FeedRng seeded from (date, user):
//!   - the same user sees the same order for the rest of the calendar day;
//!   - different users see different orders on the same day;
//!   - tomorrow reshuffles everyone.

use chrono::NaiveDate;
use rand::{RngCore, SeedableRng};
use rand_pcg::Pcg32;

/// 32-bit string hash of `"{YYYY-MM-DD}:{user_id}"`.
///
/// The exact hash is part of the ordering contract: changing it reshuffles
/// every user's feed mid-day.
pub fn feed_seed(date: NaiveDate, user_id: &str) -> u32 {
    let key = format!("{}:{user_id}", date.format("%Y-%m-%d"));
    key.bytes()
        .fold(0u32, |h, b| h.wrapping_mul(31).wrapping_add(u32::from(b)))
}

/// A deterministic RNG for one feed build.
pub struct FeedRng {
    pub seed: u32,
    inner:    Pcg32,
}

impl FeedRng {
    pub fn new(seed: u32) -> Self {
        Self {
            seed,
            inner: Pcg32::seed_from_u64(u64::from(seed)),
        }
    }

    pub fn for_session(date: NaiveDate, user_id: &str) -> Self {
        Self::new(feed_seed(date, user_id))
    }

    pub fn next_u32(&mut self) -> u32 {
        self.inner.next_u32()
    }

    /// Roll a float in [0.0, 1.0).
    pub fn next_f64(&mut self) -> f64 {
        f64::from(self.inner.next_u32()) / (f64::from(u32::MAX) + 1.0)
    }

    /// Roll an index in [0, n).
    pub fn next_below(&mut self, n: usize) -> usize {
        assert!(n > 0, "n must be > 0");
        (self.next_f64() * n as f64) as usize
    }

    /// Fisher–Yates, walking from the back.
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = self.next_below(i + 1);
            items.swap(i, j);
        }
    }
}
