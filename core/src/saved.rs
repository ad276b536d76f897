//! Saved deals: the user's bookmarks for today.
//!
//! Same daily convention as the dismissed set: a record from another day
//! loads as empty. Every toggle is written through immediately; saves are
//! user-initiated and rare, so there is nothing to debounce.

use crate::{
    clock::Clock,
    error::FeedResult,
    store::{DailyIdSet, PersistedSet},
    types::DealId,
};

pub struct SavedDeals {
    clock: Box<dyn Clock>,
    store: PersistedSet,
    set:   DailyIdSet,
}

impl SavedDeals {
    pub fn new(clock: Box<dyn Clock>, store: PersistedSet) -> Self {
        let set = store.load(clock.today());
        Self { clock, store, set }
    }

    /// Flip the saved flag for `deal_id`. Returns the new state.
    pub fn toggle(&mut self, deal_id: &str) -> FeedResult<bool> {
        self.roll_day_if_needed();
        let now_saved = if self.set.remove(deal_id) {
            false
        } else {
            self.set.insert(deal_id);
            true
        };
        log::debug!("saved: {deal_id} -> {now_saved}");
        self.store.save(&self.set)?;
        Ok(now_saved)
    }

    pub fn contains(&mut self, deal_id: &str) -> bool {
        self.roll_day_if_needed();
        self.set.contains(deal_id)
    }

    pub fn ids(&mut self) -> Vec<DealId> {
        self.roll_day_if_needed();
        self.set.ids.clone()
    }

    pub fn len(&mut self) -> usize {
        self.roll_day_if_needed();
        self.set.len()
    }

    pub fn is_empty(&mut self) -> bool {
        self.len() == 0
    }

    fn roll_day_if_needed(&mut self) {
        let today = self.clock.today();
        if !self.set.is_for(today) {
            log::info!("saved: day rolled over to {today}, clearing {} saved deals", self.set.len());
            self.set = DailyIdSet::for_day(today);
        }
    }
}
