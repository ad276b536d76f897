//! Deck state machine: the interactive visible window over a curated feed.
//!
//! States:
//!   idle ──dismiss(id)──▶ dismissing(id) ──delay──▶ appearing(new) ──delay──▶ idle
//!                                        └──(no replacement, slot removed)──▶ idle
//!
//! RULES:
//!   - At most one animated dismissal in flight; requests while busy are
//!     ignored, never queued.
//!   - A replacement is written at the exact index the dismissed card held.
//!     No other index moves. With no replacement the index is removed.
//!   - Timers are due-times on the injected clock, fired by `tick()`.
//!   - After `unmount()` nothing fires; a pending transition is dropped
//!     without touching the window or the dismissed set.
//!   - The dismissed set is per calendar day and only grows within a day.

use crate::{
    clock::Clock,
    config::DeckConfig,
    deal::Deal,
    event::{FeedEvent, IgnoreReason},
    store::{DailyIdSet, PersistedSet},
    types::{DealId, Millis},
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Idle,
    Dismissing { deal_id: DealId, index: usize, due_at: Millis },
    Appearing { deal_id: DealId, due_at: Millis },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionPhase {
    Idle,
    Dismissing,
    Appearing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionState {
    pub phase:   TransitionPhase,
    pub deal_id: Option<DealId>,
}

impl Transition {
    pub fn state(&self) -> TransitionState {
        match self {
            Transition::Idle => TransitionState { phase: TransitionPhase::Idle, deal_id: None },
            Transition::Dismissing { deal_id, .. } => TransitionState {
                phase:   TransitionPhase::Dismissing,
                deal_id: Some(deal_id.clone()),
            },
            Transition::Appearing { deal_id, .. } => TransitionState {
                phase:   TransitionPhase::Appearing,
                deal_id: Some(deal_id.clone()),
            },
        }
    }

    fn deal_id(&self) -> Option<&DealId> {
        match self {
            Transition::Idle => None,
            Transition::Dismissing { deal_id, .. } | Transition::Appearing { deal_id, .. } => Some(deal_id),
        }
    }
}

/// Counts over the current sequence. `total - dismissed` is always the
/// length of `remaining`; `seen` restarts with each rebuild and each day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeckCounts {
    pub total:     usize,
    pub seen:      usize,
    pub dismissed: usize,
}

/// What the presentation layer renders.
#[derive(Debug, Clone)]
pub struct DeckView {
    pub visible:     Vec<Arc<Deal>>,
    /// Every undismissed deal, in curated order, for non-grid layouts.
    pub remaining:   Vec<Arc<Deal>>,
    pub counts:      DeckCounts,
    pub is_complete: bool,
    pub transition:  TransitionState,
}

pub struct Deck {
    config:            DeckConfig,
    clock:             Box<dyn Clock>,
    store:             PersistedSet,
    dismissed:         DailyIdSet,
    sequence:          Vec<Arc<Deal>>,
    slots:             Vec<Arc<Deal>>,
    seen:              HashSet<DealId>,
    transition:        Transition,
    last_immediate_at: Option<Millis>,
    dirty_since:       Option<Millis>,
    mounted:           bool,
}

impl Deck {
    /// Load today's dismissed set; the window stays empty until `rebuild`.
    pub fn new(config: DeckConfig, clock: Box<dyn Clock>, store: PersistedSet) -> Self {
        let dismissed = store.load(clock.today());
        log::debug!("deck: loaded {} dismissed ids for {}", dismissed.len(), dismissed.date);
        Self {
            config,
            clock,
            store,
            dismissed,
            sequence: Vec::new(),
            slots: Vec::new(),
            seen: HashSet::new(),
            transition: Transition::Idle,
            last_immediate_at: None,
            dirty_since: None,
            mounted: true,
        }
    }

    // ── Cold rebuild ───────────────────────────────────────────────

    /// Replace the full sequence and re-slice the window from it.
    /// Any pending transition belongs to the old window and is dropped.
    pub fn rebuild(&mut self, sequence: Vec<Arc<Deal>>) -> Vec<FeedEvent> {
        let mut out = Vec::new();
        self.roll_day_if_needed(&mut out);
        self.discard_transition(&mut out);

        self.sequence = sequence;
        self.slots = self
            .sequence
            .iter()
            .filter(|d| !self.dismissed.contains(&d.id))
            .take(self.config.visible_slots)
            .cloned()
            .collect();
        self.reset_seen();

        log::info!(
            "deck: rebuilt with {} deals, {} visible",
            self.sequence.len(),
            self.slots.len()
        );
        out.push(FeedEvent::DeckRebuilt {
            total:   self.sequence.len(),
            visible: self.slots.len(),
        });
        out
    }

    // ── Animated dismissal ─────────────────────────────────────────

    pub fn dismiss(&mut self, deal_id: &str) -> Vec<FeedEvent> {
        let mut out = Vec::new();
        if !self.mounted {
            return ignored(deal_id, IgnoreReason::Unmounted);
        }
        self.roll_day_if_needed(&mut out);

        if self.transition != Transition::Idle {
            out.extend(ignored(deal_id, IgnoreReason::Busy));
            return out;
        }
        if self.dismissed.contains(deal_id) {
            out.extend(ignored(deal_id, IgnoreReason::AlreadyDismissed));
            return out;
        }
        let Some(index) = self.slots.iter().position(|d| d.id == deal_id) else {
            out.extend(ignored(deal_id, IgnoreReason::NotVisible));
            return out;
        };

        let due_at = self.clock.now_ms() + self.config.dismiss_delay_ms;
        self.transition = Transition::Dismissing {
            deal_id: deal_id.to_string(),
            index,
            due_at,
        };
        log::info!("deck: dismissing {deal_id} at slot {index}");
        out.push(FeedEvent::DismissStarted { deal_id: deal_id.to_string(), index });
        out
    }

    // ── Immediate dismissal ────────────────────────────────────────

    /// Swipe-style dismissal: no animation, rate limited, and the window
    /// array is left alone. Used by layouts that render `remaining` directly.
    pub fn dismiss_immediate(&mut self, deal_id: &str) -> Vec<FeedEvent> {
        let mut out = Vec::new();
        if !self.mounted {
            return ignored(deal_id, IgnoreReason::Unmounted);
        }
        self.roll_day_if_needed(&mut out);

        let now = self.clock.now_ms();
        if let Some(last) = self.last_immediate_at {
            if now < last + self.config.immediate_cooldown_ms {
                out.extend(ignored(deal_id, IgnoreReason::CoolingDown));
                return out;
            }
        }
        if self.dismissed.contains(deal_id) {
            out.extend(ignored(deal_id, IgnoreReason::AlreadyDismissed));
            return out;
        }
        if !self.sequence.iter().any(|d| d.id == deal_id) {
            out.extend(ignored(deal_id, IgnoreReason::UnknownDeal));
            return out;
        }

        self.dismissed.insert(deal_id);
        self.last_immediate_at = Some(now);
        self.mark_dirty(now);
        log::info!("deck: dismissed {deal_id} immediately");
        out.push(FeedEvent::DismissedImmediately { deal_id: deal_id.to_string() });
        out
    }

    // ── Timers ─────────────────────────────────────────────────────

    /// Fire every transition and persistence write that is due.
    pub fn tick(&mut self) -> Vec<FeedEvent> {
        let mut out = Vec::new();
        if !self.mounted {
            return out;
        }
        self.roll_day_if_needed(&mut out);
        let now = self.clock.now_ms();

        loop {
            match self.transition.clone() {
                Transition::Dismissing { deal_id, index, due_at } if due_at <= now => {
                    self.complete_dismissal(&deal_id, index, due_at, &mut out);
                }
                Transition::Appearing { deal_id, due_at } if due_at <= now => {
                    self.transition = Transition::Idle;
                    out.push(FeedEvent::AppearSettled { deal_id });
                }
                _ => break,
            }
        }

        if self
            .dirty_since
            .is_some_and(|since| now >= since + self.config.persist_debounce_ms)
        {
            self.persist(&mut out);
        }
        out
    }

    /// Write pending dismissals now, skipping the debounce.
    pub fn flush(&mut self) -> Vec<FeedEvent> {
        let mut out = Vec::new();
        if self.dirty_since.is_some() {
            self.persist(&mut out);
        }
        out
    }

    /// Host view torn down: drop the pending transition, flush storage,
    /// and ignore everything afterwards.
    pub fn unmount(&mut self) -> Vec<FeedEvent> {
        let mut out = Vec::new();
        if !self.mounted {
            return out;
        }
        self.discard_transition(&mut out);
        out.extend(self.flush());
        self.mounted = false;
        log::debug!("deck: unmounted");
        out
    }

    // ── Accessors ──────────────────────────────────────────────────

    pub fn visible(&self) -> &[Arc<Deal>] {
        &self.slots
    }

    pub fn transition(&self) -> &Transition {
        &self.transition
    }

    pub fn is_dismissed(&self, deal_id: &str) -> bool {
        self.dismissed.contains(deal_id)
    }

    pub fn dismissed_ids(&self) -> &[DealId] {
        &self.dismissed.ids
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    pub fn remaining(&self) -> Vec<Arc<Deal>> {
        self.sequence
            .iter()
            .filter(|d| !self.dismissed.contains(&d.id))
            .cloned()
            .collect()
    }

    pub fn view(&self) -> DeckView {
        let remaining = self.remaining();
        DeckView {
            visible: self.slots.clone(),
            counts: DeckCounts {
                total:     self.sequence.len(),
                seen:      self.seen.len(),
                dismissed: self.sequence.iter().filter(|d| self.dismissed.contains(&d.id)).count(),
            },
            is_complete: remaining.is_empty(),
            remaining,
            transition: self.transition.state(),
        }
    }

    // ── Internals ──────────────────────────────────────────────────

    fn complete_dismissal(&mut self, deal_id: &str, index: usize, fired_at: Millis, out: &mut Vec<FeedEvent>) {
        self.transition = Transition::Idle;

        // The window cannot change while a dismissal is pending, but a
        // stale index must never overwrite the wrong card.
        let index = match self.slots.get(index) {
            Some(d) if d.id == deal_id => index,
            _ => match self.slots.iter().position(|d| d.id == deal_id) {
                Some(i) => i,
                None => {
                    log::warn!("deck: {deal_id} left the window before its dismissal fired");
                    return;
                }
            },
        };

        self.dismissed.insert(deal_id);
        self.mark_dirty(fired_at);

        let replacement = self
            .sequence
            .iter()
            .find(|d| !self.dismissed.contains(&d.id) && !self.slots.iter().any(|s| s.id == d.id))
            .cloned();

        match replacement {
            Some(next) => {
                let delay = if next.deal_score >= self.config.highlight_score {
                    self.config.highlight_appear_delay_ms
                } else {
                    self.config.appear_delay_ms
                };
                log::info!("deck: slot {index} {deal_id} -> {}", next.id);
                self.seen.insert(next.id.clone());
                out.push(FeedEvent::SlotReplaced {
                    index,
                    dismissed:   deal_id.to_string(),
                    replacement: next.id.clone(),
                });
                self.transition = Transition::Appearing {
                    deal_id: next.id.clone(),
                    due_at:  fired_at + delay,
                };
                self.slots[index] = next;
            }
            None => {
                log::info!("deck: slot {index} {deal_id} removed, nothing left to show");
                self.slots.remove(index);
                out.push(FeedEvent::SlotRemoved { index, dismissed: deal_id.to_string() });
            }
        }
    }

    fn discard_transition(&mut self, out: &mut Vec<FeedEvent>) {
        if let Some(deal_id) = self.transition.deal_id().cloned() {
            log::debug!("deck: discarding pending transition for {deal_id}");
            out.push(FeedEvent::TransitionDiscarded { deal_id });
        }
        self.transition = Transition::Idle;
    }

    fn roll_day_if_needed(&mut self, out: &mut Vec<FeedEvent>) {
        let today = self.clock.today();
        if self.dismissed.is_for(today) {
            return;
        }
        log::info!("deck: day rolled over to {today}, clearing {} dismissals", self.dismissed.len());
        self.dismissed = DailyIdSet::for_day(today);
        self.dirty_since = None;
        self.reset_seen();
        out.push(FeedEvent::DayRolledOver { date: self.dismissed.date.clone() });
    }

    fn reset_seen(&mut self) {
        self.seen = self.slots.iter().map(|d| d.id.clone()).collect();
    }

    fn mark_dirty(&mut self, at: Millis) {
        self.dirty_since = Some(at);
    }

    fn persist(&mut self, out: &mut Vec<FeedEvent>) {
        self.dirty_since = None;
        match self.store.save(&self.dismissed) {
            Ok(()) => out.push(FeedEvent::StatePersisted {
                key:   self.store.key().to_string(),
                count: self.dismissed.len(),
            }),
            Err(e) => log::warn!("deck: failed to persist dismissals: {e}"),
        }
    }
}

fn ignored(deal_id: &str, reason: IgnoreReason) -> Vec<FeedEvent> {
    log::debug!("deck: dismiss of {deal_id} ignored ({reason:?})");
    vec![FeedEvent::DismissIgnored { deal_id: deal_id.to_string(), reason }]
}
