//! Deck events: everything the deck did in response to a call.
//!
//! RULE: every state change in the deck is reported as an event.
//! The presentation layer animates from events; the runner prints them.

use crate::types::DealId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedEvent {
    // ── Animated dismissal ─────────────────────────
    DismissStarted {
        deal_id: DealId,
        index:   usize,
    },
    DismissIgnored {
        deal_id: DealId,
        reason:  IgnoreReason,
    },
    SlotReplaced {
        index:       usize,
        dismissed:   DealId,
        replacement: DealId,
    },
    SlotRemoved {
        index:     usize,
        dismissed: DealId,
    },
    AppearSettled {
        deal_id: DealId,
    },

    // ── Immediate dismissal ────────────────────────
    DismissedImmediately {
        deal_id: DealId,
    },

    // ── Lifecycle ──────────────────────────────────
    DayRolledOver {
        date: String,
    },
    DeckRebuilt {
        total:   usize,
        visible: usize,
    },
    TransitionDiscarded {
        deal_id: DealId,
    },
    StatePersisted {
        key:   String,
        count: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnoreReason {
    /// Another dismissal is still animating.
    Busy,
    NotVisible,
    /// Immediate dismissal of an id that is not in the current feed.
    UnknownDeal,
    AlreadyDismissed,
    CoolingDown,
    Unmounted,
}
