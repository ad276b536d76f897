mod common;

use common::{day, deal, deck_with, init_logging, residual_pool, shared};
use dealfeed_core::{
    clock::ManualClock,
    config::{CurationConfig, DeckConfig},
    deal::Deal,
    deck::{Deck, DeckCounts, Transition, TransitionPhase},
    engine::{CurationEngine, FeedContext},
    event::{FeedEvent, IgnoreReason},
    filter::FilterState,
    store::{DailyIdSet, MemoryStorage, DISMISSED_KEY},
    types::Category,
};
use std::sync::Arc;

// ── Test helpers ────────────────────────────────────────────────────────────

fn sequence(n: usize) -> Vec<Arc<Deal>> {
    shared(
        (0..n)
            .map(|i| deal(&format!("d{i:02}"), Category::Flower, &format!("s{i}"), 10.0, 50.0))
            .collect(),
    )
}

fn setup() -> (MemoryStorage, ManualClock) {
    init_logging();
    (MemoryStorage::new(), ManualClock::on(day(16)))
}

fn ignored_reason(events: &[FeedEvent]) -> Option<IgnoreReason> {
    events.iter().find_map(|e| match e {
        FeedEvent::DismissIgnored { reason, .. } => Some(*reason),
        _ => None,
    })
}

fn visible_ids(deck: &Deck) -> Vec<String> {
    deck.visible().iter().map(|d| d.id.clone()).collect()
}

// ── Scenarios ───────────────────────────────────────────────────────────────

/// Dismissing index 0 of a full window with three deals waiting outside it:
/// index 0 is replaced in place and nothing else moves.
#[test]
fn dismissed_slot_is_replaced_in_place() {
    let (storage, clock) = setup();
    let mut deck = deck_with(&storage, &clock, DeckConfig::default());
    let seq = sequence(12);
    deck.rebuild(seq.clone());
    let before: Vec<Arc<Deal>> = deck.visible().to_vec();
    assert_eq!(before.len(), 9);

    let events = deck.dismiss("d00");
    assert_eq!(events, vec![FeedEvent::DismissStarted { deal_id: "d00".into(), index: 0 }]);
    assert_eq!(deck.view().transition.phase, TransitionPhase::Dismissing);

    clock.advance(319);
    assert!(deck.tick().is_empty(), "dismissal fired early");
    assert_eq!(deck.visible()[0].id, "d00");

    clock.advance(1);
    let events = deck.tick();
    assert!(events.contains(&FeedEvent::SlotReplaced {
        index:       0,
        dismissed:   "d00".into(),
        replacement: "d09".into(),
    }));

    let view = deck.view();
    assert_eq!(view.visible.len(), 9);
    assert_eq!(view.counts.dismissed, 1);
    assert!(Arc::ptr_eq(&view.visible[0], &seq[9]));
    for i in 1..9 {
        assert!(Arc::ptr_eq(&view.visible[i], &before[i]), "slot {i} changed reference");
    }
    assert!(!view.visible.iter().any(|d| d.id == "d00"));
}

/// Once nothing undismissed is left outside the window, a dismissal
/// shrinks the window instead of replacing.
#[test]
fn window_shrinks_when_nothing_is_left_to_show() {
    let (storage, clock) = setup();
    let mut deck = deck_with(&storage, &clock, DeckConfig::default());
    deck.rebuild(sequence(10));

    // d09 is the last deal outside the window.
    let events = deck.dismiss_immediate("d09");
    assert!(events.contains(&FeedEvent::DismissedImmediately { deal_id: "d09".into() }));

    deck.dismiss("d04");
    clock.advance(320);
    let events = deck.tick();
    assert!(events.contains(&FeedEvent::SlotRemoved { index: 4, dismissed: "d04".into() }));

    let view = deck.view();
    assert_eq!(view.visible.len(), 8);
    assert_eq!(view.transition.phase, TransitionPhase::Idle);
    assert_eq!(
        visible_ids(&deck),
        vec!["d00", "d01", "d02", "d03", "d05", "d06", "d07", "d08"]
    );
}

/// A one-category filter matching fewer than nine deals yields a window as
/// long as the match count.
#[test]
fn narrow_filter_gives_short_window() {
    let (storage, clock) = setup();
    let mut pool = residual_pool(20);
    pool.retain(|d| d.category != Category::Concentrate);
    pool.extend((0..4).map(|i| {
        deal(&format!("conc{i}"), Category::Concentrate, &format!("c{i}"), 30.0, 60.0)
    }));
    let deals = shared(pool);

    let engine = CurationEngine::new(CurationConfig::default());
    let filter = FilterState::default().with_categories([Category::Concentrate]);
    let feed = engine.build_feed(&deals, &filter, &FeedContext::new(day(16), "u1"));
    assert_eq!(feed.len(), 4);

    let mut deck = deck_with(&storage, &clock, engine.config().deck.clone());
    let events = deck.rebuild(feed.deals());
    assert_eq!(events, vec![FeedEvent::DeckRebuilt { total: 4, visible: 4 }]);
    assert_eq!(deck.view().visible.len(), 4);
}

// ── Transitions ─────────────────────────────────────────────────────────────

#[test]
fn second_dismissal_is_ignored_while_busy() {
    let (storage, clock) = setup();
    let mut deck = deck_with(&storage, &clock, DeckConfig::default());
    deck.rebuild(sequence(12));

    deck.dismiss("d00");
    assert_eq!(ignored_reason(&deck.dismiss("d01")), Some(IgnoreReason::Busy));

    clock.advance(320);
    deck.tick();
    // Still animating the replacement in.
    assert!(matches!(deck.transition(), Transition::Appearing { .. }));
    assert_eq!(ignored_reason(&deck.dismiss("d01")), Some(IgnoreReason::Busy));

    clock.advance(400);
    let events = deck.tick();
    assert!(events.contains(&FeedEvent::AppearSettled { deal_id: "d09".into() }));
    assert_eq!(deck.dismiss("d01").len(), 1);
    assert!(!deck.is_dismissed("d01"), "only recorded once the timer fires");
}

#[test]
fn unknown_and_dismissed_ids_are_ignored() {
    let (storage, clock) = setup();
    let mut deck = deck_with(&storage, &clock, DeckConfig::default());
    deck.rebuild(sequence(12));

    assert_eq!(ignored_reason(&deck.dismiss("d10")), Some(IgnoreReason::NotVisible));
    assert_eq!(ignored_reason(&deck.dismiss("nope")), Some(IgnoreReason::NotVisible));
    assert_eq!(ignored_reason(&deck.dismiss_immediate("nope")), Some(IgnoreReason::UnknownDeal));

    deck.dismiss_immediate("d10");
    clock.advance(300);
    assert_eq!(
        ignored_reason(&deck.dismiss_immediate("d10")),
        Some(IgnoreReason::AlreadyDismissed)
    );
}

#[test]
fn high_scoring_replacement_gets_the_longer_reveal() {
    let (storage, clock) = setup();
    let mut deck = deck_with(&storage, &clock, DeckConfig::default());
    let mut seq = sequence(9);
    seq.push(Arc::new(deal("star", Category::Vape, "s-star", 9.0, 95.0)));
    deck.rebuild(seq);

    deck.dismiss("d02");
    clock.advance(320);
    deck.tick();
    clock.advance(400);
    let events = deck.tick();
    assert!(
        !events.iter().any(|e| matches!(e, FeedEvent::AppearSettled { .. })),
        "highlight settled at the normal delay"
    );
    assert_eq!(deck.view().transition.deal_id.as_deref(), Some("star"));

    clock.advance(300);
    assert!(deck.tick().contains(&FeedEvent::AppearSettled { deal_id: "star".into() }));
}

#[test]
fn late_tick_catches_up_on_both_timers() {
    let (storage, clock) = setup();
    let mut deck = deck_with(&storage, &clock, DeckConfig::default());
    deck.rebuild(sequence(12));

    deck.dismiss("d05");
    clock.advance(5_000);
    let events = deck.tick();
    assert!(events.iter().any(|e| matches!(e, FeedEvent::SlotReplaced { index: 5, .. })));
    assert!(events.iter().any(|e| matches!(e, FeedEvent::AppearSettled { .. })));
    assert_eq!(deck.transition(), &Transition::Idle);
}

#[test]
fn immediate_dismissals_are_rate_limited_and_leave_slots_alone() {
    let (storage, clock) = setup();
    let mut deck = deck_with(&storage, &clock, DeckConfig::default());
    deck.rebuild(sequence(12));
    let before = deck.visible().to_vec();

    assert!(ignored_reason(&deck.dismiss_immediate("d00")).is_none());
    clock.advance(100);
    assert_eq!(ignored_reason(&deck.dismiss_immediate("d01")), Some(IgnoreReason::CoolingDown));
    clock.advance(200);
    assert!(ignored_reason(&deck.dismiss_immediate("d01")).is_none());

    let view = deck.view();
    assert_eq!(view.counts.dismissed, 2);
    assert_eq!(view.remaining.len(), 10);
    assert!(view.visible.iter().zip(&before).all(|(a, b)| Arc::ptr_eq(a, b)));
}

#[test]
fn unmount_discards_pending_transition() {
    let (storage, clock) = setup();
    let mut deck = deck_with(&storage, &clock, DeckConfig::default());
    deck.rebuild(sequence(12));
    let before = visible_ids(&deck);

    deck.dismiss("d03");
    let events = deck.unmount();
    assert!(events.contains(&FeedEvent::TransitionDiscarded { deal_id: "d03".into() }));

    clock.advance(10_000);
    assert!(deck.tick().is_empty());
    assert_eq!(visible_ids(&deck), before);
    assert!(!deck.is_dismissed("d03"));
    assert!(!deck.is_mounted());
    assert_eq!(ignored_reason(&deck.dismiss("d04")), Some(IgnoreReason::Unmounted));
    assert_eq!(storage.write_count(), 0);
}

#[test]
fn rebuild_drops_pending_transition_and_skips_dismissed() {
    let (storage, clock) = setup();
    let mut deck = deck_with(&storage, &clock, DeckConfig::default());
    deck.rebuild(sequence(12));
    deck.dismiss_immediate("d00");
    deck.dismiss("d01");

    let events = deck.rebuild(sequence(12));
    assert!(events.contains(&FeedEvent::TransitionDiscarded { deal_id: "d01".into() }));
    assert_eq!(deck.transition(), &Transition::Idle);
    assert_eq!(deck.visible()[0].id, "d01");
    assert_eq!(deck.visible().len(), 9);
    assert_eq!(deck.view().counts.total, 12);
}

#[test]
fn narrowing_rebuild_counts_only_the_new_sequence() {
    let (storage, clock) = setup();
    let mut deck = deck_with(&storage, &clock, DeckConfig::default());
    deck.rebuild(sequence(12));
    assert_eq!(deck.view().counts.seen, 9);
    deck.dismiss_immediate("d00");
    clock.advance(300);
    deck.dismiss_immediate("d11");

    // d11 stays dismissed for the day but is not part of this sequence.
    deck.rebuild(sequence(3));
    let view = deck.view();
    assert_eq!(view.counts, DeckCounts { total: 3, seen: 2, dismissed: 1 });
    assert_eq!(view.remaining.len(), view.counts.total - view.counts.dismissed);
    assert!(deck.is_dismissed("d11"));

    clock.roll_to_next_day();
    deck.tick();
    let view = deck.view();
    assert_eq!(view.counts, DeckCounts { total: 3, seen: 2, dismissed: 0 });
    assert_eq!(view.remaining.len(), 3);
}

#[test]
fn completes_when_everything_is_dismissed() {
    let (storage, clock) = setup();
    let mut deck = deck_with(&storage, &clock, DeckConfig::default());
    deck.rebuild(sequence(2));

    for id in ["d00", "d01"] {
        deck.dismiss(id);
        clock.advance(320);
        deck.tick();
    }
    let view = deck.view();
    assert!(view.visible.is_empty());
    assert!(view.is_complete);
    assert_eq!(view.counts.seen, 2);
}

// ── Persistence ─────────────────────────────────────────────────────────────

#[test]
fn writes_are_debounced_then_reloaded() {
    let (storage, clock) = setup();
    let mut deck = deck_with(&storage, &clock, DeckConfig::default());
    deck.rebuild(sequence(12));

    deck.dismiss("d00");
    clock.advance(320);
    deck.tick();
    assert_eq!(storage.write_count(), 0, "written before the debounce elapsed");

    clock.advance(249);
    deck.tick();
    assert_eq!(storage.write_count(), 0);

    clock.advance(1);
    let events = deck.tick();
    assert!(events.contains(&FeedEvent::StatePersisted { key: DISMISSED_KEY.into(), count: 1 }));
    assert_eq!(storage.write_count(), 1);

    let raw = storage.raw(DISMISSED_KEY).unwrap();
    let record: DailyIdSet = serde_json::from_str(&raw).unwrap();
    assert_eq!(record.date, "2026-10-16");
    assert_eq!(record.ids, vec!["d00".to_string()]);

    // A fresh deck on the same day starts from the stored set.
    let mut reopened = deck_with(&storage, &clock, DeckConfig::default());
    reopened.rebuild(sequence(12));
    assert!(reopened.is_dismissed("d00"));
    assert_eq!(reopened.visible()[0].id, "d01");
}

#[test]
fn rapid_dismissals_coalesce_into_one_write() {
    let (storage, clock) = setup();
    let config = DeckConfig { persist_debounce_ms: 1_000, ..DeckConfig::default() };
    let mut deck = deck_with(&storage, &clock, config);
    deck.rebuild(sequence(12));

    for id in ["d05", "d06", "d07"] {
        deck.dismiss_immediate(id);
        clock.advance(300);
        deck.tick();
    }
    assert_eq!(storage.write_count(), 0, "a write landed inside the quiet period");

    clock.advance(1_000);
    deck.tick();
    assert_eq!(storage.write_count(), 1, "only the trailing write should land");
    let record: DailyIdSet = serde_json::from_str(&storage.raw(DISMISSED_KEY).unwrap()).unwrap();
    assert_eq!(record.len(), 3);
    assert!(deck.flush().is_empty(), "nothing pending after the debounced write");
}

#[test]
fn unmount_flushes_pending_write() {
    let (storage, clock) = setup();
    let mut deck = deck_with(&storage, &clock, DeckConfig::default());
    deck.rebuild(sequence(12));
    deck.dismiss_immediate("d10");

    let events = deck.unmount();
    assert!(events.contains(&FeedEvent::StatePersisted { key: DISMISSED_KEY.into(), count: 1 }));
    assert_eq!(storage.write_count(), 1);
}

#[test]
fn dismissed_set_resets_on_a_new_day() {
    let (storage, clock) = setup();
    let mut deck = deck_with(&storage, &clock, DeckConfig::default());
    deck.rebuild(sequence(12));
    deck.dismiss_immediate("d00");
    deck.flush();
    assert!(deck.is_dismissed("d00"));

    clock.roll_to_next_day();
    let events = deck.tick();
    assert!(events.contains(&FeedEvent::DayRolledOver { date: "2026-10-17".into() }));
    assert!(!deck.is_dismissed("d00"));
    assert_eq!(deck.view().counts.dismissed, 0);

    // Yesterday's record on disk is stale and loads as empty.
    let reopened = deck_with(&storage, &clock, DeckConfig::default());
    assert!(!reopened.is_dismissed("d00"));
}
