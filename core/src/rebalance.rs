//! Window rebalancer: caps per-dispensary concentration near the top.
//!
//! RULE: only positions `hero_count..window` ever move. Heroes are anchors:
//! they are counted toward the cap but never swapped.
//!
//! Each pass walks the window with running dispensary counts. An entry whose
//! dispensary has already filled the cap is swapped with the first deal beyond
//! the window whose dispensary is under the cap. A swap touches the diversity
//! checks at both positions and at the `lookback` positions after each; the
//! first candidate that keeps all of them clean wins. When none does, the
//! first under-cap candidate is taken and every position it breaks is marked
//! `Relaxed`.
//!
//! Diversity is replayed from `hero_count`, the same origin the interleaver
//! starts from.

use crate::{
    config::{DiversityLimits, RebalanceParams},
    deal::ChainResolver,
    diversity::DiversityState,
    feed::{FeedEntry, Placement},
};
use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RebalanceReport {
    pub passes:  usize,
    /// (window position, position it was swapped with), in order applied.
    pub swaps:   Vec<(usize, usize)>,
    /// Positions marked `Relaxed` because no clean swap existed.
    pub relaxed: Vec<usize>,
}

pub fn rebalance(
    entries: &mut [FeedEntry],
    hero_count: usize,
    params: &RebalanceParams,
    limits: &DiversityLimits,
    chains: &ChainResolver,
) -> RebalanceReport {
    let mut report = RebalanceReport::default();
    let window_end = params.window.min(entries.len());
    if hero_count >= window_end || params.dispensary_cap == 0 {
        return report;
    }
    let cap = params.dispensary_cap;

    for pass in 0..params.max_passes {
        report.passes = pass + 1;
        let mut counts: HashMap<String, usize> = HashMap::new();
        for entry in &entries[..window_end] {
            *counts.entry(entry.deal.dispensary_id().to_string()).or_default() += 1;
        }

        let mut running: HashMap<String, usize> = HashMap::new();
        let mut swapped = false;

        for i in 0..window_end {
            let disp = entries[i].deal.dispensary_id().to_string();
            let seen = running.entry(disp.clone()).or_default();
            *seen += 1;
            if i < hero_count || *seen <= cap {
                continue;
            }

            let Some((j, breaks)) =
                find_replacement(entries, i, hero_count, window_end, &counts, cap, limits, chains)
            else {
                log::debug!("rebalance: no under-cap replacement for {disp} at {i}");
                continue;
            };

            let incoming = entries[j].deal.dispensary_id().to_string();
            *seen -= 1;
            *running.entry(incoming.clone()).or_default() += 1;
            if let Some(c) = counts.get_mut(&disp) {
                *c -= 1;
            }
            *counts.entry(incoming).or_default() += 1;

            entries.swap(i, j);
            mark_rebalanced(&mut entries[i]);
            mark_rebalanced(&mut entries[j]);
            if !breaks.is_empty() {
                log::debug!("rebalance: swap {i}<->{j} relaxes positions {breaks:?}");
                for &p in &breaks {
                    mark_relaxed(&mut entries[p]);
                }
                report.relaxed.extend(breaks);
            }
            report.swaps.push((i, j));
            swapped = true;
        }

        if !swapped {
            break;
        }
    }

    if !report.swaps.is_empty() {
        log::debug!(
            "rebalance: {} swaps in {} passes (window={window_end}, cap={cap})",
            report.swaps.len(),
            report.passes
        );
    }
    report
}

/// First under-cap candidate beyond the window, preferring one whose swap
/// breaks nothing. Returns the candidate with the positions the swap breaks.
#[allow(clippy::too_many_arguments)]
fn find_replacement(
    entries: &[FeedEntry],
    target: usize,
    hero_count: usize,
    window_end: usize,
    counts: &HashMap<String, usize>,
    cap: usize,
    limits: &DiversityLimits,
    chains: &ChainResolver,
) -> Option<(usize, Vec<usize>)> {
    let lookback = limits
        .max_brand_run
        .max(limits.max_category_run)
        .max(limits.max_dispensary_run)
        .max(limits.max_chain_run);

    let mut first_under_cap = None;
    for (j, entry) in entries.iter().enumerate().skip(window_end) {
        let under_cap = counts.get(entry.deal.dispensary_id()).copied().unwrap_or(0) < cap;
        if !under_cap {
            continue;
        }
        let view = Swapped { entries, a: target, b: j };
        let breaks = view.breaks(hero_count, lookback, limits, chains);
        if breaks.is_empty() {
            return Some((j, breaks));
        }
        first_under_cap.get_or_insert((j, breaks));
    }
    first_under_cap
}

/// `entries` as they would read with positions `a` and `b` exchanged.
struct Swapped<'a> {
    entries: &'a [FeedEntry],
    a:       usize,
    b:       usize,
}

impl Swapped<'_> {
    fn at(&self, k: usize) -> &FeedEntry {
        if k == self.a {
            &self.entries[self.b]
        } else if k == self.b {
            &self.entries[self.a]
        } else {
            &self.entries[k]
        }
    }

    /// Positions whose diversity check would fail after the swap. The two
    /// moved entries always count; an untouched neighbour counts unless its
    /// placement is already exempt.
    fn breaks(
        &self,
        hero_count: usize,
        lookback: usize,
        limits: &DiversityLimits,
        chains: &ChainResolver,
    ) -> Vec<usize> {
        let mut out = Vec::new();
        for pos in [self.a, self.b] {
            let start = pos.saturating_sub(lookback).max(hero_count);
            let end = (pos + lookback + 1).min(self.entries.len());
            let mut state = DiversityState::new(limits.clone());
            for p in start..end {
                let entry = self.at(p);
                if p >= pos && !out.contains(&p) && !state.allows(&entry.deal, chains) {
                    let moved = p == self.a || p == self.b;
                    if moved || !entry.placement.exempt_from_diversity() {
                        out.push(p);
                    }
                }
                state.record(&entry.deal, chains);
            }
        }
        out.sort_unstable();
        out
    }
}

fn mark_rebalanced(entry: &mut FeedEntry) {
    entry.placement = match &entry.placement {
        Placement::Interleaved { tier } | Placement::Relaxed { tier } | Placement::Rebalanced { tier } => {
            Placement::Rebalanced { tier: *tier }
        }
        other => other.clone(),
    };
}

fn mark_relaxed(entry: &mut FeedEntry) {
    if let Placement::Interleaved { tier } | Placement::Relaxed { tier } | Placement::Rebalanced { tier } =
        entry.placement
    {
        entry.placement = Placement::Relaxed { tier };
    }
}
