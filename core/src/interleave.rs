//! Diversity-constrained interleaver.
//!
//! Merges the three shuffled tier queues into one sequence:
//!   - the next tier is whichever is furthest behind its target share,
//!     measured as drawn / (ratio × total residual), recomputed after every
//!     emission so the shares converge instead of front-loading one tier;
//!   - inside that tier, placement strategies are tried in order until one
//!     yields a candidate.
//!
//! RULE: the last strategy always succeeds on a non-empty pool. The loop
//! never stalls and never drops or duplicates a deal; diversity is given up
//! before completeness is.

use crate::{
    config::{DiversityLimits, TierRatios},
    deal::{ChainResolver, Deal},
    diversity::DiversityState,
    tier::{Tier, TierQueues},
};
use std::sync::Arc;

/// A deal pulled from a tier queue, by position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub tier:  Tier,
    pub index: usize,
}

/// Everything a strategy may look at. Strategies never mutate state.
pub struct PickContext<'a> {
    pub queues:    &'a TierQueues,
    pub preferred: Tier,
    /// Tiers in descending target-ratio order.
    pub fallback:  [Tier; 3],
    pub state:     &'a DiversityState,
    pub chains:    &'a ChainResolver,
}

impl PickContext<'_> {
    fn first_passing(&self, tier: Tier) -> Option<Candidate> {
        self.queues
            .queue(tier)
            .iter()
            .position(|deal| self.state.allows(deal, self.chains))
            .map(|index| Candidate { tier, index })
    }
}

/// One step of the fallback chain.
pub trait PlacementStrategy {
    fn name(&self) -> &'static str;

    fn pick(&self, ctx: &PickContext<'_>) -> Option<Candidate>;

    /// Whether a pick from this strategy ignores the diversity rules.
    fn relaxes(&self) -> bool {
        false
    }
}

/// First diversity-passing deal in the tier that is furthest behind.
pub struct PreferredTier;

impl PlacementStrategy for PreferredTier {
    fn name(&self) -> &'static str { "preferred_tier" }

    fn pick(&self, ctx: &PickContext<'_>) -> Option<Candidate> {
        ctx.first_passing(ctx.preferred)
    }
}

/// First diversity-passing deal in any other tier, descending ratio order.
pub struct OtherTiers;

impl PlacementStrategy for OtherTiers {
    fn name(&self) -> &'static str { "other_tiers" }

    fn pick(&self, ctx: &PickContext<'_>) -> Option<Candidate> {
        ctx.fallback
            .iter()
            .filter(|&&t| t != ctx.preferred)
            .find_map(|&t| ctx.first_passing(t))
    }
}

/// Head of the first non-empty queue, rules ignored.
pub struct Relaxed;

impl PlacementStrategy for Relaxed {
    fn name(&self) -> &'static str { "relaxed" }

    fn pick(&self, ctx: &PickContext<'_>) -> Option<Candidate> {
        std::iter::once(ctx.preferred)
            .chain(ctx.fallback.iter().copied())
            .find(|&t| !ctx.queues.queue(t).is_empty())
            .map(|tier| Candidate { tier, index: 0 })
    }

    fn relaxes(&self) -> bool {
        true
    }
}

pub fn default_strategies() -> Vec<Box<dyn PlacementStrategy>> {
    vec![Box::new(PreferredTier), Box::new(OtherTiers), Box::new(Relaxed)]
}

#[derive(Debug, Clone)]
pub struct Emission {
    pub deal:     Arc<Deal>,
    pub tier:     Tier,
    pub relaxed:  bool,
    pub strategy: &'static str,
}

pub struct Interleaver<'a> {
    ratios:     TierRatios,
    limits:     DiversityLimits,
    chains:     &'a ChainResolver,
    strategies: Vec<Box<dyn PlacementStrategy>>,
}

impl<'a> Interleaver<'a> {
    pub fn new(ratios: TierRatios, limits: DiversityLimits, chains: &'a ChainResolver) -> Self {
        Self {
            ratios,
            limits,
            chains,
            strategies: default_strategies(),
        }
    }

    /// Replace the fallback chain. `Relaxed` is still applied if none of
    /// the given strategies yields a candidate.
    pub fn with_strategies(mut self, strategies: Vec<Box<dyn PlacementStrategy>>) -> Self {
        self.strategies = strategies;
        self
    }

    pub fn run(&self, mut queues: TierQueues) -> Vec<Emission> {
        let total = queues.total();
        let fallback = Tier::by_ratio_desc(&self.ratios);
        let mut drawn = [0usize; 3];
        let mut state = DiversityState::new(self.limits.clone());
        let mut out = Vec::with_capacity(total);

        while let Some(preferred) = self.choose_tier(&queues, &drawn, total) {
            let picked = {
                let ctx = PickContext {
                    queues: &queues,
                    preferred,
                    fallback,
                    state: &state,
                    chains: self.chains,
                };
                self.strategies
                    .iter()
                    .find_map(|s| s.pick(&ctx).map(|c| (c, s.relaxes(), s.name())))
                    .or_else(|| Relaxed.pick(&ctx).map(|c| (c, true, Relaxed.name())))
            };
            // choose_tier only returns a non-empty tier, so Relaxed always picks.
            let Some((candidate, relaxed, strategy)) = picked else {
                break;
            };

            let Some(deal) = queues.queue_mut(candidate.tier).remove(candidate.index) else {
                break;
            };
            if relaxed {
                log::debug!(
                    "interleave: relaxed placement of {} at position {}",
                    deal.id,
                    out.len()
                );
            }

            state.record(&deal, self.chains);
            drawn[candidate.tier.index()] += 1;
            out.push(Emission { deal, tier: candidate.tier, relaxed, strategy });
        }

        log::debug!(
            "interleave: emitted {} (high={} mid={} low={}, relaxed={})",
            out.len(),
            drawn[0],
            drawn[1],
            drawn[2],
            out.iter().filter(|e| e.relaxed).count()
        );
        out
    }

    /// Non-empty tier with the lowest progress toward its quota.
    /// Ties go to the tier with the larger ratio.
    fn choose_tier(&self, queues: &TierQueues, drawn: &[usize; 3], total: usize) -> Option<Tier> {
        let mut best: Option<(Tier, f64)> = None;
        for tier in Tier::by_ratio_desc(&self.ratios) {
            if queues.len(tier) == 0 {
                continue;
            }
            let quota = tier.ratio(&self.ratios) * total as f64;
            let progress = if quota > 0.0 {
                drawn[tier.index()] as f64 / quota
            } else {
                f64::INFINITY
            };
            if best.map_or(true, |(_, p)| progress < p) {
                best = Some((tier, progress));
            }
        }
        best.map(|(tier, _)| tier)
    }
}
