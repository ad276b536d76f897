//! The curation engine: turns a scored deal list into the feed sequence.
//!
//! EXECUTION ORDER (fixed, documented, never reordered):
//!   1. Filter & sort         (filter.rs)
//!      └─ any sort other than Curated returns here; curation is bypassed
//!   2. Hero selector         (hero.rs)
//!   3. Tier classifier       (tier.rs)
//!   4. Seeded shuffle        (rng.rs)   High, then Mid, then Low
//!   5. Diversity interleaver (interleave.rs)
//!   6. Window rebalancer     (rebalance.rs)
//!
//! RULES:
//!   - The engine is infallible: degradations are logged, never returned.
//!   - All randomness flows through one FeedRng seeded from (date, user).
//!   - Deals are never copied; every stage moves Arc<Deal> handles.

use crate::{
    config::CurationConfig,
    deal::{ChainResolver, Deal},
    feed::{CuratedFeed, FeedEntry, Placement},
    filter::{self, FilterState},
    geo::Coordinates,
    hero::select_heroes,
    interleave::Interleaver,
    rebalance::rebalance,
    rng::FeedRng,
    tier::TierQueues,
};
use chrono::NaiveDate;
use std::sync::Arc;

/// Per-session inputs. Two builds with the same context, deals, and filter
/// produce the same sequence.
#[derive(Debug, Clone)]
pub struct FeedContext {
    pub date:     NaiveDate,
    pub user_id:  String,
    pub location: Option<Coordinates>,
}

impl FeedContext {
    pub fn new(date: NaiveDate, user_id: impl Into<String>) -> Self {
        Self { date, user_id: user_id.into(), location: None }
    }

    pub fn with_location(mut self, location: Coordinates) -> Self {
        self.location = Some(location);
        self
    }
}

pub struct CurationEngine {
    config: CurationConfig,
    chains: ChainResolver,
}

impl CurationEngine {
    pub fn new(config: CurationConfig) -> Self {
        let chains = ChainResolver::new(config.chain_prefixes.clone());
        Self { config, chains }
    }

    pub fn config(&self) -> &CurationConfig {
        &self.config
    }

    pub fn chains(&self) -> &ChainResolver {
        &self.chains
    }

    /// Run the full pipeline. This is the cold rebuild.
    pub fn build_feed(&self, deals: &[Arc<Deal>], filter_state: &FilterState, ctx: &FeedContext) -> CuratedFeed {
        // 1. Filter & sort
        let outcome = filter::apply(deals, filter_state, ctx.location, self.config.weight_tolerance);
        log::debug!(
            "engine: {} of {} deals pass filters (sort {:?})",
            outcome.deals.len(),
            deals.len(),
            filter_state.sort
        );

        if !filter_state.is_curated() {
            let entries = outcome
                .deals
                .into_iter()
                .map(|deal| FeedEntry { deal, placement: Placement::Sorted })
                .collect();
            return CuratedFeed {
                entries,
                hero_count: 0,
                rebalance_passes: 0,
                distances: outcome.distances,
            };
        }

        // 2. Heroes
        let selection = select_heroes(outcome.deals, &self.config.hero_slots);
        let hero_count = selection.heroes.len();
        log::debug!(
            "engine: {hero_count} of {} hero slots filled",
            self.config.hero_slots.len()
        );

        // 3–4. Tiers, shuffled from a single generator
        let mut rng = FeedRng::for_session(ctx.date, &ctx.user_id);
        let mut queues = TierQueues::classify(selection.residual, &self.config.tiers);
        queues.shuffle(&mut rng);

        // 5. Interleave
        let emissions = Interleaver::new(self.config.ratios.clone(), self.config.diversity.clone(), &self.chains)
            .run(queues);
        let relaxed = emissions.iter().filter(|e| e.relaxed).count();
        if relaxed > 0 {
            log::debug!("engine: {relaxed} placements relaxed the diversity rules");
        }

        let mut entries: Vec<FeedEntry> = selection
            .heroes
            .into_iter()
            .map(|h| FeedEntry {
                deal:      h.deal,
                placement: Placement::Hero { label: h.label },
            })
            .collect();
        entries.extend(emissions.into_iter().map(|e| FeedEntry {
            deal:      e.deal,
            placement: if e.relaxed {
                Placement::Relaxed { tier: e.tier }
            } else {
                Placement::Interleaved { tier: e.tier }
            },
        }));

        // 6. Rebalance
        let report = rebalance(
            &mut entries,
            hero_count,
            &self.config.rebalance,
            &self.config.diversity,
            &self.chains,
        );
        log::debug!(
            "engine: rebalance ran {} passes, {} swaps",
            report.passes,
            report.swaps.len()
        );

        CuratedFeed {
            entries,
            hero_count,
            rebalance_passes: report.passes,
            distances: outcome.distances,
        }
    }
}
