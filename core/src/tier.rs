//! Tier classifier: buckets the residual pool by upstream deal score.

use crate::{
    config::{TierRatios, TierThresholds},
    deal::Deal,
    rng::FeedRng,
};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    High,
    Mid,
    Low,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::High, Tier::Mid, Tier::Low];

    pub fn of(score: f64, thresholds: &TierThresholds) -> Tier {
        if score >= thresholds.high_min {
            Tier::High
        } else if score >= thresholds.mid_min {
            Tier::Mid
        } else {
            Tier::Low
        }
    }

    pub fn index(&self) -> usize {
        match self {
            Tier::High => 0,
            Tier::Mid  => 1,
            Tier::Low  => 2,
        }
    }

    pub fn ratio(&self, ratios: &TierRatios) -> f64 {
        match self {
            Tier::High => ratios.high,
            Tier::Mid  => ratios.mid,
            Tier::Low  => ratios.low,
        }
    }

    /// Tiers in descending target-ratio order (ties keep High, Mid, Low).
    pub fn by_ratio_desc(ratios: &TierRatios) -> [Tier; 3] {
        let mut order = Tier::ALL;
        order.sort_by(|a, b| b.ratio(ratios).total_cmp(&a.ratio(ratios)));
        order
    }
}

/// One draw queue per tier, indexed by `Tier::index`.
#[derive(Debug, Clone, Default)]
pub struct TierQueues {
    queues: [VecDeque<Arc<Deal>>; 3],
}

impl TierQueues {
    pub fn classify(pool: Vec<Arc<Deal>>, thresholds: &TierThresholds) -> Self {
        let mut queues: [VecDeque<Arc<Deal>>; 3] = Default::default();
        for deal in pool {
            queues[Tier::of(deal.deal_score, thresholds).index()].push_back(deal);
        }
        Self { queues }
    }

    /// Independent Fisher–Yates pass per tier, High then Mid then Low.
    pub fn shuffle(&mut self, rng: &mut FeedRng) {
        for queue in &mut self.queues {
            rng.shuffle(queue.make_contiguous());
        }
    }

    pub fn queue(&self, tier: Tier) -> &VecDeque<Arc<Deal>> {
        &self.queues[tier.index()]
    }

    pub fn queue_mut(&mut self, tier: Tier) -> &mut VecDeque<Arc<Deal>> {
        &mut self.queues[tier.index()]
    }

    pub fn len(&self, tier: Tier) -> usize {
        self.queues[tier.index()].len()
    }

    pub fn total(&self) -> usize {
        self.queues.iter().map(VecDeque::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.iter().all(VecDeque::is_empty)
    }
}
