//! The curated sequence handed from the pipeline to the deck.

use crate::{deal::Deal, tier::Tier, types::DealId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// How an entry reached its position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Placement {
    Hero { label: String },
    Interleaved { tier: Tier },
    /// No diversity-passing candidate existed; rules were ignored.
    Relaxed { tier: Tier },
    /// Moved by the window rebalancer. Still bound by the diversity rules;
    /// a swap that could not keep them is recorded as `Relaxed` instead.
    Rebalanced { tier: Tier },
    /// Explicit sort; curation bypassed.
    Sorted,
}

impl Placement {
    pub fn is_hero(&self) -> bool {
        matches!(self, Placement::Hero { .. })
    }

    /// Entries whose neighbours were not chosen under the diversity rules.
    pub fn exempt_from_diversity(&self) -> bool {
        matches!(self, Placement::Hero { .. } | Placement::Relaxed { .. })
    }
}

#[derive(Debug, Clone)]
pub struct FeedEntry {
    pub deal:      Arc<Deal>,
    pub placement: Placement,
}

#[derive(Debug, Clone, Default)]
pub struct CuratedFeed {
    pub entries:    Vec<FeedEntry>,
    pub hero_count: usize,
    /// Rebalance passes that ran (0 for sorted feeds).
    pub rebalance_passes: usize,
    /// Miles from the user, where computed by the filter layer.
    pub distances:  HashMap<DealId, f64>,
}

impl CuratedFeed {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn deals(&self) -> Vec<Arc<Deal>> {
        self.entries.iter().map(|e| Arc::clone(&e.deal)).collect()
    }

    pub fn distance_of(&self, deal_id: &str) -> Option<f64> {
        self.distances.get(deal_id).copied()
    }

    pub fn ids(&self) -> Vec<DealId> {
        self.entries.iter().map(|e| e.deal.id.clone()).collect()
    }
}
