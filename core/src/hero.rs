//! Hero slot selector: pins the cheapest deal in each priority niche.
//!
//! For each definition, in order:
//!   1. collect unclaimed deals matching the predicate;
//!   2. sort by ascending sale price (ties by id, for determinism);
//!   3. take the cheapest whose dispensary has not supplied a hero yet,
//!      else the cheapest regardless. A slot with candidates is never empty.
//!
//! A definition with no candidates is omitted. Claimed deals leave the pool
//! before the next definition is evaluated.

use crate::{config::HeroSlotDefinition, deal::Deal};
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct HeroPick {
    pub label: String,
    pub deal:  Arc<Deal>,
    /// True when every candidate's dispensary was already used.
    pub repeated_dispensary: bool,
}

#[derive(Debug, Clone, Default)]
pub struct HeroSelection {
    /// In definition order; length ≤ number of definitions.
    pub heroes:   Vec<HeroPick>,
    /// Unclaimed deals, input order preserved.
    pub residual: Vec<Arc<Deal>>,
}

impl HeroSlotDefinition {
    pub fn matches(&self, deal: &Deal) -> bool {
        if deal.category != self.category {
            return false;
        }
        if !self.subtypes.is_empty() && !self.subtypes.iter().any(|s| deal.subtype_matches(s)) {
            return false;
        }
        match &self.weight {
            None => true,
            Some(range) => deal.parsed_weight().is_some_and(|w| range.contains(&w)),
        }
    }
}

pub fn select_heroes(pool: Vec<Arc<Deal>>, definitions: &[HeroSlotDefinition]) -> HeroSelection {
    let mut claimed = vec![false; pool.len()];
    let mut used_dispensaries: HashSet<&str> = HashSet::new();
    let mut heroes = Vec::new();

    for def in definitions {
        let mut candidates: Vec<usize> = (0..pool.len())
            .filter(|&i| !claimed[i] && def.matches(&pool[i]))
            .collect();

        if candidates.is_empty() {
            log::debug!("hero: slot '{}' has no candidates, omitted", def.label);
            continue;
        }

        candidates.sort_by(|&a, &b| {
            pool[a].sale_price
                .total_cmp(&pool[b].sale_price)
                .then_with(|| pool[a].id.cmp(&pool[b].id))
        });

        let fresh = candidates
            .iter()
            .copied()
            .find(|&i| !used_dispensaries.contains(pool[i].dispensary_id()));
        let (pick, repeated_dispensary) = match fresh {
            Some(i) => (i, false),
            None => (candidates[0], true),
        };

        claimed[pick] = true;
        used_dispensaries.insert(pool[pick].dispensary_id());
        log::debug!(
            "hero: slot '{}' -> {} @ {:.2} from {} (of {} candidates)",
            def.label,
            pool[pick].id,
            pool[pick].sale_price,
            pool[pick].dispensary_id(),
            candidates.len()
        );

        heroes.push(HeroPick {
            label: def.label.clone(),
            deal: Arc::clone(&pool[pick]),
            repeated_dispensary,
        });
    }

    let residual = pool
        .iter()
        .zip(claimed)
        .filter(|(_, taken)| !taken)
        .map(|(deal, _)| Arc::clone(deal))
        .collect();

    HeroSelection { heroes, residual }
}
