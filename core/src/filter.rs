//! Filter & sort layer.
//!
//! A pure function from (deals, filter state, user location) to a narrowed,
//! optionally re-sorted list. With any sort other than `Curated` its output
//! is the final order and the hero/tier/diversity stages do not run.
//!
//! Missing data never excludes silently in the user's disfavour:
//!   - no user location → distance filter and distance sort are no-ops;
//!   - dispensary without coordinates → kept by the distance filter,
//!     sorted last by distance;
//!   - no original price → fails any non-zero minimum discount.

use crate::{
    deal::Deal,
    geo::Coordinates,
    types::{Category, DealId, DispensaryId},
    weight::WeightBucket,
};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortMode {
    /// Score-driven curation pipeline.
    #[default]
    Curated,
    PriceAsc,
    PriceDesc,
    DiscountDesc,
    DistanceAsc,
}

/// Inclusive sale-price bounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriceRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl PriceRange {
    pub fn contains(&self, price: f64) -> bool {
        self.min.map_or(true, |m| price >= m) && self.max.map_or(true, |m| price <= m)
    }
}

/// Empty sets mean "no restriction".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterState {
    pub categories:         BTreeSet<Category>,
    pub dispensaries:       BTreeSet<DispensaryId>,
    pub price:              Option<PriceRange>,
    pub min_discount_pct:   f64,
    pub weights:            BTreeSet<WeightBucket>,
    pub max_distance_miles: Option<f64>,
    pub sort:               SortMode,
}

impl FilterState {
    pub fn is_curated(&self) -> bool {
        self.sort == SortMode::Curated
    }

    pub fn with_categories(mut self, categories: impl IntoIterator<Item = Category>) -> Self {
        self.categories = categories.into_iter().collect();
        self
    }

    pub fn with_sort(mut self, sort: SortMode) -> Self {
        self.sort = sort;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct FilterOutcome {
    pub deals:     Vec<Arc<Deal>>,
    /// Miles from the user, for every deal whose distance was needed and known.
    pub distances: HashMap<DealId, f64>,
}

pub fn apply(
    deals: &[Arc<Deal>],
    state: &FilterState,
    user: Option<Coordinates>,
    weight_tolerance: f64,
) -> FilterOutcome {
    apply_with(deals, state, user, weight_tolerance, |from, to| from.distance_miles(to))
}

/// `apply` with an injectable distance function.
pub fn apply_with<F>(
    deals: &[Arc<Deal>],
    state: &FilterState,
    user: Option<Coordinates>,
    weight_tolerance: f64,
    distance_fn: F,
) -> FilterOutcome
where
    F: FnMut(&Coordinates, &Coordinates) -> f64,
{
    let mut memo = DistanceMemo::new(user, distance_fn);

    let mut kept: Vec<Arc<Deal>> = deals
        .iter()
        .filter(|deal| passes(deal, state, weight_tolerance, &mut memo))
        .cloned()
        .collect();

    match state.sort {
        SortMode::Curated => {}
        SortMode::PriceAsc => kept.sort_by(|a, b| a.sale_price.total_cmp(&b.sale_price)),
        SortMode::PriceDesc => kept.sort_by(|a, b| b.sale_price.total_cmp(&a.sale_price)),
        SortMode::DiscountDesc => {
            kept.sort_by(|a, b| desc_known_first(a.discount_percent(), b.discount_percent()))
        }
        SortMode::DistanceAsc => {
            if memo.enabled() {
                for deal in &kept {
                    memo.get(deal);
                }
                kept.sort_by(|a, b| asc_known_first(memo.cached(a), memo.cached(b)));
            } else {
                log::debug!("filter: distance sort requested without location, order kept");
            }
        }
    }

    log::debug!(
        "filter: {} of {} deals kept (sort={:?}, distance lookups={})",
        kept.len(),
        deals.len(),
        state.sort,
        memo.lookups
    );

    FilterOutcome {
        deals: kept,
        distances: memo.into_known(),
    }
}

fn passes<F>(deal: &Deal, state: &FilterState, tolerance: f64, memo: &mut DistanceMemo<F>) -> bool
where
    F: FnMut(&Coordinates, &Coordinates) -> f64,
{
    if !state.categories.is_empty() && !state.categories.contains(&deal.category) {
        return false;
    }
    if !state.dispensaries.is_empty() && !state.dispensaries.contains(deal.dispensary_id()) {
        return false;
    }
    if let Some(range) = &state.price {
        if !range.contains(deal.sale_price) {
            return false;
        }
    }
    if state.min_discount_pct > 0.0 {
        match deal.discount_percent() {
            Some(pct) if pct >= state.min_discount_pct => {}
            _ => return false,
        }
    }
    if !state.weights.is_empty() {
        let Some(weight) = deal.parsed_weight() else { return false };
        if !state.weights.iter().any(|b| b.matches(&weight, tolerance)) {
            return false;
        }
    }
    if let Some(max) = state.max_distance_miles {
        // Unknown distance is not "far".
        if let Some(d) = memo.get(deal) {
            if d > max {
                return false;
            }
        }
    }
    true
}

fn desc_known_first(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => y.total_cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn asc_known_first(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Per-pass distance cache: each deal's distance is computed at most once.
struct DistanceMemo<F> {
    user:        Option<Coordinates>,
    distance_fn: F,
    cache:       HashMap<DealId, Option<f64>>,
    lookups:     usize,
}

impl<F> DistanceMemo<F>
where
    F: FnMut(&Coordinates, &Coordinates) -> f64,
{
    fn new(user: Option<Coordinates>, distance_fn: F) -> Self {
        Self { user, distance_fn, cache: HashMap::new(), lookups: 0 }
    }

    fn enabled(&self) -> bool {
        self.user.is_some()
    }

    fn get(&mut self, deal: &Deal) -> Option<f64> {
        let user = self.user?;
        if let Some(hit) = self.cache.get(&deal.id) {
            return *hit;
        }
        let distance = deal.dispensary.coordinates.map(|to| {
            self.lookups += 1;
            (self.distance_fn)(&user, &to)
        });
        self.cache.insert(deal.id.clone(), distance);
        distance
    }

    fn cached(&self, deal: &Deal) -> Option<f64> {
        self.cache.get(&deal.id).copied().flatten()
    }

    fn into_known(self) -> HashMap<DealId, f64> {
        self.cache
            .into_iter()
            .filter_map(|(id, d)| d.map(|d| (id, d)))
            .collect()
    }
}
