//! Diversity state: rolling memory of recently emitted attributes.
//!
//! Each attribute keeps a window as long as its run limit. A candidate
//! violates a rule when the window is full and every entry in it equals the
//! candidate's value, i.e. placing it would extend a run past the limit.

use crate::{
    config::DiversityLimits,
    deal::{ChainResolver, Deal},
    types::Category,
};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Violation {
    Brand,
    Category,
    Dispensary,
    Chain,
}

#[derive(Debug, Clone)]
pub struct DiversityState {
    limits:       DiversityLimits,
    brands:       VecDeque<Option<String>>,
    categories:   VecDeque<Category>,
    dispensaries: VecDeque<String>,
    chains:       VecDeque<String>,
}

impl DiversityState {
    pub fn new(limits: DiversityLimits) -> Self {
        Self {
            brands:       VecDeque::with_capacity(limits.max_brand_run),
            categories:   VecDeque::with_capacity(limits.max_category_run),
            dispensaries: VecDeque::with_capacity(limits.max_dispensary_run),
            chains:       VecDeque::with_capacity(limits.max_chain_run),
            limits,
        }
    }

    /// First rule the candidate would break, if any.
    pub fn check(&self, deal: &Deal, chains: &ChainResolver) -> Option<Violation> {
        if let Some(brand) = normalized_brand(deal) {
            if run_would_exceed(&self.brands, self.limits.max_brand_run, |b| {
                b.as_deref() == Some(brand.as_str())
            }) {
                return Some(Violation::Brand);
            }
        }
        if run_would_exceed(&self.categories, self.limits.max_category_run, |c| {
            *c == deal.category
        }) {
            return Some(Violation::Category);
        }
        if run_would_exceed(&self.dispensaries, self.limits.max_dispensary_run, |d| {
            d == deal.dispensary_id()
        }) {
            return Some(Violation::Dispensary);
        }
        let chain = chains.chain_of(deal.dispensary_id());
        if run_would_exceed(&self.chains, self.limits.max_chain_run, |c| c == chain) {
            return Some(Violation::Chain);
        }
        None
    }

    pub fn allows(&self, deal: &Deal, chains: &ChainResolver) -> bool {
        self.check(deal, chains).is_none()
    }

    pub fn record(&mut self, deal: &Deal, chains: &ChainResolver) {
        push_capped(&mut self.brands, self.limits.max_brand_run, normalized_brand(deal));
        push_capped(&mut self.categories, self.limits.max_category_run, deal.category);
        push_capped(
            &mut self.dispensaries,
            self.limits.max_dispensary_run,
            deal.dispensary_id().to_string(),
        );
        push_capped(
            &mut self.chains,
            self.limits.max_chain_run,
            chains.chain_of(deal.dispensary_id()).to_string(),
        );
    }
}

/// Replay a finished sequence and report every position that breaks a rule.
pub fn audit<'a, I>(sequence: I, limits: &DiversityLimits, chains: &ChainResolver) -> Vec<(usize, Violation)>
where
    I: IntoIterator<Item = &'a Deal>,
{
    let mut state = DiversityState::new(limits.clone());
    let mut out = Vec::new();
    for (i, deal) in sequence.into_iter().enumerate() {
        if let Some(v) = state.check(deal, chains) {
            out.push((i, v));
        }
        state.record(deal, chains);
    }
    out
}

fn normalized_brand(deal: &Deal) -> Option<String> {
    deal.brand
        .as_deref()
        .map(|b| b.trim().to_ascii_lowercase())
        .filter(|b| !b.is_empty())
}

fn run_would_exceed<T>(window: &VecDeque<T>, limit: usize, same: impl Fn(&T) -> bool) -> bool {
    window.len() >= limit && window.iter().all(same)
}

fn push_capped<T>(window: &mut VecDeque<T>, cap: usize, value: T) {
    window.push_back(value);
    while window.len() > cap {
        window.pop_front();
    }
}
