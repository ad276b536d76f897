#![allow(dead_code)]

use chrono::NaiveDate;
use dealfeed_core::{
    clock::ManualClock,
    config::DeckConfig,
    deal::Deal,
    deck::Deck,
    store::{MemoryStorage, PersistedSet, DISMISSED_KEY},
    types::Category,
};
use std::sync::Arc;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, d).unwrap()
}

pub fn deal(id: &str, category: Category, disp: &str, price: f64, score: f64) -> Deal {
    Deal::new(id, category, disp, price, score).with_brand(format!("brand-{id}"))
}

pub fn shared(deals: Vec<Deal>) -> Vec<Arc<Deal>> {
    deals.into_iter().map(Arc::new).collect()
}

/// `n` residual deals: categories cycle, scores spread over every tier,
/// each from its own dispensary and brand, no parsable weight.
pub fn residual_pool(n: usize) -> Vec<Deal> {
    (0..n)
        .map(|i| {
            let category = Category::ALL[i % Category::ALL.len()];
            let score = match i % 3 {
                0 => 85.0,
                1 => 55.0,
                _ => 20.0,
            };
            deal(&format!("r{i:02}"), category, &format!("shop{i:02}"), 20.0 + i as f64, score)
        })
        .collect()
}

/// A mixed pool with repeated dispensaries and chains, for pipeline tests.
pub fn market_pool() -> Vec<Deal> {
    let dispensaries = [
        "planet13-strip",
        "planet13-downtown",
        "the-source-henderson",
        "curaleaf-west",
        "oasis",
        "reef",
        "jardin",
    ];
    let brands = ["Kiva", "Stiiizy", "Cookies", "Wyld", "Raw Garden", "Camino"];
    (0..60)
        .map(|i| {
            let category = Category::ALL[(i * 7) % Category::ALL.len()];
            let score = ((i * 37) % 100) as f64;
            Deal::new(
                format!("m{i:02}"),
                category,
                dispensaries[i % dispensaries.len()],
                10.0 + ((i * 13) % 50) as f64,
                score,
            )
            .with_brand(brands[(i * 5) % brands.len()])
        })
        .collect()
}

pub fn deck_with(storage: &MemoryStorage, clock: &ManualClock, config: DeckConfig) -> Deck {
    Deck::new(
        config,
        Box::new(clock.clone()),
        PersistedSet::new(Box::new(storage.clone()), DISMISSED_KEY),
    )
}
