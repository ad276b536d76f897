//! dealfeed-core: curation engine for a daily deal feed.
//!
//! The pipeline order lives in engine.rs; the interactive window in deck.rs.

pub mod clock;
pub mod config;
pub mod deal;
pub mod deck;
pub mod diversity;
pub mod engine;
pub mod error;
pub mod event;
pub mod feed;
pub mod filter;
pub mod geo;
pub mod hero;
pub mod interleave;
pub mod rebalance;
pub mod rng;
pub mod saved;
pub mod store;
pub mod tier;
pub mod types;
pub mod weight;
