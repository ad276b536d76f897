//! Shared primitive types used across the entire curation engine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A stable, unique deal identifier (survives upstream refreshes).
pub type DealId = String;

/// A dispensary storefront identifier.
pub type DispensaryId = String;

/// Milliseconds on the injected clock's timeline.
pub type Millis = u64;

/// Closed product category set.
/// Variants are appended only; serialized names are part of the deal feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Flower,
    Vape,
    Edible,
    Concentrate,
    Preroll,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Flower,
        Category::Vape,
        Category::Edible,
        Category::Concentrate,
        Category::Preroll,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Flower      => "flower",
            Self::Vape        => "vape",
            Self::Edible      => "edible",
            Self::Concentrate => "concentrate",
            Self::Preroll     => "preroll",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
