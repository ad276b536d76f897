//! The unit being ordered.
//!
//! RULE: The engine never mutates a Deal. Stages reorder and window
//! `Arc<Deal>` references; identity is the `id` field, and tests use
//! `Arc::ptr_eq` to check that untouched positions keep the same reference.

use crate::{
    geo::Coordinates,
    types::{Category, DealId, DispensaryId},
    weight::Weight,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispensaryRef {
    pub id:          DispensaryId,
    #[serde(default)]
    pub coordinates: Option<Coordinates>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deal {
    pub id:             DealId,
    #[serde(default)]
    pub name:           String,
    pub category:       Category,
    /// Free-form refinement, e.g. "disposable" vs "cartridge".
    #[serde(default)]
    pub subtype:        Option<String>,
    #[serde(default)]
    pub brand:          Option<String>,
    pub dispensary:     DispensaryRef,
    pub sale_price:     f64,
    #[serde(default)]
    pub original_price: Option<f64>,
    /// Upstream-assigned; assumed correct.
    pub deal_score:     f64,
    /// Free text, parsed on demand.
    #[serde(default)]
    pub weight:         Option<String>,
}

impl Deal {
    pub fn new(
        id: impl Into<DealId>,
        category: Category,
        dispensary_id: impl Into<DispensaryId>,
        sale_price: f64,
        deal_score: f64,
    ) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            category,
            subtype: None,
            brand: None,
            dispensary: DispensaryRef { id: dispensary_id.into(), coordinates: None },
            sale_price,
            original_price: None,
            deal_score,
            weight: None,
        }
    }

    pub fn with_brand(mut self, brand: impl Into<String>) -> Self {
        self.brand = Some(brand.into());
        self
    }

    pub fn with_subtype(mut self, subtype: impl Into<String>) -> Self {
        self.subtype = Some(subtype.into());
        self
    }

    pub fn with_weight(mut self, weight: impl Into<String>) -> Self {
        self.weight = Some(weight.into());
        self
    }

    pub fn with_original_price(mut self, price: f64) -> Self {
        self.original_price = Some(price);
        self
    }

    pub fn with_coordinates(mut self, coordinates: Coordinates) -> Self {
        self.dispensary.coordinates = Some(coordinates);
        self
    }

    pub fn dispensary_id(&self) -> &str {
        &self.dispensary.id
    }

    pub fn parsed_weight(&self) -> Option<Weight> {
        self.weight.as_deref().and_then(Weight::parse)
    }

    /// Percent off the original price. `None` when there is no usable
    /// original price to compare against.
    pub fn discount_percent(&self) -> Option<f64> {
        let original = self.original_price?;
        if original <= 0.0 || original <= self.sale_price {
            return None;
        }
        Some((original - self.sale_price) / original * 100.0)
    }

    pub fn subtype_matches(&self, wanted: &str) -> bool {
        self.subtype
            .as_deref()
            .is_some_and(|s| s.trim().eq_ignore_ascii_case(wanted))
    }
}

/// Maps sibling storefronts onto one diversity identity.
///
/// A dispensary id belongs to a chain when it starts with a known prefix
/// followed by `-` (or is exactly the prefix): `planet13-downtown` and
/// `planet13-strip` both resolve to `planet13`. Unknown ids are their own chain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChainResolver {
    prefixes: Vec<String>,
}

impl ChainResolver {
    pub fn new(prefixes: Vec<String>) -> Self {
        // Longest first so "the-source" wins over "the".
        let mut prefixes: Vec<String> = prefixes
            .into_iter()
            .map(|p| p.trim().to_ascii_lowercase())
            .filter(|p| !p.is_empty())
            .collect();
        prefixes.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        Self { prefixes }
    }

    pub fn chain_of<'a>(&'a self, dispensary_id: &'a str) -> &'a str {
        for prefix in &self.prefixes {
            let Some(head) = dispensary_id.get(..prefix.len()) else { continue };
            if !head.eq_ignore_ascii_case(prefix) {
                continue;
            }
            let rest = &dispensary_id[prefix.len()..];
            if rest.is_empty() || rest.starts_with('-') {
                return prefix;
            }
        }
        dispensary_id
    }
}
