use crate::{
    types::{Category, Millis},
    weight::WeightRange,
};
use serde::{Deserialize, Serialize};

// ── Tiers ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TierThresholds {
    /// Scores at or above this land in the high tier.
    pub high_min: f64,
    /// Scores at or above this (and below `high_min`) land in the mid tier.
    pub mid_min:  f64,
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self { high_min: 75.0, mid_min: 40.0 }
    }
}

/// Target share of interleaved output per tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TierRatios {
    pub high: f64,
    pub mid:  f64,
    pub low:  f64,
}

impl Default for TierRatios {
    fn default() -> Self {
        Self { high: 0.40, mid: 0.45, low: 0.15 }
    }
}

// ── Diversity ──────────────────────────────────────────────────────

/// Longest allowed run of consecutive emissions sharing an attribute.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiversityLimits {
    pub max_brand_run:      usize,
    pub max_category_run:   usize,
    pub max_dispensary_run: usize,
    pub max_chain_run:      usize,
}

impl Default for DiversityLimits {
    fn default() -> Self {
        Self {
            max_brand_run:      1,
            max_category_run:   3,
            max_dispensary_run: 2,
            max_chain_run:      2,
        }
    }
}

// ── Rebalance ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RebalanceParams {
    /// Leading positions of the combined sequence that are checked.
    pub window:         usize,
    /// Max occurrences of one dispensary inside the window.
    pub dispensary_cap: usize,
    pub max_passes:     usize,
}

impl Default for RebalanceParams {
    fn default() -> Self {
        Self { window: 12, dispensary_cap: 2, max_passes: 3 }
    }
}

// ── Deck ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeckConfig {
    pub visible_slots:             usize,
    pub dismiss_delay_ms:          Millis,
    pub appear_delay_ms:           Millis,
    /// Longer reveal for replacements scoring at or above `highlight_score`.
    pub highlight_appear_delay_ms: Millis,
    pub highlight_score:           f64,
    pub immediate_cooldown_ms:     Millis,
    pub persist_debounce_ms:       Millis,
}

impl Default for DeckConfig {
    fn default() -> Self {
        Self {
            visible_slots:             9,
            dismiss_delay_ms:          320,
            appear_delay_ms:           400,
            highlight_appear_delay_ms: 700,
            highlight_score:           90.0,
            immediate_cooldown_ms:     300,
            persist_debounce_ms:       250,
        }
    }
}

// ── Hero slots ─────────────────────────────────────────────────────

/// One pinned niche at the front of the feed. List order is display order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeroSlotDefinition {
    pub label:    String,
    pub category: Category,
    /// Accepted subtypes (case-insensitive). Empty accepts any subtype.
    #[serde(default)]
    pub subtypes: Vec<String>,
    /// Parsed-weight bounds. `None` accepts any weight, even unparsable.
    #[serde(default)]
    pub weight:   Option<WeightRange>,
}

impl HeroSlotDefinition {
    fn grams(label: &str, category: Category, subtypes: &[&str], min: f64, max: f64) -> Self {
        Self {
            label: label.into(),
            category,
            subtypes: subtypes.iter().map(|s| s.to_string()).collect(),
            weight: Some(WeightRange { min_grams: min, max_grams: max }),
        }
    }
}

pub fn default_hero_slots() -> Vec<HeroSlotDefinition> {
    vec![
        HeroSlotDefinition::grams("1g Disposable", Category::Vape, &["disposable"], 0.8, 1.2),
        HeroSlotDefinition::grams("1g Cartridge", Category::Vape, &["cartridge", "cart"], 0.8, 1.2),
        HeroSlotDefinition::grams("Eighth", Category::Flower, &[], 3.0, 4.0),
        HeroSlotDefinition::grams("Ounce", Category::Flower, &[], 25.0, 30.0),
        HeroSlotDefinition::grams("100mg Edible", Category::Edible, &[], 0.09, 0.11),
        HeroSlotDefinition::grams("1g Concentrate", Category::Concentrate, &[], 0.8, 1.2),
        HeroSlotDefinition::grams("1g Pre-roll", Category::Preroll, &[], 0.8, 1.2),
    ]
}

// ── Top-level config ───────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CurationConfig {
    pub tiers:            TierThresholds,
    pub ratios:           TierRatios,
    pub diversity:        DiversityLimits,
    pub rebalance:        RebalanceParams,
    pub deck:             DeckConfig,
    /// Relative tolerance for weight-bucket equivalence.
    pub weight_tolerance: f64,
    pub chain_prefixes:   Vec<String>,
    pub hero_slots:       Vec<HeroSlotDefinition>,
}

impl Default for CurationConfig {
    fn default() -> Self {
        Self {
            tiers:            TierThresholds::default(),
            ratios:           TierRatios::default(),
            diversity:        DiversityLimits::default(),
            rebalance:        RebalanceParams::default(),
            deck:             DeckConfig::default(),
            weight_tolerance: 0.1,
            chain_prefixes:   ["planet13", "the-source", "curaleaf", "thrive", "essence", "cookies"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            hero_slots:       default_hero_slots(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct HeroSlotsFile {
    slots: Vec<HeroSlotDefinition>,
}

impl CurationConfig {
    /// Load from the data/ directory.
    /// In tests, use CurationConfig::default().
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let path = format!("{data_dir}/curation.json");
        let content = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let mut config: CurationConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;

        let hero_path = format!("{data_dir}/hero_slots.json");
        let hero_content = std::fs::read_to_string(&hero_path)
            .map_err(|e| anyhow::anyhow!("Cannot read {hero_path}: {e}"))?;
        let hero_file: HeroSlotsFile = serde_json::from_str(&hero_content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {hero_path}: {e}"))?;
        config.hero_slots = hero_file.slots;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.tiers.mid_min > self.tiers.high_min {
            anyhow::bail!(
                "tier thresholds out of order: mid_min {} > high_min {}",
                self.tiers.mid_min,
                self.tiers.high_min
            );
        }
        let ratios = [self.ratios.high, self.ratios.mid, self.ratios.low];
        if ratios.iter().any(|r| !r.is_finite() || *r < 0.0) || ratios.iter().sum::<f64>() <= 0.0 {
            anyhow::bail!("tier ratios must be non-negative and not all zero");
        }
        if self.diversity.max_brand_run == 0
            || self.diversity.max_category_run == 0
            || self.diversity.max_dispensary_run == 0
            || self.diversity.max_chain_run == 0
        {
            anyhow::bail!("diversity run limits must be at least 1");
        }
        if self.deck.visible_slots == 0 {
            anyhow::bail!("deck.visible_slots must be at least 1");
        }
        Ok(())
    }
}
