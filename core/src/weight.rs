//! Weight descriptor parsing.
//!
//! Upstream listings carry weight as free text ("3.5g", "1/8 oz", "100mg",
//! "Eighth"). Parsing happens on demand and never fails loudly: anything
//! unrecognised is `None`, which no weight predicate ever matches.

use serde::{Deserialize, Serialize};

pub const GRAMS_PER_OUNCE: f64 = 28.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "unit", content = "value", rename_all = "snake_case")]
pub enum Weight {
    Grams(f64),
    Milligrams(f64),
}

impl Weight {
    pub fn parse(raw: &str) -> Option<Weight> {
        let cleaned: String = raw
            .to_ascii_lowercase()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '/' { c } else { ' ' })
            .collect();
        let tokens: Vec<&str> = cleaned.split_whitespace().collect();

        for (i, token) in tokens.iter().enumerate() {
            // "half gram" and "half oz" both start with "half"; the unit
            // decides. A bare fraction word is a fraction of an ounce.
            if let Some(fraction) = fraction_word(token) {
                let unit = tokens.get(i + 1).and_then(|next| with_unit(fraction, next));
                return Some(unit.unwrap_or(Weight::Grams(fraction * GRAMS_PER_OUNCE)));
            }
            if let Some(weight) = parse_token(token) {
                return Some(weight);
            }
            // "3.5 g", "1/8 oz"
            if let Some(next) = tokens.get(i + 1) {
                if let Some(weight) = parse_number(token).and_then(|v| with_unit(v, next)) {
                    return Some(weight);
                }
            }
        }
        None
    }

    pub fn as_grams(&self) -> f64 {
        match *self {
            Weight::Grams(g) => g,
            Weight::Milligrams(mg) => mg / 1000.0,
        }
    }

    /// Physical-quantity equivalence: `1000mg` and `1g` are the same weight.
    /// `tolerance` is relative to the larger of the two values.
    pub fn approx_eq(&self, other: &Weight, tolerance: f64) -> bool {
        approx_grams(self.as_grams(), other.as_grams(), tolerance)
    }
}

pub(crate) fn approx_grams(a: f64, b: f64, tolerance: f64) -> bool {
    (a - b).abs() <= tolerance * a.max(b)
}

/// Inclusive gram range used by hero slot predicates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightRange {
    pub min_grams: f64,
    pub max_grams: f64,
}

impl WeightRange {
    pub fn contains(&self, weight: &Weight) -> bool {
        let grams = weight.as_grams();
        grams >= self.min_grams && grams <= self.max_grams
    }
}

/// Standard retail sizes offered as filter options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightBucket {
    Mg100,
    HalfGram,
    Gram,
    TwoGram,
    Eighth,
    Quarter,
    HalfOunce,
    Ounce,
}

impl WeightBucket {
    pub fn grams(&self) -> f64 {
        match self {
            Self::Mg100     => 0.1,
            Self::HalfGram  => 0.5,
            Self::Gram      => 1.0,
            Self::TwoGram   => 2.0,
            Self::Eighth    => 3.5,
            Self::Quarter   => 7.0,
            Self::HalfOunce => 14.0,
            Self::Ounce     => GRAMS_PER_OUNCE,
        }
    }

    pub fn matches(&self, weight: &Weight, tolerance: f64) -> bool {
        approx_grams(self.grams(), weight.as_grams(), tolerance)
    }
}

fn parse_token(token: &str) -> Option<Weight> {
    if let Some(named) = named_weight(token) {
        return Some(named);
    }
    let split = token.find(|c: char| c.is_ascii_alphabetic())?;
    let (number, unit) = token.split_at(split);
    with_unit(parse_number(number)?, unit)
}

fn fraction_word(token: &str) -> Option<f64> {
    match token {
        "eighth"  => Some(0.125),
        "quarter" => Some(0.25),
        "half"    => Some(0.5),
        _ => None,
    }
}

fn named_weight(token: &str) -> Option<Weight> {
    let grams = match token {
        "halfgram"              => 0.5,
        "halfoz" | "halfounce"  => 14.0,
        "ounce" | "zip"         => GRAMS_PER_OUNCE,
        _ => return None,
    };
    Some(Weight::Grams(grams))
}

fn with_unit(value: f64, unit: &str) -> Option<Weight> {
    if !value.is_finite() || value <= 0.0 {
        return None;
    }
    match unit {
        "mg" | "milligram" | "milligrams"   => Some(Weight::Milligrams(value)),
        "g" | "gr" | "gram" | "grams"       => Some(Weight::Grams(value)),
        "oz" | "ounce" | "ounces"           => Some(Weight::Grams(value * GRAMS_PER_OUNCE)),
        _ => None,
    }
}

fn parse_number(raw: &str) -> Option<f64> {
    if raw.is_empty() {
        return None;
    }
    match raw.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.parse().ok()?;
            let den: f64 = den.parse().ok()?;
            if den == 0.0 { None } else { Some(num / den) }
        }
        None => raw.parse().ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_descriptors() {
        assert_eq!(Weight::parse("1g"), Some(Weight::Grams(1.0)));
        assert_eq!(Weight::parse("3.5 g"), Some(Weight::Grams(3.5)));
        assert_eq!(Weight::parse("100mg"), Some(Weight::Milligrams(100.0)));
        assert_eq!(Weight::parse("Eighth"), Some(Weight::Grams(3.5)));
        assert_eq!(Weight::parse("1oz"), Some(Weight::Grams(28.0)));
        assert_eq!(Weight::parse("1/8 oz"), Some(Weight::Grams(3.5)));
        assert_eq!(Weight::parse("Live Resin Cart 0.5g"), Some(Weight::Grams(0.5)));
        assert_eq!(Weight::parse("Quarter"), Some(Weight::Grams(7.0)));
        assert_eq!(Weight::parse("Half"), Some(Weight::Grams(14.0)));
        assert_eq!(Weight::parse("Half Oz"), Some(Weight::Grams(14.0)));
        assert_eq!(Weight::parse("half ounce smalls"), Some(Weight::Grams(14.0)));
    }

    #[test]
    fn half_gram_is_not_half_an_ounce() {
        for raw in ["Half Gram", "half g", "Pre-Roll Half-Gram", "halfgram"] {
            let weight = Weight::parse(raw);
            assert_eq!(weight, Some(Weight::Grams(0.5)), "{raw}");
            let weight = weight.unwrap();
            assert!(WeightBucket::HalfGram.matches(&weight, 0.1), "{raw}");
            assert!(!WeightBucket::HalfOunce.matches(&weight, 0.1), "{raw}");
        }
    }

    #[test]
    fn unparsable_is_unknown() {
        assert_eq!(Weight::parse(""), None);
        assert_eq!(Weight::parse("family size"), None);
        assert_eq!(Weight::parse("2pk"), None);
        assert_eq!(Weight::parse("1/0 g"), None);
    }

    #[test]
    fn milligrams_and_grams_are_equivalent() {
        let mg = Weight::Milligrams(1000.0);
        let g = Weight::Grams(1.0);
        assert!(mg.approx_eq(&g, 0.1));
        assert!(WeightBucket::Gram.matches(&mg, 0.1));
        assert!(WeightBucket::Mg100.matches(&Weight::Milligrams(100.0), 0.1));
        assert!(!WeightBucket::Eighth.matches(&g, 0.1));
    }
}
