//! Seeded box tie-breaking and rarity sampling.
//!
//! Every draw is seeded from a SHA-256 digest of the user id and date (plus
//! the box type for rarity), so a given user/day always reproduces the same
//! outcome and the two draws stay uncorrelated.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sha2::{Digest, Sha256};

use super::domain::RarityTier;
use super::settings::BoxTypeConfig;

/// Stable 64-bit seed from `parts` joined with `_`.
pub fn derive_seed(parts: &[&str]) -> u64 {
    let digest = Sha256::digest(parts.join("_").as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes)
}

pub fn box_seed(user_id: &str, date: NaiveDate) -> u64 {
    derive_seed(&[user_id, &date.to_string()])
}

pub fn rarity_seed(user_id: &str, date: NaiveDate, box_type: &str) -> u64 {
    derive_seed(&[user_id, &date.to_string(), box_type])
}

/// Pick one box type from the matched candidates.
///
/// Candidates are sorted by identifier before the seeded index is drawn, so
/// reordering rules in configuration never changes the outcome.
pub fn select_box_type<'a>(
    candidates: &[&'a str],
    user_id: &str,
    date: NaiveDate,
) -> Option<&'a str> {
    let mut sorted = candidates.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    match sorted.len() {
        0 => None,
        1 => Some(sorted[0]),
        len => {
            let mut rng = StdRng::seed_from_u64(box_seed(user_id, date));
            Some(sorted[rng.gen_range(0..len)])
        }
    }
}

/// How far the draw leans toward the target distribution: 0 at the
/// threshold, 1 at certainty.
pub fn adjustment_factor(probability: f64, threshold: f64) -> f64 {
    if threshold >= 1.0 {
        return if probability >= 1.0 { 1.0 } else { 0.0 };
    }
    ((probability - threshold) / (1.0 - threshold)).clamp(0.0, 1.0)
}

/// Interpolate the box weights toward `target` by the adjustment factor and
/// renormalize. Returns zero weights when nothing carries mass.
pub fn adjusted_weights(
    box_type: &BoxTypeConfig,
    target: &BTreeMap<RarityTier, f64>,
    probability: f64,
    threshold: f64,
) -> BTreeMap<RarityTier, f64> {
    let factor = adjustment_factor(probability, threshold);
    let mut weights: BTreeMap<RarityTier, f64> = RarityTier::ALL
        .into_iter()
        .map(|tier| {
            let own = box_type.weight(tier);
            let goal = target.get(&tier).copied().unwrap_or(0.0);
            (tier, (1.0 - factor) * own + factor * goal)
        })
        .collect();

    let total: f64 = weights.values().sum();
    if total > 0.0 {
        for weight in weights.values_mut() {
            *weight /= total;
        }
    }
    weights
}

/// Outcome of a rarity draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RarityDraw {
    pub tier: RarityTier,
    /// Set when the box carried no weight and the draw fell back to common.
    pub fallback: bool,
}

pub fn select_rarity(
    box_type_id: &str,
    box_type: &BoxTypeConfig,
    target: &BTreeMap<RarityTier, f64>,
    probability: f64,
    threshold: f64,
    user_id: &str,
    date: NaiveDate,
) -> RarityDraw {
    let fallback = RarityDraw {
        tier: RarityTier::Common,
        fallback: true,
    };
    if box_type.total_weight() <= 0.0 {
        return fallback;
    }

    let weights = adjusted_weights(box_type, target, probability, threshold);
    if weights.values().sum::<f64>() <= 0.0 {
        return fallback;
    }

    let mut rng = StdRng::seed_from_u64(rarity_seed(user_id, date, box_type_id));
    let draw: f64 = rng.gen();
    RarityDraw {
        tier: sample_tier(&weights, draw),
        fallback: false,
    }
}

fn sample_tier(weights: &BTreeMap<RarityTier, f64>, draw: f64) -> RarityTier {
    let mut cumulative = 0.0;
    let mut last_positive = RarityTier::Common;
    for tier in RarityTier::ALL {
        let weight = weights.get(&tier).copied().unwrap_or(0.0);
        if weight <= 0.0 {
            continue;
        }
        cumulative += weight;
        last_positive = tier;
        if draw < cumulative {
            return tier;
        }
    }
    // Rounding can leave the cumulative sum a hair below 1.
    last_positive
}
