// Copyright (c) 2026 Choreo Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Task Complexity Scorer, AMSP (§4.9): a pure function that reduces the
//! complexity profiles of the skills a state depends on into a recommended
//! model tier, with a latency ceiling and a confidence interval.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const DIMENSION_ORDER: [&str; 7] = [
    "horizon",
    "context",
    "tooling",
    "observability",
    "modality",
    "precision",
    "adaptability",
];

/// Per-skill complexity profile: each of the seven dimensions scored 0-3.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComplexityProfile {
    pub dimension_scores: HashMap<String, u8>,
    pub maturity_level: MaturityLevel,
    pub sample_size: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaturityLevel {
    #[default]
    Provisional,
    Emerging,
    Validated,
    Stable,
}

impl MaturityLevel {
    fn factor(&self) -> f64 {
        match self {
            MaturityLevel::Provisional => 1.5,
            MaturityLevel::Emerging => 1.2,
            MaturityLevel::Validated => 1.0,
            MaturityLevel::Stable => 0.8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LatencyRequirement {
    Critical,
    Standard,
    Relaxed,
    Batch,
}

impl LatencyRequirement {
    fn tier_ceiling(&self) -> u8 {
        match self {
            LatencyRequirement::Critical => 1,
            LatencyRequirement::Standard | LatencyRequirement::Relaxed | LatencyRequirement::Batch => 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    pub lower: f64,
    pub upper: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplexityResult {
    pub dimension_breakdown: HashMap<String, u8>,
    pub base_wcs: f64,
    pub interaction_multipliers: Vec<(String, f64)>,
    pub total_multiplier: f64,
    pub final_fcs: f64,
    pub confidence_interval: ConfidenceInterval,
    pub recommended_tier: u8,
    pub latency_adjusted_tier: u8,
    pub warnings: Vec<String>,
}

/// `(dimension_a, dimension_b, threshold, multiplier, label)`: both named
/// dimensions must score >= `threshold` for the multiplier to apply.
const INTERACTION_RULES: &[(&str, &str, u8, f64, &str)] = &[
    ("horizon", "context", 2, 1.15, "High Horizon + High Context"),
    ("horizon", "tooling", 2, 1.10, "High Horizon + High Tooling"),
    ("context", "precision", 2, 1.10, "High Context + High Precision"),
    ("tooling", "observability", 2, 1.08, "High Tooling + High Observability"),
    ("modality", "precision", 2, 1.12, "High Modality + High Precision"),
    ("horizon", "adaptability", 2, 1.10, "High Horizon + High Adaptability"),
    ("context", "modality", 2, 1.08, "High Context + High Modality"),
];

const TIER_BOUNDARIES: [(u32, u32, u8); 4] = [(0, 12, 0), (13, 25, 1), (26, 50, 2), (51, u32::MAX, 3)];

/// Reduces per-skill profiles (max-aggregation across skills), applies
/// interaction multipliers and the triple-high penalty, maps to a tier, and
/// clamps the tier to `latency_requirement`'s ceiling.
pub fn compute_task_complexity(profiles: &[ComplexityProfile], latency_requirement: LatencyRequirement) -> ComplexityResult {
    let mut warnings = Vec::new();
    if profiles.is_empty() {
        warnings.push("no complexity profiles supplied; scoring as minimal complexity".to_string());
    }

    let dimension_breakdown = aggregate_dimension_scores(profiles);
    let base_wcs = compute_base_wcs(&dimension_breakdown);
    let (interaction_multipliers, total_multiplier) = compute_interaction_multipliers(&dimension_breakdown);
    let final_fcs = base_wcs * total_multiplier;
    let recommended_tier = fcs_to_tier(final_fcs);
    let latency_adjusted_tier = recommended_tier.min(latency_requirement.tier_ceiling());
    if latency_adjusted_tier < recommended_tier {
        warnings.push(format!(
            "tier clamped from {recommended_tier} to {latency_adjusted_tier} by latency requirement {latency_requirement:?}"
        ));
    }

    let confidence_interval = compute_confidence_interval(base_wcs, profiles);

    ComplexityResult {
        dimension_breakdown,
        base_wcs,
        interaction_multipliers,
        total_multiplier,
        final_fcs,
        confidence_interval,
        recommended_tier,
        latency_adjusted_tier,
        warnings,
    }
}

fn aggregate_dimension_scores(profiles: &[ComplexityProfile]) -> HashMap<String, u8> {
    let mut result: HashMap<String, u8> = DIMENSION_ORDER.iter().map(|d| (d.to_string(), 0)).collect();
    for profile in profiles {
        for dim in DIMENSION_ORDER {
            if let Some(&score) = profile.dimension_scores.get(dim) {
                let entry = result.entry(dim.to_string()).or_insert(0);
                *entry = (*entry).max(score);
            }
        }
    }
    result
}

fn compute_base_wcs(dimension_breakdown: &HashMap<String, u8>) -> f64 {
    // DIMENSION_WEIGHTS are uniformly 1.0; kept as an explicit sum rather
    // than a constant so per-dimension weighting can be reintroduced later.
    DIMENSION_ORDER.iter().map(|d| *dimension_breakdown.get(*d).unwrap_or(&0) as f64).sum()
}

fn compute_interaction_multipliers(dimension_breakdown: &HashMap<String, u8>) -> (Vec<(String, f64)>, f64) {
    let mut applied = Vec::new();
    let mut total = 1.0;

    for (dim_a, dim_b, threshold, multiplier, label) in INTERACTION_RULES {
        let score_a = *dimension_breakdown.get(*dim_a).unwrap_or(&0);
        let score_b = *dimension_breakdown.get(*dim_b).unwrap_or(&0);
        if score_a >= *threshold && score_b >= *threshold {
            applied.push((label.to_string(), *multiplier));
            total *= multiplier;
        }
    }

    let max_count = dimension_breakdown.values().filter(|&&s| s == 3).count();
    if max_count >= 3 {
        let penalty = 1.0 + (max_count as f64 - 2.0) * 0.05;
        applied.push(("Triple-high penalty".to_string(), penalty));
        total *= penalty;
    }

    (applied, total)
}

fn fcs_to_tier(fcs: f64) -> u8 {
    for (low, high, tier) in TIER_BOUNDARIES {
        if fcs >= low as f64 && fcs <= high as f64 {
            return tier;
        }
    }
    3
}

fn compute_confidence_interval(base_wcs: f64, profiles: &[ComplexityProfile]) -> ConfidenceInterval {
    let base_uncertainty = base_wcs * 0.1;

    let maturity_factor = profiles
        .iter()
        .map(|p| p.maturity_level.factor())
        .fold(None, |acc: Option<f64>, f| Some(acc.map_or(f, |a: f64| a.max(f))))
        .unwrap_or(1.5);

    let total_samples: u32 = profiles.iter().map(|p| p.sample_size).sum();
    let sample_factor = if total_samples >= 100 {
        0.8
    } else if total_samples >= 30 {
        1.0
    } else if total_samples >= 10 {
        1.2
    } else {
        1.5
    };

    let spread = base_uncertainty * maturity_factor * sample_factor;
    ConfidenceInterval {
        lower: (base_wcs - spread).max(0.0),
        upper: base_wcs + spread,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(scores: &[(&str, u8)]) -> ComplexityProfile {
        ComplexityProfile {
            dimension_scores: scores.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            maturity_level: MaturityLevel::Validated,
            sample_size: 50,
        }
    }

    #[test]
    fn low_complexity_maps_to_tier_zero() {
        let result = compute_task_complexity(&[profile(&[("horizon", 1), ("context", 1)])], LatencyRequirement::Standard);
        assert_eq!(result.recommended_tier, 0);
    }

    #[test]
    fn high_horizon_and_context_applies_interaction_multiplier() {
        let result = compute_task_complexity(
            &[profile(&[("horizon", 3), ("context", 3), ("tooling", 2), ("observability", 2), ("modality", 2), ("precision", 2), ("adaptability", 2)])],
            LatencyRequirement::Standard,
        );
        assert!(result.total_multiplier > 1.0);
        assert!(result.interaction_multipliers.iter().any(|(label, _)| label.contains("High Horizon + High Context")));
    }

    #[test]
    fn critical_latency_clamps_tier_to_one() {
        let result = compute_task_complexity(
            &[profile(&[("horizon", 3), ("context", 3), ("tooling", 3), ("observability", 3), ("modality", 3), ("precision", 3), ("adaptability", 3)])],
            LatencyRequirement::Critical,
        );
        assert_eq!(result.recommended_tier, 3);
        assert_eq!(result.latency_adjusted_tier, 1);
        assert!(!result.warnings.is_empty());
    }

    #[test]
    fn empty_profiles_scores_minimal_with_warning() {
        let result = compute_task_complexity(&[], LatencyRequirement::Standard);
        assert_eq!(result.recommended_tier, 0);
        assert!(!result.warnings.is_empty());
    }
}
