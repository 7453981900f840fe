// src/services/score_engine.rs
// DOCUMENTATION: Safety and convenience scoring
// PURPOSE: Weighted sums of per-metric normalized values, scaled to [0, 100]

use crate::config::{Normalizer, ScoreWeights};
use crate::models::{AmenityCategory, SafetyComponents};

impl Normalizer {
    /// Map a category's count and closest distance onto [0, 1]
    pub fn apply(&self, count: usize, closest_meters: Option<f64>) -> f64 {
        let value = match *self {
            Normalizer::Saturating { cap } => saturate(count as f64, cap),
            Normalizer::DistanceDecay {
                full_within,
                zero_beyond,
            } => match closest_meters {
                Some(d) => decay(d, full_within, zero_beyond),
                None => 0.0,
            },
            Normalizer::CountAndProximity { cap, near_within } => match closest_meters {
                Some(d) => {
                    let proximity = if d <= near_within { 1.0 } else { 0.5 };
                    0.5 * proximity + 0.5 * saturate(count as f64, cap)
                }
                None => 0.0,
            },
        };
        clamp_unit(value)
    }
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// value / cap, saturating at 1; a non-positive cap saturates on any value
fn saturate(value: f64, cap: f64) -> f64 {
    if cap <= 0.0 {
        return if value > 0.0 { 1.0 } else { 0.0 };
    }
    clamp_unit(value / cap)
}

/// 1 up to `full_within`, linear down to 0 at `zero_beyond`
fn decay(distance: f64, full_within: f64, zero_beyond: f64) -> f64 {
    if distance <= full_within {
        1.0
    } else if distance >= zero_beyond {
        0.0
    } else {
        (zero_beyond - distance) / (zero_beyond - full_within)
    }
}

/// Raw safety metrics for one location
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SafetyInputs {
    /// Distance to the nearest police office, if any is known
    pub nearest_police_meters: Option<f64>,
    /// CCTV installations within the radius
    pub cctv_installations: usize,
    /// None when the district could not be determined (geocoder down)
    pub arrest_rate: Option<f64>,
}

/// Raw convenience metrics for one category
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CategoryInputs {
    pub category: AmenityCategory,
    pub count: usize,
    pub closest_meters: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SafetyScore {
    pub score: f64,
    pub components: SafetyComponents,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConvenienceScore {
    pub score: f64,
    /// Normalized value per category, in rule order
    pub categories: Vec<(AmenityCategory, f64)>,
}

/// Score engine
/// DOCUMENTATION: score = sum(w_i * n_i) / sum(w_i) * 100. A metric with no
/// value (the arrest rate of a partial result) drops out of both sums, so the
/// score is renormalized over what is known. Zero total weight scores 0.
#[derive(Debug, Clone)]
pub struct ScoreEngine {
    weights: ScoreWeights,
}

impl ScoreEngine {
    pub fn new(weights: ScoreWeights) -> Self {
        Self { weights }
    }

    pub fn safety(&self, inputs: &SafetyInputs) -> SafetyScore {
        let w = &self.weights.safety;

        let police_distance = match inputs.nearest_police_meters {
            Some(d) => clamp_unit(decay(d, 0.0, w.police_distance_zero_meters)),
            None => 0.0,
        };
        let cctv = saturate(inputs.cctv_installations as f64, w.cctv_saturation);
        let arrest_rate = inputs.arrest_rate.map(clamp_unit);

        let mut terms = vec![(w.police_distance, police_distance), (w.cctv, cctv)];
        if let Some(rate) = arrest_rate {
            terms.push((w.arrest_rate, rate));
        }

        SafetyScore {
            score: weighted_score(&terms),
            components: SafetyComponents {
                police_distance,
                cctv,
                arrest_rate,
            },
        }
    }

    /// Every configured category contributes; a category with no inputs scores 0
    pub fn convenience(&self, inputs: &[CategoryInputs]) -> ConvenienceScore {
        let mut terms = Vec::with_capacity(self.weights.convenience.len());
        let mut categories = Vec::with_capacity(self.weights.convenience.len());

        for rule in &self.weights.convenience {
            let value = inputs
                .iter()
                .find(|i| i.category == rule.category)
                .map(|i| rule.normalizer.apply(i.count, i.closest_meters))
                .unwrap_or(0.0);
            terms.push((rule.weight, value));
            categories.push((rule.category, value));
        }

        ConvenienceScore {
            score: weighted_score(&terms),
            categories,
        }
    }
}

fn weighted_score(terms: &[(f64, f64)]) -> f64 {
    let total_weight: f64 = terms.iter().map(|(w, _)| w.max(0.0)).sum();
    if total_weight <= 0.0 || !total_weight.is_finite() {
        return 0.0;
    }
    let sum: f64 = terms.iter().map(|(w, v)| w.max(0.0) * clamp_unit(*v)).sum();
    (sum / total_weight * 100.0).clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SafetyWeights;

    fn engine() -> ScoreEngine {
        ScoreEngine::new(ScoreWeights::default())
    }

    #[test]
    fn test_safety_matches_weighted_formula() {
        let score = engine().safety(&SafetyInputs {
            nearest_police_meters: Some(400.0),
            cctv_installations: 15,
            arrest_rate: Some(0.72),
        });

        // 0.3 * 0.5 + 0.4 * 0.5 + 0.3 * 0.72
        assert!((score.score - 56.6).abs() < 1e-9, "{}", score.score);
        assert_eq!(score.components.police_distance, 0.5);
        assert_eq!(score.components.cctv, 0.5);
    }

    #[test]
    fn test_missing_arrest_rate_renormalizes() {
        let score = engine().safety(&SafetyInputs {
            nearest_police_meters: Some(0.0),
            cctv_installations: 30,
            arrest_rate: None,
        });
        assert_eq!(score.score, 100.0);
        assert_eq!(score.components.arrest_rate, None);
    }

    #[test]
    fn test_scores_stay_in_range_for_extreme_inputs() {
        let engine = engine();
        let cases = [
            (None, 0, None),
            (Some(0.0), usize::MAX, Some(1.0)),
            (Some(f64::INFINITY), 0, Some(-3.0)),
            (Some(-50.0), 1, Some(f64::NAN)),
            (Some(f64::NAN), 1_000_000, Some(7.5)),
        ];
        for (police, cctv, rate) in cases {
            let s = engine.safety(&SafetyInputs {
                nearest_police_meters: police,
                cctv_installations: cctv,
                arrest_rate: rate,
            });
            assert!((0.0..=100.0).contains(&s.score), "{:?}", s);
        }

        let inputs: Vec<CategoryInputs> = AmenityCategory::ALL
            .iter()
            .map(|&category| CategoryInputs {
                category,
                count: usize::MAX,
                closest_meters: Some(0.0),
            })
            .collect();
        assert_eq!(engine.convenience(&inputs).score, 100.0);
        assert_eq!(engine.convenience(&[]).score, 0.0);
    }

    #[test]
    fn test_zero_weights_score_zero() {
        let engine = ScoreEngine::new(ScoreWeights {
            safety: SafetyWeights {
                police_distance: 0.0,
                cctv: 0.0,
                arrest_rate: 0.0,
                ..SafetyWeights::default()
            },
            convenience: Vec::new(),
        });
        let s = engine.safety(&SafetyInputs {
            nearest_police_meters: Some(10.0),
            cctv_installations: 10,
            arrest_rate: Some(0.5),
        });
        assert_eq!(s.score, 0.0);
    }

    #[test]
    fn test_normalizers() {
        let subway = Normalizer::DistanceDecay {
            full_within: 500.0,
            zero_beyond: 2000.0,
        };
        assert_eq!(subway.apply(1, Some(300.0)), 1.0);
        assert_eq!(subway.apply(1, Some(1250.0)), 0.5);
        assert_eq!(subway.apply(1, Some(2500.0)), 0.0);
        assert_eq!(subway.apply(0, None), 0.0);

        let hospital = Normalizer::CountAndProximity {
            cap: 5.0,
            near_within: 1000.0,
        };
        assert_eq!(hospital.apply(5, Some(200.0)), 1.0);
        assert_eq!(hospital.apply(0, Some(1200.0)), 0.25);

        let cafe = Normalizer::Saturating { cap: 50.0 };
        assert_eq!(cafe.apply(25, Some(10.0)), 0.5);
        assert_eq!(cafe.apply(80, None), 1.0);
    }

    #[test]
    fn test_convenience_weights_are_respected() {
        let mut weights = ScoreWeights::default();
        for rule in weights.convenience.iter_mut() {
            rule.weight = if rule.category == AmenityCategory::Cafe { 1.0 } else { 0.0 };
        }
        let engine = ScoreEngine::new(weights);
        let score = engine.convenience(&[CategoryInputs {
            category: AmenityCategory::Cafe,
            count: 25,
            closest_meters: Some(50.0),
        }]);
        assert_eq!(score.score, 50.0);
    }
}
