use crate::data::Pre;
use rustc_hash::FxHashMap;

/// TF-IDF relevance scores and their boolean combinators.
///
/// Scores lie in `[0, 1]`: the term-frequency part is normalized by the most
/// frequent token of the unit, the inverse document frequency by its value
/// for a token that occurs in a single unit.
pub struct ScoringModel;

impl ScoringModel {
    /// Score of a token occurring `tf` times in a unit whose most frequent
    /// token occurs `max_tf` times, where `df` of `total_units` units contain
    /// the token.
    pub fn tf_idf(tf: u32, max_tf: u32, total_units: u32, df: u32) -> f32 {
        if tf == 0 || df == 0 || total_units == 0 {
            return 0.0;
        }
        let max_tf = max_tf.max(tf) as f64;
        let df = df.min(total_units) as f64;
        let total = total_units as f64;

        let tf_part = (1.0 + tf as f64).ln() / (1.0 + max_tf).ln();
        let idf_part = (1.0 + total / df).ln() / (1.0 + total).ln();
        (tf_part * idf_part).clamp(0.0, 1.0) as f32
    }

    /// Combined score of two tokens that must both match; zero only if
    /// one of them is zero
    pub fn and(a: f32, b: f32) -> f32 {
        let (a, b) = (a.clamp(0.0, 1.0), b.clamp(0.0, 1.0));
        if a == 0.0 || b == 0.0 {
            return 0.0;
        }
        (a as f64 * b as f64).max(f32::MIN_POSITIVE as f64) as f32
    }

    /// Combined score of two alternative tokens
    pub fn or(a: f32, b: f32) -> f32 {
        let (a, b) = (a.clamp(0.0, 1.0), b.clamp(0.0, 1.0));
        1.0 - (1.0 - a) * (1.0 - b)
    }
}

/// Per-unit frequency statistics gathered while scanning the table.
///
/// A unit is one text node; its maximum frequency is the occurrence count
/// of its most frequent token.
#[derive(Debug, Default)]
pub struct UnitStats {
    max_tf: FxHashMap<Pre, u32>,
}

impl UnitStats {
    pub fn record_unit(&mut self, pre: Pre, max_tf: u32) {
        if max_tf > 0 {
            self.max_tf.insert(pre, max_tf);
        }
    }

    pub fn max_tf(&self, pre: Pre) -> u32 {
        self.max_tf.get(&pre).copied().unwrap_or(1)
    }

    /// Number of units that produced tokens
    pub fn total_units(&self) -> u32 {
        self.max_tf.len() as u32
    }

    /// Rough heap footprint in bytes
    pub fn memory(&self) -> u64 {
        self.max_tf.capacity() as u64 * 12
    }
}

/// Smallest and largest score written by a build
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreRange {
    pub min: f32,
    pub max: f32,
}

impl ScoreRange {
    pub fn include(range: Option<ScoreRange>, score: f32) -> ScoreRange {
        match range {
            Some(r) => ScoreRange {
                min: r.min.min(score),
                max: r.max.max(score),
            },
            None => ScoreRange { min: score, max: score },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tf_idf_bounds() {
        assert_eq!(ScoringModel::tf_idf(0, 3, 10, 2), 0.0);
        assert_eq!(ScoringModel::tf_idf(1, 1, 10, 0), 0.0);
        // Rarest token at maximum frequency scores highest
        assert!((ScoringModel::tf_idf(1, 1, 1, 1) - 1.0).abs() < 1e-6);
        let common = ScoringModel::tf_idf(1, 1, 100, 100);
        assert!(common > 0.0 && common < 0.2);
    }

    #[test]
    fn test_tf_idf_monotonic() {
        let rare = ScoringModel::tf_idf(2, 4, 100, 3);
        let frequent = ScoringModel::tf_idf(2, 4, 100, 50);
        assert!(rare > frequent);
        let more = ScoringModel::tf_idf(4, 4, 100, 3);
        assert!(more > rare);
    }

    #[test]
    fn test_combinators() {
        for (a, b) in [(0.0, 0.5), (0.3, 0.7), (1.0, 0.2)] {
            assert_eq!(ScoringModel::and(a, b), ScoringModel::and(b, a));
            assert_eq!(ScoringModel::or(a, b), ScoringModel::or(b, a));
        }
        assert_eq!(ScoringModel::and(0.0, 0.9), 0.0);
        assert!(ScoringModel::and(0.1, 0.9) > 0.0);
        assert_eq!(ScoringModel::or(0.0, 0.0), 0.0);
        assert!(ScoringModel::or(0.0, 0.4) > 0.0);
        assert!(ScoringModel::or(0.3, 0.4) >= 0.4);
    }

    #[test]
    fn test_and_of_tiny_scores_stays_positive() {
        let tiny = ScoringModel::and(1e-30, 1e-30);
        assert!(tiny > 0.0);
        assert_eq!(tiny, f32::MIN_POSITIVE);
        assert_eq!(ScoringModel::and(f32::MIN_POSITIVE, 0.0), 0.0);
        assert!((ScoringModel::and(0.5, 0.5) - 0.25).abs() < 1e-7);
    }

    #[test]
    fn test_unit_stats() {
        let mut stats = UnitStats::default();
        stats.record_unit(3, 2);
        stats.record_unit(8, 0);
        assert_eq!(stats.total_units(), 1);
        assert_eq!(stats.max_tf(3), 2);

        let range = ScoreRange::include(None, 0.5);
        let range = ScoreRange::include(Some(range), 0.25);
        assert_eq!(range, ScoreRange { min: 0.25, max: 0.5 });
    }
}
