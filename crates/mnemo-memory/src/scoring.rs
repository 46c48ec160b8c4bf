//! Memory scoring and decay math
//!
//! The same score drives consolidation ranking and layer rebalancing:
//! decayed importance plus a logarithmic access-frequency bonus.

use crate::types::MemoryRecord;

/// Exponential decay multiplier for a record of the given age
///
/// `exp(-rate * age_days / 30)`: one `rate` worth of decay per 30-day
/// period.
pub fn decay_factor(age_days: f64, rate: f64) -> f64 {
    (-rate * age_days / 30.0).exp()
}

/// Composite retention score of a record at `now`
///
/// `importance * decay_factor + 0.1 * ln(access_count + 1)`. Scores above
/// ~0.8 mark records worth promoting; below ~0.3 with an expired TTL they
/// are demotion candidates.
pub fn memory_score(record: &MemoryRecord, now: i64, decay_rate: f64) -> f64 {
    let decayed = record.importance as f64 * decay_factor(record.age_days(now), decay_rate);
    let access_bonus = 0.1 * ((record.access_count as f64) + 1.0).ln();
    decayed + access_bonus
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MemoryLayer, MemoryRecord, MemorySource};

    fn record_aged(days: f64, importance: f32, access_count: u64) -> (MemoryRecord, i64) {
        let mut record = MemoryRecord::new(
            "scored",
            importance,
            MemorySource::Agent,
            vec![],
            MemoryLayer::ShortTerm,
        );
        record.access_count = access_count;
        let now = record.timestamp + (days * 86_400_000.0) as i64;
        (record, now)
    }

    #[test]
    fn test_decay_factor_at_zero_age() {
        assert!((decay_factor(0.0, 0.1) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_decay_factor_thirty_days() {
        // One full period at the default rate.
        let f = decay_factor(30.0, 0.1);
        assert!((f - (-0.1f64).exp()).abs() < 1e-12);
        assert!((f - 0.904_837_418).abs() < 1e-6);
    }

    #[test]
    fn test_score_of_fresh_untouched_record_is_importance() {
        let (record, now) = record_aged(0.0, 0.6, 0);
        let score = memory_score(&record, now, 0.1);
        assert!((score - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_score_rewards_access() {
        let (cold, now) = record_aged(10.0, 0.5, 0);
        let (mut hot, _) = record_aged(10.0, 0.5, 0);
        hot.timestamp = cold.timestamp;
        hot.access_count = 20;

        assert!(memory_score(&hot, now, 0.1) > memory_score(&cold, now, 0.1));
    }

    #[test]
    fn test_score_decays_with_age() {
        let (young, now_young) = record_aged(1.0, 0.8, 0);
        let (old, now_old) = record_aged(90.0, 0.8, 0);

        assert!(memory_score(&old, now_old, 0.1) < memory_score(&young, now_young, 0.1));
    }
}
