//! Fixed-ladder review intervals scaled by difficulty and review frequency.

use crate::config::EngineConfig;
use crate::model::{Difficulty, ReviewFrequency};

/// Days on the ladder for `review_count`; counts past the end stay on the last rung.
pub fn base_interval(review_count: u32, config: &EngineConfig) -> u32 {
    let rung = (review_count as usize).min(config.intervals.len().saturating_sub(1));
    config.intervals.get(rung).copied().unwrap_or(1)
}

pub fn effective_interval(
    review_count: u32,
    difficulty: Difficulty,
    frequency: ReviewFrequency,
    config: &EngineConfig,
) -> u32 {
    let days = f64::from(base_interval(review_count, config))
        * frequency.interval_multiplier()
        * difficulty.interval_multiplier();
    f64::max(days.round(), 1.0) as u32
}
