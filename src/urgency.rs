use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::config::EngineConfig;
use crate::model::Subject;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Exam proximity in `[0, 1]`: zero without an exam or beyond the horizon,
/// rising linearly to one as the exam arrives, and one once it has passed.
pub fn exam_urgency(subject: &Subject, now: DateTime<Utc>, config: &EngineConfig) -> f64 {
    let Some(exam) = subject.exam_date else {
        return 0.0;
    };
    if exam <= now {
        return 1.0;
    }
    let days_until = (exam - now).num_seconds() as f64 / SECONDS_PER_DAY;
    (1.0 - days_until / config.urgency_horizon_days).clamp(0.0, 1.0)
}

/// Urgency per subject id; every topic of a subject shares its value.
pub fn subject_urgencies<'a>(
    subjects: &'a [Subject],
    now: DateTime<Utc>,
    config: &EngineConfig,
) -> HashMap<&'a str, f64> {
    subjects
        .iter()
        .map(|s| (s.id.as_str(), exam_urgency(s, now, config)))
        .collect()
}
