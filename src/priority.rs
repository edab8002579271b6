use std::cmp::Ordering;
use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::config::EngineConfig;
use crate::model::{Difficulty, Preferences, PriorityWeight, Subject, Topic, TopicStatus};
use crate::review::{self, DueStatus};
use crate::urgency;

#[derive(Debug, Clone)]
pub struct RankedTopic<'a> {
    pub topic: &'a Topic,
    pub subject: &'a Subject,
    pub due: DueStatus,
    pub urgency: f64,
    pub score: f64,
}

pub fn difficulty_term(
    difficulty: Difficulty,
    weight: PriorityWeight,
    config: &EngineConfig,
) -> f64 {
    let base = difficulty.base_weight();
    match weight {
        PriorityWeight::Balanced => base,
        PriorityWeight::HardFocus => base * config.hard_focus_multiplier,
        PriorityWeight::EasyFocus => 4.0 - base,
    }
}

fn composite(
    topic: &Topic,
    due: DueStatus,
    urgency: f64,
    weight: PriorityWeight,
    config: &EngineConfig,
) -> f64 {
    let due_term = if due.is_due {
        1.0 + (due.overdue_days as f64).ln_1p()
    } else {
        0.0
    };
    let newness = if topic.status == TopicStatus::New {
        config.newness_boost
    } else {
        0.0
    };
    due_term
        + urgency * config.urgency_weight
        + difficulty_term(topic.difficulty, weight, config)
        + newness
}

pub fn score(
    topic: &Topic,
    subject: &Subject,
    prefs: &Preferences,
    now: DateTime<Utc>,
    config: &EngineConfig,
) -> f64 {
    composite(
        topic,
        review::due_status(topic, now),
        urgency::exam_urgency(subject, now, config),
        prefs.topic_priority_weight,
        config,
    )
}

/// Whether a topic belongs in "study now" at all: due, exam-urgent, or never seen.
pub fn is_candidate(topic: &Topic, due: DueStatus, urgency: f64) -> bool {
    due.is_due || urgency > 0.0 || topic.status == TopicStatus::New
}

/// Score and order candidate topics, highest priority first.
///
/// Ties fall back to the nearer exam (subjects without one last), then to
/// topic id. A topic id seen twice is only ranked once.
pub fn rank<'a>(
    pairs: impl IntoIterator<Item = (&'a Topic, &'a Subject)>,
    prefs: &Preferences,
    now: DateTime<Utc>,
    config: &EngineConfig,
) -> Vec<RankedTopic<'a>> {
    let mut seen = HashSet::new();
    let mut ranked: Vec<RankedTopic<'a>> = pairs
        .into_iter()
        .filter(|&(topic, _)| seen.insert(topic.id.as_str()))
        .filter_map(|(topic, subject)| {
            let due = review::due_status(topic, now);
            let urgency = urgency::exam_urgency(subject, now, config);
            if !is_candidate(topic, due, urgency) {
                tracing::debug!(topic = %topic.id, "not due, skipping");
                return None;
            }
            let score = composite(topic, due, urgency, prefs.topic_priority_weight, config);
            Some(RankedTopic {
                topic,
                subject,
                due,
                urgency,
                score,
            })
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| nearer_exam(a.subject.exam_date, b.subject.exam_date))
            .then_with(|| a.topic.id.cmp(&b.topic.id))
    });
    ranked
}

fn nearer_exam(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
