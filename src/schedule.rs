//! Schedule generation: a pure function of one user's subjects, topics and
//! preferences at a given instant.
//!
//! Nothing here reads the clock or touches storage. Callers load a snapshot,
//! pass `now`, and get back an ordered, time-boxed list of topics together
//! with any data-integrity problems found on the way.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::allocate::{self, ScheduleEntry};
use crate::config::EngineConfig;
use crate::error::ScheduleError;
use crate::model::{Preferences, Subject, Topic};
use crate::priority;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Plan {
    pub entries: Vec<ScheduleEntry>,
    /// Topics left out because their data is inconsistent.
    pub issues: Vec<ScheduleError>,
}

impl Plan {
    pub fn total_minutes(&self) -> u32 {
        self.entries.iter().map(|e| e.allocated_minutes).sum()
    }
}

pub fn generate(
    subjects: &[Subject],
    topics: &[Topic],
    prefs: &Preferences,
    now: DateTime<Utc>,
    config: &EngineConfig,
) -> Plan {
    let by_id: HashMap<&str, &Subject> = subjects.iter().map(|s| (s.id.as_str(), s)).collect();

    let mut issues = Vec::new();
    let mut pairs = Vec::with_capacity(topics.len());
    for topic in topics {
        match by_id.get(topic.subject_id.as_str()) {
            Some(subject) => pairs.push((topic, *subject)),
            None => {
                let issue = ScheduleError::OrphanTopic {
                    topic_id: topic.id.clone(),
                    subject_id: topic.subject_id.clone(),
                };
                tracing::warn!(%issue, "excluding topic from schedule");
                issues.push(issue);
            }
        }
    }

    let ranked = priority::rank(pairs, prefs, now, config);
    let entries = allocate::allocate(&ranked, prefs.daily_study_goal_minutes, config);
    tracing::debug!(
        candidates = ranked.len(),
        scheduled = entries.len(),
        "generated schedule"
    );
    Plan { entries, issues }
}
