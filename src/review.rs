use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::EngineConfig;
use crate::interval;
use crate::model::{ReviewFrequency, Subject, Topic, TopicStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DueStatus {
    pub is_due: bool,
    /// Whole days elapsed since the topic came due; zero when not yet due.
    pub overdue_days: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectSummary {
    pub subject_id: String,
    pub name: String,
    pub total: usize,
    pub due: usize,
}

pub fn status_for(review_count: u32, config: &EngineConfig) -> TopicStatus {
    if review_count >= config.mastered_after {
        TopicStatus::Mastered
    } else if review_count >= config.reviewing_after {
        TopicStatus::Reviewing
    } else if review_count >= config.learning_after {
        TopicStatus::Learning
    } else {
        TopicStatus::New
    }
}

/// Record one review of `topic` at `now` and schedule the next one.
pub fn advance(
    topic: &mut Topic,
    frequency: ReviewFrequency,
    now: DateTime<Utc>,
    config: &EngineConfig,
) {
    topic.review_count = topic.review_count.saturating_add(1);
    topic.last_reviewed_at = Some(now);
    let days = interval::effective_interval(topic.review_count, topic.difficulty, frequency, config);
    topic.next_due_at = now + chrono::Days::new(u64::from(days));
    topic.status = topic.status.max(status_for(topic.review_count, config));
}

/// Mastered topics are not exempt: they resurface once their due date passes.
pub fn due_status(topic: &Topic, now: DateTime<Utc>) -> DueStatus {
    let is_due = topic.last_reviewed_at.is_none() || now >= topic.next_due_at;
    let overdue_days = (now - topic.next_due_at).num_days().max(0);
    DueStatus {
        is_due,
        overdue_days,
    }
}

pub fn filter_due(topics: &[Topic], now: DateTime<Utc>) -> Vec<usize> {
    topics
        .iter()
        .enumerate()
        .filter(|(_, topic)| due_status(topic, now).is_due)
        .map(|(i, _)| i)
        .collect()
}

pub fn subject_summaries(
    subjects: &[Subject],
    topics: &[Topic],
    now: DateTime<Utc>,
) -> Vec<SubjectSummary> {
    let due = filter_due(topics, now);
    let mut summaries: Vec<SubjectSummary> = subjects
        .iter()
        .map(|s| SubjectSummary {
            subject_id: s.id.clone(),
            name: s.name.clone(),
            total: topics.iter().filter(|t| t.subject_id == s.id).count(),
            due: due.iter().filter(|&&i| topics[i].subject_id == s.id).count(),
        })
        .collect();
    summaries.sort_by(|a, b| a.name.cmp(&b.name));
    summaries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Difficulty, parse_instant};

    fn at(s: &str) -> DateTime<Utc> {
        parse_instant(s).unwrap()
    }

    fn topic(id: &str, subject_id: &str) -> Topic {
        let mut t = Topic::new("u1", subject_id, "t", Difficulty::Medium, at("2025-06-01"));
        t.id = id.to_string();
        t
    }

    #[test]
    fn first_review_moves_to_learning() {
        let config = EngineConfig::default();
        let now = at("2025-06-01T09:00:00Z");
        let mut t = topic("1", "s");
        advance(&mut t, ReviewFrequency::Standard, now, &config);
        assert_eq!(t.review_count, 1);
        assert_eq!(t.status, TopicStatus::Learning);
        assert_eq!(t.last_reviewed_at, Some(now));
        assert_eq!(t.next_due_at, at("2025-06-04T09:00:00Z"));
    }

    #[test]
    fn status_thresholds() {
        let config = EngineConfig::default();
        let statuses: Vec<TopicStatus> = (0..8).map(|n| status_for(n, &config)).collect();
        assert_eq!(
            statuses,
            vec![
                TopicStatus::New,
                TopicStatus::Learning,
                TopicStatus::Learning,
                TopicStatus::Reviewing,
                TopicStatus::Reviewing,
                TopicStatus::Reviewing,
                TopicStatus::Mastered,
                TopicStatus::Mastered,
            ]
        );
    }

    #[test]
    fn repeated_reviews_only_move_forward() {
        let config = EngineConfig::default();
        let mut now = at("2025-06-01");
        let mut t = topic("1", "s");
        let mut last_status = t.status;
        let mut last_gap = 0;
        for _ in 0..8 {
            advance(&mut t, ReviewFrequency::Standard, now, &config);
            assert!(t.status >= last_status);
            let gap = (t.next_due_at - now).num_days();
            assert!(gap >= last_gap);
            last_status = t.status;
            last_gap = gap;
            now = t.next_due_at;
        }
        assert_eq!(t.review_count, 8);
        assert_eq!(t.status, TopicStatus::Mastered);
    }

    #[test]
    fn status_never_regresses_under_raised_thresholds() {
        let config = EngineConfig {
            reviewing_after: 10,
            mastered_after: 20,
            ..EngineConfig::default()
        };
        let mut t = topic("1", "s");
        t.review_count = 4;
        t.status = TopicStatus::Reviewing;
        advance(&mut t, ReviewFrequency::Standard, at("2025-06-02"), &config);
        assert_eq!(t.status, TopicStatus::Reviewing);
    }

    #[test]
    fn never_reviewed_is_due() {
        let t = topic("1", "s");
        let due = due_status(&t, at("2025-06-01"));
        assert!(due.is_due);
        assert_eq!(due.overdue_days, 0);
    }

    #[test]
    fn not_yet_due() {
        let config = EngineConfig::default();
        let mut t = topic("1", "s");
        t.review_count = 1;
        advance(&mut t, ReviewFrequency::Standard, at("2025-05-26"), &config);
        // Seven days from the second review; six have passed.
        let due = due_status(&t, at("2025-06-01"));
        assert!(!due.is_due);
        assert_eq!(due.overdue_days, 0);
    }

    #[test]
    fn overdue_days_are_whole_days() {
        let mut t = topic("1", "s");
        t.last_reviewed_at = Some(at("2025-05-20"));
        t.next_due_at = at("2025-05-25T12:00:00Z");
        let due = due_status(&t, at("2025-06-01T00:00:00Z"));
        assert!(due.is_due);
        assert_eq!(due.overdue_days, 6);
    }

    #[test]
    fn mastered_topics_resurface() {
        let mut t = topic("1", "s");
        t.status = TopicStatus::Mastered;
        t.review_count = 9;
        t.last_reviewed_at = Some(at("2025-04-01"));
        t.next_due_at = at("2025-05-01");
        assert!(due_status(&t, at("2025-06-01")).is_due);
    }

    #[test]
    fn filter_due_picks_due_topics() {
        let mut later = topic("2", "s");
        later.last_reviewed_at = Some(at("2025-06-01"));
        later.next_due_at = at("2025-06-10");
        let topics = vec![topic("1", "s"), later];
        assert_eq!(filter_due(&topics, at("2025-06-02")), vec![0]);
        assert_eq!(filter_due(&topics, at("2025-06-10")), vec![0, 1]);
    }

    #[test]
    fn summaries_group_by_subject() {
        let subjects = vec![
            Subject {
                id: "m".into(),
                user_id: "u1".into(),
                name: "Math".into(),
                exam_date: None,
            },
            Subject {
                id: "b".into(),
                user_id: "u1".into(),
                name: "Biology".into(),
                exam_date: None,
            },
        ];
        let mut reviewed = topic("2", "m");
        reviewed.last_reviewed_at = Some(at("2025-06-01"));
        reviewed.next_due_at = at("2025-07-01");
        let topics = vec![topic("1", "m"), reviewed, topic("3", "b"), topic("4", "gone")];

        let summaries = subject_summaries(&subjects, &topics, at("2025-06-02"));
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].name, "Biology");
        assert_eq!((summaries[0].total, summaries[0].due), (1, 1));
        assert_eq!(summaries[1].name, "Math");
        assert_eq!((summaries[1].total, summaries[1].due), (2, 1));
    }

    #[test]
    fn summary_due_counts_match_filter_due() {
        let subjects = vec![Subject {
            id: "m".into(),
            user_id: "u1".into(),
            name: "Math".into(),
            exam_date: None,
        }];
        let mut mastered = topic("2", "m");
        mastered.status = TopicStatus::Mastered;
        mastered.last_reviewed_at = Some(at("2025-04-01"));
        mastered.next_due_at = at("2025-05-01");
        let mut waiting = topic("3", "m");
        waiting.last_reviewed_at = Some(at("2025-06-01"));
        waiting.next_due_at = at("2025-06-20");
        let topics = vec![topic("1", "m"), mastered, waiting];

        let now = at("2025-06-02");
        let summaries = subject_summaries(&subjects, &topics, now);
        assert_eq!(summaries[0].total, 3);
        assert_eq!(summaries[0].due, filter_due(&topics, now).len());
        assert_eq!(summaries[0].due, 2);
    }
}
