use serde::Serialize;

use crate::config::EngineConfig;
use crate::model::TopicStatus;
use crate::priority::RankedTopic;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DueReason {
    Overdue,
    ExamUrgent,
    NewTopic,
    ScheduledReview,
}

impl DueReason {
    pub fn as_str(self) -> &'static str {
        match self {
            DueReason::Overdue => "overdue",
            DueReason::ExamUrgent => "exam-urgent",
            DueReason::NewTopic => "new-topic",
            DueReason::ScheduledReview => "scheduled-review",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleEntry {
    pub topic_id: String,
    pub subject_id: String,
    pub allocated_minutes: u32,
    pub priority_score: f64,
    pub due_reason: DueReason,
}

pub fn due_reason(ranked: &RankedTopic<'_>, config: &EngineConfig) -> DueReason {
    if ranked.due.is_due && ranked.due.overdue_days > 0 {
        DueReason::Overdue
    } else if ranked.urgency >= config.exam_urgent_threshold {
        DueReason::ExamUrgent
    } else if ranked.topic.status == TopicStatus::New {
        DueReason::NewTopic
    } else {
        DueReason::ScheduledReview
    }
}

/// Minutes per topic: the goal split across up to `target_slot_count` topics,
/// never below `min_slot_minutes`.
pub fn slot_minutes(candidates: usize, goal_minutes: u32, config: &EngineConfig) -> u32 {
    let slots = candidates.min(config.target_slot_count).max(1) as u32;
    (goal_minutes / slots).max(config.min_slot_minutes)
}

/// Walk the ranked list handing out slots until the topics run out or what
/// is left of the goal drops below the minimum slot.
pub fn allocate(
    ranked: &[RankedTopic<'_>],
    goal_minutes: u32,
    config: &EngineConfig,
) -> Vec<ScheduleEntry> {
    if ranked.is_empty() || goal_minutes == 0 {
        return Vec::new();
    }
    let slot = slot_minutes(ranked.len(), goal_minutes, config);
    let mut remaining = goal_minutes;
    let mut entries = Vec::new();
    for r in ranked {
        if remaining < config.min_slot_minutes {
            break;
        }
        let minutes = slot.min(remaining);
        remaining -= minutes;
        entries.push(ScheduleEntry {
            topic_id: r.topic.id.clone(),
            subject_id: r.subject.id.clone(),
            allocated_minutes: minutes,
            priority_score: r.score,
            due_reason: due_reason(r, config),
        });
    }
    tracing::debug!(
        slot,
        entries = entries.len(),
        unallocated = remaining,
        "allocated study time"
    );
    entries
}
