//! Study actions scoped to one user: schedule generation over a store
//! snapshot, the "mark reviewed" mutation, and subject/topic/preference CRUD.

use chrono::{DateTime, Utc};

use crate::config::EngineConfig;
use crate::error::ServiceError;
use crate::model::{Difficulty, Preferences, Subject, Topic};
use crate::review::{self, SubjectSummary};
use crate::schedule::{self, Plan};
use crate::store::StudyStore;

/// Changes accepted by [`update_topic`]. Review history is never edited here.
#[derive(Debug, Clone, Default)]
pub struct TopicChanges {
    pub name: Option<String>,
    pub subject_id: Option<String>,
    pub difficulty: Option<Difficulty>,
}

pub fn preferences_for<S: StudyStore + ?Sized>(
    store: &S,
    user_id: &str,
) -> Result<Preferences, ServiceError> {
    Ok(store.preferences(user_id)?.unwrap_or_default())
}

pub fn schedule_for<S: StudyStore + ?Sized>(
    store: &S,
    user_id: &str,
    config: &EngineConfig,
    now: DateTime<Utc>,
) -> Result<Plan, ServiceError> {
    let subjects = store.subjects(user_id)?;
    let topics = store.topics(user_id)?;
    let prefs = preferences_for(store, user_id)?;
    Ok(schedule::generate(&subjects, &topics, &prefs, now, config))
}

pub fn summaries_for<S: StudyStore + ?Sized>(
    store: &S,
    user_id: &str,
    now: DateTime<Utc>,
) -> Result<Vec<SubjectSummary>, ServiceError> {
    let subjects = store.subjects(user_id)?;
    let topics = store.topics(user_id)?;
    Ok(review::subject_summaries(&subjects, &topics, now))
}

pub fn find_topic<S: StudyStore + ?Sized>(
    store: &S,
    user_id: &str,
    topic_id: &str,
) -> Result<Topic, ServiceError> {
    store
        .topics(user_id)?
        .into_iter()
        .find(|t| t.id == topic_id)
        .ok_or_else(|| ServiceError::not_found("topic", topic_id))
}

fn find_subject<S: StudyStore + ?Sized>(
    store: &S,
    user_id: &str,
    subject_id: &str,
) -> Result<Subject, ServiceError> {
    store
        .subjects(user_id)?
        .into_iter()
        .find(|s| s.id == subject_id)
        .ok_or_else(|| ServiceError::not_found("subject", subject_id))
}

/// Mark a topic reviewed at `now` using the user's review frequency.
pub fn review_topic<S: StudyStore + ?Sized>(
    store: &mut S,
    user_id: &str,
    topic_id: &str,
    config: &EngineConfig,
    now: DateTime<Utc>,
) -> Result<Topic, ServiceError> {
    let mut topic = find_topic(store, user_id, topic_id)?;
    let prefs = preferences_for(store, user_id)?;
    review::advance(&mut topic, prefs.review_frequency, now, config);
    store.save_topic(&topic)?;
    tracing::info!(
        topic = %topic.id,
        review_count = topic.review_count,
        status = topic.status.as_str(),
        next_due = %topic.next_due_at,
        "topic reviewed"
    );
    Ok(topic)
}

fn required(field: &str, value: &str) -> Result<String, ServiceError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ServiceError::Invalid(format!("{field} is required")));
    }
    Ok(value.to_string())
}

pub fn create_subject<S: StudyStore + ?Sized>(
    store: &mut S,
    user_id: &str,
    name: &str,
    exam_date: Option<DateTime<Utc>>,
) -> Result<Subject, ServiceError> {
    let subject = Subject::new(user_id, &required("subject name", name)?, exam_date);
    store.save_subject(&subject)?;
    tracing::info!(subject = %subject.id, "subject created");
    Ok(subject)
}

pub fn update_subject<S: StudyStore + ?Sized>(
    store: &mut S,
    user_id: &str,
    subject_id: &str,
    name: Option<&str>,
    exam_date: Option<Option<DateTime<Utc>>>,
) -> Result<Subject, ServiceError> {
    let mut subject = find_subject(store, user_id, subject_id)?;
    if let Some(name) = name {
        subject.name = required("subject name", name)?;
    }
    if let Some(exam_date) = exam_date {
        subject.exam_date = exam_date;
    }
    store.save_subject(&subject)?;
    Ok(subject)
}

pub fn delete_subject<S: StudyStore + ?Sized>(
    store: &mut S,
    user_id: &str,
    subject_id: &str,
) -> Result<(), ServiceError> {
    if !store.delete_subject(user_id, subject_id)? {
        return Err(ServiceError::not_found("subject", subject_id));
    }
    tracing::info!(subject = %subject_id, "subject deleted with its topics");
    Ok(())
}

pub fn create_topic<S: StudyStore + ?Sized>(
    store: &mut S,
    user_id: &str,
    subject_id: &str,
    name: &str,
    difficulty: Difficulty,
    now: DateTime<Utc>,
) -> Result<Topic, ServiceError> {
    let name = required("topic name", name)?;
    let subject = find_subject(store, user_id, subject_id)?;
    let topic = Topic::new(user_id, &subject.id, &name, difficulty, now);
    store.save_topic(&topic)?;
    tracing::info!(topic = %topic.id, subject = %subject.id, "topic created");
    Ok(topic)
}

pub fn update_topic<S: StudyStore + ?Sized>(
    store: &mut S,
    user_id: &str,
    topic_id: &str,
    changes: TopicChanges,
) -> Result<Topic, ServiceError> {
    let mut topic = find_topic(store, user_id, topic_id)?;
    if let Some(name) = changes.name {
        topic.name = required("topic name", &name)?;
    }
    if let Some(subject_id) = changes.subject_id {
        topic.subject_id = find_subject(store, user_id, &subject_id)?.id;
    }
    if let Some(difficulty) = changes.difficulty {
        topic.difficulty = difficulty;
    }
    store.save_topic(&topic)?;
    Ok(topic)
}

pub fn delete_topic<S: StudyStore + ?Sized>(
    store: &mut S,
    user_id: &str,
    topic_id: &str,
) -> Result<(), ServiceError> {
    if !store.delete_topic(user_id, topic_id)? {
        return Err(ServiceError::not_found("topic", topic_id));
    }
    Ok(())
}

pub fn update_preferences<S: StudyStore + ?Sized>(
    store: &mut S,
    user_id: &str,
    prefs: Preferences,
) -> Result<Preferences, ServiceError> {
    store.save_preferences(user_id, &prefs)?;
    tracing::info!(
        user = %user_id,
        goal = prefs.daily_study_goal_minutes,
        weight = prefs.topic_priority_weight.as_str(),
        frequency = prefs.review_frequency.as_str(),
        "preferences updated"
    );
    Ok(prefs)
}
