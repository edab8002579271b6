use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::model::{self, Difficulty, Preferences, Subject, Topic, TopicStatus};

/// Per-user access to study records.
///
/// Every mutation replaces one whole record, so concurrent writers resolve
/// as last-write-wins per subject, topic or preference row.
pub trait StudyStore {
    fn subjects(&self, user_id: &str) -> Result<Vec<Subject>, StoreError>;
    fn topics(&self, user_id: &str) -> Result<Vec<Topic>, StoreError>;
    fn preferences(&self, user_id: &str) -> Result<Option<Preferences>, StoreError>;
    fn save_subject(&mut self, subject: &Subject) -> Result<(), StoreError>;
    fn save_topic(&mut self, topic: &Topic) -> Result<(), StoreError>;
    /// Removes the subject and all of its topics. Returns false if it did not exist.
    fn delete_subject(&mut self, user_id: &str, subject_id: &str) -> Result<bool, StoreError>;
    fn delete_topic(&mut self, user_id: &str, topic_id: &str) -> Result<bool, StoreError>;
    fn save_preferences(&mut self, user_id: &str, prefs: &Preferences) -> Result<(), StoreError>;
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    subjects: Vec<Subject>,
    topics: Vec<Topic>,
    preferences: BTreeMap<String, Preferences>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }
}

fn upsert<T: Clone>(rows: &mut Vec<T>, row: &T, same: impl Fn(&T) -> bool) {
    match rows.iter_mut().find(|r| same(r)) {
        Some(existing) => *existing = row.clone(),
        None => rows.push(row.clone()),
    }
}

impl StudyStore for MemoryStore {
    fn subjects(&self, user_id: &str) -> Result<Vec<Subject>, StoreError> {
        Ok(self
            .subjects
            .iter()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect())
    }

    fn topics(&self, user_id: &str) -> Result<Vec<Topic>, StoreError> {
        Ok(self
            .topics
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect())
    }

    fn preferences(&self, user_id: &str) -> Result<Option<Preferences>, StoreError> {
        Ok(self.preferences.get(user_id).copied())
    }

    fn save_subject(&mut self, subject: &Subject) -> Result<(), StoreError> {
        upsert(&mut self.subjects, subject, |s| s.id == subject.id);
        Ok(())
    }

    fn save_topic(&mut self, topic: &Topic) -> Result<(), StoreError> {
        upsert(&mut self.topics, topic, |t| t.id == topic.id);
        Ok(())
    }

    fn delete_subject(&mut self, user_id: &str, subject_id: &str) -> Result<bool, StoreError> {
        let before = self.subjects.len();
        self.subjects
            .retain(|s| !(s.user_id == user_id && s.id == subject_id));
        if self.subjects.len() == before {
            return Ok(false);
        }
        self.topics
            .retain(|t| !(t.user_id == user_id && t.subject_id == subject_id));
        Ok(true)
    }

    fn delete_topic(&mut self, user_id: &str, topic_id: &str) -> Result<bool, StoreError> {
        let before = self.topics.len();
        self.topics
            .retain(|t| !(t.user_id == user_id && t.id == topic_id));
        Ok(self.topics.len() != before)
    }

    fn save_preferences(&mut self, user_id: &str, prefs: &Preferences) -> Result<(), StoreError> {
        self.preferences.insert(user_id.to_string(), *prefs);
        Ok(())
    }
}

pub const SUBJECTS_FILE: &str = "subjects.csv";
pub const TOPICS_FILE: &str = "topics.csv";
pub const PREFERENCES_FILE: &str = "preferences.csv";

const SUBJECT_HEADER: [&str; 4] = ["user_id", "id", "name", "exam_date"];
const TOPIC_HEADER: [&str; 10] = [
    "user_id",
    "id",
    "subject_id",
    "name",
    "difficulty",
    "created_at",
    "last_reviewed_at",
    "review_count",
    "next_due_at",
    "status",
];
const PREFERENCE_HEADER: [&str; 4] = [
    "user_id",
    "daily_study_goal_minutes",
    "topic_priority_weight",
    "review_frequency",
];

/// A directory of CSV tables, loaded once and rewritten table by table on change.
///
/// A change becomes visible to reads only after its table is on disk.
#[derive(Debug)]
pub struct CsvStore {
    dir: PathBuf,
    data: MemoryStore,
}

impl CsvStore {
    pub fn open(dir: &Path) -> Result<CsvStore, StoreError> {
        std::fs::create_dir_all(dir).map_err(|source| StoreError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let loaded_at = Utc::now();
        let data = MemoryStore {
            subjects: read_table(&dir.join(SUBJECTS_FILE), parse_subject)?,
            topics: read_table(&dir.join(TOPICS_FILE), |r| parse_topic(r, loaded_at))?,
            preferences: read_table(&dir.join(PREFERENCES_FILE), parse_preferences)?
                .into_iter()
                .collect(),
        };
        tracing::info!(
            dir = %dir.display(),
            subjects = data.subjects.len(),
            topics = data.topics.len(),
            "opened study data"
        );
        Ok(CsvStore {
            dir: dir.to_path_buf(),
            data,
        })
    }

    fn write_subjects(&self, data: &MemoryStore) -> Result<(), StoreError> {
        write_table(
            &self.dir.join(SUBJECTS_FILE),
            &SUBJECT_HEADER,
            data.subjects.iter().map(|s| {
                vec![
                    s.user_id.clone(),
                    s.id.clone(),
                    s.name.clone(),
                    format_optional_instant(s.exam_date),
                ]
            }),
        )
    }

    fn write_topics(&self, data: &MemoryStore) -> Result<(), StoreError> {
        write_table(
            &self.dir.join(TOPICS_FILE),
            &TOPIC_HEADER,
            data.topics.iter().map(|t| {
                vec![
                    t.user_id.clone(),
                    t.id.clone(),
                    t.subject_id.clone(),
                    t.name.clone(),
                    t.difficulty.as_str().to_string(),
                    t.created_at.to_rfc3339(),
                    format_optional_instant(t.last_reviewed_at),
                    t.review_count.to_string(),
                    t.next_due_at.to_rfc3339(),
                    t.status.as_str().to_string(),
                ]
            }),
        )
    }

    fn write_preferences(&self, data: &MemoryStore) -> Result<(), StoreError> {
        write_table(
            &self.dir.join(PREFERENCES_FILE),
            &PREFERENCE_HEADER,
            data.preferences.iter().map(|(user_id, p)| {
                vec![
                    user_id.clone(),
                    p.daily_study_goal_minutes.to_string(),
                    p.topic_priority_weight.as_str().to_string(),
                    p.review_frequency.as_str().to_string(),
                ]
            }),
        )
    }
}

impl StudyStore for CsvStore {
    fn subjects(&self, user_id: &str) -> Result<Vec<Subject>, StoreError> {
        self.data.subjects(user_id)
    }

    fn topics(&self, user_id: &str) -> Result<Vec<Topic>, StoreError> {
        self.data.topics(user_id)
    }

    fn preferences(&self, user_id: &str) -> Result<Option<Preferences>, StoreError> {
        self.data.preferences(user_id)
    }

    fn save_subject(&mut self, subject: &Subject) -> Result<(), StoreError> {
        let mut next = self.data.clone();
        next.save_subject(subject)?;
        self.write_subjects(&next)?;
        self.data = next;
        Ok(())
    }

    fn save_topic(&mut self, topic: &Topic) -> Result<(), StoreError> {
        let mut next = self.data.clone();
        next.save_topic(topic)?;
        self.write_topics(&next)?;
        self.data = next;
        Ok(())
    }

    fn delete_subject(&mut self, user_id: &str, subject_id: &str) -> Result<bool, StoreError> {
        let mut next = self.data.clone();
        if !next.delete_subject(user_id, subject_id)? {
            return Ok(false);
        }
        // Subjects first: a failed topic rewrite leaves orphans, not lost topics.
        self.write_subjects(&next)?;
        self.write_topics(&next)?;
        self.data = next;
        Ok(true)
    }

    fn delete_topic(&mut self, user_id: &str, topic_id: &str) -> Result<bool, StoreError> {
        let mut next = self.data.clone();
        if !next.delete_topic(user_id, topic_id)? {
            return Ok(false);
        }
        self.write_topics(&next)?;
        self.data = next;
        Ok(true)
    }

    fn save_preferences(&mut self, user_id: &str, prefs: &Preferences) -> Result<(), StoreError> {
        let mut next = self.data.clone();
        next.save_preferences(user_id, prefs)?;
        self.write_preferences(&next)?;
        self.data = next;
        Ok(())
    }
}

fn get_field(record: &csv::StringRecord, index: usize) -> &str {
    record.get(index).unwrap_or("").trim()
}

fn id_or_fresh(raw: &str) -> String {
    if raw.is_empty() {
        uuid::Uuid::new_v4().to_string()
    } else {
        raw.to_string()
    }
}

fn format_optional_instant(t: Option<DateTime<Utc>>) -> String {
    t.map_or(String::new(), |t| t.to_rfc3339())
}

fn parse_subject(record: &csv::StringRecord) -> Subject {
    Subject {
        user_id: get_field(record, 0).to_string(),
        id: id_or_fresh(get_field(record, 1)),
        name: get_field(record, 2).to_string(),
        exam_date: model::parse_instant(get_field(record, 3)),
    }
}

/// Missing timestamps fall back to "due now": the creation time is the load
/// time unless a due date is present.
fn parse_topic(record: &csv::StringRecord, loaded_at: DateTime<Utc>) -> Topic {
    let next_due = model::parse_instant(get_field(record, 8));
    let created_at = model::parse_instant(get_field(record, 5))
        .or(next_due)
        .unwrap_or(loaded_at);
    let review_count = get_field(record, 7)
        .parse::<i64>()
        .map_or(0, |n| n.clamp(0, i64::from(u32::MAX)) as u32);
    Topic {
        user_id: get_field(record, 0).to_string(),
        id: id_or_fresh(get_field(record, 1)),
        subject_id: get_field(record, 2).to_string(),
        name: get_field(record, 3).to_string(),
        difficulty: Difficulty::from(get_field(record, 4).to_string()),
        created_at,
        last_reviewed_at: model::parse_instant(get_field(record, 6)),
        review_count,
        next_due_at: next_due.unwrap_or(created_at),
        status: TopicStatus::from(get_field(record, 9).to_string()),
    }
}

fn parse_preferences(record: &csv::StringRecord) -> (String, Preferences) {
    let goal = get_field(record, 1);
    let prefs = Preferences {
        daily_study_goal_minutes: if goal.is_empty() {
            model::DEFAULT_DAILY_GOAL_MINUTES
        } else {
            model::goal_from_text(goal)
        },
        topic_priority_weight: get_field(record, 2).to_string().into(),
        review_frequency: get_field(record, 3).to_string().into(),
    };
    (get_field(record, 0).to_string(), prefs)
}

fn read_table<T>(
    path: &Path,
    parse: impl Fn(&csv::StringRecord) -> T,
) -> Result<Vec<T>, StoreError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|source| StoreError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|source| StoreError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
        rows.push(parse(&record));
    }
    Ok(rows)
}

fn write_table(
    path: &Path,
    header: &[&str],
    rows: impl Iterator<Item = Vec<String>>,
) -> Result<(), StoreError> {
    let csv_err = |source: csv::Error| StoreError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;
    writer.write_record(header).map_err(csv_err)?;
    for row in rows {
        writer.write_record(&row).map_err(csv_err)?;
    }
    writer.flush().map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}
