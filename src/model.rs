use chrono::{DateTime, NaiveDate, Utc};
use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};

pub const DEFAULT_DAILY_GOAL_MINUTES: u32 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", from = "String")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }

    /// Harder topics come back sooner.
    pub fn interval_multiplier(self) -> f64 {
        match self {
            Difficulty::Easy => 1.25,
            Difficulty::Medium => 1.0,
            Difficulty::Hard => 0.75,
        }
    }

    pub fn base_weight(self) -> f64 {
        match self {
            Difficulty::Easy => 1.0,
            Difficulty::Medium => 2.0,
            Difficulty::Hard => 3.0,
        }
    }
}

impl From<String> for Difficulty {
    fn from(s: String) -> Difficulty {
        match normalize(&s).as_str() {
            "easy" => Difficulty::Easy,
            "hard" => Difficulty::Hard,
            _ => Difficulty::Medium,
        }
    }
}

/// Lifecycle stage of a topic. Ordered: a topic only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", from = "String")]
pub enum TopicStatus {
    #[default]
    New,
    Learning,
    Reviewing,
    Mastered,
}

impl TopicStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TopicStatus::New => "new",
            TopicStatus::Learning => "learning",
            TopicStatus::Reviewing => "reviewing",
            TopicStatus::Mastered => "mastered",
        }
    }
}

impl From<String> for TopicStatus {
    fn from(s: String) -> TopicStatus {
        match normalize(&s).as_str() {
            "learning" => TopicStatus::Learning,
            "reviewing" => TopicStatus::Reviewing,
            "mastered" => TopicStatus::Mastered,
            _ => TopicStatus::New,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", from = "String")]
pub enum PriorityWeight {
    #[default]
    Balanced,
    HardFocus,
    EasyFocus,
}

impl PriorityWeight {
    pub fn as_str(self) -> &'static str {
        match self {
            PriorityWeight::Balanced => "balanced",
            PriorityWeight::HardFocus => "hard-focus",
            PriorityWeight::EasyFocus => "easy-focus",
        }
    }
}

impl From<String> for PriorityWeight {
    fn from(s: String) -> PriorityWeight {
        match normalize(&s).as_str() {
            "hard-focus" | "hardfocus" | "focus-on-hard-topics" => PriorityWeight::HardFocus,
            "easy-focus" | "easyfocus" | "focus-on-easy-topics" => PriorityWeight::EasyFocus,
            _ => PriorityWeight::Balanced,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", from = "String")]
pub enum ReviewFrequency {
    #[default]
    Standard,
    Frequent,
    Intensive,
}

impl ReviewFrequency {
    pub fn as_str(self) -> &'static str {
        match self {
            ReviewFrequency::Standard => "standard",
            ReviewFrequency::Frequent => "frequent",
            ReviewFrequency::Intensive => "intensive",
        }
    }

    pub fn interval_multiplier(self) -> f64 {
        match self {
            ReviewFrequency::Standard => 1.0,
            ReviewFrequency::Frequent => 0.5,
            ReviewFrequency::Intensive => 0.25,
        }
    }
}

impl From<String> for ReviewFrequency {
    fn from(s: String) -> ReviewFrequency {
        match normalize(&s).as_str() {
            "frequent" => ReviewFrequency::Frequent,
            "intensive" => ReviewFrequency::Intensive,
            _ => ReviewFrequency::Standard,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub exam_date: Option<DateTime<Utc>>,
}

impl Subject {
    pub fn new(user_id: &str, name: &str, exam_date: Option<DateTime<Utc>>) -> Subject {
        Subject {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            name: name.to_string(),
            exam_date,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
    pub id: String,
    pub user_id: String,
    pub subject_id: String,
    pub name: String,
    pub difficulty: Difficulty,
    pub created_at: DateTime<Utc>,
    pub last_reviewed_at: Option<DateTime<Utc>>,
    pub review_count: u32,
    pub next_due_at: DateTime<Utc>,
    pub status: TopicStatus,
}

impl Topic {
    /// A fresh topic is due the moment it is created.
    pub fn new(
        user_id: &str,
        subject_id: &str,
        name: &str,
        difficulty: Difficulty,
        now: DateTime<Utc>,
    ) -> Topic {
        Topic {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            subject_id: subject_id.to_string(),
            name: name.to_string(),
            difficulty,
            created_at: now,
            last_reviewed_at: None,
            review_count: 0,
            next_due_at: now,
            status: TopicStatus::New,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Preferences {
    #[serde(alias = "dailyStudyGoal", deserialize_with = "lenient_goal")]
    pub daily_study_goal_minutes: u32,
    #[serde(deserialize_with = "lenient")]
    pub topic_priority_weight: PriorityWeight,
    #[serde(deserialize_with = "lenient")]
    pub review_frequency: ReviewFrequency,
}

impl Default for Preferences {
    fn default() -> Preferences {
        Preferences {
            daily_study_goal_minutes: DEFAULT_DAILY_GOAL_MINUTES,
            topic_priority_weight: PriorityWeight::Balanced,
            review_frequency: ReviewFrequency::Standard,
        }
    }
}

/// Clamp a goal in minutes to the valid range; non-positive goals mean "no study time".
pub fn clamp_goal(minutes: i64) -> u32 {
    minutes.clamp(0, i64::from(u32::MAX)) as u32
}

/// Parse a daily goal given as plain minutes or a label like "1 hour", "30 minutes", "4+ hours".
pub fn parse_goal_minutes(s: &str) -> Option<i64> {
    let s = s.trim().to_ascii_lowercase();
    let split = s
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-'))
        .unwrap_or(s.len());
    let (number, unit) = s.split_at(split);
    let amount: f64 = number.parse().ok()?;
    let unit = unit.trim_start_matches('+').trim();
    let minutes = if unit.starts_with('h') {
        amount * 60.0
    } else if unit.is_empty() || unit.starts_with("min") || unit == "m" {
        amount
    } else {
        return None;
    };
    Some(minutes.round() as i64)
}

/// Goal from a stored or submitted value, falling back to the default when unreadable.
pub fn goal_from_text(s: &str) -> u32 {
    parse_goal_minutes(s).map_or(DEFAULT_DAILY_GOAL_MINUTES, clamp_goal)
}

/// Parse an instant given as RFC 3339 or as a bare `YYYY-MM-DD` date (midnight UTC).
pub fn parse_instant(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Some(t.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|t| t.and_utc())
}

fn normalize(s: &str) -> String {
    s.trim().to_ascii_lowercase().replace(['_', ' '], "-")
}

fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: From<String> + Default,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Other(IgnoredAny),
    }
    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => T::from(s),
        Raw::Other(_) => T::default(),
    })
}

fn lenient_goal<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Whole(i64),
        Fraction(f64),
        Label(String),
        Other(IgnoredAny),
    }
    Ok(match Raw::deserialize(deserializer)? {
        Raw::Whole(n) => clamp_goal(n),
        Raw::Fraction(f) => clamp_goal(f.round() as i64),
        Raw::Label(s) => goal_from_text(&s),
        Raw::Other(_) => DEFAULT_DAILY_GOAL_MINUTES,
    })
}
