//! Calendar task model shared by the REST surface and the push channel.
//!
//! Task categories and priorities are open sets: the server may send values
//! this crate has never heard of, and those must survive a round trip
//! untouched.

use std::fmt;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

/// Opaque, server-assigned task identifier.
///
/// The backend hands out integers, but nothing in the client relies on that.
/// String identifiers are accepted as well and written back in the form they
/// were read. Equality and hashing go by the displayed key, so `5` and `"5"`
/// name the same task.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(IdRepr);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum IdRepr {
    Int(i64),
    Text(String),
}

impl TaskId {
    /// Creates an identifier from the integer form the backend uses.
    #[must_use]
    pub const fn from_int(id: i64) -> Self {
        Self(IdRepr::Int(id))
    }

    /// Creates an identifier from an arbitrary string key.
    pub fn from_text(id: impl Into<String>) -> Self {
        Self(IdRepr::Text(id.into()))
    }

    /// Returns the integer value if this id was issued as an integer.
    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self.0 {
            IdRepr::Int(n) => Some(n),
            IdRepr::Text(_) => None,
        }
    }

    /// Integer value of the displayed key, if it is one written canonically.
    fn canonical_int(&self) -> Option<i64> {
        match &self.0 {
            IdRepr::Int(n) => Some(*n),
            IdRepr::Text(s) => s.parse::<i64>().ok().filter(|n| n.to_string() == *s),
        }
    }
}

impl PartialEq for TaskId {
    fn eq(&self, other: &Self) -> bool {
        match (self.canonical_int(), other.canonical_int()) {
            (Some(a), Some(b)) => a == b,
            (None, None) => match (&self.0, &other.0) {
                (IdRepr::Text(a), IdRepr::Text(b)) => a == b,
                _ => false,
            },
            _ => false,
        }
    }
}

impl Eq for TaskId {}

impl std::hash::Hash for TaskId {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        match (self.canonical_int(), &self.0) {
            (Some(n), _) => n.hash(state),
            (None, IdRepr::Text(s)) => s.hash(state),
            (None, IdRepr::Int(n)) => n.hash(state),
        }
    }
}

impl From<i64> for TaskId {
    fn from(id: i64) -> Self {
        Self::from_int(id)
    }
}

impl From<&str> for TaskId {
    fn from(id: &str) -> Self {
        Self::from_text(id)
    }
}

/// Integer text parses as an integer id; anything else is kept as text.
impl std::str::FromStr for TaskId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(s.parse::<i64>().map_or_else(|_| Self::from_text(s), Self::from_int))
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            IdRepr::Int(n) => write!(f, "{n}"),
            IdRepr::Text(s) => f.write_str(s),
        }
    }
}

/// Category of farm-maintenance work.
///
/// Values outside the known set are kept verbatim in [`TaskKind::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TaskKind {
    Watering,
    Fertilizing,
    Pruning,
    Harvesting,
    /// Any category this client does not know about.
    Other(String),
}

impl TaskKind {
    /// Returns the wire string for this category.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Watering => "watering",
            Self::Fertilizing => "fertilizing",
            Self::Pruning => "pruning",
            Self::Harvesting => "harvesting",
            Self::Other(s) => s,
        }
    }
}

impl From<&str> for TaskKind {
    fn from(s: &str) -> Self {
        match s {
            "watering" => Self::Watering,
            "fertilizing" => Self::Fertilizing,
            "pruning" => Self::Pruning,
            "harvesting" => Self::Harvesting,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for TaskKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "watering" | "fertilizing" | "pruning" | "harvesting" => Self::from(s.as_str()),
            _ => Self::Other(s),
        }
    }
}

impl From<TaskKind> for String {
    fn from(kind: TaskKind) -> Self {
        match kind {
            TaskKind::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Conventional task priority. Not enforced; unknown values are preserved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Other(String),
}

impl Priority {
    /// Returns the wire string for this priority.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Other(s) => s,
        }
    }
}

impl From<&str> for Priority {
    fn from(s: &str) -> Self {
        match s {
            "low" => Self::Low,
            "medium" => Self::Medium,
            "high" => Self::High,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for Priority {
    fn from(s: String) -> Self {
        match s.as_str() {
            "low" | "medium" | "high" => Self::from(s.as_str()),
            _ => Self::Other(s),
        }
    }
}

impl From<Priority> for String {
    fn from(priority: Priority) -> Self {
        match priority {
            Priority::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rejected task input, detected before anything is sent to the server.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskValidationError {
    /// Task title cannot be empty.
    #[error("task title cannot be empty")]
    TitleEmpty,
}

/// A scheduled farm-maintenance activity, as the server reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: TaskKind,
    /// Scheduled day, no time-of-day component.
    pub date: NaiveDate,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Priority,
}

impl Task {
    /// Whether this task is scheduled inside `[today, today + within_days]`.
    #[must_use]
    pub fn falls_within(&self, today: NaiveDate, within_days: u32) -> bool {
        let end = today
            .checked_add_days(Days::new(u64::from(within_days)))
            .unwrap_or(NaiveDate::MAX);
        today <= self.date && self.date <= end
    }
}

/// Body of a create request. The server assigns `id` and `completed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTask {
    pub title: String,
    #[serde(rename = "type")]
    pub kind: TaskKind,
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Left to the server's default (`medium`) when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
}

impl NewTask {
    pub fn new(title: impl Into<String>, kind: impl Into<TaskKind>, date: NaiveDate) -> Self {
        Self {
            title: title.into(),
            kind: kind.into(),
            date,
            description: None,
            priority: None,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn with_priority(mut self, priority: impl Into<Priority>) -> Self {
        self.priority = Some(priority.into());
        self
    }

    /// Checks the input the server would reject outright.
    ///
    /// # Errors
    ///
    /// Returns [`TaskValidationError::TitleEmpty`] for a blank title.
    pub fn validate(&self) -> Result<(), TaskValidationError> {
        if self.title.trim().is_empty() {
            return Err(TaskValidationError::TitleEmpty);
        }
        Ok(())
    }

    /// Materializes the task the way the server does on create.
    #[must_use]
    pub fn into_task(self, id: TaskId) -> Task {
        Task {
            id,
            title: self.title,
            kind: self.kind,
            date: self.date,
            completed: false,
            description: self.description,
            priority: self.priority.unwrap_or_default(),
        }
    }
}

/// Partial update. Only the fields that are set go on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<TaskKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
}

impl TaskPatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    #[must_use]
    pub fn kind(mut self, kind: impl Into<TaskKind>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    #[must_use]
    pub const fn date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    #[must_use]
    pub const fn completed(mut self, completed: bool) -> Self {
        self.completed = Some(completed);
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn priority(mut self, priority: impl Into<Priority>) -> Self {
        self.priority = Some(priority.into());
        self
    }

    /// True when no field is set.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.kind.is_none()
            && self.date.is_none()
            && self.completed.is_none()
            && self.description.is_none()
            && self.priority.is_none()
    }

    /// # Errors
    ///
    /// Returns [`TaskValidationError::TitleEmpty`] if the patch blanks the title.
    pub fn validate(&self) -> Result<(), TaskValidationError> {
        match &self.title {
            Some(title) if title.trim().is_empty() => Err(TaskValidationError::TitleEmpty),
            _ => Ok(()),
        }
    }

    /// Merges the set fields into `task`, leaving the rest untouched.
    pub fn apply(&self, task: &mut Task) {
        if let Some(title) = &self.title {
            task.title.clone_from(title);
        }
        if let Some(kind) = &self.kind {
            task.kind = kind.clone();
        }
        if let Some(date) = self.date {
            task.date = date;
        }
        if let Some(completed) = self.completed {
            task.completed = completed;
        }
        if let Some(description) = &self.description {
            task.description = Some(description.clone());
        }
        if let Some(priority) = &self.priority {
            task.priority = priority.clone();
        }
    }
}
