use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Hour used when a due date is given without a time of day.
const DEFAULT_DUE_HOUR: u32 = 9;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TaskError {
    #[error("task text cannot be empty")]
    EmptyText,
    #[error("invalid due date `{0}`, expected YYYY-MM-DD [HH:MM] or HH:MM")]
    InvalidDue(String),
    #[error("unknown repeat mode `{0}`, expected none|daily|weekly")]
    InvalidRepeat(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Repeat {
    #[default]
    None,
    Daily,
    Weekly,
}

impl Repeat {
    /// Next mode in the details form: none -> daily -> weekly -> none.
    pub fn cycle(self) -> Self {
        match self {
            Repeat::None => Repeat::Daily,
            Repeat::Daily => Repeat::Weekly,
            Repeat::Weekly => Repeat::None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Repeat::None => "none",
            Repeat::Daily => "daily",
            Repeat::Weekly => "weekly",
        }
    }
}

impl fmt::Display for Repeat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Repeat {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" | "once" => Ok(Repeat::None),
            "daily" => Ok(Repeat::Daily),
            "weekly" => Ok(Repeat::Weekly),
            other => Err(TaskError::InvalidRepeat(other.to_string())),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default)]
    pub important: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due: Option<NaiveDateTime>,
    #[serde(default)]
    pub repeat: Repeat,
}

impl Task {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            category: None,
            important: false,
            due: None,
            repeat: Repeat::None,
        }
    }

    pub(crate) fn from_draft(id: String, draft: TaskDraft) -> Self {
        Self {
            id,
            text: draft.text,
            category: draft.category,
            important: draft.important,
            due: draft.due,
            repeat: draft.repeat,
        }
    }

    /// Due date formatted for list rows, `None` when the task has no due date.
    pub fn due_label(&self) -> Option<String> {
        let due = self.due?;
        Some(match self.repeat {
            Repeat::None => due.format("%Y-%m-%d %H:%M").to_string(),
            Repeat::Daily => due.format("daily %H:%M").to_string(),
            Repeat::Weekly => due.format("%a %H:%M weekly").to_string(),
        })
    }
}

/// User input for a task that has not been assigned an id yet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskDraft {
    pub text: String,
    pub category: Option<String>,
    pub important: bool,
    pub due: Option<NaiveDateTime>,
    pub repeat: Repeat,
}

impl TaskDraft {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// Trims text and category, rejecting drafts without any text.
    pub fn validate(mut self) -> Result<Self, TaskError> {
        self.text = self.text.trim().to_string();
        if self.text.is_empty() {
            return Err(TaskError::EmptyText);
        }
        self.category = self
            .category
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        Ok(self)
    }
}

/// Parses `YYYY-MM-DD HH:MM`, `YYYY-MM-DD` or `HH:MM` (today) into a local
/// date-time.
pub fn parse_due(input: &str, now: NaiveDateTime) -> Result<NaiveDateTime, TaskError> {
    let input = input.trim();
    let invalid = || TaskError::InvalidDue(input.to_string());

    if let Ok(dt) = NaiveDateTime::parse_from_str(input, "%Y-%m-%d %H:%M") {
        return Ok(dt);
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(input, "%Y-%m-%dT%H:%M") {
        return Ok(dt);
    }
    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        let time = NaiveTime::from_hms_opt(DEFAULT_DUE_HOUR, 0, 0).ok_or_else(invalid)?;
        return Ok(date.and_time(time));
    }
    if let Ok(time) = NaiveTime::parse_from_str(input, "%H:%M") {
        return Ok(now.date().and_time(time));
    }
    Err(invalid())
}

/// Converts a local naive date-time into an epoch-millisecond id seed.
pub(crate) fn epoch_millis(now: NaiveDateTime) -> i64 {
    match Local.from_local_datetime(&now).earliest() {
        Some(dt) => dt.timestamp_millis(),
        None => now.and_utc().timestamp_millis(),
    }
}

pub fn local_now() -> NaiveDateTime {
    let now: DateTime<Local> = Local::now();
    now.naive_local()
}
