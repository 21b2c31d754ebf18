// File: ./src/model/item.rs
use crate::model::entities::{RecordMeta, null_as_default};
use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use strum::{Display, EnumIter, EnumString};

pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 5;
pub const DEFAULT_RATING: u8 = 3;

pub const URGENCY_LABELS: [&str; 5] = ["Very Low", "Low", "Medium", "High", "Critical"];
pub const IMPORTANCE_LABELS: [&str; 5] = ["Minor", "Low", "Moderate", "High", "Essential"];

fn default_rating() -> u8 {
    DEFAULT_RATING
}

/// Label for an urgency level, e.g. `3 -> "Medium"`. Out-of-range levels are clamped.
pub fn urgency_label(level: u8) -> &'static str {
    URGENCY_LABELS[clamp_rating(level) as usize - 1]
}

pub fn importance_label(level: u8) -> &'static str {
    IMPORTANCE_LABELS[clamp_rating(level) as usize - 1]
}

pub fn clamp_rating(level: u8) -> u8 {
    level.clamp(MIN_RATING, MAX_RATING)
}

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    Eq,
    PartialEq,
    Hash,
    Serialize,
    Deserialize,
    EnumIter,
    EnumString,
    Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Recurrence {
    #[default]
    None,
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Recurrence {
    pub fn is_recurring(&self) -> bool {
        !matches!(self, Recurrence::None)
    }

    /// RFC 5545 frequency for this recurrence.
    pub fn freq(&self) -> Option<&'static str> {
        match self {
            Recurrence::None => None,
            Recurrence::Daily => Some("DAILY"),
            Recurrence::Weekly => Some("WEEKLY"),
            Recurrence::Monthly => Some("MONTHLY"),
            Recurrence::Yearly => Some("YEARLY"),
        }
    }

    /// Rule body without the `RRULE:` prefix, e.g. `FREQ=WEEKLY`.
    pub fn to_rrule(&self) -> Option<String> {
        self.freq().map(|f| format!("FREQ={}", f))
    }

    pub fn label(&self) -> &'static str {
        match self {
            Recurrence::None => "Does not repeat",
            Recurrence::Daily => "Daily",
            Recurrence::Weekly => "Weekly",
            Recurrence::Monthly => "Monthly",
            Recurrence::Yearly => "Yearly",
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Task {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub title: String,
    #[serde(default = "default_rating")]
    pub urgency: u8,
    #[serde(default = "default_rating")]
    pub importance: u8,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub recurrence: Recurrence,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub completed_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub list_id: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tag_ids: Vec<String>,

    /// Position set by manual reordering; `None` until the user moves the task.
    #[serde(default)]
    pub sort_order: Option<i64>,

    #[serde(default)]
    pub sync_to_calendar: bool,
    #[serde(default)]
    pub calendar_event_id: Option<String>,

    /// Instance spawned when this recurring task was completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_instance_id: Option<String>,

    #[serde(flatten)]
    pub meta: RecordMeta,
}

impl Default for Task {
    fn default() -> Self {
        Self {
            id: String::new(),
            title: String::new(),
            urgency: DEFAULT_RATING,
            importance: DEFAULT_RATING,
            deadline: None,
            notes: None,
            recurrence: Recurrence::None,
            completed: false,
            completed_date: None,
            list_id: None,
            tag_ids: Vec::new(),
            sort_order: None,
            sync_to_calendar: false,
            calendar_event_id: None,
            next_instance_id: None,
            meta: RecordMeta::default(),
        }
    }
}

impl Task {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.trim().to_string(),
            ..Default::default()
        }
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        !self.completed && self.deadline.is_some_and(|d| d < now)
    }

    pub fn has_notes(&self) -> bool {
        self.notes.as_deref().is_some_and(|n| !n.trim().is_empty())
    }

    /// Whether a save of this task should be mirrored to the calendar.
    pub fn wants_calendar_sync(&self) -> bool {
        self.sync_to_calendar && self.deadline.is_some()
    }
}

/// Editable fields of a task, as collected by the create/edit form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDraft {
    pub title: String,
    pub urgency: u8,
    pub importance: u8,
    pub deadline: Option<DateTime<Utc>>,
    pub notes: String,
    pub recurrence: Recurrence,
    pub list_id: Option<String>,
    pub tag_ids: Vec<String>,
    pub sync_to_calendar: bool,
}

impl Default for TaskDraft {
    fn default() -> Self {
        Self {
            title: String::new(),
            urgency: DEFAULT_RATING,
            importance: DEFAULT_RATING,
            deadline: None,
            notes: String::new(),
            recurrence: Recurrence::None,
            list_id: None,
            tag_ids: Vec::new(),
            sync_to_calendar: false,
        }
    }
}

impl TaskDraft {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            ..Default::default()
        }
    }

    /// Prefills the form from an existing task. Missing ratings fall back to the default.
    pub fn from_task(task: &Task) -> Self {
        let rating = |r: u8| if r == 0 { DEFAULT_RATING } else { r };
        Self {
            title: task.title.clone(),
            urgency: rating(task.urgency),
            importance: rating(task.importance),
            deadline: task.deadline,
            notes: task.notes.clone().unwrap_or_default(),
            recurrence: task.recurrence,
            list_id: task.list_id.clone(),
            tag_ids: task.tag_ids.clone(),
            sync_to_calendar: task.sync_to_calendar,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            bail!("Task title cannot be empty");
        }
        if !(MIN_RATING..=MAX_RATING).contains(&self.urgency) {
            bail!(
                "Urgency must be between {} and {} (got {})",
                MIN_RATING,
                MAX_RATING,
                self.urgency
            );
        }
        if !(MIN_RATING..=MAX_RATING).contains(&self.importance) {
            bail!(
                "Importance must be between {} and {} (got {})",
                MIN_RATING,
                MAX_RATING,
                self.importance
            );
        }
        Ok(())
    }

    fn clean_notes(&self) -> Option<String> {
        let notes = self.notes.trim_end();
        if notes.trim().is_empty() {
            None
        } else {
            Some(notes.to_string())
        }
    }

    /// Builds a fresh, incomplete task record from the form.
    pub fn into_new_task(self) -> Task {
        let notes = self.clean_notes();
        Task {
            title: self.title.trim().to_string(),
            urgency: self.urgency,
            importance: self.importance,
            deadline: self.deadline,
            notes,
            recurrence: self.recurrence,
            completed: false,
            list_id: self.list_id,
            tag_ids: self.tag_ids,
            sync_to_calendar: self.sync_to_calendar,
            ..Default::default()
        }
    }

    /// Fields written by an edit. The owning list is not part of an edit.
    pub fn to_patch(&self) -> serde_json::Value {
        json!({
            "title": self.title.trim(),
            "urgency": self.urgency,
            "importance": self.importance,
            "deadline": self.deadline,
            "notes": self.clean_notes(),
            "recurrence": self.recurrence,
            "tag_ids": self.tag_ids,
            "sync_to_calendar": self.sync_to_calendar,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_labels_follow_rating() {
        assert_eq!(urgency_label(1), "Very Low");
        assert_eq!(urgency_label(5), "Critical");
        assert_eq!(importance_label(3), "Moderate");
        assert_eq!(importance_label(9), "Essential");
    }

    #[test]
    fn test_recurrence_parse_and_rule() {
        assert_eq!(Recurrence::from_str("Weekly").unwrap(), Recurrence::Weekly);
        assert_eq!(Recurrence::Monthly.to_rrule().as_deref(), Some("FREQ=MONTHLY"));
        assert_eq!(Recurrence::None.to_rrule(), None);
        assert_eq!(Recurrence::Daily.to_string(), "daily");
    }

    #[test]
    fn test_task_defaults_when_fields_missing() {
        let task: Task = serde_json::from_str(r#"{"id":"a","title":"Call mom"}"#).unwrap();
        assert_eq!(task.urgency, 3);
        assert_eq!(task.importance, 3);
        assert_eq!(task.recurrence, Recurrence::None);
        assert!(!task.completed);
    }

    #[test]
    fn test_null_recurrence_is_none() {
        let task: Task =
            serde_json::from_str(r#"{"id":"a","title":"x","recurrence":null,"tag_ids":null}"#)
                .unwrap();
        assert_eq!(task.recurrence, Recurrence::None);
        assert!(task.tag_ids.is_empty());
    }

    #[test]
    fn test_draft_validation() {
        assert!(TaskDraft::new("   ").validate().is_err());
        let mut d = TaskDraft::new("Pay rent");
        assert!(d.validate().is_ok());
        d.urgency = 6;
        assert!(d.validate().is_err());
        d.urgency = 5;
        d.importance = 0;
        assert!(d.validate().is_err());
    }

    #[test]
    fn test_draft_trims_title_and_drops_blank_notes() {
        let mut d = TaskDraft::new("  Pay rent  ");
        d.notes = "   \n".to_string();
        let task = d.into_new_task();
        assert_eq!(task.title, "Pay rent");
        assert_eq!(task.notes, None);
        assert!(!task.completed);
    }
}
