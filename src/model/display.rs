// File: ./src/model/display.rs
use crate::model::entities::{Subtask, Tag};
use crate::model::item::{Task, importance_label, urgency_label};
use chrono::{DateTime, Local, Utc};

pub trait TaskDisplay {
    fn checkbox_symbol(&self) -> &'static str;
    fn format_deadline_short(&self) -> Option<String>;
    fn format_deadline_long(&self) -> Option<String>;
    fn rating_badges(&self, effective_urgency: u8) -> String;
    fn to_row(&self, effective_urgency: u8, now: DateTime<Utc>) -> String;
}

impl TaskDisplay for Task {
    fn checkbox_symbol(&self) -> &'static str {
        if self.completed { "[✔]" } else { "[ ]" }
    }

    /// `Oct 16, 3:00 PM` in local time.
    fn format_deadline_short(&self) -> Option<String> {
        self.deadline.map(|d| {
            d.with_timezone(&Local)
                .format("%b %-d, %-I:%M %p")
                .to_string()
        })
    }

    /// `Friday, October 16, 2026 at 3:00 PM` in local time.
    fn format_deadline_long(&self) -> Option<String> {
        self.deadline.map(|d| {
            d.with_timezone(&Local)
                .format("%A, %B %-d, %Y at %-I:%M %p")
                .to_string()
        })
    }

    fn rating_badges(&self, effective_urgency: u8) -> String {
        if effective_urgency > self.urgency && !self.completed {
            format!(
                "Urgency: {}↑{} Importance: {}",
                self.urgency, effective_urgency, self.importance
            )
        } else {
            format!("Urgency: {} Importance: {}", self.urgency, self.importance)
        }
    }

    fn to_row(&self, effective_urgency: u8, now: DateTime<Utc>) -> String {
        let mut s = format!(
            "{} {}  [{}]",
            self.checkbox_symbol(),
            self.title,
            self.rating_badges(effective_urgency)
        );
        if let Some(d) = self.format_deadline_short() {
            s.push_str(&format!("  due {}", d));
            if self.is_overdue(now) {
                s.push_str(" (overdue)");
            }
        }
        if self.recurrence.is_recurring() {
            s.push_str(&format!("  ↻ {}", self.recurrence));
        }
        s
    }
}

/// Full multi-line description used by `show`.
pub fn describe_task(task: &Task, tags: &[Tag], subtasks: &[Subtask]) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n", task.title));
    if task.completed {
        out.push_str("  Completed\n");
    }
    out.push_str(&format!("  id:         {}\n", task.id));
    out.push_str(&format!(
        "  urgency:    {} - {}\n",
        task.urgency,
        urgency_label(task.urgency)
    ));
    out.push_str(&format!(
        "  importance: {} - {}\n",
        task.importance,
        importance_label(task.importance)
    ));
    if let Some(d) = task.format_deadline_long() {
        out.push_str(&format!("  deadline:   {}\n", d));
    }
    if task.recurrence.is_recurring() {
        out.push_str(&format!("  repeats:    {}\n", task.recurrence.label()));
    }
    if !tags.is_empty() {
        let names: Vec<String> = tags.iter().map(|t| format!("#{}", t.name)).collect();
        out.push_str(&format!("  tags:       {}\n", names.join(" ")));
    }
    if task.sync_to_calendar {
        let state = if task.calendar_event_id.is_some() {
            "synced"
        } else {
            "pending"
        };
        out.push_str(&format!("  calendar:   {}\n", state));
    }
    if let Some(notes) = task.notes.as_deref().filter(|n| !n.trim().is_empty()) {
        out.push_str("  notes:\n");
        for line in notes.lines() {
            out.push_str(&format!("    {}\n", line));
        }
    }
    if !subtasks.is_empty() {
        let done = subtasks.iter().filter(|s| s.completed).count();
        out.push_str(&format!("  subtasks ({}/{}):\n", done, subtasks.len()));
        for sub in subtasks {
            let mark = if sub.completed { "[✔]" } else { "[ ]" };
            out.push_str(&format!("    {} {}  ({})\n", mark, sub.title, sub.id));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::item::Recurrence;

    #[test]
    fn test_row_shows_escalation_and_recurrence() {
        let mut t = Task::new("Water plants");
        t.urgency = 2;
        t.importance = 4;
        t.recurrence = Recurrence::Weekly;
        let row = t.to_row(4, Utc::now());
        assert!(row.starts_with("[ ] Water plants"));
        assert!(row.contains("Urgency: 2↑4"));
        assert!(row.contains("↻ weekly"));
    }

    #[test]
    fn test_describe_lists_subtask_progress() {
        let mut t = Task::new("Move out");
        t.id = "t1".to_string();
        let subs = vec![
            Subtask {
                id: "s1".to_string(),
                task_id: "t1".to_string(),
                title: "Boxes".to_string(),
                completed: true,
                ..Default::default()
            },
            Subtask {
                id: "s2".to_string(),
                task_id: "t1".to_string(),
                title: "Van".to_string(),
                ..Default::default()
            },
        ];
        let text = describe_task(&t, &[], &subs);
        assert!(text.contains("subtasks (1/2)"));
        assert!(text.contains("urgency:    3 - Medium"));
    }
}
