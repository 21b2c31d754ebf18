// File: ./src/model/priority.rs
//! Ordering of the task list.
//!
//! Incomplete tasks come before completed ones. Among them, the *effective*
//! urgency decides first: a task's stored urgency is raised as its deadline
//! approaches. Importance breaks ties, then the earlier deadline.
//! In manual mode, tasks the user has explicitly positioned come first.
use crate::model::item::{MAX_RATING, Task, clamp_rating};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use strum::{Display, EnumString};

fn default_true() -> bool {
    true
}
fn default_critical_hours() -> u32 {
    24
}
fn default_high_days() -> u32 {
    3
}
fn default_medium_days() -> u32 {
    7
}

/// Deadline horizons used to escalate urgency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationRules {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Overdue or due within this many hours: critical.
    #[serde(default = "default_critical_hours")]
    pub critical_hours: u32,
    /// Due within this many days: at least high.
    #[serde(default = "default_high_days")]
    pub high_days: u32,
    /// Due within this many days: at least medium.
    #[serde(default = "default_medium_days")]
    pub medium_days: u32,
}

impl Default for EscalationRules {
    fn default() -> Self {
        Self {
            enabled: true,
            critical_hours: 24,
            high_days: 3,
            medium_days: 7,
        }
    }
}

impl EscalationRules {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, EnumString, Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum SortMode {
    #[default]
    Priority,
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveDirection {
    Up,
    Down,
}

/// Urgency after deadline escalation. Never lower than the stored urgency.
pub fn effective_urgency(task: &Task, now: DateTime<Utc>, rules: &EscalationRules) -> u8 {
    let base = clamp_rating(task.urgency);
    if !rules.enabled || task.completed {
        return base;
    }
    let Some(deadline) = task.deadline else {
        return base;
    };

    let remaining = deadline - now;
    let floor = if remaining <= Duration::hours(rules.critical_hours as i64) {
        MAX_RATING
    } else if remaining <= Duration::days(rules.high_days as i64) {
        4
    } else if remaining <= Duration::days(rules.medium_days as i64) {
        3
    } else {
        0
    };
    base.max(floor)
}

fn manual_key(task: &Task) -> (bool, i64) {
    (task.sort_order.is_none(), task.sort_order.unwrap_or(0))
}

pub fn compare(
    a: &Task,
    b: &Task,
    now: DateTime<Utc>,
    rules: &EscalationRules,
    mode: SortMode,
) -> Ordering {
    a.completed
        .cmp(&b.completed)
        .then_with(|| {
            if mode == SortMode::Manual && !a.completed && !b.completed {
                manual_key(a).cmp(&manual_key(b))
            } else {
                Ordering::Equal
            }
        })
        .then_with(|| effective_urgency(b, now, rules).cmp(&effective_urgency(a, now, rules)))
        .then_with(|| b.importance.cmp(&a.importance))
        .then_with(|| match (a.deadline, b.deadline) {
            (Some(d1), Some(d2)) => d1.cmp(&d2),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| a.title.to_lowercase().cmp(&b.title.to_lowercase()))
        .then_with(|| a.id.cmp(&b.id))
}

pub fn sort_tasks(tasks: &mut [Task], now: DateTime<Utc>, rules: &EscalationRules, mode: SortMode) {
    tasks.sort_by(|a, b| compare(a, b, now, rules, mode));
}

fn incomplete_ids(tasks: &[Task]) -> Vec<&str> {
    tasks
        .iter()
        .filter(|t| !t.completed)
        .map(|t| t.id.as_str())
        .collect()
}

fn neighbour(len: usize, pos: usize, direction: MoveDirection) -> Option<usize> {
    match direction {
        MoveDirection::Up => pos.checked_sub(1),
        MoveDirection::Down => (pos + 1 < len).then_some(pos + 1),
    }
}

/// Whether `id` can move in `direction` within the displayed order.
pub fn can_move(tasks: &[Task], id: &str, direction: MoveDirection) -> bool {
    let ids = incomplete_ids(tasks);
    ids.iter()
        .position(|t| *t == id)
        .and_then(|pos| neighbour(ids.len(), pos, direction))
        .is_some()
}

/// Swaps a task with its neighbour and renumbers the incomplete tasks.
///
/// `tasks` must be in displayed order. Returns `(id, new sort_order)` for the
/// tasks whose position actually changed.
pub fn move_task(tasks: &[Task], id: &str, direction: MoveDirection) -> Vec<(String, i64)> {
    let mut ids = incomplete_ids(tasks);
    let Some(pos) = ids.iter().position(|t| *t == id) else {
        return Vec::new();
    };
    let Some(target) = neighbour(ids.len(), pos, direction) else {
        return Vec::new();
    };
    ids.swap(pos, target);

    ids.iter()
        .enumerate()
        .filter_map(|(idx, task_id)| {
            let new_order = idx as i64;
            let current = tasks
                .iter()
                .find(|t| t.id == *task_id)
                .and_then(|t| t.sort_order);
            (current != Some(new_order)).then(|| (task_id.to_string(), new_order))
        })
        .collect()
}

/// Counters shown above the task list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskSummary {
    pub total: usize,
    pub pending: usize,
    pub done: usize,
}

impl TaskSummary {
    pub fn of(tasks: &[Task]) -> Self {
        let done = tasks.iter().filter(|t| t.completed).count();
        Self {
            total: tasks.len(),
            pending: tasks.len() - done,
            done,
        }
    }
}
