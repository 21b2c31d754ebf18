// File: ./src/model/recurrence.rs
use crate::model::entities::RecordMeta;
use crate::model::item::{Recurrence, Task};
use chrono::{DateTime, Utc};
use rrule::RRuleSet;
use std::str::FromStr;

pub struct RecurrenceEngine;

impl RecurrenceEngine {
    /// First occurrence of `recurrence` seeded at `seed` that falls strictly after
    /// both the seed and `now`.
    ///
    /// Overdue recurring tasks therefore skip the occurrences already in the past
    /// instead of spawning a backlog.
    pub fn next_deadline(
        recurrence: Recurrence,
        seed: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        let rule = recurrence.to_rrule()?;

        // rrule works on whole seconds; sub-second precision would shift every instance.
        let dtstart_str = seed.format("%Y%m%dT%H%M%SZ").to_string();
        let rrule_string = format!("DTSTART:{}\nRRULE:{}\n", dtstart_str, rule);

        let rrule_set = match RRuleSet::from_str(&rrule_string) {
            Ok(set) => set,
            Err(e) => {
                log::warn!("Invalid recurrence rule '{}': {}", rule, e);
                return None;
            }
        };

        let search_floor = std::cmp::max(seed, now);
        rrule_set
            .into_iter()
            .map(|d| d.to_utc())
            .find(|d| *d > search_floor)
    }

    /// Builds the next instance of a recurring task.
    ///
    /// The returned task has no identity yet (empty id, no metadata) and is
    /// incomplete; everything the user entered is carried over. Returns `None`
    /// for non-recurring tasks or when the rule yields no further date.
    pub fn next_occurrence(task: &Task, now: DateTime<Utc>) -> Option<Task> {
        if !task.recurrence.is_recurring() {
            return None;
        }

        let deadline = match task.deadline {
            Some(seed) => Some(Self::next_deadline(task.recurrence, seed, now)?),
            None => None,
        };

        let mut next_task = task.clone();
        next_task.id = String::new();
        next_task.meta = RecordMeta::default();
        next_task.completed = false;
        next_task.completed_date = None;
        next_task.calendar_event_id = None;
        next_task.next_instance_id = None;
        next_task.sort_order = None;
        next_task.deadline = deadline;
        Some(next_task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn test_daily_from_future_seed() {
        let seed = at(2030, 1, 10, 9);
        let now = at(2030, 1, 1, 0);
        assert_eq!(
            RecurrenceEngine::next_deadline(Recurrence::Daily, seed, now),
            Some(at(2030, 1, 11, 9))
        );
    }

    #[test]
    fn test_none_has_no_next() {
        let seed = at(2030, 1, 10, 9);
        assert_eq!(
            RecurrenceEngine::next_deadline(Recurrence::None, seed, seed),
            None
        );
    }

    #[test]
    fn test_overdue_weekly_catches_up() {
        let seed = at(2030, 1, 1, 12); // Tuesday
        let now = at(2030, 1, 20, 0);
        // Tuesdays after Jan 20th: Jan 22nd
        assert_eq!(
            RecurrenceEngine::next_deadline(Recurrence::Weekly, seed, now),
            Some(at(2030, 1, 22, 12))
        );
    }
}
