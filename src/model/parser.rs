// File: ./src/model/parser.rs
// Parsing of user-typed values: deadlines, times of day and ratings.
use crate::model::item::{MAX_RATING, MIN_RATING};
use chrono::{DateTime, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

/// Time used when a deadline is given as a bare date (12:00 PM, like the form default).
pub fn default_deadline_time() -> NaiveTime {
    NaiveTime::from_hms_opt(12, 0, 0).unwrap_or(NaiveTime::MIN)
}

/// Parses a time of day: `14:30`, `9:05`, `3pm`, `3:30 pm`, `12am`.
pub fn parse_time_string(s: &str) -> Option<NaiveTime> {
    let lower = s.trim().to_lowercase().replace(' ', "");
    if lower.is_empty() {
        return None;
    }

    let (body, meridiem) = if let Some(stripped) = lower.strip_suffix("am") {
        (stripped, Some(false))
    } else if let Some(stripped) = lower.strip_suffix("pm") {
        (stripped, Some(true))
    } else {
        (lower.as_str(), None)
    };

    let (hour_str, minute_str) = match body.split_once(':') {
        Some((h, m)) => (h, m),
        None => (body, "0"),
    };
    let hour: u32 = hour_str.parse().ok()?;
    let minute: u32 = minute_str.parse().ok()?;
    if minute > 59 {
        return None;
    }

    let hour24 = match meridiem {
        Some(is_pm) => {
            if !(1..=12).contains(&hour) {
                return None;
            }
            match (is_pm, hour) {
                (false, 12) => 0,
                (true, 12) => 12,
                (true, h) => h + 12,
                (false, h) => h,
            }
        }
        None => {
            // A bare number without a colon is ambiguous ("5" could be a date typo).
            if !body.contains(':') || hour > 23 {
                return None;
            }
            hour
        }
    };
    NaiveTime::from_hms_opt(hour24, minute, 0)
}

fn parse_date_word(s: &str, today: NaiveDate) -> Option<NaiveDate> {
    match s.to_lowercase().as_str() {
        "today" => Some(today),
        "tomorrow" => Some(today + Duration::days(1)),
        other => NaiveDate::parse_from_str(other, "%Y-%m-%d").ok(),
    }
}

/// Parses a local deadline: a date (`2026-03-01`, `today`, `tomorrow`)
/// optionally followed by a time. Date-only input gets `default_deadline_time`.
pub fn parse_deadline_local(input: &str, today: NaiveDate) -> Option<NaiveDateTime> {
    let trimmed = input.trim();
    let (date_part, time_part) = match trimmed.split_once(char::is_whitespace) {
        Some((d, t)) => (d, Some(t)),
        None => match trimmed.split_once('T') {
            Some((d, t)) if d.len() == 10 => (d, Some(t)),
            _ => (trimmed, None),
        },
    };

    let date = parse_date_word(date_part, today)?;
    let time = match time_part {
        Some(t) => parse_time_string(t)?,
        None => default_deadline_time(),
    };
    Some(date.and_time(time))
}

/// Interprets a naive local date-time in the system timezone.
pub fn local_to_utc(naive: NaiveDateTime) -> Option<DateTime<Utc>> {
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Parses a deadline typed by the user, relative to the local "today".
pub fn parse_deadline(input: &str) -> Option<DateTime<Utc>> {
    let today = Local::now().date_naive();
    parse_deadline_local(input, today).and_then(local_to_utc)
}

/// Parses an urgency/importance rating (1..=5).
pub fn parse_rating(s: &str) -> Option<u8> {
    s.trim()
        .parse::<u8>()
        .ok()
        .filter(|r| (MIN_RATING..=MAX_RATING).contains(r))
}
