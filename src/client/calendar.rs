// File: ./src/client/calendar.rs
//! Google Calendar v3 client used to mirror tasks with deadlines as events.
use crate::client::core::{
    HttpsClient, build_https_client, check_id, error_for_status, parse_json, send_request,
};
use crate::config::CalendarConfig;
use crate::model::Task;
use anyhow::{Result, anyhow, bail};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use http::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum SyncAction {
    Create,
    Update,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTime {
    pub date_time: String,
    pub time_zone: String,
}

impl EventTime {
    fn utc(at: DateTime<Utc>) -> Self {
        Self {
            date_time: at.to_rfc3339_opts(SecondsFormat::Millis, true),
            time_zone: "UTC".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtendedProperties {
    #[serde(default)]
    pub private: BTreeMap<String, String>,
}

/// Request body for event insert/update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub summary: String,
    pub description: String,
    pub start: EventTime,
    pub end: EventTime,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recurrence: Vec<String>,
    pub extended_properties: ExtendedProperties,
}

impl CalendarEvent {
    /// Maps a task onto an event of `duration` starting at its deadline.
    pub fn from_task(task: &Task, duration: Duration) -> Result<Self> {
        let start = task
            .deadline
            .ok_or_else(|| anyhow!("Task '{}' has no deadline to put on a calendar", task.title))?;
        let mut private = BTreeMap::new();
        private.insert("taskId".to_string(), task.id.clone());

        Ok(Self {
            summary: task.title.clone(),
            description: task.notes.clone().unwrap_or_default(),
            start: EventTime::utc(start),
            end: EventTime::utc(start + duration),
            recurrence: task
                .recurrence
                .to_rrule()
                .map(|r| vec![format!("RRULE:{}", r)])
                .unwrap_or_default(),
            extended_properties: ExtendedProperties { private },
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventResponse {
    id: String,
    #[serde(default)]
    html_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CalendarResponse {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    summary: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EventSyncResult {
    /// `None` after a delete.
    pub event_id: Option<String>,
    pub event_link: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConnectionStatus {
    pub connected: bool,
    pub calendar_name: Option<String>,
    pub email: Option<String>,
}

#[derive(Clone, Debug)]
pub struct CalendarClient {
    http: HttpsClient,
    api_url: String,
    event_duration: Duration,
}

impl CalendarClient {
    pub fn new(api_url: &str, access_token: &str, event_duration_mins: u32) -> Result<Self> {
        let api_url = api_url.trim().trim_end_matches('/').to_string();
        let http = build_https_client(&api_url, access_token)?;
        Ok(Self {
            http,
            api_url,
            event_duration: Duration::minutes(event_duration_mins.max(1) as i64),
        })
    }

    /// `None` when calendar sync is disabled or has no token.
    pub fn from_config(config: &CalendarConfig) -> Result<Option<Self>> {
        if !config.is_usable() {
            return Ok(None);
        }
        Self::new(
            &config.api_url,
            &config.access_token,
            config.event_duration_mins,
        )
        .map(Some)
    }

    fn events_uri(&self) -> String {
        format!("{}/calendars/primary/events", self.api_url)
    }

    fn event_uri(&self, event_id: &str) -> Result<String> {
        check_id(event_id)?;
        Ok(format!("{}/{}", self.events_uri(), event_id))
    }

    /// Creates, updates or deletes the event mirroring `task`.
    ///
    /// An update for a task that has no event yet creates one.
    pub async fn push_event(&self, task: &Task, action: SyncAction) -> Result<EventSyncResult> {
        match (action, task.calendar_event_id.as_deref()) {
            (SyncAction::Delete, Some(event_id)) => {
                self.delete_event(event_id).await?;
                Ok(EventSyncResult::default())
            }
            (SyncAction::Delete, None) => bail!("Invalid action: task has no calendar event"),
            (SyncAction::Update, Some(event_id)) => {
                let uri = self.event_uri(event_id)?;
                self.write_event(Method::PUT, &uri, task).await
            }
            (SyncAction::Create | SyncAction::Update, _) => {
                let uri = self.events_uri();
                self.write_event(Method::POST, &uri, task).await
            }
        }
    }

    async fn write_event(&self, method: Method, uri: &str, task: &Task) -> Result<EventSyncResult> {
        let event = CalendarEvent::from_task(task, self.event_duration)?;
        let body = serde_json::to_value(&event)?;
        let (status, bytes) = send_request(&self.http, method.clone(), uri, Some(&body)).await?;
        if !status.is_success() {
            return Err(error_for_status(&method, uri, status, &bytes)
                .context("Failed to sync event"));
        }
        let created: EventResponse = parse_json(uri, &bytes)?;
        log::info!("Calendar event {} synced for task {}", created.id, task.id);
        Ok(EventSyncResult {
            event_id: Some(created.id),
            event_link: created.html_link,
        })
    }

    pub async fn delete_event(&self, event_id: &str) -> Result<()> {
        let uri = self.event_uri(event_id)?;
        let (status, bytes) = send_request(&self.http, Method::DELETE, &uri, None).await?;
        if status.is_success() || status == StatusCode::NOT_FOUND {
            log::info!("Calendar event {} deleted", event_id);
            return Ok(());
        }
        Err(error_for_status(&Method::DELETE, &uri, status, &bytes).context("Failed to delete event"))
    }

    /// Checks access to the primary calendar. Any failure reads as "not connected".
    pub async fn connection_status(&self) -> ConnectionStatus {
        let uri = format!("{}/calendars/primary", self.api_url);
        match send_request(&self.http, Method::GET, &uri, None).await {
            Ok((status, bytes)) if status.is_success() => {
                match serde_json::from_slice::<CalendarResponse>(&bytes) {
                    Ok(cal) => ConnectionStatus {
                        connected: true,
                        calendar_name: cal.summary,
                        email: cal.id,
                    },
                    Err(e) => {
                        log::warn!("Unreadable calendar response: {}", e);
                        ConnectionStatus::default()
                    }
                }
            }
            Ok((status, _)) => {
                log::debug!("Calendar check returned {}", status);
                ConnectionStatus::default()
            }
            Err(e) => {
                log::debug!("Calendar check failed: {}", e);
                ConnectionStatus::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Recurrence;
    use chrono::TimeZone;

    fn task_at(deadline: DateTime<Utc>) -> Task {
        Task {
            id: "t1".to_string(),
            deadline: Some(deadline),
            ..Task::new("Dentist")
        }
    }

    #[test]
    fn test_event_mapping() {
        let due = Utc.with_ymd_and_hms(2030, 3, 4, 15, 30, 0).unwrap();
        let mut task = task_at(due);
        task.recurrence = Recurrence::Weekly;
        let event = CalendarEvent::from_task(&task, Duration::minutes(60)).unwrap();

        assert_eq!(event.summary, "Dentist");
        assert_eq!(event.description, "");
        assert_eq!(event.start.date_time, "2030-03-04T15:30:00.000Z");
        assert_eq!(event.end.date_time, "2030-03-04T16:30:00.000Z");
        assert_eq!(event.start.time_zone, "UTC");
        assert_eq!(event.recurrence, vec!["RRULE:FREQ=WEEKLY".to_string()]);

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["extendedProperties"]["private"]["taskId"], "t1");
        assert_eq!(json["start"]["dateTime"], "2030-03-04T15:30:00.000Z");
    }

    #[test]
    fn test_one_off_event_has_no_recurrence_field() {
        let due = Utc.with_ymd_and_hms(2030, 3, 4, 15, 30, 0).unwrap();
        let json = serde_json::to_value(
            CalendarEvent::from_task(&task_at(due), Duration::minutes(30)).unwrap(),
        )
        .unwrap();
        assert!(json.get("recurrence").is_none());
    }

    #[test]
    fn test_event_needs_deadline() {
        assert!(CalendarEvent::from_task(&Task::new("x"), Duration::minutes(60)).is_err());
    }

    #[test]
    fn test_disabled_config_yields_no_client() {
        let cfg = CalendarConfig::default();
        assert!(CalendarClient::from_config(&cfg).unwrap().is_none());
    }
}
