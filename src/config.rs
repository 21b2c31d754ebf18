// File: ./src/config.rs
// Handles configuration loading, saving, and defaults.
use crate::context::AppContext;
use crate::model::{EscalationRules, SortMode};
use crate::storage::LocalStorage;
use anyhow::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;

fn default_true() -> bool {
    true
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_calendar_api() -> String {
    "https://www.googleapis.com/calendar/v3".to_string()
}
fn default_event_duration() -> u32 {
    60
}
fn default_user_email() -> String {
    "me@localhost".to_string()
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct CalendarConfig {
    #[serde(default)]
    pub enabled: bool,
    /// OAuth access token for the calendar API. Obtaining it is left to the user.
    #[serde(default)]
    pub access_token: String,
    #[serde(default = "default_calendar_api")]
    pub api_url: String,
    #[serde(default = "default_event_duration")]
    pub event_duration_mins: u32,
    /// Whether new tasks sync to the calendar unless told otherwise.
    #[serde(default)]
    pub sync_new_tasks: bool,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            access_token: String::new(),
            api_url: default_calendar_api(),
            event_duration_mins: 60,
            sync_new_tasks: false,
        }
    }
}

impl CalendarConfig {
    pub fn is_usable(&self) -> bool {
        self.enabled && !self.access_token.is_empty()
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Base URL of the hosted entity API. Empty means local (offline) mode.
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub token: String,
    /// Identity used by the local store.
    #[serde(default = "default_user_email")]
    pub user_email: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub sort_mode: SortMode,
    #[serde(default)]
    pub escalation: EscalationRules,
    #[serde(default = "default_true")]
    pub show_completed: bool,
    #[serde(default)]
    pub calendar: CalendarConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            url: String::new(),
            token: String::new(),
            user_email: default_user_email(),
            log_level: default_log_level(),
            sort_mode: SortMode::default(),
            escalation: EscalationRules::default(),
            show_completed: true,
            calendar: CalendarConfig::default(),
        }
    }
}

impl Config {
    pub fn is_local(&self) -> bool {
        self.url.trim().is_empty()
    }

    pub fn log_level_filter(&self) -> log::LevelFilter {
        self.log_level
            .parse::<log::LevelFilter>()
            .unwrap_or(log::LevelFilter::Info)
    }

    /// Load the configuration from disk using an explicit context.
    pub fn load(ctx: &dyn AppContext) -> Result<Self> {
        let path = ctx.get_config_file_path()?;

        if !path.exists() {
            return Err(anyhow::anyhow!("Config file not found"));
        }

        let contents = fs::read_to_string(&path).map_err(|e| {
            anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e)
        })?;

        let config: Config = toml::from_str(&contents).map_err(|e| {
            anyhow::anyhow!("Failed to parse config file '{}': {}", path.display(), e)
        })?;

        Ok(config)
    }

    /// Loads the config, or the defaults when no config file exists yet.
    /// Any other failure (unreadable or malformed file) is still an error.
    pub fn load_or_default(ctx: &dyn AppContext) -> Result<Self> {
        match Self::load(ctx) {
            Ok(c) => Ok(c),
            Err(e) if Self::is_missing_config_error(&e) => Ok(Self::default()),
            Err(e) => Err(e),
        }
    }

    /// Whether an error means the config file was missing.
    pub fn is_missing_config_error(err: &Error) -> bool {
        if err.to_string().contains("Config file not found") {
            return true;
        }

        for cause in err.chain() {
            if let Some(io_err) = cause.downcast_ref::<std::io::Error>()
                && io_err.kind() == std::io::ErrorKind::NotFound
            {
                return true;
            }
        }

        false
    }

    /// Save configuration using an explicit context.
    pub fn save(&self, ctx: &dyn AppContext) -> Result<()> {
        let path = ctx.get_config_file_path()?;
        LocalStorage::with_lock(&path, || {
            let toml_str = toml::to_string_pretty(self)?;
            LocalStorage::atomic_write(&path, toml_str)?;
            Ok(())
        })?;
        Ok(())
    }

    pub fn get_path_string(ctx: &dyn AppContext) -> Result<String> {
        let path = ctx.get_config_file_path()?;
        Ok(path.to_string_lossy().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TestContext;

    #[test]
    fn test_partial_file_uses_defaults() {
        let cfg: Config = toml::from_str(
            r#"
            url = "https://api.example.com"
            sort_mode = "manual"

            [escalation]
            high_days = 5
            "#,
        )
        .unwrap();
        assert_eq!(cfg.sort_mode, SortMode::Manual);
        assert_eq!(cfg.escalation.high_days, 5);
        assert_eq!(cfg.escalation.critical_hours, 24);
        assert!(cfg.escalation.enabled);
        assert_eq!(cfg.calendar.event_duration_mins, 60);
        assert!(!cfg.is_local());
    }

    #[test]
    fn test_missing_file_is_detected() {
        let ctx = TestContext::new();
        let err = Config::load(&ctx).unwrap_err();
        assert!(Config::is_missing_config_error(&err));
        assert_eq!(Config::load_or_default(&ctx).unwrap(), Config::default());
    }

    #[test]
    fn test_save_then_load() {
        let ctx = TestContext::new();
        let mut cfg = Config::default();
        cfg.user_email = "ann@example.com".to_string();
        cfg.calendar.enabled = true;
        cfg.save(&ctx).unwrap();

        let loaded = Config::load(&ctx).unwrap();
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let ctx = TestContext::new();
        std::fs::write(ctx.get_config_file_path().unwrap(), "url = [").unwrap();
        let err = Config::load_or_default(&ctx).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }
}
