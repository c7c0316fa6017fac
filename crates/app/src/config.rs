use std::path::Path;

use anyhow::Context as _;
use serde::Deserialize;
use vocab_core::scheduler::SchedulerSettings;

/// Settings read from the optional TOML file, overridden by `VOCAB_*` variables.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database_url: String,
    pub success_interval_minutes: i64,
    pub retry_interval_minutes: i64,
    pub utc_offset_minutes: i32,
}

impl Default for AppConfig {
    fn default() -> Self {
        let scheduler = SchedulerSettings::default();
        Self {
            database_url: "sqlite://vocab.sqlite3".into(),
            success_interval_minutes: scheduler.success_interval_minutes,
            retry_interval_minutes: scheduler.retry_interval_minutes,
            utc_offset_minutes: scheduler.utc_offset_minutes,
        }
    }
}

impl AppConfig {
    /// Layer `path` (if it exists) under the `VOCAB_` environment.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(config::Environment::with_prefix("VOCAB"))
            .build()
            .with_context(|| format!("failed to read config from {}", path.display()))?;

        settings
            .try_deserialize()
            .context("failed to deserialise AppConfig")
    }

    #[must_use]
    pub fn scheduler(&self) -> SchedulerSettings {
        SchedulerSettings {
            success_interval_minutes: self.success_interval_minutes,
            retry_interval_minutes: self.retry_interval_minutes,
            utc_offset_minutes: self.utc_offset_minutes,
        }
    }
}
