use std::time::Duration;

use anyhow::Context;
use chrono::FixedOffset;

use crate::progress::{ProgressConfig, DEFAULT_TICK};

/// America/Lima, which observes no daylight saving.
pub const DEFAULT_UTC_OFFSET: &str = "-05:00";

#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: Option<String>,
    pub utc_offset: FixedOffset,
    pub progress: ProgressConfig,
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let offset_raw = lookup("FIT_UTC_OFFSET").unwrap_or_else(|| DEFAULT_UTC_OFFSET.to_string());
        let utc_offset = offset_raw
            .parse::<FixedOffset>()
            .map_err(|_| anyhow::anyhow!("FIT_UTC_OFFSET must look like -05:00, got {offset_raw:?}"))?;

        let tick = match lookup("FIT_PROGRESS_TICK_MS") {
            Some(raw) => Duration::from_millis(
                raw.parse::<u64>()
                    .with_context(|| format!("FIT_PROGRESS_TICK_MS must be milliseconds, got {raw:?}"))?,
            ),
            None => DEFAULT_TICK,
        };

        Ok(Self {
            database_url: lookup("DATABASE_URL").filter(|url| !url.is_empty()),
            utc_offset,
            progress: ProgressConfig::with_tick(tick),
        })
    }

    pub fn require_database_url(&self) -> anyhow::Result<&str> {
        self.database_url
            .as_deref()
            .context("DATABASE_URL must be set to a Postgres instance (or pass --csv)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> anyhow::Result<Settings> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        Settings::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_to_lima_offset_and_half_second_tick() {
        let settings = settings(&[]).unwrap();
        assert_eq!(settings.utc_offset, FixedOffset::west_opt(5 * 3600).unwrap());
        assert_eq!(settings.progress.tick, Duration::from_millis(500));
        assert!(settings.database_url.is_none());
        assert!(settings.require_database_url().is_err());
    }

    #[test]
    fn reads_overrides() {
        let settings = settings(&[
            ("FIT_UTC_OFFSET", "+01:00"),
            ("FIT_PROGRESS_TICK_MS", "250"),
            ("DATABASE_URL", "postgres://localhost/fit"),
        ])
        .unwrap();
        assert_eq!(settings.utc_offset, FixedOffset::east_opt(3600).unwrap());
        assert_eq!(settings.progress.tick, Duration::from_millis(250));
        assert_eq!(settings.require_database_url().unwrap(), "postgres://localhost/fit");
    }

    #[test]
    fn rejects_bad_values() {
        assert!(settings(&[("FIT_UTC_OFFSET", "Lima")]).is_err());
        assert!(settings(&[("FIT_PROGRESS_TICK_MS", "soon")]).is_err());
    }
}
