//! Autosave timing configuration.

use std::time::Duration;

use thiserror::Error;

pub const DEBOUNCE_ENV: &str = "SHOPDESK_AUTOSAVE_DEBOUNCE_MS";
pub const SAVED_DISPLAY_ENV: &str = "SHOPDESK_AUTOSAVE_SAVED_MS";
pub const ERROR_DISPLAY_ENV: &str = "SHOPDESK_AUTOSAVE_ERROR_MS";
pub const PERSIST_TIMEOUT_ENV: &str = "SHOPDESK_AUTOSAVE_PERSIST_TIMEOUT_MS";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} must be a whole number of milliseconds (got {value:?})")]
    NotMilliseconds { key: &'static str, value: String },

    #[error("{key} must be greater than zero")]
    Zero { key: &'static str },
}

/// Autosave session configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutosaveConfig {
    /// Quiet period after the last edit before a save starts.
    pub debounce_window: Duration,
    /// How long `Saved` is shown before relaxing to `Idle`.
    pub saved_display: Duration,
    /// How long `Error` is shown before relaxing to `Idle`.
    pub error_display: Duration,
    /// Upper bound on a single persist call; `None` waits indefinitely.
    pub persist_timeout: Option<Duration>,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            debounce_window: Duration::from_millis(1500),
            saved_display: Duration::from_millis(3000),
            error_display: Duration::from_millis(5000),
            persist_timeout: Some(Duration::from_secs(30)),
        }
    }
}

impl AutosaveConfig {
    pub fn with_debounce_window(mut self, window: Duration) -> Self {
        self.debounce_window = window;
        self
    }

    pub fn with_saved_display(mut self, display: Duration) -> Self {
        self.saved_display = display;
        self
    }

    pub fn with_error_display(mut self, display: Duration) -> Self {
        self.error_display = display;
        self
    }

    pub fn with_persist_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.persist_timeout = timeout;
        self
    }

    /// Defaults overridden by `SHOPDESK_AUTOSAVE_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable name.
    ///
    /// A persist timeout of `0` disables the timeout; every other value must be
    /// a positive number of milliseconds.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(ms) = read_millis(&lookup, DEBOUNCE_ENV)? {
            config.debounce_window = positive(DEBOUNCE_ENV, ms)?;
        }
        if let Some(ms) = read_millis(&lookup, SAVED_DISPLAY_ENV)? {
            config.saved_display = positive(SAVED_DISPLAY_ENV, ms)?;
        }
        if let Some(ms) = read_millis(&lookup, ERROR_DISPLAY_ENV)? {
            config.error_display = positive(ERROR_DISPLAY_ENV, ms)?;
        }
        if let Some(ms) = read_millis(&lookup, PERSIST_TIMEOUT_ENV)? {
            config.persist_timeout = (ms > 0).then(|| Duration::from_millis(ms));
        }

        Ok(config)
    }
}

fn read_millis<F>(lookup: &F, key: &'static str) -> Result<Option<u64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| ConfigError::NotMilliseconds { key, value: raw }),
    }
}

fn positive(key: &'static str, ms: u64) -> Result<Duration, ConfigError> {
    if ms == 0 {
        return Err(ConfigError::Zero { key });
    }
    Ok(Duration::from_millis(ms))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_editor_timings() {
        let config = AutosaveConfig::default();
        assert_eq!(config.debounce_window, Duration::from_millis(1500));
        assert_eq!(config.saved_display, Duration::from_millis(3000));
        assert_eq!(config.error_display, Duration::from_millis(5000));
    }

    #[test]
    fn env_overrides_apply() {
        let config = AutosaveConfig::from_lookup(lookup(&[
            (DEBOUNCE_ENV, "250"),
            (PERSIST_TIMEOUT_ENV, "0"),
        ]))
        .unwrap();

        assert_eq!(config.debounce_window, Duration::from_millis(250));
        assert_eq!(config.saved_display, Duration::from_millis(3000));
        assert_eq!(config.persist_timeout, None);
    }

    #[test]
    fn malformed_values_are_rejected() {
        let err = AutosaveConfig::from_lookup(lookup(&[(SAVED_DISPLAY_ENV, "3s")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::NotMilliseconds {
                key: SAVED_DISPLAY_ENV,
                value: "3s".to_string()
            }
        );

        let err = AutosaveConfig::from_lookup(lookup(&[(DEBOUNCE_ENV, "0")])).unwrap_err();
        assert_eq!(err, ConfigError::Zero { key: DEBOUNCE_ENV });
    }
}
