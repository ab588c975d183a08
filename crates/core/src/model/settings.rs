use std::time::Duration;

use thiserror::Error;

/// Tunable knobs of the session engine.
///
/// The pass threshold and the abandoned-session age are fixed constants
/// (`PASS_THRESHOLD_PERCENT`, `MAX_SESSION_AGE_SECS`) and are not part of
/// these settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineSettings {
    default_time_limit_secs: u32,
    warning_threshold_secs: u32,
    redirect_delay_ms: u64,
    tick_period_ms: u64,
    quiz_route_prefix: String,
    fallback_route: String,
}

#[derive(Clone, Debug, Default)]
pub struct EngineSettingsDraft {
    pub default_time_limit_secs: Option<u32>,
    pub warning_threshold_secs: Option<u32>,
    pub redirect_delay_ms: Option<u64>,
    pub tick_period_ms: Option<u64>,
    pub quiz_route_prefix: Option<String>,
    pub fallback_route: Option<String>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SettingsError {
    #[error("default time limit must be > 0 seconds")]
    InvalidTimeLimit,
    #[error("tick period must be > 0 ms")]
    InvalidTickPeriod,
    #[error("route must start with '/': {0}")]
    InvalidRoute(String),
}

const DEFAULT_TIME_LIMIT_SECS: u32 = 600;
const DEFAULT_WARNING_THRESHOLD_SECS: u32 = 60;
const DEFAULT_REDIRECT_DELAY_MS: u64 = 1_500;
const DEFAULT_TICK_PERIOD_MS: u64 = 1_000;
const DEFAULT_QUIZ_ROUTE_PREFIX: &str = "/quiz";
const DEFAULT_FALLBACK_ROUTE: &str = "/quizzes";

impl EngineSettingsDraft {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the draft, filling unset fields with defaults.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError` for a zero time limit, a zero tick period, or
    /// a route that is not absolute.
    pub fn validate(self) -> Result<EngineSettings, SettingsError> {
        let default_time_limit_secs = self
            .default_time_limit_secs
            .unwrap_or(DEFAULT_TIME_LIMIT_SECS);
        if default_time_limit_secs == 0 {
            return Err(SettingsError::InvalidTimeLimit);
        }

        let tick_period_ms = self.tick_period_ms.unwrap_or(DEFAULT_TICK_PERIOD_MS);
        if tick_period_ms == 0 {
            return Err(SettingsError::InvalidTickPeriod);
        }

        let quiz_route_prefix = normalize_route(self.quiz_route_prefix, DEFAULT_QUIZ_ROUTE_PREFIX)?;
        let fallback_route = normalize_route(self.fallback_route, DEFAULT_FALLBACK_ROUTE)?;

        Ok(EngineSettings {
            default_time_limit_secs,
            warning_threshold_secs: self
                .warning_threshold_secs
                .unwrap_or(DEFAULT_WARNING_THRESHOLD_SECS),
            redirect_delay_ms: self.redirect_delay_ms.unwrap_or(DEFAULT_REDIRECT_DELAY_MS),
            tick_period_ms,
            quiz_route_prefix,
            fallback_route,
        })
    }
}

impl EngineSettings {
    /// Fallback time budget used when a quiz definition carries none.
    #[must_use]
    pub fn default_time_limit_secs(&self) -> u32 {
        self.default_time_limit_secs
    }

    #[must_use]
    pub fn warning_threshold_secs(&self) -> u32 {
        self.warning_threshold_secs
    }

    #[must_use]
    pub fn redirect_delay(&self) -> Duration {
        Duration::from_millis(self.redirect_delay_ms)
    }

    #[must_use]
    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_period_ms)
    }

    #[must_use]
    pub fn fallback_route(&self) -> &str {
        &self.fallback_route
    }

    /// Route of the page that hosts the quiz identified by `slug`.
    #[must_use]
    pub fn quiz_route(&self, slug: &str) -> String {
        format!("{}/{slug}", self.quiz_route_prefix)
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            default_time_limit_secs: DEFAULT_TIME_LIMIT_SECS,
            warning_threshold_secs: DEFAULT_WARNING_THRESHOLD_SECS,
            redirect_delay_ms: DEFAULT_REDIRECT_DELAY_MS,
            tick_period_ms: DEFAULT_TICK_PERIOD_MS,
            quiz_route_prefix: DEFAULT_QUIZ_ROUTE_PREFIX.to_owned(),
            fallback_route: DEFAULT_FALLBACK_ROUTE.to_owned(),
        }
    }
}

fn normalize_route(value: Option<String>, default: &str) -> Result<String, SettingsError> {
    let Some(route) = value
        .map(|val| val.trim().to_string())
        .filter(|val| !val.is_empty())
    else {
        return Ok(default.to_owned());
    };
    if !route.starts_with('/') {
        return Err(SettingsError::InvalidRoute(route));
    }
    let trimmed = route.trim_end_matches('/');
    Ok(if trimmed.is_empty() { "/".to_owned() } else { trimmed.to_owned() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_draft_yields_defaults() {
        let settings = EngineSettingsDraft::new().validate().unwrap();
        assert_eq!(settings, EngineSettings::default());
        assert_eq!(settings.quiz_route("intro"), "/quiz/intro");
        assert_eq!(settings.tick_period(), Duration::from_secs(1));
    }

    #[test]
    fn routes_are_normalized() {
        let settings = EngineSettingsDraft {
            quiz_route_prefix: Some(" /learn/quiz/ ".into()),
            fallback_route: Some("  ".into()),
            ..EngineSettingsDraft::default()
        }
        .validate()
        .unwrap();
        assert_eq!(settings.quiz_route("a"), "/learn/quiz/a");
        assert_eq!(settings.fallback_route(), "/quizzes");
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = EngineSettingsDraft {
            default_time_limit_secs: Some(0),
            ..EngineSettingsDraft::default()
        }
        .validate()
        .unwrap_err();
        assert_eq!(err, SettingsError::InvalidTimeLimit);

        let err = EngineSettingsDraft {
            fallback_route: Some("home".into()),
            ..EngineSettingsDraft::default()
        }
        .validate()
        .unwrap_err();
        assert_eq!(err, SettingsError::InvalidRoute("home".into()));
    }
}
