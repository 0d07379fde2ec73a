//! Application-level configuration loading, including duel tuning parameters.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "VERSUS_BACK_CONFIG_PATH";

/// Number of questions each player picks for the opponent.
const DEFAULT_SELECTION_COUNT: usize = 5;
/// Wall-clock budget for the answering phase, in seconds.
const DEFAULT_ANSWERING_TIME_LIMIT_SECS: u64 = 90;
/// How long a finished match record stays readable before removal, in seconds.
const DEFAULT_FINISHED_GRACE_SECS: u64 = 30;

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Questions each player must select before the answering phase opens.
    pub selection_count: usize,
    /// Shared wall-clock deadline for the answering phase.
    pub answering_time_limit: Duration,
    /// Grace window during which a finished match record stays readable.
    pub finished_grace: Duration,
    /// Scoring constants applied to every recorded answer.
    pub scoring: ScoringConfig,
}

/// Scoring constants: correct answers earn base points minus a speed penalty,
/// never dropping below the minimum; incorrect answers earn zero.
#[derive(Debug, Clone)]
pub struct ScoringConfig {
    /// Points awarded for an instantaneous correct answer.
    pub base_points: i64,
    /// Floor applied to any correct answer regardless of response time.
    pub min_points: i64,
    /// Points deducted per second of response time.
    pub penalty_per_second: f64,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to baked-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(path = %path.display(), "loaded duel configuration");
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Answering time limit expressed in whole seconds, as sent to clients.
    pub fn answering_time_limit_seconds(&self) -> u64 {
        self.answering_time_limit.as_secs()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            selection_count: DEFAULT_SELECTION_COUNT,
            answering_time_limit: Duration::from_secs(DEFAULT_ANSWERING_TIME_LIMIT_SECS),
            finished_grace: Duration::from_secs(DEFAULT_FINISHED_GRACE_SECS),
            scoring: ScoringConfig::default(),
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            base_points: 100,
            min_points: 10,
            penalty_per_second: 10.0,
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    selection_count: Option<usize>,
    answering_time_limit_seconds: Option<u64>,
    finished_grace_seconds: Option<u64>,
    scoring: Option<RawScoring>,
}

#[derive(Debug, Deserialize)]
/// JSON representation of the scoring block inside the configuration file.
struct RawScoring {
    base_points: i64,
    min_points: i64,
    penalty_per_second: f64,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = Self::default();
        Self {
            selection_count: value
                .selection_count
                .filter(|count| *count > 0)
                .unwrap_or(defaults.selection_count),
            answering_time_limit: value
                .answering_time_limit_seconds
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.answering_time_limit),
            finished_grace: value
                .finished_grace_seconds
                .map(Duration::from_secs)
                .unwrap_or(defaults.finished_grace),
            scoring: value.scoring.map(Into::into).unwrap_or(defaults.scoring),
        }
    }
}

impl From<RawScoring> for ScoringConfig {
    fn from(value: RawScoring) -> Self {
        Self {
            base_points: value.base_points,
            min_points: value.min_points,
            penalty_per_second: value.penalty_per_second,
        }
    }
}

/// Resolve the configuration path from the environment, defaulting to the baked-in location.
fn resolve_config_path() -> PathBuf {
    env::var(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = AppConfig::default();
        assert_eq!(config.selection_count, 5);
        assert_eq!(config.answering_time_limit, Duration::from_secs(90));
        assert!(config.scoring.base_points > config.scoring.min_points);
    }

    #[test]
    fn raw_config_overrides_defaults() {
        let raw: RawConfig = serde_json::from_str(
            r#"{
                "selection_count": 3,
                "answering_time_limit_seconds": 45,
                "scoring": { "base_points": 50, "min_points": 5, "penalty_per_second": 2.5 }
            }"#,
        )
        .unwrap();
        let config: AppConfig = raw.into();
        assert_eq!(config.selection_count, 3);
        assert_eq!(config.answering_time_limit, Duration::from_secs(45));
        assert_eq!(config.finished_grace, Duration::from_secs(30));
        assert_eq!(config.scoring.base_points, 50);
    }

    #[test]
    fn zero_values_fall_back_to_defaults() {
        let raw: RawConfig =
            serde_json::from_str(r#"{ "selection_count": 0, "answering_time_limit_seconds": 0 }"#)
                .unwrap();
        let config: AppConfig = raw.into();
        assert_eq!(config.selection_count, 5);
        assert_eq!(config.answering_time_limit, Duration::from_secs(90));
    }
}
