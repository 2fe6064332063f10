use kapian_algo::{FsrsConfig, DEFAULT_MAXIMUM_INTERVAL, DEFAULT_REQUEST_RETENTION};

use crate::services::study_session::StudyMode;

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub study_mode: StudyMode,
    pub fsrs: FsrsConfig,
    /// Fixed fuzz seed for reproducible schedules; entropy when unset
    pub fuzz_seed: Option<u64>,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key -> value source; invalid values fall back to defaults
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let log_level = lookup("RUST_LOG").unwrap_or_else(|| "info".to_string());

        let study_mode = lookup("STUDY_MODE")
            .and_then(|value| value.parse::<StudyMode>().ok())
            .unwrap_or(StudyMode::SpacedRepetition);

        let request_retention = lookup("FSRS_REQUEST_RETENTION")
            .and_then(|value| value.parse::<f64>().ok())
            .filter(|value| *value > 0.0 && *value < 1.0)
            .unwrap_or(DEFAULT_REQUEST_RETENTION);

        let maximum_interval = lookup("FSRS_MAXIMUM_INTERVAL")
            .and_then(|value| value.parse::<i64>().ok())
            .filter(|value| (1..=DEFAULT_MAXIMUM_INTERVAL).contains(value))
            .unwrap_or(DEFAULT_MAXIMUM_INTERVAL);

        let enable_fuzz = lookup("FSRS_ENABLE_FUZZ")
            .map(|v| !(v == "false" || v == "0"))
            .unwrap_or(true);

        let fuzz_seed = lookup("FSRS_FUZZ_SEED").and_then(|value| value.parse::<u64>().ok());

        Self {
            log_level,
            study_mode,
            fsrs: FsrsConfig {
                request_retention,
                maximum_interval,
                enable_fuzz,
            },
            fuzz_seed,
        }
    }
}
