use crate::error::ConfigError;
use std::env;
use std::path::PathBuf;

const DEFAULT_BASE_DIR: &str = "./test1";
const DEFAULT_RESULTS_FILE: &str = "ranking_results.json";
const DEFAULT_ROUNDS: u32 = 10;
const DEFAULT_SESSION_TTL_MINUTES: i64 = 120;
/// Largest TTL `chrono::Duration::minutes` accepts without overflowing.
const MAX_SESSION_TTL_MINUTES: i64 = i64::MAX / 60_000;

#[derive(Debug, Clone)]
pub struct SurveyConfig {
    pub token: String,
    pub guild_id: Option<u64>,
    pub base_dir: PathBuf,
    pub results_file: PathBuf,
    pub total_rounds: u32,
    pub session_ttl_minutes: i64,
}

impl SurveyConfig {
    /// Reads the configuration from the process environment (after `.env` is loaded).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let token = lookup("DISCORD_TOKEN")
            .filter(|t| !t.trim().is_empty())
            .ok_or(ConfigError::Missing("DISCORD_TOKEN"))?;

        let guild_id = match lookup("SURVEY_GUILD_ID") {
            Some(raw) if !raw.trim().is_empty() => Some(parse_value(
                "SURVEY_GUILD_ID",
                &raw,
                "a Discord guild id",
            )?),
            _ => None,
        };

        let total_rounds: u32 = match lookup("SURVEY_ROUNDS") {
            Some(raw) => parse_value("SURVEY_ROUNDS", &raw, "a positive integer")?,
            None => DEFAULT_ROUNDS,
        };
        if total_rounds == 0 {
            return Err(ConfigError::Invalid {
                key: "SURVEY_ROUNDS",
                value: "0".to_string(),
                expected: "a positive integer",
            });
        }

        const TTL_EXPECTED: &str = "a positive number of minutes";
        let session_ttl_minutes: i64 = match lookup("SURVEY_SESSION_TTL_MINUTES") {
            Some(raw) => {
                let minutes = parse_value("SURVEY_SESSION_TTL_MINUTES", &raw, TTL_EXPECTED)?;
                if !(1..=MAX_SESSION_TTL_MINUTES).contains(&minutes) {
                    return Err(ConfigError::Invalid {
                        key: "SURVEY_SESSION_TTL_MINUTES",
                        value: raw,
                        expected: TTL_EXPECTED,
                    });
                }
                minutes
            }
            None => DEFAULT_SESSION_TTL_MINUTES,
        };

        Ok(Self {
            token,
            guild_id,
            base_dir: lookup("SURVEY_BASE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_BASE_DIR)),
            results_file: lookup("SURVEY_RESULTS_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_RESULTS_FILE)),
            total_rounds,
            session_ttl_minutes,
        })
    }
}

fn parse_value<T: std::str::FromStr>(
    key: &'static str,
    raw: &str,
    expected: &'static str,
) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::Invalid {
        key,
        value: raw.to_string(),
        expected,
    })
}
