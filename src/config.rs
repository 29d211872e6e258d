use crate::error::{Error, Result};
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;

/// How open-question answers are compared against the stored correct text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OpenAnswerPolicy {
    /// Trimmed, case-insensitive exact match.
    #[default]
    Exact,
    /// Like `Exact`, but runs of inner whitespace collapse to one space.
    Normalized,
}

impl FromStr for OpenAnswerPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exact" => Ok(Self::Exact),
            "normalized" => Ok(Self::Normalized),
            other => Err(format!("unknown open answer policy '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DifficultyStrategy {
    #[default]
    Statistical,
    Predictive,
}

impl FromStr for DifficultyStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "statistical" => Ok(Self::Statistical),
            "predictive" | "ml" => Ok(Self::Predictive),
            other => Err(format!("unknown difficulty strategy '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
    pub database_url: String,
    pub database_max_connections: u32,
    pub jwt_secret: String,
    pub classifier_url: String,
    pub classifier_timeout_secs: u64,
    pub difficulty_cron: String,
    pub difficulty_strategy: DifficultyStrategy,
    pub difficulty_min_answers: i64,
    pub difficulty_easy_ratio: f64,
    pub difficulty_hard_ratio: f64,
    pub reveal_answer_correctness: bool,
    pub open_answer_policy: OpenAnswerPolicy,
    pub request_timeout_secs: u64,
    pub log_format: LogFormat,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let difficulty_easy_ratio: f64 = get_env_parse_or("DIFFICULTY_EASY_RATIO", 0.7)?;
        let difficulty_hard_ratio: f64 = get_env_parse_or("DIFFICULTY_HARD_RATIO", 0.3)?;
        if !(0.0..=1.0).contains(&difficulty_hard_ratio)
            || !(0.0..=1.0).contains(&difficulty_easy_ratio)
            || difficulty_hard_ratio >= difficulty_easy_ratio
        {
            return Err(Error::Config(format!(
                "Difficulty ratios must satisfy 0 <= hard < easy <= 1, got hard={} easy={}",
                difficulty_hard_ratio, difficulty_easy_ratio
            )));
        }

        Ok(Self {
            server_address: get_env("SERVER_ADDRESS")?,
            database_url: get_env("DATABASE_URL")?,
            database_max_connections: get_env_parse_or("DATABASE_MAX_CONNECTIONS", 20)?,
            jwt_secret: get_env("JWT_SECRET")?,
            classifier_url: env::var("CLASSIFIER_URL")
                .unwrap_or_else(|_| "http://localhost:5000/predict".to_string()),
            classifier_timeout_secs: get_env_parse_or("CLASSIFIER_TIMEOUT_SECS", 10)?,
            difficulty_cron: env::var("DIFFICULTY_CRON")
                .unwrap_or_else(|_| "0 0 3 * * *".to_string()),
            difficulty_strategy: get_env_parse_or(
                "DIFFICULTY_STRATEGY",
                DifficultyStrategy::Statistical,
            )?,
            difficulty_min_answers: get_env_parse_or("DIFFICULTY_MIN_ANSWERS", 50)?,
            difficulty_easy_ratio,
            difficulty_hard_ratio,
            reveal_answer_correctness: get_env_parse_or("REVEAL_ANSWER_CORRECTNESS", true)?,
            open_answer_policy: get_env_parse_or("OPEN_ANSWER_POLICY", OpenAnswerPolicy::Exact)?,
            request_timeout_secs: get_env_parse_or("REQUEST_TIMEOUT_SECS", 30)?,
            log_format: get_env_parse_or("LOG_FORMAT", LogFormat::Pretty)?,
        })
    }
}

fn get_env(name: &str) -> Result<String> {
    env::var(name).map_err(|_| Error::Config(format!("Missing environment variable: {}", name)))
}

fn get_env_parse_or<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e))),
        _ => Ok(default),
    }
}
