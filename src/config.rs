// src/config.rs

use std::env;
use std::str::FromStr;

use dotenvy::dotenv;

/// Default number of questions sampled into an auto-generated package.
pub const DEFAULT_AUTO_PACKAGE_SIZE: usize = 20;

/// Seconds a subject has to answer one question.
pub const DEFAULT_QUESTION_TIME_LIMIT_SECS: u32 = 20;

/// Extra seconds tolerated on top of the time limit for network latency.
pub const DEFAULT_ANSWER_GRACE_SECS: u32 = 5;

/// Validity window of an exam login code (and default due date of an assignment).
pub const DEFAULT_CODE_VALIDITY_HOURS: i64 = 72;

/// Which `ExamStore` implementation backs the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" | "pg" => Ok(StoreBackend::Postgres),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(format!("unknown STORE_BACKEND '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExamSettings {
    pub question_time_limit_secs: u32,
    pub answer_grace_secs: u32,
    pub code_validity_hours: i64,
    pub auto_package_size: usize,
}

impl Default for ExamSettings {
    fn default() -> Self {
        Self {
            question_time_limit_secs: DEFAULT_QUESTION_TIME_LIMIT_SECS,
            answer_grace_secs: DEFAULT_ANSWER_GRACE_SECS,
            code_validity_hours: DEFAULT_CODE_VALIDITY_HOURS,
            auto_package_size: DEFAULT_AUTO_PACKAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub store_backend: StoreBackend,
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub jwt_expiration: u64,
    pub rust_log: String,
    pub bind_addr: String,
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
    pub admin_display_name: Option<String>,
    pub exam: ExamSettings,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let store_backend = env::var("STORE_BACKEND")
            .ok()
            .map(|v| v.parse::<StoreBackend>().expect("STORE_BACKEND must be 'postgres' or 'memory'"))
            .unwrap_or(StoreBackend::Postgres);

        let database_url = env::var("DATABASE_URL").ok();
        if store_backend == StoreBackend::Postgres && database_url.is_none() {
            panic!("DATABASE_URL must be set when STORE_BACKEND is postgres");
        }

        let jwt_secret = env::var("JWT_SECRET").expect("JWT_SECRET must be set");

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let defaults = ExamSettings::default();

        Self {
            store_backend,
            database_url,
            jwt_secret,
            jwt_expiration: env_or("JWT_EXPIRATION", 86_400),
            rust_log,
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            admin_username: env::var("ADMIN_USERNAME").ok(),
            admin_password: env::var("ADMIN_PASSWORD").ok(),
            admin_display_name: env::var("ADMIN_DISPLAY_NAME").ok(),
            exam: ExamSettings {
                question_time_limit_secs: env_or(
                    "EXAM_QUESTION_TIME_LIMIT_SECS",
                    defaults.question_time_limit_secs,
                ),
                answer_grace_secs: env_or("EXAM_ANSWER_GRACE_SECS", defaults.answer_grace_secs),
                code_validity_hours: env_or(
                    "EXAM_CODE_VALIDITY_HOURS",
                    defaults.code_validity_hours,
                ),
                auto_package_size: env_or("AUTO_PACKAGE_SIZE", defaults.auto_package_size),
            },
        }
    }
}

/// Reads and parses an optional variable, falling back to `default` when unset.
/// A set but unparsable value is a startup error.
fn env_or<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .unwrap_or_else(|_| panic!("{} has an invalid value: {}", key, raw)),
        Err(_) => default,
    }
}
