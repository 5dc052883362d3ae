//! Configuration management for the loan management server
//!
//! Loads server settings and the lending policy (late fees, billing cycle,
//! reward tiers) from environment variables, with `.env` support.

use rust_decimal::Decimal;
use std::env;
use std::str::FromStr;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid environment value: {0}")]
    InvalidValue(String),

    #[error("Invalid port number: {0}")]
    InvalidPort(String),

    #[error("Inconsistent lending policy: {0}")]
    InvalidPolicy(String),
}

/// Application environment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    /// Parse environment from string
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        match s.to_lowercase().as_str() {
            "dev" | "development" => Ok(Environment::Development),
            "staging" => Ok(Environment::Staging),
            "prod" | "production" => Ok(Environment::Production),
            _ => Err(ConfigError::InvalidValue(format!(
                "Invalid environment: '{}'. Expected: dev, staging, or prod",
                s
            ))),
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }
}

/// How a late fee is sized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LateFeeRule {
    /// Fixed amount per missed due date
    Flat(Decimal),
    /// Percentage of the outstanding balance
    Percentage(Decimal),
}

/// Externally supplied lending parameters
#[derive(Debug, Clone, PartialEq)]
pub struct LendingPolicy {
    /// APR given to new users, and to accounts opened without an explicit APR
    pub default_apr: Decimal,
    pub late_fee: LateFeeRule,
    /// Maximum number of late fees inside the trailing window
    pub max_late_fees: i64,
    pub late_fee_window_days: i64,
    pub billing_cycle_days: i64,
    /// Percentages offered by the repayment options calculator
    pub repayment_percentages: Vec<Decimal>,
    pub interest_savings_horizon_days: i64,
    pub reward: RewardPolicy,
}

/// Reward tier parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RewardPolicy {
    /// Consecutive qualifying repayments needed for one tier level
    pub streak_length: u32,
    /// APR points removed per tier level
    pub apr_step: Decimal,
    /// APR floor
    pub min_apr: Decimal,
    /// Share of the balance a repayment must cover to qualify
    pub min_repayment_percent: Decimal,
}

impl Default for RewardPolicy {
    fn default() -> Self {
        Self {
            streak_length: 3,
            apr_step: Decimal::new(20, 1),
            min_apr: Decimal::new(100, 1),
            min_repayment_percent: Decimal::new(100, 1),
        }
    }
}

impl Default for LendingPolicy {
    fn default() -> Self {
        Self {
            default_apr: Decimal::new(250, 1),
            late_fee: LateFeeRule::Flat(Decimal::new(500, 2)),
            max_late_fees: 3,
            late_fee_window_days: 90,
            billing_cycle_days: 30,
            repayment_percentages: [10, 25, 50, 75, 100].into_iter().map(Decimal::from).collect(),
            interest_savings_horizon_days: 30,
            reward: RewardPolicy::default(),
        }
    }
}

impl LendingPolicy {
    /// Load the policy from the environment, falling back to defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = LendingPolicy::default();

        let late_fee = match env::var("LATE_FEE_PERCENT").ok() {
            Some(pct) => LateFeeRule::Percentage(parse_value("LATE_FEE_PERCENT", &pct)?),
            None => LateFeeRule::Flat(env_or("LATE_FEE_AMOUNT", Decimal::new(500, 2))?),
        };

        let repayment_percentages = match env::var("REPAYMENT_PERCENTAGES").ok() {
            Some(list) => list
                .split(',')
                .map(|p| parse_value("REPAYMENT_PERCENTAGES", p.trim()))
                .collect::<Result<Vec<Decimal>, _>>()?,
            None => defaults.repayment_percentages,
        };

        let reward = RewardPolicy {
            streak_length: env_or("REWARD_STREAK_LENGTH", defaults.reward.streak_length)?,
            apr_step: env_or("REWARD_APR_STEP", defaults.reward.apr_step)?,
            min_apr: env_or("REWARD_MIN_APR", defaults.reward.min_apr)?,
            min_repayment_percent: env_or(
                "REWARD_MIN_REPAYMENT_PERCENT",
                defaults.reward.min_repayment_percent,
            )?,
        };

        let policy = LendingPolicy {
            default_apr: env_or("DEFAULT_APR", defaults.default_apr)?,
            late_fee,
            max_late_fees: env_or("MAX_LATE_FEES", defaults.max_late_fees)?,
            late_fee_window_days: env_or("LATE_FEE_WINDOW_DAYS", defaults.late_fee_window_days)?,
            billing_cycle_days: env_or("BILLING_CYCLE_DAYS", defaults.billing_cycle_days)?,
            repayment_percentages,
            interest_savings_horizon_days: env_or(
                "INTEREST_SAVINGS_HORIZON_DAYS",
                defaults.interest_savings_horizon_days,
            )?,
            reward,
        };

        policy.validate()?;
        Ok(policy)
    }

    /// Reject parameter combinations the engine cannot honour
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_apr <= Decimal::ZERO {
            return Err(ConfigError::InvalidPolicy("DEFAULT_APR must be positive".into()));
        }
        match self.late_fee {
            LateFeeRule::Flat(amount) if amount < Decimal::ZERO => {
                return Err(ConfigError::InvalidPolicy("LATE_FEE_AMOUNT must not be negative".into()));
            }
            LateFeeRule::Percentage(pct) if pct < Decimal::ZERO || pct > Decimal::ONE_HUNDRED => {
                return Err(ConfigError::InvalidPolicy("LATE_FEE_PERCENT must be within 0..=100".into()));
            }
            _ => {}
        }
        if self.max_late_fees < 0 || self.late_fee_window_days <= 0 {
            return Err(ConfigError::InvalidPolicy("late fee window must be positive".into()));
        }
        if self.billing_cycle_days <= 0 {
            return Err(ConfigError::InvalidPolicy("BILLING_CYCLE_DAYS must be positive".into()));
        }
        if self.interest_savings_horizon_days < 0 {
            return Err(ConfigError::InvalidPolicy(
                "INTEREST_SAVINGS_HORIZON_DAYS must not be negative".into(),
            ));
        }
        if self
            .repayment_percentages
            .iter()
            .any(|p| *p <= Decimal::ZERO || *p > Decimal::ONE_HUNDRED)
        {
            return Err(ConfigError::InvalidPolicy(
                "REPAYMENT_PERCENTAGES must be within (0, 100]".into(),
            ));
        }
        if self.reward.streak_length == 0 {
            return Err(ConfigError::InvalidPolicy("REWARD_STREAK_LENGTH must be at least 1".into()));
        }
        if self.reward.min_apr <= Decimal::ZERO {
            return Err(ConfigError::InvalidPolicy("REWARD_MIN_APR must be positive".into()));
        }
        if self.reward.apr_step < Decimal::ZERO {
            return Err(ConfigError::InvalidPolicy("REWARD_APR_STEP must not be negative".into()));
        }
        Ok(())
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection URL
    pub database_url: String,

    /// Current environment
    pub environment: Environment,

    /// Bind address
    pub host: String,

    /// Server port
    pub port: u16,

    /// Maximum database connections
    pub db_max_connections: u32,

    /// Seconds to wait for a pooled connection
    pub db_acquire_timeout_secs: u64,

    /// Apply pending migrations at start-up
    pub run_migrations: bool,

    /// CORS allowed origins (comma separated)
    pub cors_allowed_origins: Option<String>,

    /// Log level (RUST_LOG)
    pub log_level: String,

    pub lending: LendingPolicy,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors)
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .map(|s| Environment::parse(&s))
            .unwrap_or(Ok(Environment::Development))?;

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingEnvVar("DATABASE_URL".to_string()))?;

        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        let port = env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort("PORT must be a valid number".to_string()))?;

        let db_max_connections = env_or("DB_MAX_CONNECTIONS", 5u32)?;
        let db_acquire_timeout_secs = env_or("DB_ACQUIRE_TIMEOUT_SECS", 5u64)?;
        let run_migrations = env_or("RUN_MIGRATIONS", true)?;

        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS").ok();

        let log_level = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        Ok(Config {
            database_url,
            environment,
            host,
            port,
            db_max_connections,
            db_acquire_timeout_secs,
            run_migrations,
            cors_allowed_origins,
            log_level,
            lending: LendingPolicy::from_env()?,
        })
    }

    /// Database URL with the password masked, for logging
    pub fn database_url_masked(&self) -> String {
        if let Some(at_pos) = self.database_url.find('@') {
            if let Some(colon_pos) = self.database_url[..at_pos].rfind(':') {
                // "postgresql://host@..." has no password, only the scheme colon
                if !self.database_url[..colon_pos].ends_with("postgresql")
                    && !self.database_url[..colon_pos].ends_with("postgres")
                {
                    let prefix = &self.database_url[..colon_pos + 1];
                    let suffix = &self.database_url[at_pos..];
                    return format!("{}****{}", prefix, suffix);
                }
            }
        }
        self.database_url.clone()
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => parse_value(key, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> Result<T, ConfigError> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| ConfigError::InvalidValue(format!("{}={}", key, raw)))
}
