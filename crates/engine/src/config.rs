//! Engine configuration

use std::env;
use std::str::FromStr;

/// Engine configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct DeskConfig {
    // Assignment
    pub assignment_queue_depth: usize,

    // Input limits
    pub max_title_length: usize,
    pub max_content_length: usize,

    // Workload report thresholds
    pub workload_normal_threshold: u64,
    pub workload_high_threshold: u64,

    // Events
    pub event_capacity: usize,

    // Database (only read by the Postgres store)
    pub database_url: Option<String>,
    pub database_max_connections: u32,
}

impl Default for DeskConfig {
    fn default() -> Self {
        Self {
            assignment_queue_depth: 256,
            max_title_length: 500,
            max_content_length: 50_000,
            workload_normal_threshold: 8,
            workload_high_threshold: 15,
            event_capacity: 1024,
            database_url: None,
            database_max_connections: 5,
        }
    }
}

impl DeskConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let config = Self {
            assignment_queue_depth: parse_var(
                "DESK_ASSIGNMENT_QUEUE_DEPTH",
                defaults.assignment_queue_depth,
            )?,
            max_title_length: parse_var("DESK_MAX_TITLE_LENGTH", defaults.max_title_length)?,
            max_content_length: parse_var("DESK_MAX_CONTENT_LENGTH", defaults.max_content_length)?,
            workload_normal_threshold: parse_var(
                "DESK_WORKLOAD_NORMAL_THRESHOLD",
                defaults.workload_normal_threshold,
            )?,
            workload_high_threshold: parse_var(
                "DESK_WORKLOAD_HIGH_THRESHOLD",
                defaults.workload_high_threshold,
            )?,
            event_capacity: parse_var("DESK_EVENT_CAPACITY", defaults.event_capacity)?,
            database_url: env::var("DATABASE_URL").ok().filter(|url| !url.is_empty()),
            database_max_connections: parse_var(
                "DATABASE_MAX_CONNECTIONS",
                defaults.database_max_connections,
            )?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.assignment_queue_depth == 0 {
            return Err(ConfigError::Invalid(
                "DESK_ASSIGNMENT_QUEUE_DEPTH",
                "must be greater than zero".to_string(),
            ));
        }
        if self.event_capacity == 0 {
            return Err(ConfigError::Invalid(
                "DESK_EVENT_CAPACITY",
                "must be greater than zero".to_string(),
            ));
        }
        if self.max_title_length == 0 {
            return Err(ConfigError::Invalid(
                "DESK_MAX_TITLE_LENGTH",
                "must be greater than zero".to_string(),
            ));
        }
        if self.max_content_length == 0 {
            return Err(ConfigError::Invalid(
                "DESK_MAX_CONTENT_LENGTH",
                "must be greater than zero".to_string(),
            ));
        }
        if self.workload_high_threshold <= self.workload_normal_threshold {
            return Err(ConfigError::Invalid(
                "DESK_WORKLOAD_HIGH_THRESHOLD",
                format!(
                    "must exceed DESK_WORKLOAD_NORMAL_THRESHOLD ({})",
                    self.workload_normal_threshold
                ),
            ));
        }
        Ok(())
    }
}

fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(name, format!("cannot parse {:?}", raw))),
        _ => Ok(default),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: &[&str] = &[
        "DESK_ASSIGNMENT_QUEUE_DEPTH",
        "DESK_MAX_TITLE_LENGTH",
        "DESK_MAX_CONTENT_LENGTH",
        "DESK_WORKLOAD_NORMAL_THRESHOLD",
        "DESK_WORKLOAD_HIGH_THRESHOLD",
        "DESK_EVENT_CAPACITY",
        "DATABASE_URL",
        "DATABASE_MAX_CONNECTIONS",
    ];

    /// Helper to clear env vars before and after tests
    fn cleanup_config() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_defaults_when_unset() {
        cleanup_config();

        let config = DeskConfig::from_env().unwrap();
        assert_eq!(config.assignment_queue_depth, 256);
        assert_eq!(config.max_title_length, 500);
        assert_eq!(config.max_content_length, 50_000);
        assert_eq!(config.workload_normal_threshold, 8);
        assert_eq!(config.workload_high_threshold, 15);
        assert!(config.database_url.is_none());
    }

    #[test]
    #[serial]
    fn test_overrides_are_read() {
        cleanup_config();
        env::set_var("DESK_ASSIGNMENT_QUEUE_DEPTH", "16");
        env::set_var("DESK_MAX_TITLE_LENGTH", "80");
        env::set_var("DATABASE_URL", "postgres://desk@localhost/desk");

        let config = DeskConfig::from_env().unwrap();
        assert_eq!(config.assignment_queue_depth, 16);
        assert_eq!(config.max_title_length, 80);
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://desk@localhost/desk")
        );

        cleanup_config();
    }

    #[test]
    #[serial]
    fn test_malformed_number_is_rejected() {
        cleanup_config();
        env::set_var("DESK_ASSIGNMENT_QUEUE_DEPTH", "lots");

        let result = DeskConfig::from_env();
        assert!(
            matches!(result, Err(ConfigError::Invalid("DESK_ASSIGNMENT_QUEUE_DEPTH", _))),
            "malformed depth should be rejected, got: {:?}",
            result
        );

        cleanup_config();
    }

    #[test]
    #[serial]
    fn test_zero_queue_depth_is_rejected() {
        cleanup_config();
        env::set_var("DESK_ASSIGNMENT_QUEUE_DEPTH", "0");

        assert!(DeskConfig::from_env().is_err());

        cleanup_config();
    }

    #[test]
    #[serial]
    fn test_zero_length_limit_names_its_variable() {
        cleanup_config();
        env::set_var("DESK_MAX_CONTENT_LENGTH", "0");

        let result = DeskConfig::from_env();
        assert!(matches!(
            result,
            Err(ConfigError::Invalid("DESK_MAX_CONTENT_LENGTH", _))
        ));

        env::set_var("DESK_MAX_TITLE_LENGTH", "0");
        let result = DeskConfig::from_env();
        assert!(matches!(
            result,
            Err(ConfigError::Invalid("DESK_MAX_TITLE_LENGTH", _))
        ));

        cleanup_config();
    }

    #[test]
    #[serial]
    fn test_thresholds_must_be_ordered() {
        cleanup_config();
        env::set_var("DESK_WORKLOAD_NORMAL_THRESHOLD", "10");
        env::set_var("DESK_WORKLOAD_HIGH_THRESHOLD", "10");

        let result = DeskConfig::from_env();
        assert!(matches!(
            result,
            Err(ConfigError::Invalid("DESK_WORKLOAD_HIGH_THRESHOLD", _))
        ));

        cleanup_config();
    }
}
