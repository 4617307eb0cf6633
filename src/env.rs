/// Environment variable names used by this crate for convenient
/// configuration of loggers from services.
///
/// These are purely helpers; [`LoggerConfig`](crate::LoggerConfig) itself
/// never reads the environment unless asked to via
/// [`LoggerConfig::from_env`](crate::LoggerConfig::from_env).

/// Minimum severity name, e.g. `warn`. Unknown values emit everything.
pub const LOG_LEVEL_ENV: &str = "LOG_LEVEL";

/// Output mode: `development` (default) or anything else for production.
pub const LOG_MODE_ENV: &str = "LOG_MODE";

/// Mode assumed when [`LOG_MODE_ENV`] is unset.
pub const DEFAULT_MODE: &str = "development";

/// Read an environment variable or fall back to a provided default.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Read an environment variable, treating unset and empty alike.
pub fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}
