use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub booking: BookingConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct BookingConfig {
    pub hold_ttl_secs: u64,
    pub default_timezone: String,
    pub horizon_days: u32,
    pub slot_minutes: u32,
    pub max_horizon_days: u32,
    /// `0` disables the periodic expiry sweep; lazy expiry still applies.
    pub sweep_interval_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub server_port: Option<u16>,
    pub hold_ttl_secs: Option<u64>,
    pub default_timezone: Option<String>,
    pub sweep_interval_secs: Option<u64>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://chairside.db?mode=rwc".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            booking: BookingConfig {
                hold_ttl_secs: 300,
                default_timezone: "America/New_York".to_string(),
                horizon_days: 14,
                slot_minutes: 30,
                max_horizon_days: 60,
                sweep_interval_secs: 60,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl BookingConfig {
    pub fn timezone(&self) -> Result<Tz, ConfigError> {
        self.default_timezone.trim().parse::<Tz>().map_err(|_| {
            ConfigError::Validation(format!(
                "booking.default_timezone `{}` is not an IANA timezone name",
                self.default_timezone
            ))
        })
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("chairside.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(booking) = patch.booking {
            if let Some(hold_ttl_secs) = booking.hold_ttl_secs {
                self.booking.hold_ttl_secs = hold_ttl_secs;
            }
            if let Some(default_timezone) = booking.default_timezone {
                self.booking.default_timezone = default_timezone;
            }
            if let Some(horizon_days) = booking.horizon_days {
                self.booking.horizon_days = horizon_days;
            }
            if let Some(slot_minutes) = booking.slot_minutes {
                self.booking.slot_minutes = slot_minutes;
            }
            if let Some(max_horizon_days) = booking.max_horizon_days {
                self.booking.max_horizon_days = max_horizon_days;
            }
            if let Some(sweep_interval_secs) = booking.sweep_interval_secs {
                self.booking.sweep_interval_secs = sweep_interval_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("CHAIRSIDE_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("CHAIRSIDE_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("CHAIRSIDE_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("CHAIRSIDE_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("CHAIRSIDE_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("CHAIRSIDE_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("CHAIRSIDE_SERVER_PORT") {
            self.server.port = parse_u16("CHAIRSIDE_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("CHAIRSIDE_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("CHAIRSIDE_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        if let Some(value) = read_env("CHAIRSIDE_BOOKING_HOLD_TTL_SECS") {
            self.booking.hold_ttl_secs = parse_u64("CHAIRSIDE_BOOKING_HOLD_TTL_SECS", &value)?;
        }
        if let Some(value) = read_env("CHAIRSIDE_BOOKING_DEFAULT_TIMEZONE") {
            self.booking.default_timezone = value;
        }
        if let Some(value) = read_env("CHAIRSIDE_BOOKING_HORIZON_DAYS") {
            self.booking.horizon_days = parse_u32("CHAIRSIDE_BOOKING_HORIZON_DAYS", &value)?;
        }
        if let Some(value) = read_env("CHAIRSIDE_BOOKING_SLOT_MINUTES") {
            self.booking.slot_minutes = parse_u32("CHAIRSIDE_BOOKING_SLOT_MINUTES", &value)?;
        }
        if let Some(value) = read_env("CHAIRSIDE_BOOKING_MAX_HORIZON_DAYS") {
            self.booking.max_horizon_days =
                parse_u32("CHAIRSIDE_BOOKING_MAX_HORIZON_DAYS", &value)?;
        }
        if let Some(value) = read_env("CHAIRSIDE_BOOKING_SWEEP_INTERVAL_SECS") {
            self.booking.sweep_interval_secs =
                parse_u64("CHAIRSIDE_BOOKING_SWEEP_INTERVAL_SECS", &value)?;
        }

        let log_level =
            read_env("CHAIRSIDE_LOGGING_LEVEL").or_else(|| read_env("CHAIRSIDE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("CHAIRSIDE_LOGGING_FORMAT").or_else(|| read_env("CHAIRSIDE_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
        if let Some(hold_ttl_secs) = overrides.hold_ttl_secs {
            self.booking.hold_ttl_secs = hold_ttl_secs;
        }
        if let Some(default_timezone) = overrides.default_timezone {
            self.booking.default_timezone = default_timezone;
        }
        if let Some(sweep_interval_secs) = overrides.sweep_interval_secs {
            self.booking.sweep_interval_secs = sweep_interval_secs;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_server(&self.server)?;
        validate_booking(&self.booking)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("chairside.toml"), PathBuf::from("config/chairside.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_booking(booking: &BookingConfig) -> Result<(), ConfigError> {
    if booking.hold_ttl_secs == 0 || booking.hold_ttl_secs > 3600 {
        return Err(ConfigError::Validation(
            "booking.hold_ttl_secs must be in range 1..=3600".to_string(),
        ));
    }

    booking.timezone()?;

    if !(5..=480).contains(&booking.slot_minutes) {
        return Err(ConfigError::Validation(
            "booking.slot_minutes must be in range 5..=480".to_string(),
        ));
    }

    if booking.max_horizon_days == 0 || booking.max_horizon_days > 366 {
        return Err(ConfigError::Validation(
            "booking.max_horizon_days must be in range 1..=366".to_string(),
        ));
    }

    if booking.horizon_days == 0 || booking.horizon_days > booking.max_horizon_days {
        return Err(ConfigError::Validation(format!(
            "booking.horizon_days must be in range 1..={}",
            booking.max_horizon_days
        )));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    server: Option<ServerPatch>,
    booking: Option<BookingPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct BookingPatch {
    hold_ttl_secs: Option<u64>,
    default_timezone: Option<String>,
    horizon_days: Option<u32>,
    slot_minutes: Option<u32>,
    max_horizon_days: Option<u32>,
    sweep_interval_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
