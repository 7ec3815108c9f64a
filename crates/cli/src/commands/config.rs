use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use chairside_core::config::{AppConfig, LoadOptions};
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let entries: [(&str, String, &[&str]); 15] = [
        ("database.url", config.database.url.clone(), &["CHAIRSIDE_DATABASE_URL"]),
        (
            "database.max_connections",
            config.database.max_connections.to_string(),
            &["CHAIRSIDE_DATABASE_MAX_CONNECTIONS"],
        ),
        (
            "database.timeout_secs",
            config.database.timeout_secs.to_string(),
            &["CHAIRSIDE_DATABASE_TIMEOUT_SECS"],
        ),
        (
            "server.bind_address",
            config.server.bind_address.clone(),
            &["CHAIRSIDE_SERVER_BIND_ADDRESS"],
        ),
        ("server.port", config.server.port.to_string(), &["CHAIRSIDE_SERVER_PORT"]),
        (
            "server.graceful_shutdown_secs",
            config.server.graceful_shutdown_secs.to_string(),
            &["CHAIRSIDE_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        ),
        (
            "booking.hold_ttl_secs",
            config.booking.hold_ttl_secs.to_string(),
            &["CHAIRSIDE_BOOKING_HOLD_TTL_SECS"],
        ),
        (
            "booking.default_timezone",
            config.booking.default_timezone.clone(),
            &["CHAIRSIDE_BOOKING_DEFAULT_TIMEZONE"],
        ),
        (
            "booking.horizon_days",
            config.booking.horizon_days.to_string(),
            &["CHAIRSIDE_BOOKING_HORIZON_DAYS"],
        ),
        (
            "booking.slot_minutes",
            config.booking.slot_minutes.to_string(),
            &["CHAIRSIDE_BOOKING_SLOT_MINUTES"],
        ),
        (
            "booking.max_horizon_days",
            config.booking.max_horizon_days.to_string(),
            &["CHAIRSIDE_BOOKING_MAX_HORIZON_DAYS"],
        ),
        (
            "booking.sweep_interval_secs",
            config.booking.sweep_interval_secs.to_string(),
            &["CHAIRSIDE_BOOKING_SWEEP_INTERVAL_SECS"],
        ),
        (
            "logging.level",
            config.logging.level.clone(),
            &["CHAIRSIDE_LOGGING_LEVEL", "CHAIRSIDE_LOG_LEVEL"],
        ),
        (
            "logging.format",
            format!("{:?}", config.logging.format).to_ascii_lowercase(),
            &["CHAIRSIDE_LOGGING_FORMAT", "CHAIRSIDE_LOG_FORMAT"],
        ),
        ("config.file", display_path(config_file_path.as_deref()), &[]),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key, value, env_keys) in &entries {
        let source =
            field_source(key, env_keys, config_file_doc.as_ref(), config_file_path.as_deref());
        lines.push(render_line(key, value, source));
    }

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("chairside.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/chairside.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn display_path(path: Option<&Path>) -> String {
    path.map(|path| path.display().to_string()).unwrap_or_else(|| "<none>".to_string())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            return format!("file ({})", display_path(config_file_path));
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
