use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use claimdesk_core::config::{AppConfig, LoadOptions};
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let source = |key_path: &str, env_key: &str| {
        field_source(key_path, Some(env_key), config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let lines = vec![
        "effective config (source precedence: env > file > default):".to_string(),
        render_line(
            "database.url",
            &config.database.url,
            source("database.url", "CLAIMDESK_DATABASE_URL"),
        ),
        render_line(
            "database.max_connections",
            &config.database.max_connections.to_string(),
            source("database.max_connections", "CLAIMDESK_DATABASE_MAX_CONNECTIONS"),
        ),
        render_line(
            "database.timeout_secs",
            &config.database.timeout_secs.to_string(),
            source("database.timeout_secs", "CLAIMDESK_DATABASE_TIMEOUT_SECS"),
        ),
        render_line(
            "server.bind_address",
            &config.server.bind_address,
            source("server.bind_address", "CLAIMDESK_SERVER_BIND_ADDRESS"),
        ),
        render_line(
            "server.port",
            &config.server.port.to_string(),
            source("server.port", "CLAIMDESK_SERVER_PORT"),
        ),
        render_line(
            "server.graceful_shutdown_secs",
            &config.server.graceful_shutdown_secs.to_string(),
            source("server.graceful_shutdown_secs", "CLAIMDESK_SERVER_GRACEFUL_SHUTDOWN_SECS"),
        ),
        render_line(
            "logging.level",
            &config.logging.level,
            source("logging.level", "CLAIMDESK_LOGGING_LEVEL"),
        ),
        render_line(
            "logging.format",
            &format!("{:?}", config.logging.format),
            source("logging.format", "CLAIMDESK_LOGGING_FORMAT"),
        ),
        render_line(
            "reporting.legacy_approver_matching",
            &config.reporting.legacy_approver_matching.to_string(),
            source(
                "reporting.legacy_approver_matching",
                "CLAIMDESK_REPORTING_LEGACY_APPROVER_MATCHING",
            ),
        ),
        render_line(
            "reporting.recent_activity_limit",
            &config.reporting.recent_activity_limit.to_string(),
            source("reporting.recent_activity_limit", "CLAIMDESK_REPORTING_RECENT_ACTIVITY_LIMIT"),
        ),
    ];

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("claimdesk.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/claimdesk.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: Option<&str>,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_key {
        if env::var_os(env_key).is_some() {
            return format!("env ({env_key})");
        }
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
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
