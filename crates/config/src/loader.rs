use std::{
    path::{Path, PathBuf},
    str::FromStr,
};

use {
    secrecy::Secret,
    tracing::{debug, warn},
};

use crate::{
    error::{Context, Error, Result},
    schema::SlacklineConfig,
};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "slackline.toml",
    "slackline.yaml",
    "slackline.yml",
    "slackline.json",
];

/// Load config from the given path (any supported format).
///
/// `${VAR}` placeholders are resolved against the process environment before
/// parsing. Env overrides are *not* applied; see [`load`].
pub fn load_config(path: &Path) -> Result<SlacklineConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Load the effective configuration.
///
/// An explicit path must exist and parse. Without one, standard locations are
/// searched and a broken file degrades to defaults with a warning. Env
/// overrides are applied last in both cases.
pub fn load(explicit: Option<&Path>) -> Result<SlacklineConfig> {
    let mut config = match explicit {
        Some(path) => {
            debug!(path = %path.display(), "loading explicit config");
            load_config(path)?
        },
        None => discover_and_load(),
    };
    apply_env_overrides(&mut config);
    Ok(config)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./slackline.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/slackline/slackline.{toml,yaml,yml,json}` (user-global)
///
/// Returns `SlacklineConfig::default()` if no config file is found.
pub fn discover_and_load() -> SlacklineConfig {
    if let Some(path) = find_config_file() {
        debug!(path = %path.display(), "loading config");
        match load_config(&path) {
            Ok(cfg) => return cfg,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            },
        }
    } else {
        debug!("no config file found, using defaults");
    }
    SlacklineConfig::default()
}

/// Find the first config file in standard locations.
pub fn find_config_file() -> Option<PathBuf> {
    let local = CONFIG_FILENAMES
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists());
    if local.is_some() {
        return local;
    }

    let dir = config_dir()?;
    CONFIG_FILENAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.exists())
}

/// Returns the user-global config directory (`~/.config/slackline/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "slackline").map(|d| d.config_dir().to_path_buf())
}

fn parse_config(raw: &str, path: &Path) -> Result<SlacklineConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        other => Err(Error::UnsupportedFormat {
            extension: other.to_string(),
        }),
    }
}

// ── Environment ─────────────────────────────────────────────────────────────

/// Replace `${VAR}` placeholders with values from the process environment.
///
/// Unresolvable variables are left as-is.
pub fn substitute_env(input: &str) -> String {
    substitute_env_with(input, |name| std::env::var(name).ok())
}

fn substitute_env_with(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            // Unterminated, keep the remainder verbatim.
            out.push_str(&rest[start..]);
            return out;
        };
        let name = &after[..end];
        match lookup(name).filter(|_| !name.is_empty()) {
            Some(value) => out.push_str(&value),
            None => out.push_str(&rest[start..start + 2 + end + 1]),
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}

/// Apply the documented environment overrides on top of a loaded config.
pub fn apply_env_overrides(config: &mut SlacklineConfig) {
    apply_env_overrides_with(config, |key| std::env::var(key).ok());
}

fn apply_env_overrides_with(config: &mut SlacklineConfig, lookup: impl Fn(&str) -> Option<String>) {
    let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    if let Some(token) = get("SLACK_BOT_TOKEN") {
        config.slack.bot_token = Some(Secret::new(token));
    }
    if let Some(token) = get("SLACK_USER_TOKEN") {
        config.slack.user_token = Some(Secret::new(token));
    }
    if let Some(url) = get("SLACK_API_BASE_URL") {
        config.slack.api_base_url = url;
    }

    override_number(&get, "MAX_RETRIES", &mut config.retry.max_attempts);
    override_number(&get, "RETRY_BASE_DELAY", &mut config.retry.base_delay_secs);
    override_number(
        &get,
        "EXPONENTIAL_BACKOFF_BASE",
        &mut config.retry.backoff_factor,
    );
    override_number(
        &get,
        "RATE_LIMIT_DELAY",
        &mut config.retry.rate_limit_delay_secs,
    );
    override_number(
        &get,
        "REQUEST_TIMEOUT",
        &mut config.http.request_timeout_secs,
    );

    override_number(
        &get,
        "TEXT_MESSAGE_LIMIT",
        &mut config.upload.text_message_limit,
    );
    override_number(&get, "MEDIUM_FILE_LIMIT", &mut config.upload.snippet_limit);
    override_number(
        &get,
        "STANDARD_FILE_LIMIT",
        &mut config.upload.standard_file_limit,
    );
    override_number(&get, "LARGE_FILE_LIMIT", &mut config.upload.large_file_limit);
    override_number(&get, "MAX_FILE_SIZE", &mut config.upload.max_file_size);
    override_number(
        &get,
        "MAX_MESSAGE_CHARS",
        &mut config.upload.max_message_chars,
    );

    override_number(
        &get,
        "DEFAULT_MESSAGE_LIMIT",
        &mut config.defaults.message_limit,
    );
    override_number(&get, "DEFAULT_USER_LIMIT", &mut config.defaults.user_limit);
}

fn override_number<T: FromStr>(get: &impl Fn(&str) -> Option<String>, key: &str, slot: &mut T) {
    let Some(raw) = get(key) else {
        return;
    };
    match raw.parse::<T>() {
        Ok(value) => *slot = value,
        Err(_) => warn!(key, value = %raw, "ignoring non-numeric env override"),
    }
}
