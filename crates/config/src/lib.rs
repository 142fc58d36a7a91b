//! Configuration loading, validation, and env overrides.
//!
//! Config files: `slackline.toml`, `slackline.yaml`, or `slackline.json`
//! Searched in `./` then `~/.config/slackline/`.
//!
//! Supports `${ENV_VAR}` substitution in all string values. Documented
//! environment variables (`SLACK_BOT_TOKEN`, `MAX_RETRIES`, ...) override the
//! file.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    error::{Error, Result},
    loader::{apply_env_overrides, config_dir, discover_and_load, find_config_file, load},
    schema::{
        DefaultsConfig, HttpConfig, RetryConfig, SlackConfig, SlacklineConfig, UploadConfig,
    },
    validate::{Diagnostic, Severity, ValidationResult},
};
