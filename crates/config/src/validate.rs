//! Configuration validation.
//!
//! Detects unknown or misspelled keys in a TOML config, and semantic problems
//! (missing bot token, size bands out of order, retry settings that would
//! disable retries) in a loaded [`SlacklineConfig`].

use std::path::Path;

use {secrecy::ExposeSecret, toml::Value};

use crate::schema::SlacklineConfig;

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Category: "syntax", "unknown-field", "type-error", "credentials",
    /// "upload-bands", "retry"
    pub category: &'static str,
    /// Dotted path, e.g. "retry.max_attempts"
    pub path: String,
    pub message: String,
}

/// Result of validating a configuration.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
    pub config_path: Option<std::path::PathBuf>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Count diagnostics by severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }
}

/// Known sections and their fields, mirroring `schema.rs`.
const KNOWN_FIELDS: &[(&str, &[&str])] = &[
    ("slack", &["bot_token", "user_token", "api_base_url"]),
    (
        "retry",
        &[
            "max_attempts",
            "base_delay_secs",
            "backoff_factor",
            "rate_limit_delay_secs",
        ],
    ),
    ("http", &["request_timeout_secs"]),
    (
        "upload",
        &[
            "text_message_limit",
            "snippet_limit",
            "standard_file_limit",
            "large_file_limit",
            "max_file_size",
            "max_message_chars",
        ],
    ),
    ("defaults", &["message_limit", "user_limit"]),
];

// ── Edit distance ───────────────────────────────────────────────────────────

fn edit_distance(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut row: Vec<usize> = (0..=b.len()).collect();

    for (i, ca) in a.chars().enumerate() {
        let mut diagonal = row[0];
        row[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let above = row[j + 1];
            let substitution = diagonal + usize::from(ca != *cb);
            row[j + 1] = substitution.min(above + 1).min(row[j] + 1);
            diagonal = above;
        }
    }
    row[b.len()]
}

fn closest<'a>(needle: &str, candidates: impl IntoIterator<Item = &'a str>) -> Option<&'a str> {
    candidates
        .into_iter()
        .map(|c| (c, edit_distance(needle, c)))
        .filter(|(_, d)| *d > 0 && *d <= 3)
        .min_by_key(|(_, d)| *d)
        .map(|(c, _)| c)
}

// ── Entry points ────────────────────────────────────────────────────────────

/// Validate a config file at `path`, or the discovered default location.
#[must_use]
pub fn validate(path: Option<&Path>) -> ValidationResult {
    let config_path = path
        .map(Path::to_path_buf)
        .or_else(crate::loader::find_config_file);

    let Some(actual_path) = config_path else {
        return ValidationResult {
            diagnostics: vec![Diagnostic {
                severity: Severity::Info,
                category: "syntax",
                path: String::new(),
                message: "no config file found; using defaults and environment".into(),
            }],
            config_path: None,
        };
    };

    let is_toml = actual_path
        .extension()
        .is_none_or(|ext| ext.eq_ignore_ascii_case("toml"));
    let mut result = match std::fs::read_to_string(&actual_path) {
        Ok(content) if is_toml => validate_toml_str(&content),
        Ok(_) => match crate::loader::load_config(&actual_path) {
            Ok(config) => validate_config(&config),
            Err(e) => ValidationResult {
                diagnostics: vec![Diagnostic {
                    severity: Severity::Error,
                    category: "type-error",
                    path: String::new(),
                    message: format!("failed to parse config file: {e}"),
                }],
                config_path: None,
            },
        },
        Err(e) => ValidationResult {
            diagnostics: vec![Diagnostic {
                severity: Severity::Error,
                category: "syntax",
                path: String::new(),
                message: format!("failed to read config file: {e}"),
            }],
            config_path: None,
        },
    };
    result.config_path = Some(actual_path);
    result
}

/// Validate a TOML string without file-system side effects.
#[must_use]
pub fn validate_toml_str(toml_str: &str) -> ValidationResult {
    let mut diagnostics = Vec::new();

    let value: Value = match toml::from_str(toml_str) {
        Ok(v) => v,
        Err(e) => {
            diagnostics.push(Diagnostic {
                severity: Severity::Error,
                category: "syntax",
                path: String::new(),
                message: format!("TOML syntax error: {e}"),
            });
            return ValidationResult {
                diagnostics,
                config_path: None,
            };
        },
    };

    check_unknown_fields(&value, &mut diagnostics);

    match toml::from_str::<SlacklineConfig>(toml_str) {
        Ok(config) => diagnostics.extend(validate_config(&config).diagnostics),
        Err(e) => diagnostics.push(Diagnostic {
            severity: Severity::Error,
            category: "type-error",
            path: String::new(),
            message: format!("type error: {e}"),
        }),
    }

    ValidationResult {
        diagnostics,
        config_path: None,
    }
}

/// Validate the file at `path` (or the discovered one) for structure, and the
/// effective `config` (file plus env overrides) for semantics.
///
/// Semantic findings on the raw file are dropped because env overrides may
/// supply what the file leaves out.
#[must_use]
pub fn validate_effective(path: Option<&Path>, config: &SlacklineConfig) -> ValidationResult {
    let mut result = validate(path);
    result
        .diagnostics
        .retain(|d| matches!(d.category, "syntax" | "unknown-field" | "type-error"));
    result
        .diagnostics
        .extend(validate_config(config).diagnostics);
    result
}

/// Semantic checks on an already-loaded config (file + env overrides).
#[must_use]
pub fn validate_config(config: &SlacklineConfig) -> ValidationResult {
    let mut diagnostics = Vec::new();
    let mut push = |severity, category, path: &str, message: String| {
        diagnostics.push(Diagnostic {
            severity,
            category,
            path: path.to_string(),
            message,
        });
    };

    match &config.slack.bot_token {
        None => push(
            Severity::Error,
            "credentials",
            "slack.bot_token",
            "bot token is not set (config or SLACK_BOT_TOKEN)".into(),
        ),
        Some(token) if !token.expose_secret().starts_with("xoxb-") => push(
            Severity::Error,
            "credentials",
            "slack.bot_token",
            "bot token must start with 'xoxb-'".into(),
        ),
        Some(_) => {},
    }
    match &config.slack.user_token {
        None => push(
            Severity::Info,
            "credentials",
            "slack.user_token",
            "user token not set; search and uploads above the standard ceiling are disabled"
                .into(),
        ),
        Some(token) if !token.expose_secret().starts_with("xoxp-") => push(
            Severity::Warning,
            "credentials",
            "slack.user_token",
            "user token must start with 'xoxp-'; it will be ignored".into(),
        ),
        Some(_) => {},
    }

    if config.retry.max_attempts == 0 {
        push(
            Severity::Warning,
            "retry",
            "retry.max_attempts",
            "0 attempts is treated as 1 (no retries)".into(),
        );
    }
    if config.retry.backoff_factor == 0 {
        push(
            Severity::Warning,
            "retry",
            "retry.backoff_factor",
            "a zero backoff factor retries network faults without waiting".into(),
        );
    }

    let upload = &config.upload;
    let bands = [
        ("upload.text_message_limit", upload.text_message_limit),
        ("upload.snippet_limit", upload.snippet_limit),
        ("upload.large_file_limit", upload.large_file_limit),
        ("upload.max_file_size", upload.max_file_size),
    ];
    for pair in bands.windows(2) {
        let ((lower_name, lower), (upper_name, upper)) = (pair[0], pair[1]);
        if lower >= upper {
            push(
                Severity::Error,
                "upload-bands",
                upper_name,
                format!("must be greater than {lower_name} ({lower} >= {upper})"),
            );
        }
    }
    if upload.standard_file_limit < upload.snippet_limit
        || upload.standard_file_limit > upload.large_file_limit
    {
        push(
            Severity::Warning,
            "upload-bands",
            "upload.standard_file_limit",
            "should lie between snippet_limit and large_file_limit".into(),
        );
    }

    ValidationResult {
        diagnostics,
        config_path: None,
    }
}

fn check_unknown_fields(value: &Value, diagnostics: &mut Vec<Diagnostic>) {
    let Some(root) = value.as_table() else {
        return;
    };

    for (section, section_value) in root {
        let Some((_, fields)) = KNOWN_FIELDS.iter().find(|(name, _)| name == section) else {
            let hint = closest(section, KNOWN_FIELDS.iter().map(|(name, _)| *name));
            diagnostics.push(unknown_field(section.clone(), hint, true));
            continue;
        };
        let Some(table) = section_value.as_table() else {
            continue;
        };
        for key in table.keys() {
            if !fields.contains(&key.as_str()) {
                let hint = closest(key, fields.iter().copied());
                diagnostics.push(unknown_field(format!("{section}.{key}"), hint, false));
            }
        }
    }
}

fn unknown_field(path: String, hint: Option<&str>, top_level: bool) -> Diagnostic {
    let level = if top_level {
        " at top level"
    } else {
        ""
    };
    let message = match hint {
        Some(s) => format!("unknown field{level} (did you mean \"{s}\"?)"),
        None => format!("unknown field{level}"),
    };
    Diagnostic {
        severity: Severity::Error,
        category: "unknown-field",
        path,
        message,
    }
}
