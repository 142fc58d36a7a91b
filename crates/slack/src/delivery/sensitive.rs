//! Local denylist for files that must never leave the machine.

use std::path::{Component, Path};

const KEY_EXTENSIONS: &[&str] = &["key", "pem", "p12", "jks", "keystore"];
const NAME_KEYWORDS: &[&str] = &[
    "passwd",
    "shadow",
    "private",
    "secrets",
    "credentials",
    "config",
    "settings",
    "token",
    "api_key",
    "password",
];
const SYSTEM_ROOTS: &[&str] = &["etc", "usr", "sys", "proc", "var"];
const SECRET_DIRS: &[&str] = &[".ssh", ".aws", ".config", ".env", "credentials", "secrets"];
const BACKUP_SUFFIXES: &[&str] = &[".bak", ".tmp", ".swp", "~", ".DS_Store"];

/// Why a path was refused, or `None` when it may be uploaded.
#[must_use]
pub fn sensitivity_reason(path: &Path) -> Option<&'static str> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let lower_name = name.to_lowercase();

    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase());
    if extension.is_some_and(|e| KEY_EXTENSIONS.contains(&e.as_str())) {
        return Some("key or certificate file");
    }
    if NAME_KEYWORDS.iter().any(|k| lower_name.contains(k)) {
        return Some("file name suggests secrets or configuration");
    }

    let mut components = path.components();
    let first_normal = match components.next() {
        Some(Component::RootDir) => components.next(),
        other => other,
    };
    if path.has_root()
        && let Some(Component::Normal(root)) = first_normal
        && SYSTEM_ROOTS.iter().any(|s| root == *s)
    {
        return Some("system path");
    }

    if path
        .components()
        .any(|c| matches!(c, Component::Normal(part) if SECRET_DIRS.iter().any(|d| part == *d)))
    {
        return Some("inside a secrets directory");
    }
    if BACKUP_SUFFIXES.iter().any(|s| name.ends_with(s)) {
        return Some("backup or temporary file");
    }
    None
}

#[must_use]
pub fn is_sensitive(path: &Path) -> bool {
    sensitivity_reason(path).is_some()
}
