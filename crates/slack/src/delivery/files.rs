//! Local file helpers: size formatting, metadata, preview and create.

use std::{
    io::{BufRead, BufReader},
    path::Path,
    time::SystemTime,
};

use {
    chrono::{DateTime, Utc},
    serde::Serialize,
    tracing::info,
};

use crate::{
    delivery::FileCandidate,
    error::{GatewayError, Result},
};

const KIB: f64 = 1024.0;

/// Human-readable size: bytes, then KB/MB/GB with one decimal.
#[must_use]
pub fn format_file_size(bytes: u64) -> String {
    let b = bytes as f64;
    if bytes < 1024 {
        format!("{bytes} bytes")
    } else if b < KIB * KIB {
        format!("{:.1} KB", b / KIB)
    } else if b < KIB * KIB * KIB {
        format!("{:.1} MB", b / (KIB * KIB))
    } else {
        format!("{:.1} GB", b / (KIB * KIB * KIB))
    }
}

/// Metadata reported for a local file.
#[derive(Debug, Clone, Serialize)]
pub struct FileInfo {
    pub name: String,
    pub path: String,
    pub size: u64,
    pub size_human: String,
    pub extension: String,
    pub is_text: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
}

impl FileInfo {
    pub fn read(path: &Path) -> Result<Self> {
        let candidate = FileCandidate::inspect(path)?;
        let metadata = std::fs::metadata(&candidate.path)
            .map_err(|e| GatewayError::file_unavailable(&candidate.path, e))?;
        let stamp = |t: std::io::Result<SystemTime>| t.ok().map(DateTime::<Utc>::from);
        Ok(Self {
            is_text: candidate.is_text(),
            path: candidate.path.display().to_string(),
            size_human: format_file_size(candidate.size),
            name: candidate.name,
            size: candidate.size,
            extension: candidate.extension,
            modified: stamp(metadata.modified()),
            created: stamp(metadata.created()),
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FilePreview {
    pub file: FileInfo,
    /// First lines of a text file; `None` for other types.
    pub content: Option<String>,
    pub lines_shown: usize,
    pub truncated: bool,
}

/// Preview a local file without uploading it.
pub fn preview(path: &Path, max_lines: usize) -> Result<FilePreview> {
    let file = FileInfo::read(path)?;
    if !file.is_text {
        return Ok(FilePreview {
            file,
            content: None,
            lines_shown: 0,
            truncated: false,
        });
    }

    let handle =
        std::fs::File::open(path).map_err(|e| GatewayError::file_unavailable(path, e))?;
    let mut lines = Vec::new();
    let mut truncated = false;
    for chunk in BufReader::new(handle).split(b'\n') {
        let chunk = chunk.map_err(|e| GatewayError::file_unavailable(path, e))?;
        if lines.len() == max_lines {
            truncated = true;
            break;
        }
        lines.push(String::from_utf8_lossy(&chunk).trim_end().to_string());
    }
    let lines_shown = lines.len();
    let mut content = lines.join("\n");
    if truncated {
        content.push_str(&format!("\n... (more than {max_lines} lines)"));
    }

    info!(file = %file.name, lines_shown, "file preview ready");
    Ok(FilePreview {
        file,
        content: Some(content),
        lines_shown,
        truncated,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct VerifiedFile {
    pub created: bool,
    pub file: FileInfo,
}

/// Report on an existing file, or create it (and its parents) with
/// `content` when it does not exist.
pub fn verify_or_create(path: &Path, content: Option<&str>) -> Result<VerifiedFile> {
    if path.exists() {
        return Ok(VerifiedFile {
            created: false,
            file: FileInfo::read(path)?,
        });
    }

    let Some(content) = content.filter(|c| !c.is_empty()) else {
        return Err(GatewayError::file_unavailable(
            path,
            "file does not exist and no content was provided to create it",
        ));
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| GatewayError::file_unavailable(parent, e))?;
    }
    std::fs::write(path, content).map_err(|e| GatewayError::file_unavailable(path, e))?;

    let file = FileInfo::read(path)?;
    info!(file = %file.name, size = file.size, "file created");
    Ok(VerifiedFile {
        created: true,
        file,
    })
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, crate::error::ErrorKind, rstest::rstest};

    #[rstest]
    #[case(0, "0 bytes")]
    #[case(1023, "1023 bytes")]
    #[case(1536, "1.5 KB")]
    #[case(50 * 1024 * 1024, "50.0 MB")]
    #[case(3 * 1024 * 1024 * 1024, "3.0 GB")]
    fn formats_sizes(#[case] bytes: u64, #[case] expected: &str) {
        assert_eq!(format_file_size(bytes), expected);
    }

    #[test]
    fn preview_truncates_long_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        let body: String = (1..=30).map(|i| format!("line {i}\n")).collect();
        std::fs::write(&path, body).unwrap();

        let preview = preview(&path, 20).unwrap();
        assert!(preview.truncated);
        assert_eq!(preview.lines_shown, 20);
        let content = preview.content.unwrap();
        assert!(content.starts_with("line 1\n"));
        assert!(content.contains("line 20\n..."));
        assert!(!content.contains("line 21"));
    }

    #[test]
    fn preview_skips_binary_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("image.png");
        std::fs::write(&path, [0u8, 159, 146, 150]).unwrap();

        let preview = preview(&path, 20).unwrap();
        assert!(preview.content.is_none());
        assert_eq!(preview.file.size, 4);
    }

    #[test]
    fn verify_creates_missing_file_with_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/dir/report.md");

        let verified = verify_or_create(&path, Some("# hello\n")).unwrap();
        assert!(verified.created);
        assert_eq!(verified.file.size, 8);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# hello\n");

        let again = verify_or_create(&path, Some("ignored")).unwrap();
        assert!(!again.created);
        assert_eq!(again.file.size, 8);
    }

    #[test]
    fn verify_without_content_fails_for_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = verify_or_create(&dir.path().join("absent.txt"), None).unwrap_err();
        assert_eq!(err.kind, ErrorKind::FileUnavailable);
    }
}
