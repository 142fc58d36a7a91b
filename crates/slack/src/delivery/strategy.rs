//! Pure choice of a delivery path from a file's size, type and sensitivity.

use slackline_config::UploadConfig;

use crate::{credentials::CredentialTier, delivery::FileCandidate};

/// Size thresholds in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadLimits {
    pub text_message: u64,
    pub snippet: u64,
    /// Above this the user token is required.
    pub standard: u64,
    /// At or above this the file is announced, not transferred.
    pub large: u64,
    /// At or above this the file is rejected.
    pub max_file_size: u64,
    pub max_message_chars: usize,
}

impl From<&UploadConfig> for UploadLimits {
    fn from(config: &UploadConfig) -> Self {
        Self {
            text_message: config.text_message_limit,
            snippet: config.snippet_limit,
            standard: config.standard_file_limit,
            large: config.large_file_limit,
            max_file_size: config.max_file_size,
            max_message_chars: config.max_message_chars,
        }
    }
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self::from(&UploadConfig::default())
    }
}

impl UploadLimits {
    /// Credential tier an upload of `size` bytes needs.
    #[must_use]
    pub fn tier_for(&self, size: u64) -> CredentialTier {
        if size > self.standard {
            CredentialTier::Elevated
        } else {
            CredentialTier::Primary
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    Sensitive,
    TooLarge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStrategy {
    InlineText,
    Snippet { filetype: &'static str },
    Standard { tier: CredentialTier },
    InfoOnly,
    Rejected(RejectReason),
}

/// Pick the delivery path for `candidate`.
///
/// Sensitivity is checked first, then the hard size cap, then the bands in
/// ascending order.
#[must_use]
pub fn select_strategy(candidate: &FileCandidate, limits: &UploadLimits) -> DeliveryStrategy {
    let size = candidate.size;
    if candidate.is_sensitive {
        DeliveryStrategy::Rejected(RejectReason::Sensitive)
    } else if size >= limits.max_file_size {
        DeliveryStrategy::Rejected(RejectReason::TooLarge)
    } else if candidate.is_text() && size < limits.text_message {
        DeliveryStrategy::InlineText
    } else if size < limits.snippet {
        DeliveryStrategy::Snippet {
            filetype: snippet_filetype(&candidate.extension),
        }
    } else if size < limits.large {
        DeliveryStrategy::Standard {
            tier: limits.tier_for(size),
        }
    } else {
        DeliveryStrategy::InfoOnly
    }
}

/// Syntax-highlighting type for a snippet, keyed by extension without dot.
#[must_use]
pub fn snippet_filetype(extension: &str) -> &'static str {
    match extension.to_lowercase().as_str() {
        "py" => "python",
        "js" => "javascript",
        "html" => "html",
        "css" => "css",
        "json" => "json",
        "xml" => "xml",
        "sql" => "sql",
        "sh" => "shell",
        "yml" | "yaml" => "yaml",
        "md" => "markdown",
        "dockerfile" => "dockerfile",
        _ => "text",
    }
}

#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    const KB: u64 = 1024;
    const MB: u64 = 1024 * KB;
    const GB: u64 = 1024 * MB;

    fn pick(path: &str, size: u64) -> DeliveryStrategy {
        select_strategy(
            &FileCandidate::from_parts(path, size),
            &UploadLimits::default(),
        )
    }

    #[rstest]
    #[case("/home/me/notes.txt", 10 * KB, DeliveryStrategy::InlineText)]
    #[case("/home/me/data.csv", 900 * KB, DeliveryStrategy::Snippet { filetype: "text" })]
    #[case("/home/me/app.py", 200 * KB, DeliveryStrategy::Snippet { filetype: "python" })]
    #[case("/home/me/photo.png", 10 * KB, DeliveryStrategy::Snippet { filetype: "text" })]
    #[case("/home/me/bundle.zip", 50 * MB, DeliveryStrategy::Standard { tier: CredentialTier::Primary })]
    #[case("/home/me/video.mp4", 500 * MB, DeliveryStrategy::Standard { tier: CredentialTier::Elevated })]
    #[case("/home/me/disk.img", GB + 1, DeliveryStrategy::InfoOnly)]
    #[case("/home/me/huge.tar", 2 * GB, DeliveryStrategy::Rejected(RejectReason::TooLarge))]
    #[case("/home/me/.ssh/id_rsa", 2 * KB, DeliveryStrategy::Rejected(RejectReason::Sensitive))]
    fn bands(#[case] path: &str, #[case] size: u64, #[case] expected: DeliveryStrategy) {
        assert_eq!(pick(path, size), expected);
    }

    #[test]
    fn band_edges_are_exclusive_upper_bounds() {
        let limits = UploadLimits::default();
        assert_eq!(
            pick("/home/me/a.txt", limits.text_message),
            DeliveryStrategy::Snippet { filetype: "text" }
        );
        assert_eq!(
            pick("/home/me/a.bin", limits.snippet),
            DeliveryStrategy::Standard {
                tier: CredentialTier::Primary
            }
        );
        assert_eq!(pick("/home/me/a.bin", limits.large), DeliveryStrategy::InfoOnly);
        assert_eq!(
            pick("/home/me/a.bin", limits.max_file_size),
            DeliveryStrategy::Rejected(RejectReason::TooLarge)
        );
    }

    #[test]
    fn sensitivity_beats_size() {
        assert_eq!(
            pick("/home/me/server.pem", 3 * GB),
            DeliveryStrategy::Rejected(RejectReason::Sensitive)
        );
    }

    #[test]
    fn unknown_extension_highlights_as_text() {
        assert_eq!(snippet_filetype("rs"), "text");
        assert_eq!(snippet_filetype("YAML"), "yaml");
    }
}
