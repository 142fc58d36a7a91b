//! Message-only error construction shared by the library crates.

/// Error types that can be built from a plain message.
pub trait FromMessage: Sized {
    fn from_message(message: String) -> Self;
}

/// Define a crate-local `Context` trait that prefixes a failure with a
/// message, for any `Result` whose error implements `Display`.
///
/// The invoking module must define `Error: FromMessage` and a `Result<T>`
/// alias over it:
///
/// ```ignore
/// slackline_common::impl_context!();
///
/// std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
/// ```
#[macro_export]
macro_rules! impl_context {
    () => {
        pub trait Context<T> {
            fn context(self, context: impl Into<String>) -> Result<T>;

            fn with_context<C: Into<String>>(self, f: impl FnOnce() -> C) -> Result<T>;
        }

        impl<T, E: std::fmt::Display> Context<T> for std::result::Result<T, E> {
            fn context(self, context: impl Into<String>) -> Result<T> {
                self.with_context(|| context)
            }

            fn with_context<C: Into<String>>(self, f: impl FnOnce() -> C) -> Result<T> {
                self.map_err(|source| {
                    let message = format!("{}: {source}", f().into());
                    <Error as $crate::FromMessage>::from_message(message)
                })
            }
        }
    };
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use crate::FromMessage;

    #[derive(Debug, PartialEq)]
    pub struct Error(pub String);

    impl FromMessage for Error {
        fn from_message(message: String) -> Self {
            Self(message)
        }
    }

    pub type Result<T> = std::result::Result<T, Error>;

    crate::impl_context!();

    #[test]
    fn context_prefixes_source() {
        let parsed = "x".parse::<u32>();
        let err = parsed.context("MAX_RETRIES").unwrap_err();
        assert!(err.0.starts_with("MAX_RETRIES: "));
    }

    #[test]
    fn with_context_runs_only_on_failure() {
        let ok: std::result::Result<u8, String> = Ok(3);
        assert_eq!(ok.with_context(|| -> String { unreachable!() }), Ok(3));

        let failed: std::result::Result<u8, String> = Err("denied".into());
        assert_eq!(
            failed.with_context(|| "reading slackline.toml"),
            Err(Error("reading slackline.toml: denied".into()))
        );
    }
}
