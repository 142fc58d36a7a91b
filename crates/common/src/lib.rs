//! Shared helpers used across the slackline crates.

pub mod error;

pub use error::FromMessage;
