//! Resilient Slack Web API gateway.
//!
//! Every call flows through the [`Dispatcher`](dispatch::Dispatcher), which
//! picks the credential tier, retries throttling and network faults under a
//! bounded policy, and classifies remote failures into [`GatewayError`]s with
//! a remediation hint. [`SlackGateway`] builds the individual operations on
//! top, and [`SlackTools`] wraps them into uniform JSON envelopes.

pub mod api;
pub mod classify;
pub mod credentials;
pub mod delivery;
pub mod dispatch;
pub mod error;
pub mod pagination;
pub mod tools;
pub mod transport;
pub mod types;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_support;

pub use {
    api::SlackGateway,
    credentials::{CredentialTier, Credentials},
    error::{ErrorKind, GatewayError, Result},
    tools::{Envelope, SlackTools},
};
