//! Error types shared across the interception engine.
//!
//! None of these ever reach page-facing callers: every boundary that can
//! produce one logs it and degrades to "do nothing" (empty rule set, raw
//! response body, or fallthrough to the real transport).

use std::time::Duration;

/// Failures of the relay round trip that fetches rule snapshots.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("relay did not answer within {0:?}")]
    Timeout(Duration),
    #[error("relay channel is closed")]
    Disconnected,
    #[error("malformed relay payload: {0}")]
    Malformed(String),
}

/// Failures raised by a real transport implementation.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Failures while realizing a response template.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("invalid generation rule '{rule}' on key '{key}'")]
    InvalidRule { key: String, rule: String },
    #[error("invalid arguments for @{placeholder}: {reason}")]
    InvalidArgument { placeholder: String, reason: String },
}

/// Failures while turning a synthesized response into a transport response.
#[derive(Debug, thiserror::Error)]
pub enum InterceptError {
    #[error("status {0} cannot be represented by the transport")]
    InvalidStatus(u16),
    #[error("header '{0}' has a value the transport cannot carry")]
    InvalidHeader(String),
    #[error("no async runtime available to schedule the mock response")]
    NoRuntime,
}

/// Rejected ready-state transitions of a replayed XHR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LifecycleError {
    #[error("cannot move from {from:?} to {to:?}")]
    InvalidTransition {
        from: crate::transport::ReadyState,
        to: crate::transport::ReadyState,
    },
}
