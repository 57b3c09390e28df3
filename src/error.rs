//! Unified application error model.
//! Every fallible operation in the crate returns `AppResult<T>`. The variants mirror the
//! ways a session call can go wrong: the transport failed, the request was cancelled
//! (timeout or explicit abort), the API answered with a non-2xx status, client-side
//! validation rejected the input, or the identity provider reported an error.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Message shown to users when a request was cancelled by the gateway timeout.
pub const TIMEOUT_NOTICE: &str = "API timeout. Check backend URL and server.";

#[derive(Debug, Clone, Serialize, Deserialize, Error)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppError {
    #[error("{code}: {message}")]
    Transport { code: String, message: String },
    #[error("{code}: {message}")]
    Cancelled { code: String, message: String },
    #[error("{code}: {message} (HTTP {status})")]
    Api { code: String, message: String, status: u16 },
    #[error("{code}: {message}")]
    Validation { code: String, message: String, fields: BTreeMap<String, String> },
    #[error("{code}: {message}")]
    Provider { code: String, message: String },
    #[error("{code}: {message}")]
    Session { code: String, message: String },
    #[error("{code}: {message}")]
    Io { code: String, message: String },
    #[error("{code}: {message}")]
    Internal { code: String, message: String },
}

impl AppError {
    pub fn code_str(&self) -> &str {
        match self {
            AppError::Transport { code, .. }
            | AppError::Cancelled { code, .. }
            | AppError::Api { code, .. }
            | AppError::Validation { code, .. }
            | AppError::Provider { code, .. }
            | AppError::Session { code, .. }
            | AppError::Io { code, .. }
            | AppError::Internal { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::Transport { message, .. }
            | AppError::Cancelled { message, .. }
            | AppError::Api { message, .. }
            | AppError::Validation { message, .. }
            | AppError::Provider { message, .. }
            | AppError::Session { message, .. }
            | AppError::Io { message, .. }
            | AppError::Internal { message, .. } => message.as_str(),
        }
    }

    pub fn transport<S: Into<String>>(code: S, msg: S) -> Self { AppError::Transport { code: code.into(), message: msg.into() } }
    pub fn cancelled<S: Into<String>>(code: S, msg: S) -> Self { AppError::Cancelled { code: code.into(), message: msg.into() } }
    pub fn api<S: Into<String>>(status: u16, code: S, msg: S) -> Self { AppError::Api { code: code.into(), message: msg.into(), status } }
    pub fn provider<S: Into<String>>(code: S, msg: S) -> Self { AppError::Provider { code: code.into(), message: msg.into() } }
    pub fn session<S: Into<String>>(code: S, msg: S) -> Self { AppError::Session { code: code.into(), message: msg.into() } }
    pub fn io<S: Into<String>>(code: S, msg: S) -> Self { AppError::Io { code: code.into(), message: msg.into() } }
    pub fn internal<S: Into<String>>(code: S, msg: S) -> Self { AppError::Internal { code: code.into(), message: msg.into() } }

    pub fn validation(fields: BTreeMap<String, String>) -> Self {
        let message = fields.values().cloned().collect::<Vec<_>>().join("; ");
        AppError::Validation { code: "invalid_input".into(), message, fields }
    }

    /// HTTP status carried by an `Api` error.
    pub fn status(&self) -> Option<u16> {
        match self {
            AppError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool { matches!(self, AppError::Cancelled { .. }) }

    /// Text a caller should present to the user.
    pub fn user_message(&self) -> &str {
        match self {
            AppError::Cancelled { .. } => TIMEOUT_NOTICE,
            _ => self.message(),
        }
    }

    /// Per-field messages of a validation failure; empty for every other kind.
    pub fn field_errors(&self) -> BTreeMap<String, String> {
        match self {
            AppError::Validation { fields, .. } => fields.clone(),
            _ => BTreeMap::new(),
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AppError::cancelled("timeout".to_string(), err.to_string())
        } else {
            AppError::transport("request_failed".to_string(), err.to_string())
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io { code: "io_error".into(), message: err.to_string() }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Internal { code: "json_error".into(), message: err.to_string() }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal { code: "internal".into(), message: err.to_string() }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod error_tests;
