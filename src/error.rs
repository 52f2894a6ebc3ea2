// Copyright (C) 2026 the project contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Error types for the reconciliation core.
//!
//! One domain error enum, grouped by section, covering every failure mode
//! that crosses a component boundary: HTTP/API errors from the two clients,
//! cache/storage errors, and data-validation errors. Call sites that only
//! need a quick contextual wrap (test setup, config loading) use
//! `anyhow::Result` instead; anything returned across a public API boundary
//! uses `Result<T, CoreError>`.

use thiserror::Error;

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Error, Debug)]
pub enum CoreError {
    // ===== Authentication / Authorization =====
    // Fatal to the invocation; never retried.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    // ===== Not found =====
    #[error("not found: {0}")]
    NotFound(String),

    // ===== Transport / timing =====
    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("upstream returned HTTP {status}: {message}")]
    HttpStatus { status: u16, message: String },

    #[error("rate limited, retry after {retry_after_seconds}s")]
    RateLimit { retry_after_seconds: u64 },

    // ===== Validation =====
    #[error("could not parse upstream payload for {identifier}: {message}")]
    Validation {
        identifier: String,
        message: String,
    },

    // ===== Cache =====
    #[error("cache entry at ({namespace}, {key}) is corrupt and was discarded")]
    CacheCorruption { namespace: String, key: String },

    // ===== Configuration / programming errors =====
    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("required collaborator missing: {0}")]
    MissingCollaborator(&'static str),

    #[error("credential file at {path} has overly permissive mode {mode:o}; refusing to load")]
    InsecureCredentialFile { path: String, mode: u32 },

    // ===== External library errors (wrapped verbatim) =====
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CoreError {
    pub fn not_found(what: impl Into<String>) -> Self {
        CoreError::NotFound(what.into())
    }

    pub fn validation(identifier: impl Into<String>, message: impl Into<String>) -> Self {
        CoreError::Validation {
            identifier: identifier.into(),
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        CoreError::Configuration(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        CoreError::Configuration(message.into())
    }

    pub fn auth_failed(what: impl Into<String>) -> Self {
        CoreError::Unauthorized(what.into())
    }

    pub fn rate_limited(retry_after_seconds: u64) -> Self {
        CoreError::RateLimit { retry_after_seconds }
    }

    /// True for errors fatal to the current invocation per §7: auth
    /// failures are surfaced and abort rather than being retried or skipped.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, CoreError::Unauthorized(_) | CoreError::Forbidden(_))
    }

    /// True for errors the §7 propagation policy has retried once already
    /// and will still accept a caller retrying again (transport hiccups,
    /// 5xx, 429). Auth failures and validation failures are never retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            CoreError::Transport(_) | CoreError::Timeout(_) | CoreError::RateLimit { .. } => true,
            CoreError::HttpStatus { status, .. } => *status >= 500,
            CoreError::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    /// True for errors that must propagate out of a per-item batch loop
    /// rather than being logged and skipped, per §7.
    pub fn is_fatal_to_batch(&self) -> bool {
        matches!(
            self,
            CoreError::Unauthorized(_) | CoreError::Forbidden(_) | CoreError::MissingCollaborator(_)
        )
    }

    pub fn retry_after_seconds(&self) -> Option<u64> {
        match self {
            CoreError::RateLimit {
                retry_after_seconds,
            } => Some(*retry_after_seconds),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_errors_are_fatal_and_not_retryable() {
        let e = CoreError::auth_failed("whoami");
        assert!(e.is_auth_error());
        assert!(e.is_fatal_to_batch());
        assert!(!e.is_retryable());
    }

    #[test]
    fn rate_limit_carries_its_retry_after() {
        let e = CoreError::rate_limited(30);
        assert!(e.is_retryable());
        assert_eq!(e.retry_after_seconds(), Some(30));
    }

    #[test]
    fn transient_5xx_is_retryable_but_4xx_is_not() {
        let server_err = CoreError::HttpStatus { status: 503, message: "busy".into() };
        let client_err = CoreError::HttpStatus { status: 404, message: "missing".into() };
        assert!(server_err.is_retryable());
        assert!(!client_err.is_retryable());
    }
}
