//! Error types for the forge API client.
//!
//! [`ForgeError`] separates faults the retry protocol may recover from
//! (rate limits, 5xx responses, timeouts) from faults that must surface
//! immediately (authorization, malformed requests, not-found).

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while talking to the forge API.
#[derive(Debug, Error)]
pub enum ForgeError {
    /// HTTP 429, a 403 carrying rate-limit headers, or a GraphQL `RATE_LIMITED` error.
    /// `resume_after` is the server-suggested wait, when one was given.
    #[error("rate limited{}", resume_hint(.resume_after))]
    RateLimited { resume_after: Option<Duration> },

    /// 5xx-class response.
    #[error("server error (status {status}): {message}")]
    Server { status: u16, message: String },

    /// The request did not complete in time.
    #[error("request timed out")]
    Timeout,

    /// Connection-level failure (DNS, refused connection, reset).
    #[error("transport error: {0}")]
    Transport(String),

    /// 401, or a 403 that is not a rate limit.
    #[error("unauthorized (status {status}): {message}")]
    Unauthorized { status: u16, message: String },

    /// The addressed item or repository does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Any other non-success response.
    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// The GraphQL endpoint answered with errors that are not rate limits or not-found.
    #[error("GraphQL error: {0}")]
    GraphQl(String),

    /// The response body could not be decoded.
    #[error("failed to parse forge response: {0}")]
    Parse(String),
}

fn resume_hint(resume_after: &Option<Duration>) -> String {
    match resume_after {
        Some(wait) => format!(", resume after {}s", wait.as_secs()),
        None => String::new(),
    }
}

impl ForgeError {
    /// Whether the retry protocol may attempt the request again.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ForgeError::RateLimited { .. }
                | ForgeError::Server { .. }
                | ForgeError::Timeout
                | ForgeError::Transport(_)
        )
    }

    /// Server-suggested resume time carried by a rate-limit fault.
    pub fn resume_after(&self) -> Option<Duration> {
        match self {
            ForgeError::RateLimited { resume_after } => *resume_after,
            _ => None,
        }
    }

    /// Maps a non-success HTTP status and body to the matching variant.
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            401 | 403 => ForgeError::Unauthorized { status, message },
            404 => ForgeError::NotFound(message),
            429 => ForgeError::RateLimited { resume_after: None },
            500..=599 => ForgeError::Server { status, message },
            _ => ForgeError::Api { status, message },
        }
    }
}

impl From<reqwest::Error> for ForgeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ForgeError::Timeout
        } else if err.is_connect() || err.is_request() {
            ForgeError::Transport(err.to_string())
        } else if err.is_decode() {
            ForgeError::Parse(err.to_string())
        } else if let Some(status) = err.status() {
            ForgeError::from_status(status.as_u16(), err.to_string())
        } else {
            ForgeError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ForgeError {
    fn from(err: serde_json::Error) -> Self {
        ForgeError::Parse(err.to_string())
    }
}
