//! Request error types.

use thiserror::Error;

/// Errors surfaced by request operations.
///
/// These are returned unchanged when a caller asks for `should_throw`;
/// otherwise they are swallowed in favor of the last cached payload.
#[derive(Error, Debug)]
pub enum RequestError {
  /// The path could not be resolved against the base URL.
  #[error("Invalid URL {url}: {reason}")]
  InvalidUrl { url: String, reason: String },

  /// The HTTP method is not a valid token.
  #[error("Invalid HTTP method {0:?}")]
  InvalidMethod(String),

  /// Transport-level failure (DNS, connection reset, timeout).
  #[error("Network failure: {0}")]
  Network(String),

  /// Non-success HTTP status.
  #[error("HTTP {status}")]
  Http { status: u16 },

  /// A request carrying an Authorization header was answered with 401.
  #[error("HTTP 401: credentials rejected")]
  AuthRejected,

  /// A success response whose body could not be decoded.
  #[error("Failed to decode response: {0}")]
  Decode(String),
}

impl RequestError {
  /// HTTP status associated with this error, if any.
  pub fn status(&self) -> Option<u16> {
    match self {
      Self::Http { status } => Some(*status),
      Self::AuthRejected => Some(401),
      _ => None,
    }
  }
}

impl From<serde_json::Error> for RequestError {
  fn from(e: serde_json::Error) -> Self {
    RequestError::Decode(e.to_string())
  }
}
