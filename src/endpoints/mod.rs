//! Authorization and token endpoint abstractions.
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

pub mod authorization;
pub mod token;

/// Error code reported when the refresh token or authorization code is no
/// longer usable.
pub const INVALID_GRANT: &str = "invalid_grant";

/// Error code reported when the resource owner denied the authorization
/// request.
pub const ACCESS_DENIED: &str = "access_denied";

/// An OAuth error response.
///
/// This is the standard error format returned by the authorization server
/// when a request fails, as defined in
/// [RFC 6749 Section 5.2](https://datatracker.ietf.org/doc/html/rfc6749#section-5.2).
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ErrorResponse {
	/// A single error code string.
	pub error: String,

	/// Human-readable text providing additional information about the error.
	pub error_description: Option<String>,

	/// A URI identifying a human-readable web page with information about
	/// the error.
	pub error_uri: Option<String>,
}

impl ErrorResponse {
	pub fn new(error: String, error_description: Option<String>, error_uri: Option<String>) -> Self {
		Self {
			error,
			error_description,
			error_uri,
		}
	}
}

impl fmt::Display for ErrorResponse {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.error)?;

		if let Some(description) = &self.error_description {
			write!(f, " ({description})")?;
		}

		Ok(())
	}
}
