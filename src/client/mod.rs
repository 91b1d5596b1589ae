//! Client error taxonomy.
use crate::endpoints::ErrorResponse;

/// Error returned by every fallible operation of this crate.
///
/// The variants separate failures a caller may want to react to
/// differently: a misconfigured client, a user who declined the grant, a
/// provider rejecting a request, or a plain transport failure.
#[derive(Debug, thiserror::Error)]
pub enum OAuthClientError {
	#[error("unable to send request: {0}")]
	Request(String),

	#[error("unable to receive response: {0}")]
	Response(String),

	#[error("server responded with status code: {0}")]
	ServerError(http::StatusCode),

	/// Missing or inconsistent settings. Never retried.
	#[error("invalid configuration: {0}")]
	Configuration(String),

	/// The operation was abandoned through its cancellation token.
	#[error("authorization cancelled")]
	Cancelled,

	/// The resource owner declined the authorization request.
	#[error("authorization denied{}", suffix(.description))]
	AccessDenied { description: Option<String> },

	/// The provider answered with an OAuth error other than `invalid_grant`.
	#[error("provider error: {0}")]
	Provider(ErrorResponse),

	/// The access token is still invalid after the whole protocol ran.
	#[error("authentication failed")]
	AuthenticationFailed,
}

impl OAuthClientError {
	pub fn request(e: impl ToString) -> Self {
		let msg = e.to_string();
		log::error!("request error: {msg}");
		Self::Request(msg)
	}

	pub fn response(e: impl ToString) -> Self {
		let msg = e.to_string();
		log::error!("response error: {msg}");
		Self::Response(msg)
	}

	pub fn server(status: http::StatusCode) -> Self {
		log::error!("unexpected server response status: {status}");
		Self::ServerError(status)
	}

	pub fn configuration(e: impl ToString) -> Self {
		let msg = e.to_string();
		log::error!("configuration error: {msg}");
		Self::Configuration(msg)
	}

	pub fn provider(error: ErrorResponse) -> Self {
		log::error!("provider error: {error}");
		Self::Provider(error)
	}

	/// Whether the failure came from the user or caller giving up rather than
	/// from the network or the provider.
	pub fn is_cancelled_or_denied(&self) -> bool {
		matches!(self, Self::Cancelled | Self::AccessDenied { .. })
	}
}

fn suffix(description: &Option<String>) -> String {
	description
		.as_deref()
		.map(|d| format!(": {d}"))
		.unwrap_or_default()
}
