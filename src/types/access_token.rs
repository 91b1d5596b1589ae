use http::HeaderValue;

use crate::client::OAuthClientError;

use super::vschar_string;

vschar_string! {
	/// Access Token.
	///
	/// # Grammar
	///
	/// ```abnf
	/// access-token = 1*VSCHAR
	/// ```
	AccessToken / AccessTokenBuf, allow_empty = false
}

impl AccessToken {
	/// Builds the `Authorization: Bearer <token>` header value.
	///
	/// The value is marked sensitive so it does not show up in debug output
	/// of the request.
	pub fn bearer_header(&self) -> Result<HeaderValue, OAuthClientError> {
		let mut value = HeaderValue::try_from(format!("Bearer {}", self.as_str()))
			.map_err(OAuthClientError::request)?;
		value.set_sensitive(true);
		Ok(value)
	}
}
