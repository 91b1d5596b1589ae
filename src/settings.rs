//! Provider configuration.
use std::collections::BTreeMap;

use iref::UriBuf;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

use crate::{ClientIdBuf, client::OAuthClientError};

/// Strategy used to send the user through the interactive grant.
///
/// Each mode is served by the
/// [`AuthorizationCodeReceiver`](crate::receiver::AuthorizationCodeReceiver)
/// registered for it in the
/// [`ReceiverRegistry`](crate::receiver::ReceiverRegistry).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationMode {
	/// A loopback HTTP listener receives the redirect.
	#[default]
	LocalServer,

	/// An embedded browser captures the redirect.
	EmbeddedBrowser,

	/// The user copies the code back by hand.
	OutOfBand,
}

/// OAuth 1.0a signature method.
///
/// See: <https://datatracker.ietf.org/doc/html/rfc5849#section-3.4>
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SignatureMethod {
	#[default]
	#[serde(rename = "HMAC-SHA1")]
	HmacSha1,

	#[serde(rename = "HMAC-SHA256")]
	HmacSha256,

	/// Requires the `rsa` feature and [`OAuthSettings::rsa_private_key`].
	#[serde(rename = "RSA-SHA1")]
	RsaSha1,

	#[serde(rename = "PLAINTEXT")]
	Plaintext,
}

impl SignatureMethod {
	/// Value of the `oauth_signature_method` parameter.
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::HmacSha1 => "HMAC-SHA1",
			Self::HmacSha256 => "HMAC-SHA256",
			Self::RsaSha1 => "RSA-SHA1",
			Self::Plaintext => "PLAINTEXT",
		}
	}
}

/// Configuration of one provider.
///
/// Owned by exactly one interceptor. Settings deserialize from the usual
/// configuration formats; optional fields default to the most common
/// provider behavior.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthSettings {
	/// Client identifier (OAuth 1.0a consumer key).
	pub client_id: ClientIdBuf,

	/// Client secret (OAuth 1.0a consumer secret).
	pub client_secret: Option<String>,

	/// Endpoint the user is sent to in order to authorize the client.
	pub authorization_uri: UriBuf,

	/// Token endpoint (OAuth 1.0a access token endpoint).
	pub token_uri: UriBuf,

	/// OAuth 1.0a temporary credential (request token) endpoint.
	pub request_token_uri: Option<UriBuf>,

	/// Where the provider redirects the user after the grant.
	pub redirect_uri: UriBuf,

	#[serde(default)]
	pub authorize_mode: AuthorizationMode,

	/// Provider specific parameters (e.g. `scope`), added to the
	/// authorization request and to every token endpoint request.
	#[serde(default)]
	pub additional_attributes: BTreeMap<String, String>,

	/// OAuth 1.0a: require an `oauth_verifier` and a matching `oauth_token`
	/// in the authorization response.
	#[serde(default)]
	pub check_verifier: bool,

	#[serde(default)]
	pub signature_method: SignatureMethod,

	/// PEM encoded RSA private key (PKCS#8 or PKCS#1), used by
	/// [`SignatureMethod::RsaSha1`].
	pub rsa_private_key: Option<String>,

	/// Protect the OAuth 2.0 code grant with PKCE (S256).
	#[serde(default)]
	pub use_pkce: bool,
}

impl OAuthSettings {
	pub fn new(
		client_id: ClientIdBuf,
		authorization_uri: UriBuf,
		token_uri: UriBuf,
		redirect_uri: UriBuf,
	) -> Self {
		Self {
			client_id,
			client_secret: None,
			authorization_uri,
			token_uri,
			request_token_uri: None,
			redirect_uri,
			authorize_mode: AuthorizationMode::default(),
			additional_attributes: BTreeMap::new(),
			check_verifier: false,
			signature_method: SignatureMethod::default(),
			rsa_private_key: None,
			use_pkce: false,
		}
	}

	pub fn with_client_secret(self, client_secret: impl Into<String>) -> Self {
		Self {
			client_secret: Some(client_secret.into()),
			..self
		}
	}

	pub fn with_request_token_uri(self, request_token_uri: UriBuf) -> Self {
		Self {
			request_token_uri: Some(request_token_uri),
			..self
		}
	}

	pub fn with_authorize_mode(self, authorize_mode: AuthorizationMode) -> Self {
		Self {
			authorize_mode,
			..self
		}
	}

	pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.additional_attributes.insert(key.into(), value.into());
		self
	}

	pub fn with_check_verifier(self, check_verifier: bool) -> Self {
		Self {
			check_verifier,
			..self
		}
	}

	pub fn with_signature_method(self, signature_method: SignatureMethod) -> Self {
		Self {
			signature_method,
			..self
		}
	}

	pub fn with_rsa_private_key(self, pem: impl Into<String>) -> Self {
		Self {
			rsa_private_key: Some(pem.into()),
			..self
		}
	}

	pub fn with_pkce(self, use_pkce: bool) -> Self {
		Self { use_pkce, ..self }
	}

	/// Client secret, ignoring empty values.
	pub fn client_secret(&self) -> Option<&str> {
		self.client_secret.as_deref().filter(|s| !s.is_empty())
	}

	/// Checks the settings needed by the OAuth 2.0 interceptor.
	///
	/// A client secret is required unless PKCE is enabled (public client).
	pub fn validate_oauth2(&self) -> Result<(), OAuthClientError> {
		self.validate_common()?;

		if self.client_secret().is_none() && !self.use_pkce {
			return Err(OAuthClientError::configuration(
				"missing client secret (enable PKCE for public clients)",
			));
		}

		Ok(())
	}

	/// Checks the settings needed by the OAuth 1.0a interceptor.
	pub fn validate_oauth1(&self) -> Result<(), OAuthClientError> {
		self.validate_common()?;

		if self.request_token_uri.is_none() {
			return Err(OAuthClientError::configuration("missing request token URI"));
		}

		match self.signature_method {
			SignatureMethod::RsaSha1 => {
				if self.rsa_private_key.is_none() {
					return Err(OAuthClientError::configuration(
						"RSA-SHA1 signatures need an RSA private key",
					));
				}
			}
			_ => {
				if self.client_secret().is_none() {
					return Err(OAuthClientError::configuration("missing consumer secret"));
				}
			}
		}

		Ok(())
	}

	fn validate_common(&self) -> Result<(), OAuthClientError> {
		if self.client_id.as_str().is_empty() {
			return Err(OAuthClientError::configuration("missing client id"));
		}

		if self.token_uri.as_str().is_empty() {
			return Err(OAuthClientError::configuration("missing token URI"));
		}

		Ok(())
	}
}
