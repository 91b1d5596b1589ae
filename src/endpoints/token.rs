//! Token endpoint: authorization code exchange and refresh.
//!
//! See: <https://datatracker.ietf.org/doc/html/rfc6749#section-4.1.3>
use std::collections::BTreeMap;

use chrono::{DateTime, TimeDelta, Utc};
use http::header;
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, PickFirst, serde_as, skip_serializing_none};
use tokio_util::sync::CancellationToken;

use crate::{
	AccessTokenBuf, Code,
	client::OAuthClientError,
	endpoints::{ErrorResponse, INVALID_GRANT},
	ext::pkce::PkceCodeVerifier,
	settings::OAuthSettings,
	transport::{
		APPLICATION_JSON, APPLICATION_X_WWW_FORM_URLENCODED, ContentType, HttpClient,
		WwwFormUrlEncoded, decode_form, has_content_type,
	},
	util::cancellable,
};

/// Decoded answer of a token endpoint, successful or not.
///
/// OAuth 2.0 providers answer in JSON, OAuth 1.0a providers with a
/// form-urlencoded body whose `oauth_*` names are mapped onto the same
/// fields (see [`Self::from_form_pairs`]).
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExchangeResponse {
	pub access_token: Option<AccessTokenBuf>,

	pub token_type: Option<String>,

	pub refresh_token: Option<String>,

	/// Lifetime of the access token, in seconds. Some providers send it as a
	/// string.
	#[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
	pub expires_in: Option<i64>,

	pub scope: Option<String>,

	pub error: Option<String>,

	pub error_description: Option<String>,

	pub error_uri: Option<String>,

	/// OAuth 1.0a token secret (`oauth_token_secret`).
	pub token_secret: Option<String>,

	/// When the response was decoded. Expiry times are computed from it.
	#[serde(skip, default = "Utc::now")]
	pub received_at: DateTime<Utc>,
}

impl Default for ExchangeResponse {
	fn default() -> Self {
		Self {
			access_token: None,
			token_type: None,
			refresh_token: None,
			expires_in: None,
			scope: None,
			error: None,
			error_description: None,
			error_uri: None,
			token_secret: None,
			received_at: Utc::now(),
		}
	}
}

impl ExchangeResponse {
	/// Absolute expiry of the access token, when the provider gave a
	/// positive lifetime.
	pub fn expires_at(&self) -> Option<DateTime<Utc>> {
		self.expires_in
			.filter(|secs| *secs > 0)
			.and_then(TimeDelta::try_seconds)
			.and_then(|delta| self.received_at.checked_add_signed(delta))
	}

	pub fn has_error(&self) -> bool {
		self.error.as_deref().is_some_and(|e| !e.is_empty())
	}

	pub fn is_invalid_grant(&self) -> bool {
		self.error.as_deref() == Some(INVALID_GRANT)
	}

	/// The provider error carried by this response, if any.
	pub fn error_response(&self) -> Option<ErrorResponse> {
		self.has_error().then(|| {
			ErrorResponse::new(
				self.error.clone().unwrap_or_default(),
				self.error_description.clone(),
				self.error_uri.clone(),
			)
		})
	}

	/// Builds a response from form-urlencoded pairs.
	///
	/// Both the OAuth 2.0 names and the OAuth 1.0a ones are understood:
	///
	/// | OAuth 1.0a             | field               |
	/// |------------------------|---------------------|
	/// | `oauth_token`          | `access_token`      |
	/// | `oauth_token_secret`   | `token_secret`      |
	/// | `oauth_expires_in`     | `expires_in`        |
	/// | `oauth_problem`        | `error`             |
	/// | `oauth_problem_advice` | `error_description` |
	///
	/// Empty values are ignored.
	pub fn from_form_pairs(
		pairs: impl IntoIterator<Item = (String, String)>,
	) -> Result<Self, OAuthClientError> {
		let mut response = Self::default();

		for (key, value) in pairs {
			if value.is_empty() {
				continue;
			}

			match key.as_str() {
				"access_token" | "oauth_token" => {
					response.access_token =
						Some(AccessTokenBuf::new(value).map_err(|_| {
							OAuthClientError::response("invalid access token")
						})?)
				}
				"token_type" => response.token_type = Some(value),
				"refresh_token" => response.refresh_token = Some(value),
				"expires_in" | "oauth_expires_in" => {
					response.expires_in = Some(value.parse().map_err(|_| {
						OAuthClientError::response(format!("invalid `{key}` value: {value}"))
					})?)
				}
				"scope" => response.scope = Some(value),
				"error" | "oauth_problem" => response.error = Some(value),
				"error_description" | "oauth_problem_advice" => {
					response.error_description = Some(value)
				}
				"error_uri" => response.error_uri = Some(value),
				"oauth_token_secret" => response.token_secret = Some(value),
				_ => (),
			}
		}

		Ok(response)
	}

	/// Decodes a token endpoint response, JSON or form-urlencoded depending
	/// on its content type.
	pub fn decode(response: http::Response<Vec<u8>>) -> Result<Self, OAuthClientError> {
		if has_content_type(response.headers(), &APPLICATION_X_WWW_FORM_URLENCODED) {
			return Self::decode_form(response);
		}

		let parsed =
			serde_json::from_slice::<Self>(response.body()).map_err(OAuthClientError::response);
		check_status(response.status(), parsed)
	}

	/// Decodes a form-urlencoded token endpoint response regardless of its
	/// content type. OAuth 1.0a providers frequently label it `text/plain`.
	pub fn decode_form(response: http::Response<Vec<u8>>) -> Result<Self, OAuthClientError> {
		let parsed = Self::from_form_pairs(decode_form(response.body()));
		check_status(response.status(), parsed)
	}
}

/// A response carrying an `error` is handed back whatever the status, so
/// the caller can apply the `invalid_grant` rules.
fn check_status(
	status: http::StatusCode,
	parsed: Result<ExchangeResponse, OAuthClientError>,
) -> Result<ExchangeResponse, OAuthClientError> {
	match parsed {
		Ok(response) if response.has_error() => {
			log::debug!("token endpoint answered {status} with an error body");
			Ok(response)
		}
		_ if !status.is_success() => Err(OAuthClientError::server(status)),
		result => result,
	}
}

/// Authorization code exchange request.
#[skip_serializing_none]
#[derive(Debug, Serialize)]
#[serde(tag = "grant_type", rename = "authorization_code")]
struct AuthorizationCodeRequest<'a> {
	code: &'a str,
	client_id: &'a str,
	client_secret: Option<&'a str>,
	redirect_uri: &'a str,
	code_verifier: Option<&'a str>,

	#[serde(flatten)]
	additional_attributes: &'a BTreeMap<String, String>,
}

/// Refresh token request.
///
/// See: <https://datatracker.ietf.org/doc/html/rfc6749#section-6>
#[skip_serializing_none]
#[derive(Debug, Serialize)]
#[serde(tag = "grant_type", rename = "refresh_token")]
struct RefreshTokenRequest<'a> {
	refresh_token: &'a str,
	client_id: &'a str,
	client_secret: Option<&'a str>,

	#[serde(flatten)]
	additional_attributes: &'a BTreeMap<String, String>,
}

/// OAuth 2.0 token endpoint of one provider.
#[derive(Debug, Clone, Copy)]
pub struct TokenEndpoint<'a> {
	pub settings: &'a OAuthSettings,
}

impl<'a> TokenEndpoint<'a> {
	pub fn new(settings: &'a OAuthSettings) -> Self {
		Self { settings }
	}

	/// Exchanges an authorization code for tokens.
	pub async fn exchange_code(
		&self,
		http_client: &impl HttpClient,
		code: &Code,
		pkce_verifier: Option<&PkceCodeVerifier>,
		cancel: &CancellationToken,
	) -> Result<ExchangeResponse, OAuthClientError> {
		log::debug!("exchanging authorization code at {}", self.settings.token_uri);

		let request = self.build_request(&AuthorizationCodeRequest {
			code: code.as_str(),
			client_id: self.settings.client_id.as_str(),
			client_secret: self.settings.client_secret(),
			redirect_uri: self.settings.redirect_uri.as_str(),
			code_verifier: pkce_verifier.map(PkceCodeVerifier::as_str),
			additional_attributes: &self.settings.additional_attributes,
		})?;

		self.send(http_client, request, cancel).await
	}

	/// Obtains a new access token from a refresh token.
	pub async fn refresh(
		&self,
		http_client: &impl HttpClient,
		refresh_token: &str,
		cancel: &CancellationToken,
	) -> Result<ExchangeResponse, OAuthClientError> {
		log::debug!("refreshing access token at {}", self.settings.token_uri);

		let request = self.build_request(&RefreshTokenRequest {
			refresh_token,
			client_id: self.settings.client_id.as_str(),
			client_secret: self.settings.client_secret(),
			additional_attributes: &self.settings.additional_attributes,
		})?;

		self.send(http_client, request, cancel).await
	}

	fn build_request<T: Serialize>(
		&self,
		body: &T,
	) -> Result<http::Request<Vec<u8>>, OAuthClientError> {
		http::Request::builder()
			.method(http::Method::POST)
			.uri(self.settings.token_uri.as_str())
			.header(header::CONTENT_TYPE, WwwFormUrlEncoded::VALUE)
			.header(header::ACCEPT, APPLICATION_JSON)
			.body(WwwFormUrlEncoded::encode(body)?)
			.map_err(OAuthClientError::request)
	}

	async fn send(
		&self,
		http_client: &impl HttpClient,
		request: http::Request<Vec<u8>>,
		cancel: &CancellationToken,
	) -> Result<ExchangeResponse, OAuthClientError> {
		let response = cancellable(cancel, http_client.send(request)).await??;
		ExchangeResponse::decode(response)
	}
}
