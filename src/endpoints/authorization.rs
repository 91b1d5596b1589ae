//! Authorization endpoint: the request the user is sent to and the
//! parameters the provider redirects back with.
//!
//! See: <https://datatracker.ietf.org/doc/html/rfc6749#section-4.1.1>
use std::collections::BTreeMap;

use iref::UriBuf;
use serde::{Deserialize, Serialize};

use crate::{
	CodeBuf, State, StateBuf,
	client::OAuthClientError,
	endpoints::{ACCESS_DENIED, ErrorResponse},
	ext::pkce::PkceChallenge,
	settings::{AuthorizationMode, OAuthSettings},
	transport::decode_form,
	util::extend_uri_query,
};

/// Everything a code receiver needs to run the interactive step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationRequest {
	/// Receiver that must handle the request.
	pub mode: AuthorizationMode,

	/// Full URI the user must visit, query included.
	pub uri: UriBuf,

	/// Where the provider sends the user back.
	pub redirect_uri: UriBuf,

	/// CSRF state the response must echo (OAuth 2.0 only).
	pub state: Option<StateBuf>,
}

#[derive(Serialize)]
struct CodeGrantQuery<'a> {
	response_type: &'static str,
	client_id: &'a str,
	redirect_uri: &'a str,

	#[serde(skip_serializing_if = "Option::is_none")]
	state: Option<&'a str>,

	#[serde(flatten)]
	pkce: Option<&'a PkceChallenge>,

	#[serde(flatten)]
	additional_attributes: &'a BTreeMap<String, String>,
}

#[derive(Serialize)]
struct TemporaryCredentialsQuery<'a> {
	oauth_token: &'a str,
}

impl AuthorizationRequest {
	/// Builds an OAuth 2.0 authorization code grant request.
	pub fn code_grant(
		settings: &OAuthSettings,
		state: Option<StateBuf>,
		pkce: Option<&PkceChallenge>,
	) -> Result<Self, OAuthClientError> {
		let mut uri = settings.authorization_uri.clone();
		extend_uri_query(
			&mut uri,
			CodeGrantQuery {
				response_type: "code",
				client_id: settings.client_id.as_str(),
				redirect_uri: settings.redirect_uri.as_str(),
				state: state.as_ref().map(|s| s.as_str()),
				pkce,
				additional_attributes: &settings.additional_attributes,
			},
		)?;

		Ok(Self {
			mode: settings.authorize_mode,
			uri,
			redirect_uri: settings.redirect_uri.clone(),
			state,
		})
	}

	/// Builds an OAuth 1.0a resource owner authorization request for the
	/// given temporary credentials.
	///
	/// See: <https://datatracker.ietf.org/doc/html/rfc5849#section-2.2>
	pub fn temporary_credentials(
		settings: &OAuthSettings,
		oauth_token: &str,
	) -> Result<Self, OAuthClientError> {
		let mut uri = settings.authorization_uri.clone();
		extend_uri_query(&mut uri, TemporaryCredentialsQuery { oauth_token })?;

		Ok(Self {
			mode: settings.authorize_mode,
			uri,
			redirect_uri: settings.redirect_uri.clone(),
			state: None,
		})
	}
}

/// Parameters returned by the provider at the end of the interactive step,
/// kept verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthorizationResponse(pub BTreeMap<String, String>);

impl AuthorizationResponse {
	pub fn new(parameters: BTreeMap<String, String>) -> Self {
		Self(parameters)
	}

	/// Parses the query string of a redirect URI. The first occurrence of a
	/// repeated parameter wins.
	pub fn from_query(query: &str) -> Self {
		let mut parameters = BTreeMap::new();

		for (key, value) in decode_form(query.as_bytes()) {
			parameters.entry(key).or_insert(value);
		}

		Self(parameters)
	}

	/// Non-empty value of a parameter.
	pub fn get(&self, key: &str) -> Option<&str> {
		self.0.get(key).map(String::as_str).filter(|v| !v.is_empty())
	}

	pub fn code(&self) -> Option<&str> {
		self.get("code")
	}

	pub fn state(&self) -> Option<&str> {
		self.get("state")
	}

	pub fn error(&self) -> Option<&str> {
		self.get("error")
	}

	pub fn error_description(&self) -> Option<&str> {
		self.get("error_description")
	}

	pub fn oauth_token(&self) -> Option<&str> {
		self.get("oauth_token")
	}

	pub fn oauth_verifier(&self) -> Option<&str> {
		self.get("oauth_verifier")
	}

	/// Turns an `error` parameter into the matching error.
	///
	/// `access_denied` (or the OAuth 1.0a `denied` parameter) is a user
	/// refusal, every other code is a provider error.
	pub fn check_error(&self) -> Result<(), OAuthClientError> {
		if self.get("denied").is_some() {
			log::info!("user denied the authorization request");
			return Err(OAuthClientError::AccessDenied { description: None });
		}

		match self.error() {
			None => Ok(()),
			Some(ACCESS_DENIED) => {
				log::info!("user denied the authorization request");
				Err(OAuthClientError::AccessDenied {
					description: self.error_description().map(ToOwned::to_owned),
				})
			}
			Some(error) => Err(OAuthClientError::provider(ErrorResponse::new(
				error.to_owned(),
				self.error_description().map(ToOwned::to_owned),
				self.get("error_uri").map(ToOwned::to_owned),
			))),
		}
	}

	/// Extracts the authorization code of an OAuth 2.0 grant.
	///
	/// When a state was sent, the response must carry the same one.
	pub fn into_code(self, expected_state: Option<&State>) -> Result<CodeBuf, OAuthClientError> {
		self.check_error()?;

		if let Some(expected) = expected_state {
			if self.state() != Some(expected.as_str()) {
				return Err(OAuthClientError::response(
					"authorization response state does not match the request",
				));
			}
		}

		let code = self
			.0
			.get("code")
			.filter(|c| !c.is_empty())
			.cloned()
			.ok_or_else(|| OAuthClientError::response("missing authorization code"))?;

		CodeBuf::new(code).map_err(|_| OAuthClientError::response("invalid authorization code"))
	}

	/// Extracts the `oauth_verifier` of an OAuth 1.0a authorization.
	///
	/// With `check_verifier`, the verifier is mandatory and the returned
	/// `oauth_token` must be the one that was authorized.
	pub fn into_verifier(
		self,
		oauth_token: &str,
		check_verifier: bool,
	) -> Result<Option<String>, OAuthClientError> {
		self.check_error()?;

		if check_verifier {
			if self.oauth_verifier().is_none() {
				return Err(OAuthClientError::response("missing `oauth_verifier`"));
			}

			if self.oauth_token() != Some(oauth_token) {
				return Err(OAuthClientError::response(
					"authorization response `oauth_token` does not match the request token",
				));
			}
		}

		Ok(self.oauth_verifier().map(ToOwned::to_owned))
	}
}

impl FromIterator<(String, String)> for AuthorizationResponse {
	fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
		Self(iter.into_iter().collect())
	}
}
