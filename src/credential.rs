//! Mutable credential record shared by every request of one interceptor.
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::{
	AccessToken, AccessTokenBuf, client::OAuthClientError, endpoints::token::ExchangeResponse,
};

/// Clock drift and request latency allowance, in seconds, applied when
/// checking the access token expiry.
pub const EXPIRY_SKEW_SECS: i64 = 10;

/// Current credentials of one interceptor.
///
/// Created empty, mutated only by the token acquisition protocol while the
/// interceptor gate is held. Serializable so callers can persist
/// credentials between runs and hand them back with
/// `with_credentials`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialState {
	access_token: Option<AccessTokenBuf>,

	/// [`DateTime::MIN_UTC`] when the expiry was never verified.
	#[serde(default = "unverified_expiry", with = "chrono::serde::ts_seconds")]
	access_token_expiry: DateTime<Utc>,

	refresh_token: Option<String>,

	/// OAuth 1.0a token secret.
	token_secret: Option<String>,

	/// Code or verifier received from the interactive step and not yet
	/// exchanged. Never read by the token protocol; kept so callers can
	/// inspect an interrupted grant. Not persisted.
	#[serde(skip)]
	pending_code: Option<String>,
}

fn unverified_expiry() -> DateTime<Utc> {
	DateTime::<Utc>::MIN_UTC
}

impl Default for CredentialState {
	fn default() -> Self {
		Self {
			access_token: None,
			access_token_expiry: unverified_expiry(),
			refresh_token: None,
			token_secret: None,
			pending_code: None,
		}
	}
}

impl CredentialState {
	pub fn new() -> Self {
		Self::default()
	}

	/// Builds a state from previously issued credentials.
	pub fn with_tokens(
		access_token: AccessTokenBuf,
		access_token_expiry: DateTime<Utc>,
		refresh_token: Option<String>,
	) -> Self {
		Self {
			access_token: Some(access_token),
			access_token_expiry,
			refresh_token: refresh_token.filter(|t| !t.is_empty()),
			..Self::default()
		}
	}

	/// Builds an OAuth 1.0a state from a token and its secret.
	pub fn with_token_secret(access_token: AccessTokenBuf, token_secret: String) -> Self {
		Self {
			access_token: Some(access_token),
			access_token_expiry: DateTime::<Utc>::MAX_UTC,
			token_secret: Some(token_secret),
			..Self::default()
		}
	}

	pub fn access_token(&self) -> Option<&AccessToken> {
		self.access_token.as_deref()
	}

	pub fn access_token_expiry(&self) -> DateTime<Utc> {
		self.access_token_expiry
	}

	pub fn refresh_token(&self) -> Option<&str> {
		self.refresh_token.as_deref()
	}

	pub fn token_secret(&self) -> Option<&str> {
		self.token_secret.as_deref()
	}

	pub fn pending_code(&self) -> Option<&str> {
		self.pending_code.as_deref()
	}

	pub fn set_pending_code(&mut self, code: impl Into<String>) {
		self.pending_code = Some(code.into());
	}

	/// Checks whether the access token must be renewed before use.
	///
	/// Returns `true` when there is no access token, or when it expires within
	/// [`EXPIRY_SKEW_SECS`] seconds.
	///
	/// # Side effect
	///
	/// When the result is `true` the access token is cleared, so a stale
	/// token can never be handed out afterwards. The refresh token is kept.
	pub fn is_access_token_expired(&mut self) -> bool {
		self.is_access_token_expired_at(Utc::now())
	}

	/// Same as [`Self::is_access_token_expired`], evaluated at `now`.
	pub fn is_access_token_expired_at(&mut self, now: DateTime<Utc>) -> bool {
		let expired = self.access_token.is_none()
			|| now
				.checked_add_signed(TimeDelta::seconds(EXPIRY_SKEW_SECS))
				.is_none_or(|deadline| deadline >= self.access_token_expiry);

		if expired && self.access_token.take().is_some() {
			log::debug!("access token expired at {}", self.access_token_expiry);
		}

		expired
	}

	/// Commits the result of a token endpoint call.
	///
	/// - `invalid_grant`: the grant is dead, everything is [reset](Self::reset)
	///   and the call succeeds so the caller can fall back to a full grant.
	/// - any other error: returned as [`OAuthClientError::Provider`], the
	///   state is left untouched.
	/// - success: the access token is replaced; the refresh token and token
	///   secret are replaced only when the response carries one. The expiry
	///   moves to `received_at + expires_in` when `expires_in` is positive.
	///   Without it, a still-future expiry is kept, otherwise the token is
	///   treated as non-expiring.
	pub fn apply_exchange(&mut self, response: &ExchangeResponse) -> Result<(), OAuthClientError> {
		if response.is_invalid_grant() {
			log::warn!("grant rejected by the provider, credentials reset");
			self.reset();
			return Ok(());
		}

		if let Some(error) = response.error_response() {
			return Err(OAuthClientError::provider(error));
		}

		let access_token = response
			.access_token
			.clone()
			.ok_or_else(|| OAuthClientError::response("token response carries no access token"))?;

		self.access_token = Some(access_token);

		if let Some(refresh_token) = response.refresh_token.as_ref().filter(|t| !t.is_empty()) {
			self.refresh_token = Some(refresh_token.clone());
		}

		if let Some(token_secret) = &response.token_secret {
			self.token_secret = Some(token_secret.clone());
		}

		match response.expires_at() {
			Some(expires_at) => self.access_token_expiry = expires_at,
			None if self.access_token_expiry <= response.received_at => {
				self.access_token_expiry = DateTime::<Utc>::MAX_UTC
			}
			None => (),
		}

		self.pending_code = None;
		Ok(())
	}

	/// Forgets every credential, forcing a full grant on the next request.
	pub fn reset(&mut self) {
		*self = Self::default();
	}
}
