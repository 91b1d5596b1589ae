//! Token lifecycle interceptors.
//!
//! An interceptor wraps an inner [`HttpClient`], makes sure valid
//! credentials exist before every request (running the interactive grant,
//! the code exchange or a refresh as needed), stamps them on the request and
//! forwards it. Interceptors implement [`HttpClient`] themselves, so they
//! can be used wherever a transport is expected.
//!
//! Token acquisition is serialized by a per-interceptor async mutex (the
//! gate): concurrent requests on an expired token cause a single refresh.
use http::header;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::{
	AccessTokenBuf, StateBuf,
	client::OAuthClientError,
	credential::CredentialState,
	endpoints::{authorization::AuthorizationRequest, token::TokenEndpoint},
	ext::pkce::PkceChallenge,
	receiver::ReceiverRegistry,
	settings::OAuthSettings,
	transport::HttpClient,
	util::cancellable,
};

pub mod oauth1;

pub use oauth1::OAuth1Interceptor;

/// Runs `acquire` on a copy of the credentials held behind `gate`.
///
/// The copy replaces the stored credentials once the attempt finishes,
/// unless it was cancelled: a cancelled attempt leaves them exactly as they
/// were.
async fn with_gate<T>(
	gate: &Mutex<CredentialState>,
	cancel: &CancellationToken,
	acquire: impl AsyncFnOnce(&mut CredentialState) -> Result<T, OAuthClientError>,
) -> Result<T, OAuthClientError> {
	let mut guard = cancellable(cancel, gate.lock()).await?;
	let mut working = guard.clone();

	let result = acquire(&mut working).await;

	if matches!(result, Err(OAuthClientError::Cancelled)) {
		log::debug!("token acquisition cancelled, credentials left unchanged");
	} else {
		*guard = working;
	}

	result
}

/// OAuth 2.0 interceptor stamping `Authorization: Bearer` headers.
pub struct OAuth2Interceptor<C> {
	inner: C,
	settings: OAuthSettings,
	receivers: ReceiverRegistry,
	credentials: Mutex<CredentialState>,
}

impl<C> OAuth2Interceptor<C> {
	/// Creates an interceptor with empty credentials.
	///
	/// Fails if the settings are incomplete or if no receiver is registered
	/// for the configured authorization mode.
	pub fn new(
		inner: C,
		settings: OAuthSettings,
		receivers: ReceiverRegistry,
	) -> Result<Self, OAuthClientError> {
		settings.validate_oauth2()?;

		if !receivers.contains(settings.authorize_mode) {
			return Err(OAuthClientError::configuration(format!(
				"no code receiver registered for {:?} authorization",
				settings.authorize_mode
			)));
		}

		Ok(Self {
			inner,
			settings,
			receivers,
			credentials: Mutex::new(CredentialState::new()),
		})
	}

	/// Starts from previously persisted credentials.
	pub fn with_credentials(self, credentials: CredentialState) -> Self {
		Self {
			credentials: Mutex::new(credentials),
			..self
		}
	}

	pub fn inner(&self) -> &C {
		&self.inner
	}

	pub fn settings(&self) -> &OAuthSettings {
		&self.settings
	}

	/// Snapshot of the current credentials, e.g. to persist them.
	pub async fn credentials(&self) -> CredentialState {
		self.credentials.lock().await.clone()
	}

	/// Forgets every credential. The next request runs the full grant.
	pub async fn clear_credentials(&self) {
		self.credentials.lock().await.reset()
	}
}

impl<C: HttpClient> OAuth2Interceptor<C> {
	/// Makes sure a valid access token is available and returns it.
	pub async fn ensure_authenticated(
		&self,
		cancel: &CancellationToken,
	) -> Result<AccessTokenBuf, OAuthClientError> {
		with_gate(&self.credentials, cancel, async |state| {
			self.acquire(state, cancel).await
		})
		.await
	}

	/// Sends `request` with a fresh access token.
	///
	/// The response is returned as is; a `401` is not interpreted.
	pub async fn send_with_cancellation(
		&self,
		mut request: http::Request<Vec<u8>>,
		cancel: &CancellationToken,
	) -> Result<http::Response<Vec<u8>>, OAuthClientError> {
		let token = self.ensure_authenticated(cancel).await?;

		request
			.headers_mut()
			.insert(header::AUTHORIZATION, token.bearer_header()?);

		cancellable(cancel, self.inner.send(request)).await?
	}

	async fn acquire(
		&self,
		state: &mut CredentialState,
		cancel: &CancellationToken,
	) -> Result<AccessTokenBuf, OAuthClientError> {
		if state.access_token().is_none() && state.refresh_token().is_none() {
			self.authorize(state, cancel).await?;
		}

		if state.is_access_token_expired() {
			self.refresh(state, cancel).await?;

			if state.refresh_token().is_none() {
				self.authorize(state, cancel).await?;

				if state.is_access_token_expired() {
					self.refresh(state, cancel).await?;
				}
			}
		}

		if state.is_access_token_expired() {
			log::error!("access token still invalid after authorization");
			return Err(OAuthClientError::AuthenticationFailed);
		}

		state
			.access_token()
			.map(ToOwned::to_owned)
			.ok_or(OAuthClientError::AuthenticationFailed)
	}

	/// Full authorization code grant.
	async fn authorize(
		&self,
		state: &mut CredentialState,
		cancel: &CancellationToken,
	) -> Result<(), OAuthClientError> {
		log::info!("starting authorization code grant");

		let pkce = self.settings.use_pkce.then(PkceChallenge::new_random_sha256);
		let request = AuthorizationRequest::code_grant(
			&self.settings,
			Some(StateBuf::new_random()),
			pkce.as_ref().map(|(challenge, _)| challenge),
		)?;

		let code = self
			.receivers
			.receive_code(&request, &self.settings, cancel)
			.await?
			.into_code(request.state.as_deref())?;
		state.set_pending_code(code.as_str());

		let response = TokenEndpoint::new(&self.settings)
			.exchange_code(
				&self.inner,
				&code,
				pkce.as_ref().map(|(_, verifier)| &**verifier),
				cancel,
			)
			.await?;

		state.apply_exchange(&response)
	}

	async fn refresh(
		&self,
		state: &mut CredentialState,
		cancel: &CancellationToken,
	) -> Result<(), OAuthClientError> {
		let Some(refresh_token) = state.refresh_token().map(ToOwned::to_owned) else {
			log::debug!("no refresh token available");
			return Ok(());
		};

		let response = TokenEndpoint::new(&self.settings)
			.refresh(&self.inner, &refresh_token, cancel)
			.await?;

		state.apply_exchange(&response)
	}
}

impl<C: HttpClient> HttpClient for OAuth2Interceptor<C> {
	async fn send(
		&self,
		request: http::Request<Vec<u8>>,
	) -> Result<http::Response<Vec<u8>>, OAuthClientError> {
		self.send_with_cancellation(request, &CancellationToken::new())
			.await
	}
}

#[cfg(test)]
mod tests {
	use std::sync::{
		Arc,
		atomic::{AtomicBool, AtomicUsize, Ordering},
	};

	use chrono::{DateTime, TimeDelta, Utc};

	use super::*;
	use crate::{
		endpoints::authorization::AuthorizationResponse,
		ext::pkce::{PkceCodeChallengeMethod, PkceCodeVerifier},
		settings::AuthorizationMode,
		test_support::{
			API_URI, MockTransport, RecordedRequest, ScriptedReceiver, api_request, json_response,
			oauth2_settings,
		},
	};

	fn token(value: &str) -> AccessTokenBuf {
		AccessTokenBuf::new(value.to_owned()).unwrap()
	}

	fn registry(receiver: &Arc<ScriptedReceiver>) -> ReceiverRegistry {
		ReceiverRegistry::new().with_receiver(AuthorizationMode::LocalServer, receiver.clone())
	}

	/// Provider issuing `tok-code` for codes and `tok-refresh` for refresh
	/// tokens; the API echoes 200.
	fn provider(request: &RecordedRequest) -> http::Response<Vec<u8>> {
		match request.grant_type().as_deref() {
			Some("authorization_code") => json_response(
				200,
				serde_json::json!({
					"access_token": "tok-code",
					"token_type": "Bearer",
					"expires_in": 3600,
					"refresh_token": "ref-code"
				}),
			),
			Some("refresh_token") => json_response(
				200,
				serde_json::json!({ "access_token": "tok-refresh", "expires_in": 7200 }),
			),
			_ => json_response(200, serde_json::json!({ "ok": true })),
		}
	}

	fn expired(access_token: &str, refresh_token: &str) -> CredentialState {
		CredentialState::with_tokens(
			token(access_token),
			Utc::now() - TimeDelta::seconds(60),
			Some(refresh_token.to_owned()),
		)
	}

	fn assert_close(actual: DateTime<Utc>, expected: DateTime<Utc>) {
		assert!((actual - expected).num_seconds().abs() <= 5, "{actual} != {expected}");
	}

	#[tokio::test]
	async fn first_use_runs_the_grant() {
		let receiver = Arc::new(ScriptedReceiver::code("abc"));
		let interceptor =
			OAuth2Interceptor::new(MockTransport::new(provider), oauth2_settings(), registry(&receiver))
				.unwrap();

		let response = interceptor.send(api_request()).await.unwrap();
		assert_eq!(response.status(), 200);

		let transport = interceptor.inner();
		assert_eq!(receiver.calls(), 1);
		assert_eq!(transport.grant_count("authorization_code"), 1);
		assert_eq!(transport.grant_count("refresh_token"), 0);
		assert_eq!(
			transport.requests_to(API_URI)[0].authorization(),
			Some("Bearer tok-code")
		);

		let credentials = interceptor.credentials().await;
		assert_eq!(credentials.access_token().unwrap().as_str(), "tok-code");
		assert_eq!(credentials.refresh_token(), Some("ref-code"));
		assert_close(
			credentials.access_token_expiry(),
			Utc::now() + TimeDelta::seconds(3600),
		);
		assert!(credentials.pending_code().is_none());

		interceptor.send(api_request()).await.unwrap();
		assert_eq!(receiver.calls(), 1);
		assert_eq!(interceptor.inner().grant_count("authorization_code"), 1);
	}

	#[tokio::test]
	async fn expired_token_is_refreshed() {
		let receiver = Arc::new(ScriptedReceiver::code("abc"));
		let interceptor =
			OAuth2Interceptor::new(MockTransport::new(provider), oauth2_settings(), registry(&receiver))
				.unwrap()
				.with_credentials(expired("tok1", "ref1"));

		interceptor.send(api_request()).await.unwrap();

		let transport = interceptor.inner();
		assert_eq!(receiver.calls(), 0);
		assert_eq!(transport.grant_count("refresh_token"), 1);
		assert_eq!(transport.requests()[0].form()["refresh_token"], "ref1");
		assert_eq!(
			transport.requests_to(API_URI)[0].authorization(),
			Some("Bearer tok-refresh")
		);

		let credentials = interceptor.credentials().await;
		assert_eq!(credentials.refresh_token(), Some("ref1"));
		assert_close(
			credentials.access_token_expiry(),
			Utc::now() + TimeDelta::seconds(7200),
		);
	}

	#[tokio::test]
	async fn invalid_grant_falls_back_to_the_grant() {
		let receiver = Arc::new(ScriptedReceiver::code("abc"));
		let transport = MockTransport::new(|request| match request.grant_type().as_deref() {
			Some("refresh_token") => json_response(400, serde_json::json!({ "error": "invalid_grant" })),
			_ => provider(request),
		});
		let interceptor = OAuth2Interceptor::new(transport, oauth2_settings(), registry(&receiver))
			.unwrap()
			.with_credentials(expired("tok1", "ref1"));

		interceptor.send(api_request()).await.unwrap();

		let transport = interceptor.inner();
		assert_eq!(transport.grant_count("refresh_token"), 1);
		assert_eq!(receiver.calls(), 1);
		assert_eq!(transport.grant_count("authorization_code"), 1);
		assert_eq!(
			transport.requests_to(API_URI)[0].authorization(),
			Some("Bearer tok-code")
		);
		assert_eq!(
			interceptor.credentials().await.refresh_token(),
			Some("ref-code")
		);
	}

	#[tokio::test]
	async fn concurrent_first_requests_share_one_grant() {
		let receiver = Arc::new(ScriptedReceiver::code("abc"));
		let interceptor =
			OAuth2Interceptor::new(MockTransport::new(provider), oauth2_settings(), registry(&receiver))
				.unwrap();

		let responses =
			futures::future::join_all((0..8).map(|_| interceptor.send(api_request()))).await;
		assert!(responses.iter().all(Result::is_ok));

		let transport = interceptor.inner();
		assert_eq!(receiver.calls(), 1);
		assert_eq!(transport.grant_count("authorization_code"), 1);
		assert_eq!(transport.grant_count("refresh_token"), 0);

		let api_requests = transport.requests_to(API_URI);
		assert_eq!(api_requests.len(), 8);
		assert!(
			api_requests
				.iter()
				.all(|r| r.authorization() == Some("Bearer tok-code"))
		);
	}

	#[tokio::test]
	async fn concurrent_requests_share_one_refresh() {
		let receiver = Arc::new(ScriptedReceiver::code("abc"));
		let interceptor =
			OAuth2Interceptor::new(MockTransport::new(provider), oauth2_settings(), registry(&receiver))
				.unwrap()
				.with_credentials(expired("tok1", "ref1"));

		let responses =
			futures::future::join_all((0..8).map(|_| interceptor.send(api_request()))).await;
		assert!(responses.iter().all(Result::is_ok));

		let transport = interceptor.inner();
		assert_eq!(transport.grant_count("refresh_token"), 1);
		assert_eq!(receiver.calls(), 0);

		let api_requests = transport.requests_to(API_URI);
		assert_eq!(api_requests.len(), 8);
		assert!(
			api_requests
				.iter()
				.all(|r| r.authorization() == Some("Bearer tok-refresh"))
		);
	}

	#[tokio::test]
	async fn cancelled_refresh_leaves_credentials_unchanged() {
		let receiver = Arc::new(ScriptedReceiver::code("abc"));
		let interceptor =
			OAuth2Interceptor::new(MockTransport::new(provider), oauth2_settings(), registry(&receiver))
				.unwrap()
				.with_credentials(expired("tok1", "ref1"));
		let before = interceptor.credentials().await;

		interceptor.inner().set_hang(true);
		let cancel = CancellationToken::new();
		let (result, ()) = tokio::join!(
			interceptor.send_with_cancellation(api_request(), &cancel),
			async {
				tokio::task::yield_now().await;
				cancel.cancel()
			}
		);

		assert!(matches!(result, Err(OAuthClientError::Cancelled)));
		assert_eq!(interceptor.inner().grant_count("refresh_token"), 1);
		assert_eq!(interceptor.credentials().await, before);

		interceptor.inner().set_hang(false);
		interceptor.send(api_request()).await.unwrap();
		assert_eq!(
			interceptor.credentials().await.access_token().unwrap().as_str(),
			"tok-refresh"
		);
	}

	#[tokio::test]
	async fn cancelled_grant_leaves_credentials_unchanged() {
		let receiver = Arc::new(ScriptedReceiver::hanging());
		let interceptor =
			OAuth2Interceptor::new(MockTransport::new(provider), oauth2_settings(), registry(&receiver))
				.unwrap();

		let cancel = CancellationToken::new();
		let (result, ()) = tokio::join!(interceptor.ensure_authenticated(&cancel), async {
			cancel.cancel()
		});

		assert!(matches!(result, Err(OAuthClientError::Cancelled)));
		assert_eq!(interceptor.credentials().await, CredentialState::default());
		assert!(interceptor.inner().requests().is_empty());
	}

	#[tokio::test]
	async fn denied_grant_is_reported() {
		let receiver = Arc::new(ScriptedReceiver::denied());
		let interceptor =
			OAuth2Interceptor::new(MockTransport::new(provider), oauth2_settings(), registry(&receiver))
				.unwrap();

		let result = interceptor.send(api_request()).await;
		assert!(matches!(result, Err(OAuthClientError::AccessDenied { .. })));
		assert!(interceptor.inner().requests().is_empty());
	}

	#[tokio::test]
	async fn token_endpoint_failures_are_not_retried() {
		let receiver = Arc::new(ScriptedReceiver::code("abc"));
		let transport = MockTransport::new(|request| match request.grant_type().as_deref() {
			Some("refresh_token") => json_response(503, serde_json::json!({})),
			_ => provider(request),
		});
		let interceptor = OAuth2Interceptor::new(transport, oauth2_settings(), registry(&receiver))
			.unwrap()
			.with_credentials(expired("tok1", "ref1"));

		let result = interceptor.send(api_request()).await;
		assert!(matches!(result, Err(OAuthClientError::ServerError(_))));
		assert_eq!(interceptor.inner().requests().len(), 1);
		assert_eq!(receiver.calls(), 0);
	}

	#[tokio::test]
	async fn provider_errors_are_surfaced() {
		let receiver = Arc::new(ScriptedReceiver::code("abc"));
		let transport = MockTransport::new(|request| match request.grant_type().as_deref() {
			Some("refresh_token") => json_response(
				401,
				serde_json::json!({ "error": "invalid_client", "error_description": "bad secret" }),
			),
			_ => provider(request),
		});
		let interceptor = OAuth2Interceptor::new(transport, oauth2_settings(), registry(&receiver))
			.unwrap()
			.with_credentials(expired("tok1", "ref1"));

		match interceptor.send(api_request()).await {
			Err(OAuthClientError::Provider(error)) => assert_eq!(error.error, "invalid_client"),
			other => panic!("unexpected result: {other:?}"),
		}
		assert_eq!(interceptor.credentials().await.refresh_token(), Some("ref1"));
	}

	#[tokio::test]
	async fn short_lived_tokens_fail_authentication() {
		let receiver = Arc::new(ScriptedReceiver::code("abc"));
		let long_lived = Arc::new(AtomicBool::new(false));
		let transport = MockTransport::new({
			let long_lived = long_lived.clone();
			move |request| {
				if long_lived.load(Ordering::SeqCst) {
					provider(request)
				} else {
					json_response(200, serde_json::json!({ "access_token": "tok1", "expires_in": 5 }))
				}
			}
		});
		let interceptor =
			OAuth2Interceptor::new(transport, oauth2_settings(), registry(&receiver)).unwrap();

		let result = interceptor.send(api_request()).await;
		assert!(matches!(result, Err(OAuthClientError::AuthenticationFailed)));
		assert_eq!(receiver.calls(), 2);
		assert!(interceptor.inner().requests_to(API_URI).is_empty());

		long_lived.store(true, Ordering::SeqCst);
		interceptor.send(api_request()).await.unwrap();
		assert_eq!(receiver.calls(), 3);
		assert_eq!(
			interceptor.inner().requests_to(API_URI)[0].authorization(),
			Some("Bearer tok-code")
		);
	}

	#[tokio::test]
	async fn grant_uses_pkce_and_checks_state() {
		let receiver = Arc::new(ScriptedReceiver::code("abc"));
		let settings = oauth2_settings().with_pkce(true);
		let interceptor =
			OAuth2Interceptor::new(MockTransport::new(provider), settings, registry(&receiver))
				.unwrap();

		interceptor.ensure_authenticated(&CancellationToken::new()).await.unwrap();

		let request = receiver.last_request().unwrap();
		let query = AuthorizationResponse::from_query(request.uri.query().unwrap().as_str());
		assert_eq!(query.state(), request.state.as_ref().map(|s| s.as_str()));
		assert_eq!(query.get("code_challenge_method"), Some("S256"));

		let form = interceptor.inner().requests()[0].form();
		let verifier = PkceCodeVerifier::new(&form["code_verifier"]).unwrap();
		assert_eq!(
			query.get("code_challenge"),
			Some(PkceCodeChallengeMethod::S256.transform(verifier).as_str())
		);
	}

	#[tokio::test]
	async fn mismatched_state_is_rejected() {
		let receiver = Arc::new(ScriptedReceiver::new(|_| {
			Ok(AuthorizationResponse::from_query("code=abc&state=forged"))
		}));
		let interceptor =
			OAuth2Interceptor::new(MockTransport::new(provider), oauth2_settings(), registry(&receiver))
				.unwrap();

		let result = interceptor.send(api_request()).await;
		assert!(matches!(result, Err(OAuthClientError::Response(_))));
		assert!(interceptor.inner().requests().is_empty());
	}

	#[tokio::test]
	async fn cleared_credentials_trigger_a_new_grant() {
		let receiver = Arc::new(ScriptedReceiver::code("abc"));
		let interceptor =
			OAuth2Interceptor::new(MockTransport::new(provider), oauth2_settings(), registry(&receiver))
				.unwrap();

		interceptor.send(api_request()).await.unwrap();
		interceptor.clear_credentials().await;
		interceptor.send(api_request()).await.unwrap();

		assert_eq!(receiver.calls(), 2);
	}

	#[tokio::test]
	async fn construction_checks_the_configuration() {
		let receiver = Arc::new(ScriptedReceiver::code("abc"));

		let result = OAuth2Interceptor::new(
			MockTransport::new(provider),
			oauth2_settings().with_authorize_mode(AuthorizationMode::EmbeddedBrowser),
			registry(&receiver),
		);
		assert!(matches!(result, Err(OAuthClientError::Configuration(_))));

		let mut settings = oauth2_settings();
		settings.client_secret = None;
		let result = OAuth2Interceptor::new(MockTransport::new(provider), settings, registry(&receiver));
		assert!(matches!(result, Err(OAuthClientError::Configuration(_))));
	}

	#[tokio::test]
	async fn interceptors_stack_on_shared_transports() {
		let calls = Arc::new(AtomicUsize::new(0));
		let transport = Arc::new(MockTransport::new({
			let calls = calls.clone();
			move |request| {
				calls.fetch_add(1, Ordering::SeqCst);
				provider(request)
			}
		}));
		let receiver = Arc::new(ScriptedReceiver::code("abc"));
		let interceptor =
			OAuth2Interceptor::new(transport.clone(), oauth2_settings(), registry(&receiver))
				.unwrap();

		interceptor.send(api_request()).await.unwrap();
		assert_eq!(calls.load(Ordering::SeqCst), 2);
		assert_eq!(transport.requests_to(API_URI).len(), 1);
	}
}
