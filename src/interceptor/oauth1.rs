//! OAuth 1.0a interceptor.
//!
//! Token credentials are obtained once through the three-legged flow
//! (temporary credentials, user authorization, token credentials) and every
//! request is then signed with them.
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use super::with_gate;
use crate::{
	client::OAuthClientError,
	credential::CredentialState,
	endpoints::authorization::AuthorizationRequest,
	oauth1::{SignatureEngine, endpoints},
	receiver::ReceiverRegistry,
	settings::OAuthSettings,
	transport::HttpClient,
	util::cancellable,
};

pub struct OAuth1Interceptor<C> {
	inner: C,
	settings: OAuthSettings,
	engine: SignatureEngine,
	receivers: ReceiverRegistry,
	credentials: Mutex<CredentialState>,
}

impl<C> OAuth1Interceptor<C> {
	/// Creates an interceptor with empty credentials.
	///
	/// Fails if the consumer settings are incomplete, if the signing key
	/// cannot be loaded, or if no receiver is registered for the configured
	/// authorization mode.
	pub fn new(
		inner: C,
		settings: OAuthSettings,
		receivers: ReceiverRegistry,
	) -> Result<Self, OAuthClientError> {
		settings.validate_oauth1()?;
		let engine = SignatureEngine::from_settings(&settings)?;

		if !receivers.contains(settings.authorize_mode) {
			return Err(OAuthClientError::configuration(format!(
				"no code receiver registered for {:?} authorization",
				settings.authorize_mode
			)));
		}

		Ok(Self {
			inner,
			settings,
			engine,
			receivers,
			credentials: Mutex::new(CredentialState::new()),
		})
	}

	/// Starts from previously issued token credentials.
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

	pub fn engine(&self) -> &SignatureEngine {
		&self.engine
	}

	pub async fn credentials(&self) -> CredentialState {
		self.credentials.lock().await.clone()
	}

	pub async fn clear_credentials(&self) {
		self.credentials.lock().await.reset()
	}
}

impl<C: HttpClient> OAuth1Interceptor<C> {
	/// Makes sure token credentials are available and returns them.
	pub async fn ensure_authenticated(
		&self,
		cancel: &CancellationToken,
	) -> Result<CredentialState, OAuthClientError> {
		with_gate(&self.credentials, cancel, async |state| {
			if state.access_token().is_none() {
				self.authorize(state, cancel).await?;
			}

			Ok(state.clone())
		})
		.await
	}

	/// Signs `request` with the token credentials and sends it.
	pub async fn send_with_cancellation(
		&self,
		mut request: http::Request<Vec<u8>>,
		cancel: &CancellationToken,
	) -> Result<http::Response<Vec<u8>>, OAuthClientError> {
		let credentials = self.ensure_authenticated(cancel).await?;
		let token = credentials
			.access_token()
			.ok_or(OAuthClientError::AuthenticationFailed)?;

		let params = self.engine.parameters().with_token(token.as_str());
		self.engine
			.sign(&mut request, &params, credentials.token_secret())?;

		cancellable(cancel, self.inner.send(request)).await?
	}

	async fn authorize(
		&self,
		state: &mut CredentialState,
		cancel: &CancellationToken,
	) -> Result<(), OAuthClientError> {
		log::info!("starting OAuth 1.0a authorization");

		let temporary =
			endpoints::request_token(&self.inner, &self.engine, &self.settings, cancel).await?;
		if let Some(error) = temporary.error_response() {
			return Err(OAuthClientError::provider(error));
		}

		let request_token = temporary
			.access_token
			.as_ref()
			.ok_or_else(|| OAuthClientError::response("temporary credentials carry no token"))?
			.as_str();

		let request = AuthorizationRequest::temporary_credentials(&self.settings, request_token)?;
		let verifier = self
			.receivers
			.receive_code(&request, &self.settings, cancel)
			.await?
			.into_verifier(request_token, self.settings.check_verifier)?;

		if let Some(verifier) = &verifier {
			state.set_pending_code(verifier.as_str());
		}

		let response = endpoints::access_token(
			&self.inner,
			&self.engine,
			&self.settings,
			request_token,
			temporary.token_secret.as_deref(),
			verifier.as_deref(),
			cancel,
		)
		.await?;

		state.apply_exchange(&response)
	}
}

impl<C: HttpClient> HttpClient for OAuth1Interceptor<C> {
	async fn send(
		&self,
		request: http::Request<Vec<u8>>,
	) -> Result<http::Response<Vec<u8>>, OAuthClientError> {
		self.send_with_cancellation(request, &CancellationToken::new())
			.await
	}
}
