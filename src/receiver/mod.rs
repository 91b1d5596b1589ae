//! Interactive authorization step.
//!
//! A [`AuthorizationCodeReceiver`] sends the user to the authorization URI
//! and waits for the provider's redirect. Receivers are registered per
//! [`AuthorizationMode`] in a [`ReceiverRegistry`] handed to the
//! interceptor.
use std::{collections::HashMap, fmt, future::Future, sync::Arc};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::{
	client::OAuthClientError,
	endpoints::authorization::{AuthorizationRequest, AuthorizationResponse},
	settings::{AuthorizationMode, OAuthSettings},
	util::cancellable,
};

#[cfg(feature = "axum")]
pub mod loopback;

/// Obtains the authorization response for one interactive grant.
///
/// Implementations should honour `cancel`, but the registry abandons the
/// wait on cancellation anyway.
#[async_trait]
pub trait AuthorizationCodeReceiver: Send + Sync {
	async fn receive_code(
		&self,
		request: &AuthorizationRequest,
		settings: &OAuthSettings,
		cancel: &CancellationToken,
	) -> Result<AuthorizationResponse, OAuthClientError>;
}

/// Receiver backed by an async function, typically a dialog asking the user
/// to paste the code (out-of-band mode).
pub struct FnReceiver<F>(pub F);

#[async_trait]
impl<F, Fut> AuthorizationCodeReceiver for FnReceiver<F>
where
	F: Fn(AuthorizationRequest) -> Fut + Send + Sync,
	Fut: Future<Output = Result<AuthorizationResponse, OAuthClientError>> + Send,
{
	async fn receive_code(
		&self,
		request: &AuthorizationRequest,
		_settings: &OAuthSettings,
		_cancel: &CancellationToken,
	) -> Result<AuthorizationResponse, OAuthClientError> {
		(self.0)(request.clone()).await
	}
}

/// Receivers indexed by authorization mode.
#[derive(Clone, Default)]
pub struct ReceiverRegistry {
	receivers: HashMap<AuthorizationMode, Arc<dyn AuthorizationCodeReceiver>>,
}

impl ReceiverRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_receiver(
		mut self,
		mode: AuthorizationMode,
		receiver: Arc<dyn AuthorizationCodeReceiver>,
	) -> Self {
		self.register(mode, receiver);
		self
	}

	/// Registers `receiver` for `mode`, returning the one it replaces.
	pub fn register(
		&mut self,
		mode: AuthorizationMode,
		receiver: Arc<dyn AuthorizationCodeReceiver>,
	) -> Option<Arc<dyn AuthorizationCodeReceiver>> {
		self.receivers.insert(mode, receiver)
	}

	pub fn contains(&self, mode: AuthorizationMode) -> bool {
		self.receivers.contains_key(&mode)
	}

	pub fn get(&self, mode: AuthorizationMode) -> Option<&Arc<dyn AuthorizationCodeReceiver>> {
		self.receivers.get(&mode)
	}

	/// Runs the receiver registered for the request's mode.
	pub async fn receive_code(
		&self,
		request: &AuthorizationRequest,
		settings: &OAuthSettings,
		cancel: &CancellationToken,
	) -> Result<AuthorizationResponse, OAuthClientError> {
		let receiver = self.get(request.mode).ok_or_else(|| {
			OAuthClientError::configuration(format!(
				"no code receiver registered for {:?} authorization",
				request.mode
			))
		})?;

		log::info!("waiting for user authorization ({:?})", request.mode);
		cancellable(cancel, receiver.receive_code(request, settings, cancel)).await?
	}
}

impl fmt::Debug for ReceiverRegistry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_set().entries(self.receivers.keys()).finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_support::{ScriptedReceiver, oauth2_settings};

	fn request(mode: AuthorizationMode) -> AuthorizationRequest {
		let settings = oauth2_settings().with_authorize_mode(mode);
		AuthorizationRequest::code_grant(&settings, None, None).unwrap()
	}

	#[tokio::test]
	async fn dispatches_by_mode() {
		let local = Arc::new(ScriptedReceiver::code("local"));
		let oob = Arc::new(ScriptedReceiver::code("oob"));
		let registry = ReceiverRegistry::new()
			.with_receiver(AuthorizationMode::LocalServer, local.clone())
			.with_receiver(AuthorizationMode::OutOfBand, oob.clone());

		let response = registry
			.receive_code(
				&request(AuthorizationMode::OutOfBand),
				&oauth2_settings(),
				&CancellationToken::new(),
			)
			.await
			.unwrap();

		assert_eq!(response.code(), Some("oob"));
		assert_eq!(oob.calls(), 1);
		assert_eq!(local.calls(), 0);
		assert!(!registry.contains(AuthorizationMode::EmbeddedBrowser));
	}

	#[tokio::test]
	async fn unregistered_mode_is_a_configuration_error() {
		let result = ReceiverRegistry::new()
			.receive_code(
				&request(AuthorizationMode::EmbeddedBrowser),
				&oauth2_settings(),
				&CancellationToken::new(),
			)
			.await;
		assert!(matches!(result, Err(OAuthClientError::Configuration(_))));
	}

	#[tokio::test]
	async fn cancellation_abandons_a_receiver_ignoring_the_token() {
		let registry = ReceiverRegistry::new().with_receiver(
			AuthorizationMode::LocalServer,
			Arc::new(ScriptedReceiver::hanging()),
		);

		let request = request(AuthorizationMode::LocalServer);
		let settings = oauth2_settings();
		let cancel = CancellationToken::new();
		let wait = registry.receive_code(&request, &settings, &cancel);
		let (result, ()) = tokio::join!(wait, async { cancel.cancel() });

		assert!(matches!(result, Err(OAuthClientError::Cancelled)));
	}

	#[tokio::test]
	async fn function_receiver() {
		let registry = ReceiverRegistry::new().with_receiver(
			AuthorizationMode::OutOfBand,
			Arc::new(FnReceiver(|request: AuthorizationRequest| async move {
				Ok::<_, OAuthClientError>(AuthorizationResponse::from_query(&format!(
					"code=typed&state={}",
					request.state.as_ref().map(|s| s.as_str()).unwrap_or_default()
				)))
			})),
		);

		let response = registry
			.receive_code(
				&request(AuthorizationMode::OutOfBand),
				&oauth2_settings(),
				&CancellationToken::new(),
			)
			.await
			.unwrap();
		assert_eq!(response.code(), Some("typed"));
		assert_eq!(format!("{registry:?}"), "{OutOfBand}");
	}
}
