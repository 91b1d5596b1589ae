//! Loopback redirect listener.
//!
//! Serves the path of the redirect URI on its host and port, and resolves
//! with the query of the first request it receives.
use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use axum::{Router, extract::RawQuery, response::Html, routing::get};
use iref::Uri;
use tokio::{
	net::TcpListener,
	sync::{Mutex, oneshot},
};
use tokio_util::sync::CancellationToken;

use crate::{
	client::OAuthClientError,
	endpoints::authorization::{AuthorizationRequest, AuthorizationResponse},
	receiver::AuthorizationCodeReceiver,
	settings::OAuthSettings,
};

/// How long the user is given to complete the authorization.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

const SUCCESS_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Authorization complete</title></head>
<body style="font-family: system-ui; text-align: center; padding-top: 80px;">
<h2>Authorization complete</h2>
<p>You can close this tab and return to the application.</p>
</body>
</html>"#;

const FAILURE_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Authorization failed</title></head>
<body style="font-family: system-ui; text-align: center; padding-top: 80px;">
<h2>Authorization failed</h2>
<p>You can close this tab and return to the application.</p>
</body>
</html>"#;

type Launcher = Arc<dyn Fn(&str) + Send + Sync>;

/// Receiver for [`AuthorizationMode::LocalServer`](crate::settings::AuthorizationMode::LocalServer).
#[derive(Clone)]
pub struct LoopbackReceiver {
	timeout: Duration,
	launcher: Option<Launcher>,
}

impl Default for LoopbackReceiver {
	fn default() -> Self {
		Self {
			timeout: DEFAULT_TIMEOUT,
			launcher: None,
		}
	}
}

impl LoopbackReceiver {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_timeout(self, timeout: Duration) -> Self {
		Self { timeout, ..self }
	}

	/// Called with the authorization URI once the listener accepts
	/// connections, typically to open it in a browser. Without a launcher
	/// the URI is logged.
	pub fn with_launcher(self, launcher: impl Fn(&str) + Send + Sync + 'static) -> Self {
		Self {
			launcher: Some(Arc::new(launcher)),
			..self
		}
	}
}

/// Host, port and path the listener must serve.
fn redirect_target(redirect_uri: &Uri) -> Result<(String, u16, String), OAuthClientError> {
	let uri: http::Uri = redirect_uri
		.as_str()
		.parse()
		.map_err(|e| OAuthClientError::configuration(format!("invalid redirect URI: {e}")))?;

	let host = uri
		.host()
		.ok_or_else(|| OAuthClientError::configuration("redirect URI has no host"))?
		.trim_start_matches('[')
		.trim_end_matches(']')
		.to_owned();

	let port = uri.port_u16().unwrap_or(match uri.scheme_str() {
		Some("https") => 443,
		_ => 80,
	});

	Ok((host, port, uri.path().to_owned()))
}

#[async_trait]
impl AuthorizationCodeReceiver for LoopbackReceiver {
	async fn receive_code(
		&self,
		request: &AuthorizationRequest,
		_settings: &OAuthSettings,
		cancel: &CancellationToken,
	) -> Result<AuthorizationResponse, OAuthClientError> {
		let (host, port, path) = redirect_target(&request.redirect_uri)?;
		let listener = TcpListener::bind((host.as_str(), port))
			.await
			.map_err(|e| OAuthClientError::request(format!("unable to listen on {host}:{port}: {e}")))?;

		let (tx, rx) = oneshot::channel::<AuthorizationResponse>();
		let tx = Arc::new(Mutex::new(Some(tx)));

		let app = Router::new().route(
			&path,
			get(move |RawQuery(query): RawQuery| {
				let tx = tx.clone();
				async move {
					let response = AuthorizationResponse::from_query(query.as_deref().unwrap_or_default());
					let failed = response.check_error().is_err();

					if let Some(sender) = tx.lock().await.take() {
						let _ = sender.send(response);
					}

					Html(if failed { FAILURE_PAGE } else { SUCCESS_PAGE })
				}
			}),
		);

		// Cancelled when this function returns, whatever the outcome.
		let shutdown = cancel.child_token();
		let _shutdown_guard = shutdown.clone().drop_guard();

		tokio::spawn(async move {
			let server = axum::serve(listener, app)
				.with_graceful_shutdown(async move { shutdown.cancelled().await });

			if let Err(e) = server.await {
				log::warn!("loopback listener failed: {e}");
			}
		});

		log::debug!("listening for the authorization redirect on {host}:{port}{path}");
		match &self.launcher {
			Some(launcher) => launcher(request.uri.as_str()),
			None => log::info!("open {} to authorize the client", request.uri),
		}

		tokio::select! {
			response = rx => response.map_err(|_| {
				OAuthClientError::response("loopback listener stopped before the redirect")
			}),
			_ = cancel.cancelled() => Err(OAuthClientError::Cancelled),
			_ = tokio::time::sleep(self.timeout) => Err(OAuthClientError::response(
				"timed out waiting for the authorization redirect",
			)),
		}
	}
}
