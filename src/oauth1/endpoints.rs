//! Temporary credential and token credential requests.
//!
//! See: <https://datatracker.ietf.org/doc/html/rfc5849#section-2>
use http::header;
use tokio_util::sync::CancellationToken;

use crate::{
	client::OAuthClientError,
	endpoints::token::ExchangeResponse,
	oauth1::{OUT_OF_BAND_CALLBACK, OAuthParameters, SignatureEngine},
	settings::{AuthorizationMode, OAuthSettings},
	transport::{ContentType, HttpClient, WwwFormUrlEncoded},
	util::cancellable,
};

/// Obtains temporary credentials (request token and secret).
///
/// The callback is the redirect URI, or `oob` in out-of-band mode. The
/// request carries no body.
pub async fn request_token(
	http_client: &impl HttpClient,
	engine: &SignatureEngine,
	settings: &OAuthSettings,
	cancel: &CancellationToken,
) -> Result<ExchangeResponse, OAuthClientError> {
	let uri = settings
		.request_token_uri
		.as_ref()
		.ok_or_else(|| OAuthClientError::configuration("missing request token URI"))?;

	let callback = match settings.authorize_mode {
		AuthorizationMode::OutOfBand => OUT_OF_BAND_CALLBACK,
		_ => settings.redirect_uri.as_str(),
	};

	log::debug!("requesting temporary credentials at {uri}");
	let params = engine.parameters().with_callback(callback);
	send_signed(http_client, engine, uri.as_str(), Vec::new(), params, None, cancel).await
}

/// Exchanges authorized temporary credentials for token credentials.
pub async fn access_token(
	http_client: &impl HttpClient,
	engine: &SignatureEngine,
	settings: &OAuthSettings,
	request_token: &str,
	request_token_secret: Option<&str>,
	verifier: Option<&str>,
	cancel: &CancellationToken,
) -> Result<ExchangeResponse, OAuthClientError> {
	log::debug!("requesting token credentials at {}", settings.token_uri);
	let body = WwwFormUrlEncoded::encode(&settings.additional_attributes)?;

	let mut params = engine.parameters().with_token(request_token);
	if let Some(verifier) = verifier {
		params = params.with_verifier(verifier);
	}

	send_signed(
		http_client,
		engine,
		settings.token_uri.as_str(),
		body,
		params,
		request_token_secret,
		cancel,
	)
	.await
}

/// Signed form POST; the form `body` takes part in the signature.
async fn send_signed(
	http_client: &impl HttpClient,
	engine: &SignatureEngine,
	uri: &str,
	body: Vec<u8>,
	params: OAuthParameters,
	token_secret: Option<&str>,
	cancel: &CancellationToken,
) -> Result<ExchangeResponse, OAuthClientError> {
	let mut request = http::Request::builder()
		.method(http::Method::POST)
		.uri(uri)
		.header(header::CONTENT_TYPE, WwwFormUrlEncoded::VALUE)
		.body(body)
		.map_err(OAuthClientError::request)?;

	engine.sign(&mut request, &params, token_secret)?;

	let response = cancellable(cancel, http_client.send(request)).await??;
	ExchangeResponse::decode_form(response)
}
