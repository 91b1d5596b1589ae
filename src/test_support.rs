//! Fixtures shared by the unit tests.
use std::{
	collections::BTreeMap,
	sync::{
		Mutex,
		atomic::{AtomicBool, AtomicUsize, Ordering},
	},
};

use async_trait::async_trait;
use http::{HeaderMap, header};
use iref::uri;
use tokio_util::sync::CancellationToken;

use crate::{
	ClientIdBuf,
	client::OAuthClientError,
	endpoints::authorization::{AuthorizationRequest, AuthorizationResponse},
	receiver::AuthorizationCodeReceiver,
	settings::OAuthSettings,
	transport::{
		APPLICATION_JSON, APPLICATION_X_WWW_FORM_URLENCODED, HttpClient, decode_form,
	},
};

pub const API_URI: &str = "https://api.example.com/data";

pub fn oauth2_settings() -> OAuthSettings {
	OAuthSettings::new(
		ClientIdBuf::new("client".to_owned()).unwrap(),
		uri!("https://provider.example.com/authorize").to_owned(),
		uri!("https://provider.example.com/token").to_owned(),
		uri!("http://127.0.0.1:8844/callback").to_owned(),
	)
	.with_client_secret("secret")
}

pub fn oauth1_settings() -> OAuthSettings {
	oauth2_settings()
		.with_request_token_uri(uri!("https://provider.example.com/request_token").to_owned())
}

pub fn json_response(status: u16, body: serde_json::Value) -> http::Response<Vec<u8>> {
	http::Response::builder()
		.status(status)
		.header(header::CONTENT_TYPE, APPLICATION_JSON)
		.body(serde_json::to_vec(&body).unwrap())
		.unwrap()
}

pub fn form_response(status: u16, body: &str) -> http::Response<Vec<u8>> {
	http::Response::builder()
		.status(status)
		.header(header::CONTENT_TYPE, APPLICATION_X_WWW_FORM_URLENCODED)
		.body(body.as_bytes().to_vec())
		.unwrap()
}

pub fn api_request() -> http::Request<Vec<u8>> {
	http::Request::builder().uri(API_URI).body(Vec::new()).unwrap()
}

/// Copy of a request seen by [`MockTransport`].
#[derive(Debug, Clone)]
pub struct RecordedRequest {
	pub method: http::Method,
	pub uri: String,
	pub headers: HeaderMap,
	pub body: Vec<u8>,
}

impl RecordedRequest {
	pub fn form(&self) -> BTreeMap<String, String> {
		decode_form(&self.body).into_iter().collect()
	}

	pub fn grant_type(&self) -> Option<String> {
		self.form().remove("grant_type")
	}

	pub fn authorization(&self) -> Option<&str> {
		self.headers
			.get(header::AUTHORIZATION)
			.and_then(|v| v.to_str().ok())
	}
}

type Handler = Box<dyn Fn(&RecordedRequest) -> http::Response<Vec<u8>> + Send + Sync>;

/// Inner transport answering through a handler and recording every request.
pub struct MockTransport {
	handler: Handler,
	requests: Mutex<Vec<RecordedRequest>>,
	hang: AtomicBool,
}

impl MockTransport {
	pub fn new(
		handler: impl Fn(&RecordedRequest) -> http::Response<Vec<u8>> + Send + Sync + 'static,
	) -> Self {
		Self {
			handler: Box::new(handler),
			requests: Mutex::new(Vec::new()),
			hang: AtomicBool::new(false),
		}
	}

	/// While set, requests are recorded but never answered.
	pub fn set_hang(&self, hang: bool) {
		self.hang.store(hang, Ordering::SeqCst)
	}

	pub fn requests(&self) -> Vec<RecordedRequest> {
		self.requests.lock().unwrap().clone()
	}

	pub fn grant_count(&self, grant_type: &str) -> usize {
		self.requests()
			.iter()
			.filter(|r| r.grant_type().as_deref() == Some(grant_type))
			.count()
	}

	pub fn requests_to(&self, uri: &str) -> Vec<RecordedRequest> {
		self.requests()
			.into_iter()
			.filter(|r| r.uri == uri)
			.collect()
	}
}

impl HttpClient for MockTransport {
	async fn send(
		&self,
		request: http::Request<Vec<u8>>,
	) -> Result<http::Response<Vec<u8>>, OAuthClientError> {
		let (parts, body) = request.into_parts();
		let recorded = RecordedRequest {
			method: parts.method,
			uri: parts.uri.to_string(),
			headers: parts.headers,
			body,
		};
		self.requests.lock().unwrap().push(recorded.clone());

		if self.hang.load(Ordering::SeqCst) {
			std::future::pending::<()>().await;
		}

		// Lets concurrent callers interleave.
		tokio::task::yield_now().await;
		Ok((self.handler)(&recorded))
	}
}

type Script =
	Box<dyn Fn(&AuthorizationRequest) -> Result<AuthorizationResponse, OAuthClientError> + Send + Sync>;

/// Code receiver answering through a script.
pub struct ScriptedReceiver {
	script: Script,
	hang: bool,
	calls: AtomicUsize,
	last_request: Mutex<Option<AuthorizationRequest>>,
}

impl ScriptedReceiver {
	pub fn new(
		script: impl Fn(&AuthorizationRequest) -> Result<AuthorizationResponse, OAuthClientError>
		+ Send
		+ Sync
		+ 'static,
	) -> Self {
		Self {
			script: Box::new(script),
			hang: false,
			calls: AtomicUsize::new(0),
			last_request: Mutex::new(None),
		}
	}

	/// Returns `code`, echoing the request state.
	pub fn code(code: &'static str) -> Self {
		Self::new(move |request| {
			let mut parameters = BTreeMap::new();
			parameters.insert("code".to_owned(), code.to_owned());

			if let Some(state) = &request.state {
				parameters.insert("state".to_owned(), state.as_str().to_owned());
			}

			Ok(AuthorizationResponse::new(parameters))
		})
	}

	/// Redirects with `error=access_denied`.
	pub fn denied() -> Self {
		Self::new(|_| Ok(AuthorizationResponse::from_query("error=access_denied")))
	}

	/// Never answers.
	pub fn hanging() -> Self {
		Self {
			hang: true,
			..Self::new(|_| Ok(AuthorizationResponse::default()))
		}
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}

	pub fn last_request(&self) -> Option<AuthorizationRequest> {
		self.last_request.lock().unwrap().clone()
	}
}

#[async_trait]
impl AuthorizationCodeReceiver for ScriptedReceiver {
	async fn receive_code(
		&self,
		request: &AuthorizationRequest,
		_settings: &OAuthSettings,
		_cancel: &CancellationToken,
	) -> Result<AuthorizationResponse, OAuthClientError> {
		self.calls.fetch_add(1, Ordering::SeqCst);
		*self.last_request.lock().unwrap() = Some(request.clone());

		if self.hang {
			std::future::pending::<()>().await;
		}

		(self.script)(request)
	}
}
