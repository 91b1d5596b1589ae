//! OAuth 1.0a signatures.
//!
//! See: <https://datatracker.ietf.org/doc/html/rfc5849#section-3.4>
use std::fmt;

use base64::{Engine, prelude::BASE64_STANDARD};
use hmac::{Hmac, Mac};
use http::{HeaderValue, header};
use sha1::Sha1;
use sha2::Sha256;

use crate::{
	ClientIdBuf,
	client::OAuthClientError,
	oauth1::OAuthParameters,
	settings::{OAuthSettings, SignatureMethod},
	transport::{APPLICATION_X_WWW_FORM_URLENCODED, decode_form, has_content_type},
	util::percent_encode,
};

/// Result of signing a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
	/// Signature base string that was signed.
	pub base_string: String,

	/// `oauth_signature` value.
	pub signature: String,

	/// `Authorization` header set on the request.
	pub header: HeaderValue,
}

/// Signs OAuth 1.0a requests on behalf of one consumer.
pub struct SignatureEngine {
	consumer_key: ClientIdBuf,
	consumer_secret: String,
	method: SignatureMethod,

	#[cfg(feature = "rsa")]
	rsa_key: Option<rsa::pkcs1v15::SigningKey<Sha1>>,
}

impl fmt::Debug for SignatureEngine {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SignatureEngine")
			.field("consumer_key", &self.consumer_key)
			.field("method", &self.method)
			.finish_non_exhaustive()
	}
}

impl SignatureEngine {
	/// Creates an engine for the HMAC and PLAINTEXT methods.
	///
	/// RSA-SHA1 also needs [`Self::with_rsa_private_key_pem`].
	pub fn new(
		consumer_key: ClientIdBuf,
		consumer_secret: impl Into<String>,
		method: SignatureMethod,
	) -> Self {
		Self {
			consumer_key,
			consumer_secret: consumer_secret.into(),
			method,
			#[cfg(feature = "rsa")]
			rsa_key: None,
		}
	}

	/// Creates the engine described by the consumer settings.
	pub fn from_settings(settings: &OAuthSettings) -> Result<Self, OAuthClientError> {
		let engine = Self::new(
			settings.client_id.clone(),
			settings.client_secret().unwrap_or_default(),
			settings.signature_method,
		);

		match (settings.signature_method, &settings.rsa_private_key) {
			(SignatureMethod::RsaSha1, Some(pem)) => engine.with_rsa_private_key_pem(pem),
			(SignatureMethod::RsaSha1, None) => Err(OAuthClientError::configuration(
				"RSA-SHA1 signatures need an RSA private key",
			)),
			_ => Ok(engine),
		}
	}

	/// Loads the RSA-SHA1 signing key from a PKCS#8 or PKCS#1 PEM document.
	#[cfg(feature = "rsa")]
	pub fn with_rsa_private_key_pem(self, pem: &str) -> Result<Self, OAuthClientError> {
		use rsa::{RsaPrivateKey, pkcs1::DecodeRsaPrivateKey, pkcs8::DecodePrivateKey};

		let key = RsaPrivateKey::from_pkcs8_pem(pem)
			.or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
			.map_err(|e| OAuthClientError::configuration(format!("invalid RSA private key: {e}")))?;

		Ok(Self {
			rsa_key: Some(rsa::pkcs1v15::SigningKey::new(key)),
			..self
		})
	}

	#[cfg(not(feature = "rsa"))]
	pub fn with_rsa_private_key_pem(self, _pem: &str) -> Result<Self, OAuthClientError> {
		Err(OAuthClientError::configuration(
			"RSA-SHA1 signatures require the `rsa` feature",
		))
	}

	pub fn method(&self) -> SignatureMethod {
		self.method
	}

	/// Fresh protocol parameters for this consumer.
	pub fn parameters(&self) -> OAuthParameters {
		OAuthParameters::new(&self.consumer_key, self.method)
	}

	/// Builds the signature base string.
	///
	/// `form` holds the fields of a form-urlencoded body, which are signed
	/// along with the protocol and query parameters.
	///
	/// See: <https://datatracker.ietf.org/doc/html/rfc5849#section-3.4.1>
	pub fn signature_base_string(
		method: &http::Method,
		uri: &http::Uri,
		params: &OAuthParameters,
		form: &[(String, String)],
	) -> String {
		let query = uri.query().map(|q| decode_form(q.as_bytes())).unwrap_or_default();

		let mut normalized: Vec<(String, String)> = params
			.pairs()
			.into_iter()
			.map(|(key, value)| (key.to_owned(), value))
			.chain(query)
			.chain(form.iter().cloned())
			.map(|(key, value)| (percent_encode(&key), percent_encode(&value)))
			.collect();

		// Stable: parameters sharing a name keep their relative order.
		normalized.sort_by(|a, b| a.0.cmp(&b.0));

		let normalized = normalized
			.iter()
			.map(|(key, value)| format!("{key}={value}"))
			.collect::<Vec<_>>()
			.join("&");

		format!(
			"{}&{}&{}",
			method.as_str().to_ascii_uppercase(),
			percent_encode(&base_string_uri(uri)),
			percent_encode(&normalized)
		)
	}

	/// `enc(consumer_secret)&enc(token_secret)`.
	pub fn signing_key(&self, token_secret: Option<&str>) -> String {
		format!(
			"{}&{}",
			percent_encode(&self.consumer_secret),
			percent_encode(token_secret.unwrap_or_default())
		)
	}

	/// Signs `base_string` with the configured method.
	pub fn compute_signature(
		&self,
		base_string: &str,
		token_secret: Option<&str>,
	) -> Result<String, OAuthClientError> {
		match self.method {
			SignatureMethod::HmacSha1 => {
				let mut mac = Hmac::<Sha1>::new_from_slice(self.signing_key(token_secret).as_bytes())
					.map_err(OAuthClientError::request)?;
				mac.update(base_string.as_bytes());
				Ok(BASE64_STANDARD.encode(mac.finalize().into_bytes()))
			}
			SignatureMethod::HmacSha256 => {
				let mut mac =
					Hmac::<Sha256>::new_from_slice(self.signing_key(token_secret).as_bytes())
						.map_err(OAuthClientError::request)?;
				mac.update(base_string.as_bytes());
				Ok(BASE64_STANDARD.encode(mac.finalize().into_bytes()))
			}
			SignatureMethod::Plaintext => Ok(self.signing_key(token_secret)),
			SignatureMethod::RsaSha1 => self.rsa_sha1(base_string),
		}
	}

	#[cfg(feature = "rsa")]
	fn rsa_sha1(&self, base_string: &str) -> Result<String, OAuthClientError> {
		use rsa::signature::{SignatureEncoding, Signer};

		let key = self
			.rsa_key
			.as_ref()
			.ok_or_else(|| OAuthClientError::configuration("missing RSA private key"))?;

		let signature = key
			.try_sign(base_string.as_bytes())
			.map_err(OAuthClientError::request)?;

		Ok(BASE64_STANDARD.encode(signature.to_bytes()))
	}

	#[cfg(not(feature = "rsa"))]
	fn rsa_sha1(&self, _base_string: &str) -> Result<String, OAuthClientError> {
		Err(OAuthClientError::configuration(
			"RSA-SHA1 signatures require the `rsa` feature",
		))
	}

	/// Signs `request` and sets its `Authorization` header.
	///
	/// Query parameters and form-urlencoded body fields take part in the
	/// signature but never appear in the header.
	pub fn sign(
		&self,
		request: &mut http::Request<Vec<u8>>,
		params: &OAuthParameters,
		token_secret: Option<&str>,
	) -> Result<Signature, OAuthClientError> {
		let form = if has_content_type(request.headers(), &APPLICATION_X_WWW_FORM_URLENCODED) {
			decode_form(request.body())
		} else {
			Vec::new()
		};

		let base_string =
			Self::signature_base_string(request.method(), request.uri(), params, &form);
		log::trace!("OAuth signature base string: {base_string}");

		let signature = self.compute_signature(&base_string, token_secret)?;
		let header = Self::authorization_header(params, &signature)?;
		request
			.headers_mut()
			.insert(header::AUTHORIZATION, header.clone());

		Ok(Signature {
			base_string,
			signature,
			header,
		})
	}

	/// Builds the `Authorization: OAuth ...` header value.
	///
	/// See: <https://datatracker.ietf.org/doc/html/rfc5849#section-3.5.1>
	pub fn authorization_header(
		params: &OAuthParameters,
		signature: &str,
	) -> Result<HeaderValue, OAuthClientError> {
		let mut pairs = params.pairs();
		pairs.push(("oauth_signature", signature.to_owned()));
		pairs.sort_by(|a, b| a.0.cmp(b.0));

		let fields = pairs
			.iter()
			.map(|(key, value)| format!("{}=\"{}\"", percent_encode(key), percent_encode(value)))
			.collect::<Vec<_>>()
			.join(", ");

		let mut value =
			HeaderValue::try_from(format!("OAuth {fields}")).map_err(OAuthClientError::request)?;
		value.set_sensitive(true);
		Ok(value)
	}
}

/// Base string URI: lower case scheme and host, default port dropped, no
/// query or fragment.
///
/// See: <https://datatracker.ietf.org/doc/html/rfc5849#section-3.4.1.2>
fn base_string_uri(uri: &http::Uri) -> String {
	let scheme = uri.scheme_str().unwrap_or("http").to_ascii_lowercase();
	let host = uri.host().unwrap_or_default().to_ascii_lowercase();
	let port = match (scheme.as_str(), uri.port_u16()) {
		("http", Some(80)) | ("https", Some(443)) | (_, None) => String::new(),
		(_, Some(port)) => format!(":{port}"),
	};
	let path = match uri.path() {
		"" => "/",
		path => path,
	};

	format!("{scheme}://{host}{port}{path}")
}
