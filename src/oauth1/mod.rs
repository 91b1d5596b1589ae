//! OAuth 1.0a request signing and temporary credential endpoints.
//!
//! See: <https://datatracker.ietf.org/doc/html/rfc5849>
use chrono::Utc;
use rand::{RngExt, rng};

use crate::{ClientId, settings::SignatureMethod};

pub mod endpoints;
pub mod signature;

pub use signature::{Signature, SignatureEngine};

/// Protocol version sent in `oauth_version`.
pub const OAUTH_VERSION: &str = "1.0";

/// Callback value for out-of-band authorization.
pub const OUT_OF_BAND_CALLBACK: &str = "oob";

/// The `oauth_*` protocol parameters of one signed request.
///
/// A fresh nonce and timestamp are generated on creation; both can be fixed
/// with [`Self::with_nonce`] and [`Self::with_timestamp`] to make the
/// signature reproducible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthParameters {
	pub consumer_key: String,
	pub nonce: String,
	pub signature_method: SignatureMethod,
	pub timestamp: i64,
	pub token: Option<String>,
	pub callback: Option<String>,
	pub verifier: Option<String>,
}

impl OAuthParameters {
	pub fn new(consumer_key: &ClientId, signature_method: SignatureMethod) -> Self {
		Self {
			consumer_key: consumer_key.as_str().to_owned(),
			nonce: rng().random::<u32>().to_string(),
			signature_method,
			timestamp: Utc::now().timestamp(),
			token: None,
			callback: None,
			verifier: None,
		}
	}

	pub fn with_nonce(self, nonce: impl Into<String>) -> Self {
		Self {
			nonce: nonce.into(),
			..self
		}
	}

	pub fn with_timestamp(self, timestamp: i64) -> Self {
		Self { timestamp, ..self }
	}

	pub fn with_token(self, token: impl Into<String>) -> Self {
		Self {
			token: Some(token.into()),
			..self
		}
	}

	pub fn with_callback(self, callback: impl Into<String>) -> Self {
		Self {
			callback: Some(callback.into()),
			..self
		}
	}

	pub fn with_verifier(self, verifier: impl Into<String>) -> Self {
		Self {
			verifier: Some(verifier.into()),
			..self
		}
	}

	/// Parameters as `(name, value)` pairs, in insertion order.
	pub fn pairs(&self) -> Vec<(&'static str, String)> {
		let mut pairs = Vec::with_capacity(8);

		if let Some(callback) = &self.callback {
			pairs.push(("oauth_callback", callback.clone()));
		}

		pairs.push(("oauth_consumer_key", self.consumer_key.clone()));
		pairs.push(("oauth_nonce", self.nonce.clone()));
		pairs.push((
			"oauth_signature_method",
			self.signature_method.as_str().to_owned(),
		));
		pairs.push(("oauth_timestamp", self.timestamp.to_string()));

		if let Some(token) = &self.token {
			pairs.push(("oauth_token", token.clone()));
		}

		if let Some(verifier) = &self.verifier {
			pairs.push(("oauth_verifier", verifier.clone()));
		}

		pairs.push(("oauth_version", OAUTH_VERSION.to_owned()));
		pairs
	}
}
