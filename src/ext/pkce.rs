//! Proof Key for Code Exchange by OAuth Public Clients
//!
//! See: <https://datatracker.ietf.org/doc/html/rfc7636>
use base64::{Engine, prelude::BASE64_URL_SAFE_NO_PAD};
use rand::{RngExt, rng};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use str_newtype::StrNewType;

/// Code challenge and method sent with the authorization request through
/// the `code_challenge` and `code_challenge_method` parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PkceChallenge {
	#[serde(rename = "code_challenge")]
	pub challenge: String,

	#[serde(rename = "code_challenge_method")]
	pub method: PkceCodeChallengeMethod,
}

impl PkceChallenge {
	/// Derives the challenge of `code_verifier` with the given method.
	pub fn from_code_verifier(
		code_verifier: &PkceCodeVerifier,
		method: PkceCodeChallengeMethod,
	) -> Self {
		Self {
			challenge: method.transform(code_verifier),
			method,
		}
	}

	/// Generates a new random verifier and its SHA-256 challenge.
	pub fn new_random_sha256() -> (Self, PkceCodeVerifierBuf) {
		let code_verifier = PkceCodeVerifierBuf::new_random_len(32);
		(
			Self::from_code_verifier(&code_verifier, PkceCodeChallengeMethod::S256),
			code_verifier,
		)
	}
}

/// PKCE code challenge method.
///
/// See: <https://datatracker.ietf.org/doc/html/rfc7636#section-4.2>
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PkceCodeChallengeMethod {
	/// Only for providers that cannot compute SHA-256.
	#[serde(rename = "plain")]
	Plain,

	/// BASE64URL(SHA256(code_verifier)).
	S256,
}

impl PkceCodeChallengeMethod {
	/// Derives the code challenge of `code_verifier`.
	pub fn transform(&self, code_verifier: &PkceCodeVerifier) -> String {
		match self {
			Self::Plain => code_verifier.as_str().to_owned(),
			Self::S256 => BASE64_URL_SAFE_NO_PAD.encode(Sha256::digest(code_verifier.as_str())),
		}
	}
}

/// Code Verifier.
///
/// See: <https://datatracker.ietf.org/doc/html/rfc7636#section-4.1>
///
/// # Grammar
///
/// ```abnf
/// code-verifier = 43*128unreserved
/// unreserved = ALPHA / DIGIT / "-" / "." / "_" / "~"
/// ```
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, StrNewType)]
#[newtype(
	serde,
	owned(PkceCodeVerifierBuf, derive(PartialEq, Eq, PartialOrd, Ord, Hash))
)]
pub struct PkceCodeVerifier(str);

impl PkceCodeVerifier {
	pub const fn validate_str(s: &str) -> bool {
		Self::validate_bytes(s.as_bytes())
	}

	pub const fn validate_bytes(bytes: &[u8]) -> bool {
		if bytes.len() < 43 || bytes.len() > 128 {
			return false;
		}

		let mut i = 0;

		while i < bytes.len() {
			if !bytes[i].is_ascii_alphanumeric() && !matches!(bytes[i], b'-' | b'.' | b'_' | b'~')
			{
				return false;
			}

			i += 1
		}

		true
	}
}

impl PkceCodeVerifierBuf {
	/// Generates a new random verifier from `len` random bytes.
	///
	/// # Panics
	///
	/// Panics unless `len` is in `32..=96`, the range whose base64url
	/// encoding is 43 to 128 characters long.
	pub fn new_random_len(len: u32) -> Self {
		assert!((32..=96).contains(&len));
		let random_bytes: Vec<u8> = (0..len).map(|_| rng().random::<u8>()).collect();
		Self(BASE64_URL_SAFE_NO_PAD.encode(random_bytes))
	}
}
