use base64::{Engine, prelude::BASE64_URL_SAFE_NO_PAD};
use rand::{RngExt, rng};

use super::vschar_string;

vschar_string! {
	/// An OAuth 2.0 state parameter (borrowed).
	///
	/// The state parameter is an opaque value used to maintain state between an
	/// authorization request and callback, primarily for CSRF protection.
	///
	/// See: <https://datatracker.ietf.org/doc/html/rfc6749#section-10.12>
	///
	/// # Grammar
	///
	/// ```abnf
	/// state = 1*VSCHAR
	/// ```
	State / StateBuf, allow_empty = false
}

impl StateBuf {
	/// Generates a new random, base64url-encoded 128-bit CSRF token.
	pub fn new_random() -> Self {
		Self::new_random_len(16)
	}

	/// Generates a new random, base64url-encoded CSRF token from `len`
	/// random bytes.
	pub fn new_random_len(len: u32) -> Self {
		let random_bytes: Vec<u8> = (0..len.max(1)).map(|_| rng().random::<u8>()).collect();
		unsafe {
			// SAFETY: base64url output is never empty and only contains VSCHARs.
			Self::new_unchecked(BASE64_URL_SAFE_NO_PAD.encode(random_bytes))
		}
	}
}
