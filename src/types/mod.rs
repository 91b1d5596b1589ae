//! Validated protocol strings.
//!
//! Every type comes in a borrowed/owned pair (e.g. [`AccessToken`] /
//! [`AccessTokenBuf`]) following the same pattern as [`str`] / [`String`],
//! and is validated against the `VSCHAR` grammar of
//! [RFC 6749 Appendix A](https://datatracker.ietf.org/doc/html/rfc6749#appendix-A).
mod access_token;
mod state;

pub use access_token::*;
pub use state::*;

/// Returns `true` if the byte is a VSCHAR (visible ASCII character plus
/// space), i.e. in the range `0x20..=0x7E`.
const fn is_vschar(c: u8) -> bool {
	c >= 0x20 && c <= 0x7e
}

/// Returns `true` if every byte is a VSCHAR.
const fn all_vschar(bytes: &[u8]) -> bool {
	let mut i = 0;

	while i < bytes.len() {
		if !is_vschar(bytes[i]) {
			return false;
		}

		i += 1
	}

	true
}

macro_rules! vschar_string {
	{
		$(#[$meta:meta])*
		$name:ident / $buf:ident, allow_empty = $allow_empty:literal
	} => {
		$(#[$meta])*
		#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, str_newtype::StrNewType)]
		#[newtype(serde, owned($buf, derive(PartialEq, Eq, PartialOrd, Ord, Hash)))]
		pub struct $name(str);

		impl $name {
			/// Validates that the given string is well-formed.
			pub const fn validate_str(s: &str) -> bool {
				Self::validate_bytes(s.as_bytes())
			}

			/// Validates that the given byte slice is well-formed.
			pub const fn validate_bytes(bytes: &[u8]) -> bool {
				($allow_empty || !bytes.is_empty()) && $crate::types::all_vschar(bytes)
			}
		}
	};
}

pub(crate) use vschar_string;

vschar_string! {
	/// An OAuth client identifier (borrowed).
	///
	/// Unlike the other protocol strings, a client identifier may be empty
	/// (`*VSCHAR` rather than `1*VSCHAR`), which is why the settings
	/// validation rejects empty identifiers separately.
	///
	/// # Grammar
	///
	/// ```abnf
	/// client_id = *VSCHAR
	/// ```
	ClientId / ClientIdBuf, allow_empty = true
}

vschar_string! {
	/// An authorization code (borrowed), as returned by the authorization
	/// endpoint and exchanged at the token endpoint.
	///
	/// # Grammar
	///
	/// ```abnf
	/// code = 1*VSCHAR
	/// ```
	Code / CodeBuf, allow_empty = false
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn empty_client_id_is_valid() {
		assert!(ClientId::new("").is_ok());
		assert!(ClientIdBuf::new("my-client".to_owned()).is_ok());
	}

	#[test]
	fn empty_code_is_invalid() {
		assert!(Code::new("").is_err());
		assert!(Code::new("abc123").is_ok());
		assert!(Code::new("code with spaces").is_ok());
	}

	#[test]
	fn control_characters_are_rejected() {
		assert!(ClientId::new("abc\ndef").is_err());
		assert!(Code::new("\x00").is_err());
		assert!(CodeBuf::new("abc\x7f".to_owned()).is_err());
	}
}
