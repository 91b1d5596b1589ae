//! HTTP transport layer, content type encoding, and client abstraction.
use http::{HeaderMap, HeaderValue, header};
use serde::Serialize;

use crate::client::OAuthClientError;

mod client;

pub use client::*;

/// `Content-Type: application/json` header value.
pub const APPLICATION_JSON: HeaderValue = HeaderValue::from_static("application/json");

/// `Content-Type: application/x-www-form-urlencoded` header value.
pub const APPLICATION_X_WWW_FORM_URLENCODED: HeaderValue =
	HeaderValue::from_static("application/x-www-form-urlencoded");

/// Returns `true` if the `Content-Type` header starts with the given value,
/// ignoring parameters such as `charset`.
pub fn has_content_type(headers: &HeaderMap, expected_value: &HeaderValue) -> bool {
	headers
		.get(header::CONTENT_TYPE)
		.is_some_and(|value| value.as_bytes().starts_with(expected_value.as_bytes()))
}

/// Trait for encoding request bodies with a specific content type.
pub trait ContentType {
	/// The `Content-Type` header value.
	const VALUE: HeaderValue;

	/// Serializes the given value into a byte vector using this content type's
	/// encoding.
	fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, OAuthClientError>;
}

/// URL-encoded form (`application/x-www-form-urlencoded`) content type
/// encoding.
pub struct WwwFormUrlEncoded;

impl ContentType for WwwFormUrlEncoded {
	const VALUE: HeaderValue = APPLICATION_X_WWW_FORM_URLENCODED;

	fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, OAuthClientError> {
		log::debug!("serializing {}", std::any::type_name_of_val(value));
		serde_html_form::to_string(value)
			.map(String::into_bytes)
			.map_err(OAuthClientError::request)
	}
}

/// Decodes an `application/x-www-form-urlencoded` string into its key/value
/// pairs, keeping their original order and duplicates.
pub fn decode_form(input: &[u8]) -> Vec<(String, String)> {
	url::form_urlencoded::parse(input)
		.map(|(key, value)| (key.into_owned(), value.into_owned()))
		.collect()
}

#[cfg(test)]
mod tests {
	use std::collections::BTreeMap;

	use super::*;

	#[test]
	fn form_encoding_escapes_reserved_characters() {
		let mut value = BTreeMap::new();
		value.insert("redirect_uri", "https://client.example.com/cb?x=1");
		value.insert("scope", "read write");

		let body = WwwFormUrlEncoded::encode(&value).unwrap();
		assert_eq!(
			String::from_utf8(body).unwrap(),
			"redirect_uri=https%3A%2F%2Fclient.example.com%2Fcb%3Fx%3D1&scope=read+write"
		);
	}

	#[test]
	fn form_decoding_keeps_order_and_duplicates() {
		let pairs = decode_form(b"b=2&a=1&b=3&empty=&plus=a+b");
		assert_eq!(
			pairs,
			vec![
				("b".to_owned(), "2".to_owned()),
				("a".to_owned(), "1".to_owned()),
				("b".to_owned(), "3".to_owned()),
				("empty".to_owned(), String::new()),
				("plus".to_owned(), "a b".to_owned()),
			]
		);
	}

	#[test]
	fn content_type_ignores_parameters() {
		let mut headers = HeaderMap::new();
		assert!(!has_content_type(&headers, &APPLICATION_JSON));

		headers.insert(
			header::CONTENT_TYPE,
			HeaderValue::from_static("application/json; charset=utf-8"),
		);
		assert!(has_content_type(&headers, &APPLICATION_JSON));
		assert!(!has_content_type(
			&headers,
			&APPLICATION_X_WWW_FORM_URLENCODED
		));
	}
}
