//! URI query string, percent-encoding and cancellation utilities.
use std::future::Future;

use iref::{
	UriBuf,
	uri::{Query, QueryBuf},
};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::client::OAuthClientError;

/// Characters left as-is by [`percent_encode`]: `ALPHA / DIGIT / "-" / "." /
/// "_" / "~"`.
///
/// See: <https://datatracker.ietf.org/doc/html/rfc5849#section-3.6>
const UNRESERVED: &AsciiSet = &NON_ALPHANUMERIC
	.remove(b'-')
	.remove(b'.')
	.remove(b'_')
	.remove(b'~');

/// Percent-encodes `value` the way OAuth 1.0a requires: every byte outside
/// the unreserved set is encoded, with upper case hexadecimal digits.
pub fn percent_encode(value: &str) -> String {
	utf8_percent_encode(value, UNRESERVED).to_string()
}

/// Extends the query parameters of a URI by serializing `value` as
/// `application/x-www-form-urlencoded` and appending the result.
///
/// Existing query parameters on the URI are preserved.
pub fn extend_uri_query<T: Serialize>(uri: &mut UriBuf, value: T) -> Result<(), OAuthClientError> {
	let query = serialize_concat_query(
		uri.query().map(ToOwned::to_owned).unwrap_or_default(),
		value,
	)?;

	uri.set_query(Some(
		Query::new(&query)
			// UNWRAP SAFETY: `query` is already a valid query.
			.unwrap(),
	));

	Ok(())
}

/// Serializes `value` as form-urlencoded data and concatenates it with the
/// existing query string.
pub fn serialize_concat_query<T>(query: QueryBuf, value: T) -> Result<QueryBuf, OAuthClientError>
where
	T: Serialize,
{
	let serialized = serde_html_form::to_string(value).map_err(OAuthClientError::request)?;
	let other = QueryBuf::new(serialized.into_bytes()).map_err(|_| {
		OAuthClientError::request("serialized parameters are not a valid URI query")
	})?;

	Ok(concat_query(query, &other))
}

/// Concatenates two query strings with `&` as separator.
///
/// If either query is empty, the other is returned as-is without a
/// separator.
pub fn concat_query(query: QueryBuf, other: &Query) -> QueryBuf {
	let mut query = query.into_string();

	if !query.is_empty() && !other.is_empty() {
		query.push('&')
	}

	query.push_str(other.as_str());

	// UNWRAP SAFETY: the concatenation of two queries with `&` is a query.
	QueryBuf::new(query.into_bytes()).unwrap()
}

/// Runs `future` until it completes or `cancel` fires.
///
/// The future is dropped on cancellation, which releases whatever it holds
/// (sockets, listeners, pending requests).
pub async fn cancellable<F>(cancel: &CancellationToken, future: F) -> Result<F::Output, OAuthClientError>
where
	F: Future,
{
	tokio::select! {
		biased;
		_ = cancel.cancelled() => {
			log::debug!("operation cancelled");
			Err(OAuthClientError::Cancelled)
		}
		output = future => Ok(output),
	}
}
