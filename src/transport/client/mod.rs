use std::sync::Arc;

use crate::client::OAuthClientError;

#[cfg(feature = "reqwest")]
mod reqwest;

/// Inner HTTP transport.
///
/// Performs both the wrapped API calls and every token endpoint call. The
/// interceptors of this crate implement this trait too, so they can be
/// stacked on top of any other transport.
pub trait HttpClient {
	#[allow(async_fn_in_trait)]
	async fn send(
		&self,
		request: http::Request<Vec<u8>>,
	) -> Result<http::Response<Vec<u8>>, OAuthClientError>;
}

impl<T> HttpClient for &T
where
	T: HttpClient,
{
	async fn send(
		&self,
		request: http::Request<Vec<u8>>,
	) -> Result<http::Response<Vec<u8>>, OAuthClientError> {
		T::send(*self, request).await
	}
}

impl<T> HttpClient for Arc<T>
where
	T: HttpClient,
{
	async fn send(
		&self,
		request: http::Request<Vec<u8>>,
	) -> Result<http::Response<Vec<u8>>, OAuthClientError> {
		T::send(self, request).await
	}
}
