use crate::{client::OAuthClientError, transport::HttpClient};

fn request_error(e: reqwest::Error) -> OAuthClientError {
	if e.is_timeout() {
		OAuthClientError::request(format!("request timed out: {e}"))
	} else {
		OAuthClientError::request(e)
	}
}

async fn into_http_response(
	response: reqwest::Response,
) -> Result<http::Response<Vec<u8>>, OAuthClientError> {
	let mut head = http::Response::new(());
	*head.status_mut() = response.status();
	*head.headers_mut() = response.headers().clone();

	#[cfg(not(target_arch = "wasm32"))]
	{
		*head.version_mut() = response.version();
	}

	let body = response
		.bytes()
		.await
		.map_err(OAuthClientError::response)?;

	Ok(head.map(|()| body.to_vec()))
}

impl HttpClient for reqwest::Client {
	async fn send(
		&self,
		request: http::Request<Vec<u8>>,
	) -> Result<http::Response<Vec<u8>>, OAuthClientError> {
		log::debug!("HTTP {} request to: {}", request.method(), request.uri());

		let request = request.try_into().map_err(OAuthClientError::request)?;
		let response = into_http_response(self.execute(request).await.map_err(request_error)?).await?;

		// Bodies may hold tokens and secrets: only their size is traced.
		log::trace!(
			"HTTP response status {} ({} bytes)",
			response.status(),
			response.body().len()
		);

		Ok(response)
	}
}
