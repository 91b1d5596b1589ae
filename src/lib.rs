//! OAuth token lifecycle interceptors for HTTP clients.
//!
//! An interceptor wraps an [`HttpClient`](transport::HttpClient) and makes
//! every outgoing request carry valid credentials:
//!
//! - [`OAuth2Interceptor`](interceptor::OAuth2Interceptor) runs the
//!   [RFC 6749][rfc6749] authorization code grant (optionally with
//!   [RFC 7636][rfc7636] PKCE) when no token is known, refreshes expired
//!   tokens and stamps `Authorization: Bearer` headers.
//! - [`OAuth1Interceptor`](interceptor::OAuth1Interceptor) runs the
//!   [RFC 5849][rfc5849] three-legged flow once and signs every request.
//!
//! Token acquisition is serialized per interceptor, so concurrent requests
//! on an expired token trigger a single refresh, and every step honours a
//! [`CancellationToken`](tokio_util::sync::CancellationToken).
//!
//! The interactive step is delegated to an
//! [`AuthorizationCodeReceiver`](receiver::AuthorizationCodeReceiver)
//! picked by [`AuthorizationMode`](settings::AuthorizationMode). With the
//! `axum` feature, [`LoopbackReceiver`](receiver::loopback::LoopbackReceiver)
//! listens on the redirect URI.
//!
//! # Modules
//!
//! - [`client`]: error type.
//! - [`credential`]: credential record and expiry rules.
//! - [`endpoints`]: authorization and token endpoints.
//! - [`ext`]: PKCE.
//! - [`interceptor`]: OAuth 2.0 and OAuth 1.0a interceptors.
//! - [`oauth1`]: OAuth 1.0a signatures and temporary credentials.
//! - [`receiver`]: interactive authorization receivers.
//! - [`settings`]: client configuration.
//! - [`transport`]: HTTP transport layer and content types.
//! - [`util`]: query string and cancellation helpers.
//!
//! [rfc6749]: https://datatracker.ietf.org/doc/html/rfc6749
//! [rfc7636]: https://datatracker.ietf.org/doc/html/rfc7636
//! [rfc5849]: https://datatracker.ietf.org/doc/html/rfc5849
#[cfg(feature = "reqwest")]
pub use reqwest;

pub use http;

pub mod client;
pub mod credential;
pub mod endpoints;
pub mod ext;
pub mod interceptor;
pub mod oauth1;
pub mod receiver;
pub mod settings;
pub mod transport;
mod types;
pub mod util;

#[cfg(test)]
mod test_support;

pub use types::*;
