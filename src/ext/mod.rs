//! OAuth 2.0 protocol extensions.
//!
//! - [`pkce`]: Proof Key for Code Exchange
//!   ([RFC 7636](https://datatracker.ietf.org/doc/html/rfc7636)).
pub mod pkce;
