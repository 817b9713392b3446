//! Signed, client-side sessions stored in a single cookie.
//!
//! The whole session (a small JSON key/value map) travels in the cookie as
//! `base64url(payload).base64url(hmac)`. Nothing is stored server side. On each request the
//! token is split, its HMAC checked against the configured [`Keyring`], and the payload decoded
//! into a [`Session`]; if any step fails the request simply starts with an empty session. A new
//! token is only issued when the session was modified.
//!
//! [`SessionAdapter`] implements that cycle independently of any framework.
//! [`CookieSessionManagerLayer`] wires it into `tower` via `tower-cookies`, and with the `axum`
//! feature [`Session`] is an axum extractor.
//!
//! # Security
//! Tokens are signed, not encrypted: clients can read (but not modify) everything stored in the
//! session. Do not store secrets in it.
//!
//! # Example
//! ```
//! use signed_session_cookie::{SecretKey, SessionAdapter};
//!
//! let adapter = SessionAdapter::new(SecretKey::generate());
//!
//! let session = adapter.begin_request(None);
//! session.insert("cart", [1, 2, 3]).unwrap();
//! let token = adapter.finalize_response(&session).unwrap().unwrap();
//!
//! let session = adapter.begin_request(Some(token.as_str()));
//! assert_eq!(session.get::<Vec<u32>>("cart").unwrap(), Some(vec![1, 2, 3]));
//! assert!(adapter.finalize_response(&session).unwrap().is_none());
//! ```

pub mod adapter;
pub mod codec;
mod config;
mod error;
#[cfg(feature = "axum")]
mod extract;
pub mod layer;
mod signer;
mod store;
pub mod token;

pub use tower_cookies::cookie::SameSite;

pub use crate::adapter::SessionAdapter;
pub use crate::codec::{Payload, SessionData};
pub use crate::config::{
    CookieSessionConfig, DEFAULT_COOKIE_NAME, DEFAULT_MAX_SESSION_BYTES, DEFAULT_MAX_TOKEN_BYTES,
};
pub use crate::error::{Error, Result};
pub use crate::layer::CookieSessionManagerLayer;
pub use crate::signer::{Keyring, MacAlgorithm, SecretKey, Signature, sign, verify};
pub use crate::store::Session;
pub use crate::token::Token;
