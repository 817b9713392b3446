//! Loading a session at request start and reissuing its token at response time.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use time::OffsetDateTime;

use crate::{
    codec::{self, Record, SessionData},
    config::CookieSessionConfig,
    error::Result,
    signer::Keyring,
    store::Session,
    token::{self, Token},
};

/// Framework-independent session cookie handling.
///
/// [`begin_request`](Self::begin_request) turns the raw cookie value into a [`Session`];
/// [`finalize_response`](Self::finalize_response) turns a modified session back into a
/// [`Token`] for the `Set-Cookie` header. Cheap to clone; clones share the rejection counter.
#[derive(Debug, Clone)]
pub struct SessionAdapter {
    keys: Keyring,
    config: CookieSessionConfig,
    rejected: Arc<AtomicU64>,
}

impl SessionAdapter {
    pub fn new(keys: impl Into<Keyring>) -> Self {
        Self {
            keys: keys.into(),
            config: CookieSessionConfig::default(),
            rejected: Arc::new(AtomicU64::new(0)),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: CookieSessionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &CookieSessionConfig {
        &self.config
    }

    pub fn keys(&self) -> &Keyring {
        &self.keys
    }

    /// Number of inbound tokens discarded since this adapter was created.
    pub fn rejected_tokens(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    /// Materialize the session for an inbound request.
    ///
    /// A missing or empty cookie value, and any token that fails verification, produce the same
    /// empty session.
    ///
    /// The session's size ceiling is [`CookieSessionConfig::payload_limit`], checked against the
    /// payload with the expiry the next token will carry, so a write that succeeds always fits
    /// in a token.
    pub fn begin_request(&self, raw_cookie: Option<&str>) -> Session {
        let Some(raw) = raw_cookie.filter(|raw| !raw.is_empty()) else {
            return Session::empty_for(&self.keys, &self.config);
        };

        match Session::try_from_token(raw, &self.keys, &self.config) {
            Ok(session) => session,
            Err(err) => {
                self.rejected.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(reason = err.reason(), "discarding session cookie");
                Session::empty_for(&self.keys, &self.config)
            }
        }
    }

    /// Produce the token to send back, or `None` if the client's cookie is still current.
    ///
    /// Unmodified sessions are not reissued unless `always_save` is set. The token carries the
    /// expiry stamped on the session when it was loaded.
    pub fn finalize_response(&self, session: &Session) -> Result<Option<Token>> {
        if !session.is_modified() && !self.config.always_save {
            return Ok(None);
        }
        let record = Record {
            data: session.snapshot(),
            expires_at: session.expires_at(),
        };
        self.issue_record(&record).map(Some)
    }

    /// Encode, sign and assemble `data` into a token, stamping the configured expiry.
    pub fn issue(&self, data: &SessionData) -> Result<Token> {
        let record = Record {
            data: data.clone(),
            expires_at: self.config.expires_at(OffsetDateTime::now_utc()),
        };
        self.issue_record(&record)
    }

    fn issue_record(&self, record: &Record) -> Result<Token> {
        let payload = codec::encode_record(record)?;
        let signature = self.keys.sign(payload.as_bytes())?;
        let token = token::assemble(&payload, &signature, self.config.max_token_bytes)?;

        tracing::debug!(
            algorithm = %self.keys.algorithm(),
            len = token.len(),
            "issued session token"
        );
        Ok(token)
    }
}
