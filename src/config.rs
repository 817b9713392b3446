use std::borrow::Cow;

use time::{Duration, OffsetDateTime};
use tower_cookies::Cookie;

use crate::{SameSite, signer::MacAlgorithm, token};

pub const DEFAULT_COOKIE_NAME: &str = "_app_session";

/// Default ceiling on the encoded session payload.
///
/// Chosen so that a full payload plus an HMAC-SHA512 tag still assembles under
/// [`DEFAULT_MAX_TOKEN_BYTES`].
pub const DEFAULT_MAX_SESSION_BYTES: usize = 3000;

/// Default ceiling on the cookie value, the common per-cookie browser limit.
pub const DEFAULT_MAX_TOKEN_BYTES: usize = 4096;

#[derive(Debug, Clone)]
pub struct CookieSessionConfig {
    pub(crate) name: Cow<'static, str>,
    pub(crate) http_only: bool,
    pub(crate) same_site: SameSite,
    pub(crate) max_age: Option<Duration>,
    pub(crate) secure: bool,
    pub(crate) path: Cow<'static, str>,
    pub(crate) domain: Option<Cow<'static, str>>,
    pub(crate) always_save: bool,
    pub(crate) max_session_bytes: usize,
    pub(crate) max_token_bytes: usize,
}

impl Default for CookieSessionConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_COOKIE_NAME.into(),
            http_only: true,
            same_site: SameSite::Lax,
            max_age: None,
            secure: true,
            path: "/".into(),
            domain: None,
            always_save: false,
            max_session_bytes: DEFAULT_MAX_SESSION_BYTES,
            max_token_bytes: DEFAULT_MAX_TOKEN_BYTES,
        }
    }
}

impl CookieSessionConfig {
    #[must_use]
    pub fn with_name<N: Into<Cow<'static, str>>>(mut self, name: N) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn with_http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    #[must_use]
    pub fn with_same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = same_site;
        self
    }

    /// Give the cookie a `Max-Age` and sign a matching absolute expiry into each token.
    ///
    /// Tokens presented after their expiry are discarded like any other invalid token. Without
    /// [`with_always_save`](Self::with_always_save) the expiry only moves when the session is
    /// modified.
    #[must_use]
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    /// Issue session cookies without `Max-Age` or a signed expiry.
    #[must_use]
    pub fn without_max_age(mut self) -> Self {
        self.max_age = None;
        self
    }

    #[must_use]
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    #[must_use]
    pub fn with_path<P: Into<Cow<'static, str>>>(mut self, path: P) -> Self {
        self.path = path.into();
        self
    }

    #[must_use]
    pub fn with_domain<D: Into<Cow<'static, str>>>(mut self, domain: D) -> Self {
        self.domain = Some(domain.into());
        self
    }

    #[must_use]
    pub fn without_domain(mut self) -> Self {
        self.domain = None;
        self
    }

    /// Reissue the token on every successful response, even when the session was only read.
    #[must_use]
    pub fn with_always_save(mut self, always_save: bool) -> Self {
        self.always_save = always_save;
        self
    }

    #[must_use]
    pub fn with_max_session_bytes(mut self, max_session_bytes: usize) -> Self {
        self.max_session_bytes = max_session_bytes;
        self
    }

    #[must_use]
    pub fn with_max_token_bytes(mut self, max_token_bytes: usize) -> Self {
        self.max_token_bytes = max_token_bytes;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_age(&self) -> Option<Duration> {
        self.max_age
    }

    pub fn always_save(&self) -> bool {
        self.always_save
    }

    pub fn max_session_bytes(&self) -> usize {
        self.max_session_bytes
    }

    pub fn max_token_bytes(&self) -> usize {
        self.max_token_bytes
    }

    /// Ceiling actually enforced on the signed payload: `max_session_bytes`, lowered when a
    /// payload that large could not be assembled into a token of `max_token_bytes`.
    pub fn payload_limit(&self, algorithm: MacAlgorithm) -> usize {
        self.max_session_bytes.min(token::max_payload_len(
            self.max_token_bytes,
            algorithm.tag_len(),
        ))
    }

    pub(crate) fn expires_at(&self, now: OffsetDateTime) -> Option<OffsetDateTime> {
        self.max_age.map(|max_age| now + max_age)
    }

    /// Render the `Set-Cookie` cookie carrying `value`.
    pub fn build_cookie(&self, value: String) -> Cookie<'static> {
        let mut cookie_builder = Cookie::build((self.name.clone(), value))
            .http_only(self.http_only)
            .same_site(self.same_site)
            .secure(self.secure)
            .path(self.path.clone());

        if let Some(max_age) = self.max_age {
            cookie_builder = cookie_builder.max_age(std::cmp::max(max_age, Duration::ZERO));
        }

        if let Some(domain) = self.domain.clone() {
            cookie_builder = cookie_builder.domain(domain);
        }

        cookie_builder.build()
    }

    /// Render a cookie that, once passed to `Cookies::remove`, deletes the session cookie.
    pub fn removal_cookie(&self) -> Cookie<'static> {
        let mut cookie = Cookie::new(self.name.clone(), "");
        cookie.set_path(self.path.clone());
        if let Some(domain) = self.domain.clone() {
            cookie.set_domain(domain);
        }
        cookie
    }
}
