use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use time::OffsetDateTime;

use crate::{
    codec::{self, Record, SessionData},
    config::{CookieSessionConfig, DEFAULT_MAX_SESSION_BYTES},
    error::{Error, Result},
    signer::Keyring,
    token,
};

/// Session state for a single request.
///
/// Clones share the same underlying map, so the handle the middleware keeps and the one the
/// handler extracts observe each other's writes. Access is serialized through an internal lock;
/// a session must not outlive or be shared beyond the request it was loaded for.
#[derive(Debug, Clone)]
pub struct Session {
    inner: Arc<Mutex<Inner>>,
    max_bytes: usize,
    expires_at: Option<OffsetDateTime>,
}

#[derive(Debug, Default)]
struct Inner {
    data: SessionData,
    modified: bool,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SESSION_BYTES)
    }
}

impl Session {
    /// An empty, unmodified session whose encoded payload may grow to `max_bytes`.
    pub fn new(max_bytes: usize) -> Self {
        Self::from_data(SessionData::new(), max_bytes)
    }

    /// A session preloaded with `data`, starting unmodified.
    pub fn from_data(data: SessionData, max_bytes: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                data,
                modified: false,
            })),
            max_bytes,
            expires_at: None,
        }
    }

    /// An empty session sized and stamped for `config`.
    pub(crate) fn empty_for(keys: &Keyring, config: &CookieSessionConfig) -> Self {
        Self::new(config.payload_limit(keys.algorithm()))
            .with_expires_at(config.expires_at(OffsetDateTime::now_utc()))
    }

    /// Set the expiry the next token for this session will carry.
    ///
    /// The size ceiling is checked against the payload as it will be signed, `exp` included.
    #[must_use]
    pub fn with_expires_at(mut self, expires_at: Option<OffsetDateTime>) -> Self {
        self.expires_at = expires_at;
        self
    }

    /// Load a session from an inbound token.
    ///
    /// Any failure (bad structure, bad signature, bad payload, expired) yields a fresh empty
    /// session. Callers cannot tell a rejected token from a missing one.
    pub fn from_token(token: &str, keys: &Keyring, config: &CookieSessionConfig) -> Self {
        Self::try_from_token(token, keys, config)
            .unwrap_or_else(|_| Self::empty_for(keys, config))
    }

    pub(crate) fn try_from_token(
        token: &str,
        keys: &Keyring,
        config: &CookieSessionConfig,
    ) -> Result<Self> {
        let record = load_record(token, keys, config.max_token_bytes)?;
        let now = OffsetDateTime::now_utc();
        if record.is_expired_at(now) {
            return Err(Error::Expired);
        }
        Ok(Self::from_data(record.data, config.payload_limit(keys.algorithm()))
            .with_expires_at(config.expires_at(now)))
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Writers restore the previous state before releasing the lock on every error path.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Get a value and deserialize it into `T`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.get_value(key).map(codec::from_value).transpose()
    }

    pub fn get_value(&self, key: &str) -> Option<Value> {
        self.lock().data.get(key).cloned()
    }

    /// Serialize `value` and store it under `key`.
    ///
    /// Fails without changing the session if the value is not representable (including values
    /// nested deeper than [`MAX_VALUE_DEPTH`](codec::MAX_VALUE_DEPTH)) or if the encoded session
    /// would exceed its size ceiling.
    pub fn insert<T: Serialize>(&self, key: impl Into<String>, value: T) -> Result<()> {
        self.insert_value(key, codec::to_value(value)?)
    }

    pub fn insert_value(&self, key: impl Into<String>, value: Value) -> Result<()> {
        let key = key.into();
        let mut inner = self.lock();

        let previous = inner.data.insert(key.clone(), value);
        let size = match codec::encode_parts(&inner.data, self.expires_at) {
            Ok(payload) => payload.len(),
            Err(err) => {
                restore(&mut inner.data, key, previous);
                return Err(err);
            }
        };
        if size > self.max_bytes {
            restore(&mut inner.data, key, previous);
            return Err(Error::SessionTooLarge {
                size,
                limit: self.max_bytes,
            });
        }

        inner.modified = true;
        Ok(())
    }

    /// Remove a value, deserializing what was stored.
    pub fn remove<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.remove_value(key).map(codec::from_value).transpose()
    }

    /// Remove a value. The session is only marked modified if the key was present.
    pub fn remove_value(&self, key: &str) -> Option<Value> {
        let mut inner = self.lock();
        let removed = inner.data.remove(key);
        if removed.is_some() {
            inner.modified = true;
        }
        removed
    }

    /// Remove every value. The session is only marked modified if it was non-empty.
    pub fn clear(&self) {
        let mut inner = self.lock();
        if !inner.data.is_empty() {
            inner.data.clear();
            inner.modified = true;
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.lock().data.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.lock().data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().data.is_empty()
    }

    /// Whether any write changed the session since it was loaded.
    pub fn is_modified(&self) -> bool {
        self.lock().modified
    }

    /// Copy of the current data.
    pub fn snapshot(&self) -> SessionData {
        self.lock().data.clone()
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    pub fn expires_at(&self) -> Option<OffsetDateTime> {
        self.expires_at
    }
}

fn restore(data: &mut SessionData, key: String, previous: Option<Value>) {
    match previous {
        Some(value) => {
            data.insert(key, value);
        }
        None => {
            data.remove(&key);
        }
    }
}

/// Disassemble, verify and decode a token, in that order.
pub(crate) fn load_record(token: &str, keys: &Keyring, max_token_bytes: usize) -> Result<Record> {
    let (payload, signature) = token::disassemble(token, max_token_bytes)?;
    if !keys.verify(payload.as_bytes(), &signature) {
        return Err(Error::SignatureMismatch);
    }
    codec::decode_record(payload.as_bytes())
}
