//! Keyed authentication of session payloads.
//!
//! Tags are HMAC-SHA256 (default) or HMAC-SHA512 over the raw payload bytes. Verification goes
//! through [`Mac::verify_slice`], which compares in constant time.

use std::{fmt, str::FromStr};

use base64::{
    Engine as _,
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
};
use hmac::{Hmac, Mac, digest::KeyInit};
use rand::{RngCore as _, rngs::OsRng};
use sha2::{Sha256, Sha512};

use crate::error::{Error, Result};

type HmacSha256 = Hmac<Sha256>;
type HmacSha512 = Hmac<Sha512>;

/// Secret used to sign and verify session tokens.
///
/// Loaded once at startup and shared read-only by every request. The `Debug` output never
/// includes the key material.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretKey(Box<[u8]>);

impl SecretKey {
    /// Minimum accepted key length in bytes.
    pub const MIN_LEN: usize = 32;

    const GENERATED_LEN: usize = 64;

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < Self::MIN_LEN {
            return Err(Error::InvalidKey(format!(
                "key must be at least {} bytes, got {}",
                Self::MIN_LEN,
                bytes.len()
            )));
        }
        Ok(Self(bytes.into()))
    }

    /// Parse a base64 key, accepting the URL-safe unpadded or the standard alphabet.
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let encoded = encoded.trim();
        let bytes = URL_SAFE_NO_PAD
            .decode(encoded)
            .or_else(|_| STANDARD.decode(encoded))
            .map_err(|err| Error::InvalidKey(err.to_string()))?;
        Self::from_bytes(&bytes)
    }

    /// Generate a random key from the operating system's CSPRNG.
    pub fn generate() -> Self {
        let mut bytes = vec![0u8; Self::GENERATED_LEN];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes.into_boxed_slice())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SecretKey").field(&"[redacted]").finish()
    }
}

/// MAC construction used for session tokens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum MacAlgorithm {
    #[default]
    HmacSha256,
    HmacSha512,
}

impl MacAlgorithm {
    /// Length of the authentication tag in bytes.
    pub fn tag_len(self) -> usize {
        match self {
            Self::HmacSha256 => 32,
            Self::HmacSha512 => 64,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::HmacSha256 => "HS256",
            Self::HmacSha512 => "HS512",
        }
    }
}

impl fmt::Display for MacAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MacAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "HS256" => Ok(Self::HmacSha256),
            "HS512" => Ok(Self::HmacSha512),
            other => Err(Error::InvalidKey(format!("unknown MAC algorithm: {other}"))),
        }
    }
}

/// Authentication tag bound to one payload and one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature(Vec<u8>);

impl Signature {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u8]> for Signature {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for Signature {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

fn keyed<M: Mac + KeyInit>(key: &SecretKey, payload: &[u8]) -> Result<M> {
    let mut mac = <M as Mac>::new_from_slice(key.as_bytes())
        .map_err(|err| Error::InvalidKey(err.to_string()))?;
    mac.update(payload);
    Ok(mac)
}

/// Compute the tag of `payload` under `key`.
pub fn sign(algorithm: MacAlgorithm, payload: &[u8], key: &SecretKey) -> Result<Signature> {
    let tag = match algorithm {
        MacAlgorithm::HmacSha256 => keyed::<HmacSha256>(key, payload)?
            .finalize()
            .into_bytes()
            .to_vec(),
        MacAlgorithm::HmacSha512 => keyed::<HmacSha512>(key, payload)?
            .finalize()
            .into_bytes()
            .to_vec(),
    };
    Ok(Signature(tag))
}

/// Check `signature` against `payload` under `key` in constant time.
pub fn verify(
    algorithm: MacAlgorithm,
    payload: &[u8],
    signature: &Signature,
    key: &SecretKey,
) -> bool {
    match algorithm {
        MacAlgorithm::HmacSha256 => keyed::<HmacSha256>(key, payload)
            .is_ok_and(|mac| mac.verify_slice(signature.as_bytes()).is_ok()),
        MacAlgorithm::HmacSha512 => keyed::<HmacSha512>(key, payload)
            .is_ok_and(|mac| mac.verify_slice(signature.as_bytes()).is_ok()),
    }
}

/// Ordered set of signing keys, newest first.
///
/// New tokens are signed with the first key; tokens signed by any key in the ring verify. Retire
/// an old key by dropping it from the ring once every token it signed has expired.
#[derive(Debug, Clone)]
pub struct Keyring {
    algorithm: MacAlgorithm,
    keys: Vec<SecretKey>,
}

impl Keyring {
    pub fn new(primary: SecretKey) -> Self {
        Self {
            algorithm: MacAlgorithm::default(),
            keys: vec![primary],
        }
    }

    /// Accept tokens signed by an older key.
    #[must_use]
    pub fn with_fallback(mut self, key: SecretKey) -> Self {
        self.keys.push(key);
        self
    }

    #[must_use]
    pub fn with_algorithm(mut self, algorithm: MacAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn algorithm(&self) -> MacAlgorithm {
        self.algorithm
    }

    pub fn primary(&self) -> &SecretKey {
        &self.keys[0]
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn sign(&self, payload: &[u8]) -> Result<Signature> {
        sign(self.algorithm, payload, self.primary())
    }

    pub fn verify(&self, payload: &[u8], signature: &Signature) -> bool {
        self.keys
            .iter()
            .any(|key| verify(self.algorithm, payload, signature, key))
    }
}

impl From<SecretKey> for Keyring {
    fn from(primary: SecretKey) -> Self {
        Self::new(primary)
    }
}
