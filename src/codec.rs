//! Encoding and decoding of the signed session payload.
//!
//! The payload is a small JSON envelope:
//!
//! ```text
//! {"v":1,"exp":1767225600,"data":{"cart":[1,2,3],"user":"alice"}}
//! ```
//!
//! Object keys are written in lexicographic order at every nesting level, so the same session
//! data always produces the same bytes (and therefore the same signature) no matter in which
//! order the application inserted it. `exp` is present only when the session has a signed
//! expiry.
//!
//! Note: the envelope is versioned, but it is still considered an implementation detail and may
//! evolve.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize, Serializer, de::DeserializeOwned};
use serde_json::Value;
use time::OffsetDateTime;

use crate::error::{Error, Result};

const VERSION: u8 = 1;

/// Deepest nesting of arrays and objects accepted inside a single session value.
///
/// `serde_json` refuses to parse input nested 128 containers deep. The envelope and its `data`
/// object take two of the remaining 127 levels.
pub const MAX_VALUE_DEPTH: usize = 125;

/// The key/value map held by a session.
pub type SessionData = BTreeMap<String, Value>;

/// Canonical serialized form of a session snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload(Vec<u8>);

impl Payload {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl AsRef<[u8]> for Payload {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

/// Session data together with its optional signed expiry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    pub data: SessionData,
    pub expires_at: Option<OffsetDateTime>,
}

impl Record {
    pub fn new(data: SessionData) -> Self {
        Self {
            data,
            expires_at: None,
        }
    }

    #[must_use]
    pub fn with_expires_at(mut self, expires_at: OffsetDateTime) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }
}

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    v: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    exp: Option<i64>,
    #[serde(serialize_with = "serialize_data")]
    data: &'a SessionData,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct Envelope {
    v: u8,
    #[serde(default)]
    exp: Option<i64>,
    data: SessionData,
}

/// Serializes a [`Value`] with object keys sorted, regardless of how the map stores them.
struct Canonical<'a>(&'a Value);

impl Serialize for Canonical<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self.0 {
            Value::Array(items) => serializer.collect_seq(items.iter().map(Canonical)),
            Value::Object(map) => {
                let mut entries: Vec<_> = map.iter().collect();
                entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
                serializer.collect_map(entries.into_iter().map(|(k, v)| (k, Canonical(v))))
            }
            scalar => scalar.serialize(serializer),
        }
    }
}

fn serialize_data<S: Serializer>(
    data: &&SessionData,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_map(data.iter().map(|(k, v)| (k, Canonical(v))))
}

/// Encode session data without an expiry.
pub fn encode(data: &SessionData) -> Result<Payload> {
    encode_parts(data, None)
}

/// Decode a payload into session data, ignoring any expiry it carries.
pub fn decode(payload: &[u8]) -> Result<SessionData> {
    decode_record(payload).map(|record| record.data)
}

/// Encode a [`Record`] into its canonical payload.
pub fn encode_record(record: &Record) -> Result<Payload> {
    encode_parts(&record.data, record.expires_at)
}

/// Decode a payload into a [`Record`].
pub fn decode_record(payload: &[u8]) -> Result<Record> {
    let envelope: Envelope = serde_json::from_slice(payload)
        .map_err(|err| Error::MalformedPayload(err.to_string()))?;

    if envelope.v != VERSION {
        return Err(Error::MalformedPayload(format!(
            "unsupported session payload version: {}",
            envelope.v
        )));
    }

    let expires_at = envelope
        .exp
        .map(OffsetDateTime::from_unix_timestamp)
        .transpose()
        .map_err(|err| Error::MalformedPayload(err.to_string()))?;

    Ok(Record {
        data: envelope.data,
        expires_at,
    })
}

/// Encode `data` with an optional expiry, exactly as it is signed.
pub(crate) fn encode_parts(
    data: &SessionData,
    expires_at: Option<OffsetDateTime>,
) -> Result<Payload> {
    if data
        .values()
        .any(|value| exceeds_depth(value, MAX_VALUE_DEPTH))
    {
        return Err(Error::UnsupportedValueKind(format!(
            "value nested deeper than {MAX_VALUE_DEPTH} levels"
        )));
    }

    let envelope = EnvelopeRef {
        v: VERSION,
        exp: expires_at.map(OffsetDateTime::unix_timestamp),
        data,
    };

    serde_json::to_vec(&envelope)
        .map(Payload)
        .map_err(|err| Error::UnsupportedValueKind(err.to_string()))
}

fn exceeds_depth(value: &Value, budget: usize) -> bool {
    match value {
        Value::Array(items) => {
            budget == 0 || items.iter().any(|item| exceeds_depth(item, budget - 1))
        }
        Value::Object(map) => {
            budget == 0 || map.values().any(|item| exceeds_depth(item, budget - 1))
        }
        _ => false,
    }
}

/// Convert an application value into a session value.
pub fn to_value<T: Serialize>(value: T) -> Result<Value> {
    serde_json::to_value(value).map_err(|err| Error::UnsupportedValueKind(err.to_string()))
}

/// Convert a stored session value back into an application type.
pub fn from_value<T: DeserializeOwned>(value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|err| Error::ValueMismatch(err.to_string()))
}
