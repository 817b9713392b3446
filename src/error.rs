use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced while encoding, signing and parsing session cookies.
///
/// The verification-path variants ([`Error::is_rejection`]) never reach application code through
/// [`Session`](crate::Session): an inbound token failing any of those checks is discarded and the
/// request starts with an empty session. Size and value errors are returned to the caller.
#[derive(Debug, Error)]
pub enum Error {
    /// The token is not `payload.signature` in unpadded base64url.
    #[error("malformed session token: {0}")]
    MalformedToken(&'static str),

    /// The token is well formed but no configured key produced its signature.
    #[error("session token signature mismatch")]
    SignatureMismatch,

    /// The payload was authenticated but does not decode as a session envelope.
    #[error("malformed session payload: {0}")]
    MalformedPayload(String),

    /// The payload was authenticated but its signed expiry has passed.
    #[error("session token expired")]
    Expired,

    #[error("session payload exceeds its size ceiling ({size} > {limit})")]
    SessionTooLarge { size: usize, limit: usize },

    #[error("session token exceeds max_token_bytes ({size} > {limit})")]
    TokenTooLarge { size: usize, limit: usize },

    /// The value cannot be represented as a JSON session value.
    #[error("unsupported session value: {0}")]
    UnsupportedValueKind(String),

    /// The stored value does not deserialize into the requested type.
    #[error("session value has an unexpected type: {0}")]
    ValueMismatch(String),

    #[error("invalid secret key: {0}")]
    InvalidKey(String),
}

impl Error {
    /// Whether this error can reject an inbound token, in which case it is swallowed and the
    /// request starts with an empty session.
    ///
    /// [`Error::TokenTooLarge`] plays both roles: inbound it rejects an oversized cookie, while
    /// from [`SessionAdapter::finalize_response`](crate::SessionAdapter::finalize_response) or
    /// [`SessionAdapter::issue`](crate::SessionAdapter::issue) it is a save failure. Callers on
    /// the outbound path should treat any error as a failure regardless of this flag.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::MalformedToken(_)
                | Self::SignatureMismatch
                | Self::MalformedPayload(_)
                | Self::Expired
                | Self::TokenTooLarge { .. }
        )
    }

    /// Coarse label safe to log; carries no token or payload content.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::MalformedToken(_) => "malformed_token",
            Self::SignatureMismatch => "signature_mismatch",
            Self::MalformedPayload(_) => "malformed_payload",
            Self::Expired => "expired",
            Self::SessionTooLarge { .. } => "session_too_large",
            Self::TokenTooLarge { .. } => "token_too_large",
            Self::UnsupportedValueKind(_) => "unsupported_value_kind",
            Self::ValueMismatch(_) => "value_mismatch",
            Self::InvalidKey(_) => "invalid_key",
        }
    }
}
