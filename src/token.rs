//! The cookie value: `base64url(payload) "." base64url(signature)`.

use std::fmt;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};

use crate::{
    codec::Payload,
    error::{Error, Result},
    signer::Signature,
};

/// Separates the payload and signature segments. Not part of the base64url alphabet.
pub const DELIMITER: char = '.';

/// Signed session token as it travels in `Cookie` / `Set-Cookie`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token(String);

impl Token {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Token {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<Token> for String {
    fn from(token: Token) -> Self {
        token.0
    }
}

/// Length of the token [`assemble`] would produce, without building it.
pub fn encoded_len(payload_len: usize, signature_len: usize) -> usize {
    base64_len(payload_len) + DELIMITER.len_utf8() + base64_len(signature_len)
}

/// Largest payload that still assembles into a token of at most `max_len` bytes.
pub fn max_payload_len(max_len: usize, signature_len: usize) -> usize {
    let available = max_len.saturating_sub(DELIMITER.len_utf8() + base64_len(signature_len));
    available * 3 / 4
}

fn base64_len(len: usize) -> usize {
    (len * 4).div_ceil(3)
}

/// Join a payload and its signature into a token no longer than `max_len`.
pub fn assemble(payload: &Payload, signature: &Signature, max_len: usize) -> Result<Token> {
    let size = encoded_len(payload.len(), signature.len());
    if size > max_len {
        return Err(Error::TokenTooLarge {
            size,
            limit: max_len,
        });
    }

    let mut token = String::with_capacity(size);
    URL_SAFE_NO_PAD.encode_string(payload, &mut token);
    token.push(DELIMITER);
    URL_SAFE_NO_PAD.encode_string(signature, &mut token);
    Ok(Token(token))
}

/// Split a token back into its payload and signature.
///
/// Only canonical unpadded base64url is accepted, so two distinct strings never decode to the
/// same segment bytes.
pub fn disassemble(token: &str, max_len: usize) -> Result<(Payload, Signature)> {
    if token.len() > max_len {
        return Err(Error::TokenTooLarge {
            size: token.len(),
            limit: max_len,
        });
    }

    let (payload, signature) = token
        .split_once(DELIMITER)
        .ok_or(Error::MalformedToken("missing delimiter"))?;
    if signature.contains(DELIMITER) {
        return Err(Error::MalformedToken("unexpected delimiter"));
    }
    if payload.is_empty() {
        return Err(Error::MalformedToken("empty payload segment"));
    }
    if signature.is_empty() {
        return Err(Error::MalformedToken("empty signature segment"));
    }

    let payload = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|_| Error::MalformedToken("payload segment is not base64url"))?;
    let signature = URL_SAFE_NO_PAD
        .decode(signature)
        .map_err(|_| Error::MalformedToken("signature segment is not base64url"))?;

    Ok((Payload::from(payload), Signature::from(signature)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts() -> (Payload, Signature) {
        (
            Payload::from(br#"{"v":1,"data":{}}"#.to_vec()),
            Signature::from(vec![0xfb; 32]),
        )
    }

    #[test]
    fn assembles_two_base64url_segments() {
        let (payload, signature) = parts();
        let token = assemble(&payload, &signature, 4096).expect("token fits");

        let (left, right) = token.as_str().split_once('.').expect("token has delimiter");
        assert_eq!(left, "eyJ2IjoxLCJkYXRhIjp7fX0");
        assert_eq!(right.len(), 43);
        assert!(
            token
                .as_str()
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || b == b'.')
        );
        assert_eq!(token.len(), encoded_len(payload.len(), signature.len()));
    }

    #[test]
    fn disassemble_reverses_assemble() {
        let (payload, signature) = parts();
        let token = assemble(&payload, &signature, 4096).expect("token fits");

        let (p, s) = disassemble(token.as_str(), 4096).expect("token splits");

        assert_eq!(p, payload);
        assert_eq!(s, signature);
    }

    #[test]
    fn assemble_refuses_to_exceed_limit() {
        let (payload, signature) = parts();
        let size = encoded_len(payload.len(), signature.len());

        assert!(assemble(&payload, &signature, size).is_ok());
        let err = assemble(&payload, &signature, size - 1).expect_err("token is too large");
        assert!(matches!(err, Error::TokenTooLarge { limit, .. } if limit == size - 1));
    }

    #[test]
    fn max_payload_len_is_tight() {
        for signature_len in [32, 64] {
            for max_len in [0, 44, 45, 128, 4095, 4096, 4097] {
                let payload_len = max_payload_len(max_len, signature_len);

                if payload_len > 0 {
                    assert!(encoded_len(payload_len, signature_len) <= max_len);
                }
                assert!(encoded_len(payload_len + 1, signature_len) > max_len);
            }
        }

        assert_eq!(max_payload_len(4096, 64), 3006);
        assert_eq!(max_payload_len(4096, 32), 3039);
        assert_eq!(max_payload_len(32, 32), 0);
    }

    #[test]
    fn rejects_structurally_invalid_tokens() {
        for bad in [
            "",
            "nodelimiter",
            ".c2ln",
            "cGF5bG9hZA.",
            "cGF5bG9hZA.c2ln.c2ln",
            "cGF5bG9hZA==.c2ln",
            "cGF5 bG9hZA.c2ln",
            "cGF5bG9hZA.c2l+",
            "cGF5bG9hZB.c2ln",
        ] {
            let err = disassemble(bad, 4096).expect_err("token is rejected");
            assert!(matches!(err, Error::MalformedToken(_)), "{bad:?}: {err:?}");
        }
    }

    #[test]
    fn rejects_oversized_input_before_parsing() {
        let token = "A".repeat(65);

        let err = disassemble(&token, 64).expect_err("token is too large");

        assert!(matches!(err, Error::TokenTooLarge { size: 65, limit: 64 }));
    }
}
