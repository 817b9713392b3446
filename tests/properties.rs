// Property tests for the codec, signer and the fail-closed loading path.
use proptest::prelude::*;
use serde_json::Value;

use signed_session_cookie::{
    CookieSessionConfig, Keyring, MacAlgorithm, SecretKey, SessionAdapter, SessionData, codec,
    sign,
};

const BASE64URL: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_.";

fn value() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::from),
        any::<u64>().prop_map(Value::from),
        (-1.0e12f64..1.0e12).prop_map(Value::from),
        ".{0,16}".prop_map(Value::String),
    ];
    leaf.prop_recursive(3, 32, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map(".{0,6}", inner, 0..4)
                .prop_map(|map| Value::Object(map.into_iter().collect())),
        ]
    })
}

fn session_data() -> impl Strategy<Value = SessionData> {
    prop::collection::btree_map("[a-z_]{1,8}", value(), 0..6)
}

fn key() -> impl Strategy<Value = SecretKey> {
    prop::array::uniform32(any::<u8>())
        .prop_map(|bytes| SecretKey::from_bytes(&bytes).expect("32-byte key is accepted"))
}

fn adapter(key: SecretKey) -> SessionAdapter {
    SessionAdapter::new(key).with_config(
        CookieSessionConfig::default()
            .with_max_session_bytes(1 << 20)
            .with_max_token_bytes(1 << 20),
    )
}

proptest! {
    #[test]
    fn codec_round_trips(data in session_data()) {
        let payload = codec::encode(&data).expect("data encodes");

        prop_assert_eq!(codec::decode(payload.as_bytes()).expect("payload decodes"), data);
    }

    #[test]
    fn signing_is_deterministic(
        payload in prop::collection::vec(any::<u8>(), 0..256),
        key in key(),
    ) {
        for algorithm in [MacAlgorithm::HmacSha256, MacAlgorithm::HmacSha512] {
            prop_assert_eq!(
                sign(algorithm, &payload, &key).expect("payload signs"),
                sign(algorithm, &payload, &key).expect("payload signs")
            );
        }
    }

    #[test]
    fn issued_tokens_load_back(data in session_data(), key in key()) {
        let adapter = adapter(key);
        let token = adapter.issue(&data).expect("session issues");

        let session = adapter.begin_request(Some(token.as_str()));

        prop_assert_eq!(session.snapshot(), data);
        prop_assert!(!session.is_modified());
    }

    #[test]
    fn any_single_character_change_is_rejected(
        data in session_data(),
        key in key(),
        index in any::<prop::sample::Index>(),
        replacement in prop::sample::select(BASE64URL),
    ) {
        let adapter = adapter(key);
        let token = adapter.issue(&data).expect("session issues").into_string();
        let mut bytes = token.into_bytes();
        let index = index.index(bytes.len());
        prop_assume!(bytes[index] != replacement);
        bytes[index] = replacement;
        let tampered = String::from_utf8(bytes).expect("token stays ascii");

        let session = adapter.begin_request(Some(&tampered));

        prop_assert!(session.is_empty());
        prop_assert_eq!(adapter.rejected_tokens(), 1);
    }

    #[test]
    fn tokens_do_not_verify_under_another_key(data in session_data(), k1 in key(), k2 in key()) {
        prop_assume!(k1 != k2);
        let token = adapter(k1).issue(&data).expect("session issues");

        let verifier = adapter(k2);

        prop_assert!(verifier.begin_request(Some(token.as_str())).is_empty());
        prop_assert_eq!(verifier.rejected_tokens(), 1);
    }

    #[test]
    fn fallback_keys_verify_but_never_sign(data in session_data(), k1 in key(), k2 in key()) {
        prop_assume!(k1 != k2);
        let old = adapter(k1.clone()).issue(&data).expect("session issues");

        let ring = SessionAdapter::new(Keyring::new(k2.clone()).with_fallback(k1.clone()))
            .with_config(
                CookieSessionConfig::default()
                    .with_max_session_bytes(1 << 20)
                    .with_max_token_bytes(1 << 20),
            );
        prop_assert_eq!(ring.begin_request(Some(old.as_str())).snapshot(), data.clone());

        let new = ring.issue(&data).expect("session issues");
        prop_assert!(adapter(k1).begin_request(Some(new.as_str())).is_empty());
        prop_assert_eq!(adapter(k2).begin_request(Some(new.as_str())).snapshot(), data);
    }
}
