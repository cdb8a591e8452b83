// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! ECIES Key Wrapping Tests

use ectsm::crypto::{ecies, CryptoError, KeyPair, SessionKey};

#[test]
fn test_wrap_unwrap_session_key() {
    let pair = KeyPair::generate();
    let key = SessionKey::generate();

    let wrapped = ecies::wrap(pair.public_key(), key.as_bytes()).unwrap();
    assert_eq!(wrapped.len(), ecies::MIN_CIPHERTEXT_SIZE + 16);
    assert_eq!(wrapped[0], 0x04, "Ephemeral key should be uncompressed");

    let unwrapped = ecies::unwrap(pair.secret(), &wrapped).unwrap();
    assert_eq!(unwrapped.as_slice(), key.as_bytes());
}

#[test]
fn test_wrap_is_probabilistic() {
    // Each wrap uses a fresh ephemeral key, so the same input never repeats
    let pair = KeyPair::generate();
    let key = SessionKey::generate();

    let a = ecies::wrap(pair.public_key(), key.as_bytes()).unwrap();
    let b = ecies::wrap(pair.public_key(), key.as_bytes()).unwrap();
    assert_ne!(a, b);
}

#[test]
fn test_wrong_private_key_fails() {
    let server = KeyPair::generate();
    let other = KeyPair::generate();
    let wrapped = ecies::wrap(other.public_key(), b"0123456789abcdef").unwrap();

    let result = ecies::unwrap_with(&server, &wrapped);
    assert!(matches!(result, Err(CryptoError::DecryptionFailed { .. })));
}

#[test]
fn test_tampered_ciphertext_fails() {
    let pair = KeyPair::generate();
    let mut wrapped = ecies::wrap(pair.public_key(), b"0123456789abcdef").unwrap();
    let last = wrapped.len() - 40;
    wrapped[last] ^= 0x01;

    assert!(ecies::unwrap_with(&pair, &wrapped).is_err());
}

#[test]
fn test_short_input_fails_uniformly() {
    let pair = KeyPair::generate();
    for len in [0usize, 1, 65, ecies::MIN_CIPHERTEXT_SIZE - 1] {
        let result = ecies::unwrap_with(&pair, &vec![0x04u8; len]);
        assert_eq!(
            result,
            Err(CryptoError::DecryptionFailed {
                operation: "ecies_unwrap".to_string()
            }),
            "len {}",
            len
        );
    }
}
