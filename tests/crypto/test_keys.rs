// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Key Codec Tests

use base64::{engine::general_purpose::STANDARD, Engine};
use ectsm::crypto::keys::{public_key_to_base64, PRIVATE_KEY_SIZE, PUBLIC_KEY_SIZE};
use ectsm::crypto::{fingerprint, public_key_from_base64, CryptoError, KeyPair, SessionKey};

#[test]
fn test_private_key_base64_round_trip() {
    let pair = KeyPair::generate();
    let restored = KeyPair::from_private_base64(&pair.private_key_base64()).unwrap();
    assert_eq!(restored.public_key_base64(), pair.public_key_base64());
    assert_eq!(
        STANDARD.decode(pair.private_key_base64()).unwrap().len(),
        PRIVATE_KEY_SIZE
    );
}

#[test]
fn test_public_key_is_uncompressed() {
    let pair = KeyPair::generate();
    let bytes = STANDARD.decode(pair.public_key_base64()).unwrap();
    assert_eq!(bytes.len(), PUBLIC_KEY_SIZE);
    assert_eq!(bytes[0], 0x04);

    let parsed = public_key_from_base64(&pair.public_key_base64()).unwrap();
    assert_eq!(public_key_to_base64(&parsed), pair.public_key_base64());
}

#[test]
fn test_private_key_validation() {
    // Wrong length
    let short = STANDARD.encode([1u8; 31]);
    assert!(matches!(
        KeyPair::from_private_base64(&short),
        Err(CryptoError::InvalidKey { .. })
    ));

    // Zero scalar
    let zero = STANDARD.encode([0u8; 32]);
    assert!(KeyPair::from_private_base64(&zero).is_err());

    // Above the curve order
    let too_big = STANDARD.encode([0xffu8; 32]);
    assert!(KeyPair::from_private_base64(&too_big).is_err());
}

#[test]
fn test_invalid_public_key() {
    assert!(public_key_from_base64("!!!").is_err());
    let not_a_point = STANDARD.encode([0x04u8; 65]);
    assert!(matches!(
        public_key_from_base64(&not_a_point),
        Err(CryptoError::InvalidKey { .. })
    ));
}

#[test]
fn test_session_key_from_slice_length() {
    assert!(SessionKey::from_slice(&[1u8; 16]).is_ok());
    assert!(SessionKey::from_slice(&[1u8; 15]).is_err());
    assert!(SessionKey::from_slice(&[1u8; 32]).is_err());
}

#[test]
fn test_debug_output_redacts_keys() {
    let key = SessionKey::from_bytes([0xabu8; 16]);
    assert!(!format!("{:?}", key).to_lowercase().contains("abab"));

    let pair = KeyPair::generate();
    assert!(!format!("{:?}", pair).contains(&pair.private_key_base64()));
}

#[test]
fn test_fingerprint_is_short_and_stable() {
    let a = fingerprint("d3JhcHBlZC1rZXk=");
    assert_eq!(a.len(), 12);
    assert_eq!(a, fingerprint("d3JhcHBlZC1rZXk="));
    assert_ne!(a, fingerprint("b3RoZXIta2V5"));
}
