// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! ECIES Key Wrapping over secp256k1
//!
//! Wraps short symmetric keys under the server's public key. The layout and
//! KDF match the go-ethereum `ecies` package (AES-128 + SHA-256 parameters for
//! secp256k1), so wrapped keys interoperate with peers built on it.
//!
//! ```text
//! [ephemeral pubkey (65) | iv (16) | AES-128-CTR ciphertext | HMAC-SHA256 tag (32)]
//! ```
//!
//! 1. Generate an ephemeral key pair `(r, R)`
//! 2. Shared secret `S = x(r * Pub)`
//! 3. `K = ConcatKDF-SHA256(S, 32)`, `Ke = K[..16]`, `Km = SHA256(K[16..])`
//! 4. `c = AES-128-CTR(Ke, iv, msg)`, `d = HMAC-SHA256(Km, iv || c)`

use super::keys::{KeyPair, PUBLIC_KEY_SIZE};
use super::CryptoError;
use aes::cipher::{KeyIvInit, StreamCipher};
use hmac::{Hmac, Mac};
use k256::{
    ecdh::{diffie_hellman, EphemeralSecret},
    elliptic_curve::sec1::ToEncodedPoint,
    PublicKey, SecretKey,
};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};

type Aes128Ctr = ctr::Ctr128BE<aes::Aes128>;
type HmacSha256 = Hmac<Sha256>;

const IV_SIZE: usize = 16;
const TAG_SIZE: usize = 32;
const ENC_KEY_SIZE: usize = 16;

/// Smallest possible ciphertext: ephemeral pubkey + iv + tag (empty message)
pub const MIN_CIPHERTEXT_SIZE: usize = PUBLIC_KEY_SIZE + IV_SIZE + TAG_SIZE;

/// Encrypt `msg` to `recipient`
pub fn wrap(recipient: &PublicKey, msg: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let ephemeral = EphemeralSecret::random(&mut OsRng);
    let ephemeral_pub = ephemeral.public_key().to_encoded_point(false);
    let shared = ephemeral.diffie_hellman(recipient);

    let (enc_key, mac_key) = derive_keys(shared.raw_secret_bytes().as_slice());

    let mut iv = [0u8; IV_SIZE];
    OsRng.fill_bytes(&mut iv);

    let mut body = msg.to_vec();
    Aes128Ctr::new_from_slices(&enc_key, &iv)
        .map_err(|e| CryptoError::EncryptionFailed {
            operation: "ecies_wrap".to_string(),
            reason: e.to_string(),
        })?
        .apply_keystream(&mut body);

    let mut out = Vec::with_capacity(MIN_CIPHERTEXT_SIZE + body.len());
    out.extend_from_slice(ephemeral_pub.as_bytes());
    out.extend_from_slice(&iv);
    out.extend_from_slice(&body);

    let tag = message_tag(&mac_key, &out[PUBLIC_KEY_SIZE..])?;
    out.extend_from_slice(&tag);
    Ok(out)
}

/// Decrypt an ECIES ciphertext with the recipient's private key
///
/// Malformed ephemeral points, truncated input and MAC mismatches all
/// produce the same `DecryptionFailed` error.
pub fn unwrap(secret: &SecretKey, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let failed = || CryptoError::decryption("ecies_unwrap");

    if ciphertext.len() < MIN_CIPHERTEXT_SIZE || ciphertext[0] != 0x04 {
        return Err(failed());
    }

    let ephemeral_pub =
        PublicKey::from_sec1_bytes(&ciphertext[..PUBLIC_KEY_SIZE]).map_err(|_| failed())?;
    let shared = diffie_hellman(secret.to_nonzero_scalar(), ephemeral_pub.as_affine());
    let (enc_key, mac_key) = derive_keys(shared.raw_secret_bytes().as_slice());

    let tag_start = ciphertext.len() - TAG_SIZE;
    let authenticated = &ciphertext[PUBLIC_KEY_SIZE..tag_start];

    let mut mac = HmacSha256::new_from_slice(&mac_key).map_err(|_| failed())?;
    mac.update(authenticated);
    mac.verify_slice(&ciphertext[tag_start..])
        .map_err(|_| failed())?;

    let (iv, body) = authenticated.split_at(IV_SIZE);
    let mut plaintext = body.to_vec();
    Aes128Ctr::new_from_slices(&enc_key, iv)
        .map_err(|_| failed())?
        .apply_keystream(&mut plaintext);

    Ok(plaintext)
}

/// Convenience wrapper taking the full key pair
pub fn unwrap_with(key_pair: &KeyPair, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    unwrap(key_pair.secret(), ciphertext)
}

/// NIST SP 800-56 concatenation KDF, single SHA-256 block (counter = 1)
fn derive_keys(shared: &[u8]) -> ([u8; ENC_KEY_SIZE], [u8; 32]) {
    let mut hasher = Sha256::new();
    hasher.update(1u32.to_be_bytes());
    hasher.update(shared);
    let k = hasher.finalize();

    let mut enc_key = [0u8; ENC_KEY_SIZE];
    enc_key.copy_from_slice(&k[..ENC_KEY_SIZE]);

    let mac_key: [u8; 32] = Sha256::digest(&k[ENC_KEY_SIZE..]).into();
    (enc_key, mac_key)
}

fn message_tag(mac_key: &[u8], data: &[u8]) -> Result<[u8; TAG_SIZE], CryptoError> {
    let mut mac = HmacSha256::new_from_slice(mac_key).map_err(|e| CryptoError::EncryptionFailed {
        operation: "ecies_wrap".to_string(),
        reason: e.to_string(),
    })?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().into())
}
