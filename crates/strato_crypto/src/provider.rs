//! Encrypt/decrypt operations over both key families.
//!
//! RSA payloads are chunked so that plaintexts larger than one OAEP block
//! round-trip; curve payloads use an ephemeral X25519 exchange with a
//! per-operation salt fed into HKDF-SHA256, then ChaCha20-Poly1305.
//!
//! Wire format for curve ciphertexts:
//! `salt(32) || ephemeral-pub(32) || nonce(12) || aead-ciphertext`.

use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use hkdf::Hkdf;
use rand::rngs::OsRng;
use rand::RngCore;
use rsa::traits::PublicKeyParts;
use rsa::Oaep;
use sha2::Sha256;
use tracing::debug;
use x25519_dalek::StaticSecret;

use crate::error::{CryptoError, CryptoResult};
use crate::keys::{PrivateKey, PublicKey, CURVE_KEY_LEN};

/// SHA-256 digest length; OAEP reserves `2 * hash + 2` bytes per block.
const OAEP_HASH_LEN: usize = 32;

const SALT_LEN: usize = 32;
const NONCE_LEN: usize = 12;

/// Encrypt a plaintext for the given public key.
///
/// Non-deterministic: the same plaintext encrypts differently on every call
/// for both families.
pub fn encrypt(public_key: &PublicKey, plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
    match public_key {
        PublicKey::Rsa(key) => encrypt_rsa(key, plaintext),
        PublicKey::Curve(key) => encrypt_curve(key, plaintext),
    }
}

/// Decrypt a ciphertext with the given private key.
///
/// The key family drives the decode path; a ciphertext that does not fit the
/// key's framing yields a typed error, never a panic.
pub fn decrypt(private_key: &PrivateKey, ciphertext: &[u8]) -> CryptoResult<Vec<u8>> {
    match private_key {
        PrivateKey::Rsa(key) => decrypt_rsa(key, ciphertext),
        PrivateKey::Curve(secret) => decrypt_curve(&secret.0, ciphertext),
    }
}

fn encrypt_rsa(key: &rsa::RsaPublicKey, plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
    let block_size = key.size();
    let chunk_size = block_size - 2 * OAEP_HASH_LEN - 2;
    let mut ciphertext = Vec::with_capacity(plaintext.len().div_ceil(chunk_size) * block_size);

    for chunk in plaintext.chunks(chunk_size.max(1)) {
        let block = key
            .encrypt(&mut OsRng, Oaep::new::<Sha256>(), chunk)
            .map_err(|e| CryptoError::Encrypt(format!("RSA-OAEP block failed: {e}")))?;
        ciphertext.extend_from_slice(&block);
    }

    // Empty plaintext still produces one block so the ciphertext is framed.
    if plaintext.is_empty() {
        let block = key
            .encrypt(&mut OsRng, Oaep::new::<Sha256>(), &[])
            .map_err(|e| CryptoError::Encrypt(format!("RSA-OAEP block failed: {e}")))?;
        ciphertext.extend_from_slice(&block);
    }

    debug!(blocks = ciphertext.len() / block_size, "Encrypted RSA payload");
    Ok(ciphertext)
}

fn decrypt_rsa(key: &rsa::RsaPrivateKey, ciphertext: &[u8]) -> CryptoResult<Vec<u8>> {
    let block_size = key.size();
    if ciphertext.is_empty() || ciphertext.len() % block_size != 0 {
        return Err(CryptoError::TruncatedPayload {
            expected: block_size,
            actual: ciphertext.len(),
        });
    }

    let mut plaintext = Vec::new();
    for block in ciphertext.chunks(block_size) {
        let chunk = key
            .decrypt(Oaep::new::<Sha256>(), block)
            .map_err(|e| CryptoError::Decrypt(format!("RSA-OAEP block failed: {e}")))?;
        plaintext.extend_from_slice(&chunk);
    }
    Ok(plaintext)
}

fn encrypt_curve(recipient: &x25519_dalek::PublicKey, plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);

    let ephemeral = StaticSecret::random_from_rng(OsRng);
    let ephemeral_pub = x25519_dalek::PublicKey::from(&ephemeral);
    let shared = ephemeral.diffie_hellman(recipient);

    let key = derive_symmetric_key(&salt, shared.as_bytes(), recipient.as_bytes());
    let cipher = ChaCha20Poly1305::new(Key::from_slice(&key));

    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);

    let sealed = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|e| CryptoError::Encrypt(format!("AEAD seal failed: {e}")))?;

    let mut out = Vec::with_capacity(SALT_LEN + CURVE_KEY_LEN + NONCE_LEN + sealed.len());
    out.extend_from_slice(&salt);
    out.extend_from_slice(ephemeral_pub.as_bytes());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&sealed);
    Ok(out)
}

fn decrypt_curve(secret: &StaticSecret, ciphertext: &[u8]) -> CryptoResult<Vec<u8>> {
    let header = SALT_LEN + CURVE_KEY_LEN + NONCE_LEN;
    if ciphertext.len() < header {
        return Err(CryptoError::TruncatedPayload {
            expected: header,
            actual: ciphertext.len(),
        });
    }

    let (salt, rest) = ciphertext.split_at(SALT_LEN);
    let (ephemeral_bytes, rest) = rest.split_at(CURVE_KEY_LEN);
    let (nonce, sealed) = rest.split_at(NONCE_LEN);

    let ephemeral_array: [u8; CURVE_KEY_LEN] = ephemeral_bytes
        .try_into()
        .map_err(|_| CryptoError::KeyMismatch { expected: "curve" })?;
    let ephemeral_pub = x25519_dalek::PublicKey::from(ephemeral_array);
    let shared = secret.diffie_hellman(&ephemeral_pub);

    let recipient_pub = x25519_dalek::PublicKey::from(secret);
    let key = derive_symmetric_key(salt, shared.as_bytes(), recipient_pub.as_bytes());
    let cipher = ChaCha20Poly1305::new(Key::from_slice(&key));

    cipher
        .decrypt(Nonce::from_slice(nonce), sealed)
        .map_err(|e| CryptoError::Decrypt(format!("AEAD open failed: {e}")))
}

/// HKDF-SHA256: salt + shared secret, with the recipient public key as info.
fn derive_symmetric_key(salt: &[u8], shared: &[u8], recipient_pub: &[u8]) -> [u8; 32] {
    let hk = Hkdf::<Sha256>::new(Some(salt), shared);
    let mut okm = [0u8; 32];
    hk.expand(recipient_pub, &mut okm)
        .expect("32 bytes is a valid HKDF-SHA256 output length");
    okm
}
