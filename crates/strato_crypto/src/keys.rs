//! Key parsing and generation.
//!
//! Two key families are supported: RSA (PEM-encoded, PKCS#1 or PKCS#8) and
//! X25519 curve keys (base64-encoded 32-byte raw keys). The family is
//! detected from the key material itself, never from a stored tag.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use rand::rngs::OsRng;
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey, EncodeRsaPrivateKey, EncodeRsaPublicKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use x25519_dalek::StaticSecret;

use crate::error::{CryptoError, CryptoResult};

/// Minimum accepted RSA modulus size in bits.
pub const MIN_RSA_BITS: usize = 2048;

/// Length of a raw X25519 key in bytes.
pub const CURVE_KEY_LEN: usize = 32;

/// An X25519 private key handle.
///
/// Wrapped so that both owning and borrowed handles convert into
/// [`PrivateKey`]; callers holding a `&CurveSecret` get the same decrypt
/// path as callers holding the secret itself.
#[derive(Clone)]
pub struct CurveSecret(pub(crate) StaticSecret);

impl CurveSecret {
    pub fn from_bytes(bytes: [u8; CURVE_KEY_LEN]) -> Self {
        Self(StaticSecret::from(bytes))
    }

    /// The corresponding public key.
    pub fn public_key(&self) -> x25519_dalek::PublicKey {
        x25519_dalek::PublicKey::from(&self.0)
    }
}

/// A public key of either supported family.
#[derive(Clone, Debug)]
pub enum PublicKey {
    Rsa(RsaPublicKey),
    Curve(x25519_dalek::PublicKey),
}

/// A private key of either supported family.
#[derive(Clone)]
pub enum PrivateKey {
    Rsa(RsaPrivateKey),
    Curve(CurveSecret),
}

impl From<CurveSecret> for PrivateKey {
    fn from(secret: CurveSecret) -> Self {
        PrivateKey::Curve(secret)
    }
}

impl From<&CurveSecret> for PrivateKey {
    fn from(secret: &CurveSecret) -> Self {
        PrivateKey::Curve(secret.clone())
    }
}

impl PublicKey {
    /// Parse a public key, detecting the family from the material.
    ///
    /// PEM blocks are treated as RSA; anything else must be a base64-encoded
    /// 32-byte X25519 key.
    pub fn parse(material: &str) -> CryptoResult<Self> {
        let material = material.trim();
        if material.contains("-----BEGIN") {
            let key = RsaPublicKey::from_pkcs1_pem(material)
                .or_else(|_| RsaPublicKey::from_public_key_pem(material))
                .map_err(|e| CryptoError::KeyParse(format!("invalid RSA public key: {e}")))?;
            check_rsa_size(key.n().bits())?;
            return Ok(PublicKey::Rsa(key));
        }

        let bytes = decode_curve_bytes(material)?;
        Ok(PublicKey::Curve(x25519_dalek::PublicKey::from(bytes)))
    }

    /// Encode the key back to its storage representation.
    pub fn encode(&self) -> CryptoResult<String> {
        match self {
            PublicKey::Rsa(key) => key
                .to_pkcs1_pem(LineEnding::LF)
                .map_err(|e| CryptoError::KeyParse(format!("failed to encode RSA key: {e}"))),
            PublicKey::Curve(key) => Ok(BASE64.encode(key.as_bytes())),
        }
    }

    /// Human-readable family name, used in error messages.
    pub fn family(&self) -> &'static str {
        match self {
            PublicKey::Rsa(_) => "rsa",
            PublicKey::Curve(_) => "curve",
        }
    }
}

impl PrivateKey {
    /// Parse a private key, detecting the family from the material.
    pub fn parse(material: &str) -> CryptoResult<Self> {
        let material = material.trim();
        if material.contains("-----BEGIN") {
            let key = RsaPrivateKey::from_pkcs1_pem(material)
                .or_else(|_| RsaPrivateKey::from_pkcs8_pem(material))
                .map_err(|e| CryptoError::KeyParse(format!("invalid RSA private key: {e}")))?;
            check_rsa_size(key.n().bits())?;
            return Ok(PrivateKey::Rsa(key));
        }

        let bytes = decode_curve_bytes(material)?;
        Ok(PrivateKey::Curve(CurveSecret::from_bytes(bytes)))
    }

    /// The matching public key.
    pub fn public_key(&self) -> PublicKey {
        match self {
            PrivateKey::Rsa(key) => PublicKey::Rsa(RsaPublicKey::from(key)),
            PrivateKey::Curve(secret) => PublicKey::Curve(secret.public_key()),
        }
    }

    pub fn family(&self) -> &'static str {
        match self {
            PrivateKey::Rsa(_) => "rsa",
            PrivateKey::Curve(_) => "curve",
        }
    }
}

/// Generate a fresh RSA keypair.
pub fn generate_rsa_keypair(bits: usize) -> CryptoResult<(PublicKey, PrivateKey)> {
    check_rsa_size(bits)?;
    let private = RsaPrivateKey::new(&mut OsRng, bits)
        .map_err(|e| CryptoError::KeyParse(format!("RSA key generation failed: {e}")))?;
    let public = RsaPublicKey::from(&private);
    Ok((PublicKey::Rsa(public), PrivateKey::Rsa(private)))
}

/// Generate a fresh X25519 keypair.
pub fn generate_curve_keypair() -> (PublicKey, PrivateKey) {
    let secret = CurveSecret(StaticSecret::random_from_rng(OsRng));
    let public = secret.public_key();
    (PublicKey::Curve(public), PrivateKey::Curve(secret))
}

/// Encode an RSA private key to PEM for storage.
pub fn encode_private_key(key: &PrivateKey) -> CryptoResult<String> {
    match key {
        PrivateKey::Rsa(key) => key
            .to_pkcs1_pem(LineEnding::LF)
            .map(|pem| pem.to_string())
            .map_err(|e| CryptoError::KeyParse(format!("failed to encode RSA key: {e}"))),
        PrivateKey::Curve(secret) => Ok(BASE64.encode(secret.0.to_bytes())),
    }
}

fn check_rsa_size(bits: usize) -> CryptoResult<()> {
    if bits < MIN_RSA_BITS {
        return Err(CryptoError::KeyTooSmall {
            bits,
            minimum: MIN_RSA_BITS,
        });
    }
    Ok(())
}

fn decode_curve_bytes(material: &str) -> CryptoResult<[u8; CURVE_KEY_LEN]> {
    let decoded = BASE64
        .decode(material)
        .map_err(|e| CryptoError::KeyParse(format!("key is neither PEM nor base64: {e}")))?;
    let bytes: [u8; CURVE_KEY_LEN] = decoded.as_slice().try_into().map_err(|_| {
        CryptoError::KeyParse(format!(
            "curve key must be {CURVE_KEY_LEN} bytes, got {}",
            decoded.len()
        ))
    })?;
    Ok(bytes)
}
