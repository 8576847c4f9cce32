//! # strato_crypto
//!
//! Asymmetric encryption for strato secret payloads.
//!
//! Two key families share one encrypt/decrypt contract:
//!
//! - **RSA** (≥2048-bit): OAEP with SHA-256, chunked so payloads larger than
//!   one block round-trip.
//! - **Curve** (X25519): per-operation random salt + HKDF-SHA256 key
//!   derivation, ChaCha20-Poly1305 AEAD; the salt travels with the
//!   ciphertext.
//!
//! The key family is auto-detected from the key material at parse time, so
//! callers never carry a family tag next to the key.
//!
//! # Example
//!
//! ```rust
//! use strato_crypto::{encrypt, decrypt, generate_curve_keypair};
//!
//! let (public, private) = generate_curve_keypair();
//! let ciphertext = encrypt(&public, b"db-password").unwrap();
//! assert_eq!(decrypt(&private, &ciphertext).unwrap(), b"db-password");
//! ```

pub mod error;
pub mod keys;
pub mod provider;

pub use error::{CryptoError, CryptoResult};
pub use keys::{
    encode_private_key, generate_curve_keypair, generate_rsa_keypair, CurveSecret, PrivateKey,
    PublicKey, CURVE_KEY_LEN, MIN_RSA_BITS,
};
pub use provider::{decrypt, encrypt};
