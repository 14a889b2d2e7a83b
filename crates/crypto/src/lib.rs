//! # cipherchat-crypto
//!
//! Ende-zu-Ende Verschluesselung fuer Cipherchat. Der Relay benutzt dieses
//! Crate nicht: er sieht nur die fertigen Umschlaege.
//!
//! ## Module
//! - `aead` - AES-256-GCM Umschlaege (16-Byte Nonce, 16-Byte Tag)
//! - `kem` - X25519 Schluessel-Kapselung fuer die Aushandlung
//! - `types` - `SecretBytes` (wird beim Drop genullt)
//! - `error` - Fehlertypen

pub mod aead;
pub mod error;
pub mod kem;
pub mod types;

// Bequeme Re-Exports
pub use aead::{entschluesseln, verschluesseln, NONCE_LAENGE, SCHLUESSEL_LAENGE, TAG_LAENGE};
pub use error::{CryptoError, CryptoResult};
pub use kem::{kapseln, Kapselung, Schluesselpaar};
pub use types::SecretBytes;
