//! AEAD-Umschlaege fuer Direktnachrichten
//!
//! AES-256-GCM mit 128-Bit-Nonce und 128-Bit-Auth-Tag. Der Schluessel ist
//! das zwischen zwei Teilnehmern ausgehandelte Secret.
//!
//! ## Format
//! ```text
//! [nonce(16)] [ciphertext(n)] [auth_tag(16)]
//! ```
//!
//! Die Nonce kommt fuer jede Nachricht frisch aus dem OS-Zufallsgenerator.
//! Eine wiederholte Nonce unter demselben Schluessel bricht Vertraulichkeit
//! und Integritaet aller Nachrichten dieses Schluessels.

use aes_gcm::aead::consts::U16;
use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::aes::Aes256;
use aes_gcm::AesGcm;
use rand::rngs::OsRng;
use rand::RngCore;

use crate::error::{CryptoError, CryptoResult};

/// Laenge der Nonce am Anfang jedes Umschlags
pub const NONCE_LAENGE: usize = 16;

/// Laenge des angehaengten Auth-Tags
pub const TAG_LAENGE: usize = 16;

/// Erwartete Schluessel-Laenge (AES-256)
pub const SCHLUESSEL_LAENGE: usize = 32;

/// AES-256-GCM mit 16-Byte-Nonce (Tag-Groesse Standard: 16 Bytes)
type Aes256Gcm16 = AesGcm<Aes256, U16>;

/// Verschluesselt `plaintext` und gibt `nonce ‖ ciphertext ‖ tag` zurueck
///
/// Schlaegt nur bei falscher Schluessel-Laenge fehl.
pub fn verschluesseln(plaintext: &[u8], key: &[u8]) -> CryptoResult<Vec<u8>> {
    let cipher = cipher_erstellen(key)?;

    let mut nonce_bytes = [0u8; NONCE_LAENGE];
    OsRng.fill_bytes(&mut nonce_bytes);

    let ciphertext = cipher
        .encrypt(GenericArray::from_slice(&nonce_bytes), plaintext)
        .map_err(|_| CryptoError::Verschluesselung)?;

    let mut umschlag = Vec::with_capacity(NONCE_LAENGE + ciphertext.len());
    umschlag.extend_from_slice(&nonce_bytes);
    umschlag.extend_from_slice(&ciphertext);
    Ok(umschlag)
}

/// Entschluesselt einen Umschlag aus [`verschluesseln`]
///
/// # Fehler
/// - `UngueltigeSchluesselLaenge` wenn der Schluessel nicht 32 Bytes hat
/// - `UngueltigerUmschlag` wenn der Umschlag leer oder kuerzer als die Nonce ist
/// - `AuthentifizierungFehlgeschlagen` bei jedem Tag-Fehler (falscher
///   Schluessel, manipulierte Nonce, manipulierter Ciphertext oder Tag)
pub fn entschluesseln(umschlag: &[u8], key: &[u8]) -> CryptoResult<Vec<u8>> {
    let cipher = cipher_erstellen(key)?;

    if umschlag.len() < NONCE_LAENGE {
        return Err(CryptoError::UngueltigerUmschlag {
            laenge: umschlag.len(),
            minimum: NONCE_LAENGE,
        });
    }

    let (nonce_bytes, ciphertext) = umschlag.split_at(NONCE_LAENGE);

    cipher
        .decrypt(GenericArray::from_slice(nonce_bytes), ciphertext)
        .map_err(|_| CryptoError::AuthentifizierungFehlgeschlagen)
}

fn cipher_erstellen(key: &[u8]) -> CryptoResult<Aes256Gcm16> {
    if key.len() != SCHLUESSEL_LAENGE {
        return Err(CryptoError::UngueltigeSchluesselLaenge {
            erwartet: SCHLUESSEL_LAENGE,
            erhalten: key.len(),
        });
    }

    Aes256Gcm16::new_from_slice(key).map_err(|_| CryptoError::UngueltigeSchluesselLaenge {
        erwartet: SCHLUESSEL_LAENGE,
        erhalten: key.len(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
