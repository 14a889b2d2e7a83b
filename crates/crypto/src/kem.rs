//! X25519 Schluessel-Kapselung fuer die Aushandlung zwischen zwei Teilnehmern
//!
//! Jeder Client hat ein Langzeit-Schluesselpaar, dessen oeffentliche Haelfte
//! beim Join im Verzeichnis landet. Der Initiator einer Aushandlung:
//! 1. erzeugt ein ephemeres X25519-Paar
//! 2. rechnet DH mit dem oeffentlichen Schluessel des Ziels
//! 3. leitet via HKDF-SHA256 den 32-Byte-Nachrichtenschluessel ab
//! 4. schickt den ephemeren oeffentlichen Schluessel als "Kapsel" ueber den Relay
//!
//! Das Ziel rechnet mit seinem Langzeit-Secret dasselbe DH und erhaelt
//! denselben Schluessel. Der Relay sieht nur die Kapsel.

use hkdf::Hkdf;
use rand::rngs::OsRng;
use sha2::Sha256;
use x25519_dalek::{EphemeralSecret, PublicKey as X25519PublicKey, StaticSecret};

use crate::aead::SCHLUESSEL_LAENGE;
use crate::error::{CryptoError, CryptoResult};
use crate::types::SecretBytes;

/// Laenge eines X25519-Schluessels (oeffentlich wie geheim)
pub const X25519_LAENGE: usize = 32;

/// HKDF-Info fuer den ausgehandelten Nachrichtenschluessel
const HKDF_INFO: &[u8] = b"cipherchat-negotiation-v1";

/// Ergebnis einer Kapselung auf Initiator-Seite
#[derive(Debug)]
pub struct Kapselung {
    /// Wird ueber den Relay an das Ziel geschickt
    pub kapsel: Vec<u8>,
    /// Ausgehandelter Nachrichtenschluessel (32 Bytes)
    pub schluessel: SecretBytes,
}

/// Langzeit-Schluesselpaar eines Clients
pub struct Schluesselpaar {
    secret: StaticSecret,
    public_key: [u8; X25519_LAENGE],
}

impl Schluesselpaar {
    /// Erzeugt ein frisches Schluesselpaar
    pub fn erzeugen() -> Self {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public_key = X25519PublicKey::from(&secret).to_bytes();
        Self { secret, public_key }
    }

    pub fn public_key(&self) -> &[u8; X25519_LAENGE] {
        &self.public_key
    }

    /// Oeffnet eine Kapsel die an diesen Schluessel gerichtet wurde
    pub fn entkapseln(&self, kapsel: &[u8]) -> CryptoResult<SecretBytes> {
        let ephemeral = public_key_lesen(kapsel)?;
        let dh = self.secret.diffie_hellman(&X25519PublicKey::from(ephemeral));
        if !dh.was_contributory() {
            return Err(CryptoError::KeyExchange(
                "Kapsel enthaelt einen Punkt niedriger Ordnung".to_string(),
            ));
        }

        schluessel_ableiten(dh.as_bytes(), &ephemeral, &self.public_key)
    }
}

impl std::fmt::Debug for Schluesselpaar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Schluesselpaar")
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}

/// Kapselt einen frischen Nachrichtenschluessel fuer `empfaenger_public_key`
pub fn kapseln(empfaenger_public_key: &[u8]) -> CryptoResult<Kapselung> {
    let empfaenger = public_key_lesen(empfaenger_public_key)?;

    let ephemeral_secret = EphemeralSecret::random_from_rng(OsRng);
    let ephemeral_public = X25519PublicKey::from(&ephemeral_secret).to_bytes();

    let dh = ephemeral_secret.diffie_hellman(&X25519PublicKey::from(empfaenger));
    if !dh.was_contributory() {
        return Err(CryptoError::KeyExchange(
            "Oeffentlicher Schluessel des Empfaengers ist ein Punkt niedriger Ordnung".to_string(),
        ));
    }

    let schluessel = schluessel_ableiten(dh.as_bytes(), &ephemeral_public, &empfaenger)?;
    Ok(Kapselung {
        kapsel: ephemeral_public.to_vec(),
        schluessel,
    })
}

fn public_key_lesen(bytes: &[u8]) -> CryptoResult<[u8; X25519_LAENGE]> {
    bytes
        .try_into()
        .map_err(|_| CryptoError::UngueltigeSchluesselLaenge {
            erwartet: X25519_LAENGE,
            erhalten: bytes.len(),
        })
}

/// Leitet den Nachrichtenschluessel via HKDF-SHA256 ab
///
/// Salt = ephemerer Schluessel ‖ Empfaenger-Schluessel, damit jede Kapsel
/// an genau ein Paar gebunden ist.
fn schluessel_ableiten(
    dh_secret: &[u8],
    ephemeral_public: &[u8; X25519_LAENGE],
    empfaenger_public: &[u8; X25519_LAENGE],
) -> CryptoResult<SecretBytes> {
    let mut salt = [0u8; 2 * X25519_LAENGE];
    salt[..X25519_LAENGE].copy_from_slice(ephemeral_public);
    salt[X25519_LAENGE..].copy_from_slice(empfaenger_public);

    let hk = Hkdf::<Sha256>::new(Some(&salt), dh_secret);
    let mut schluessel = vec![0u8; SCHLUESSEL_LAENGE];
    hk.expand(HKDF_INFO, &mut schluessel)
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;

    Ok(SecretBytes::new(schluessel))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aead::{entschluesseln, verschluesseln};

    #[test]
    fn beide_seiten_erhalten_denselben_schluessel() {
        let bob = Schluesselpaar::erzeugen();

        let kapselung = kapseln(bob.public_key()).unwrap();
        let bei_bob = bob.entkapseln(&kapselung.kapsel).unwrap();

        assert_eq!(kapselung.schluessel, bei_bob);
        assert_eq!(bei_bob.len(), SCHLUESSEL_LAENGE);
    }

    #[test]
    fn ausgehandelter_schluessel_taugt_fuer_umschlaege() {
        let bob = Schluesselpaar::erzeugen();
        let kapselung = kapseln(bob.public_key()).unwrap();
        let bei_bob = bob.entkapseln(&kapselung.kapsel).unwrap();

        let umschlag = verschluesseln(b"hallo", kapselung.schluessel.as_bytes()).unwrap();
        assert_eq!(entschluesseln(&umschlag, bei_bob.as_bytes()).unwrap(), b"hallo");
    }

    #[test]
    fn jede_kapselung_ist_frisch() {
        let bob = Schluesselpaar::erzeugen();
        let a = kapseln(bob.public_key()).unwrap();
        let b = kapseln(bob.public_key()).unwrap();

        assert_ne!(a.kapsel, b.kapsel);
        assert_ne!(a.schluessel, b.schluessel);
    }

    #[test]
    fn falscher_empfaenger_erhaelt_anderen_schluessel() {
        let bob = Schluesselpaar::erzeugen();
        let mallory = Schluesselpaar::erzeugen();

        let kapselung = kapseln(bob.public_key()).unwrap();
        let bei_mallory = mallory.entkapseln(&kapselung.kapsel).unwrap();

        assert_ne!(kapselung.schluessel, bei_mallory);
    }

    #[test]
    fn kapsel_mit_falscher_laenge() {
        let bob = Schluesselpaar::erzeugen();
        let result = bob.entkapseln(&[1u8; 31]);
        assert!(matches!(
            result,
            Err(CryptoError::UngueltigeSchluesselLaenge { erwartet: 32, erhalten: 31 })
        ));

        assert!(kapseln(&[]).is_err());
    }

    #[test]
    fn null_punkt_wird_abgelehnt() {
        let bob = Schluesselpaar::erzeugen();
        let result = bob.entkapseln(&[0u8; X25519_LAENGE]);
        assert!(matches!(result, Err(CryptoError::KeyExchange(_))));
    }

    #[test]
    fn debug_zeigt_kein_secret() {
        let paar = Schluesselpaar::erzeugen();
        let text = format!("{:?}", paar);
        assert!(text.contains("public_key"));
        assert!(!text.contains("secret"));
    }
}
