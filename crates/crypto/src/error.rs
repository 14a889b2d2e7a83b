//! Fehlertypen fuer das Kryptografie-Subsystem

use thiserror::Error;

/// Fehler im Kryptografie-Subsystem
///
/// `AuthentifizierungFehlgeschlagen` traegt bewusst keine Details: ein
/// falscher Schluessel, eine manipulierte Nonce und ein manipulierter Tag
/// sind von aussen nicht unterscheidbar.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("Ungueltige Schluessel-Laenge: erwartet {erwartet}, erhalten {erhalten}")]
    UngueltigeSchluesselLaenge { erwartet: usize, erhalten: usize },

    #[error("Ungueltiger Umschlag: {laenge} Bytes (Minimum: {minimum} Bytes)")]
    UngueltigerUmschlag { laenge: usize, minimum: usize },

    #[error("Authentifizierung fehlgeschlagen")]
    AuthentifizierungFehlgeschlagen,

    #[error("Verschluesselung fehlgeschlagen")]
    Verschluesselung,

    #[error("Key-Exchange fehlgeschlagen: {0}")]
    KeyExchange(String),

    #[error("Key Derivation fehlgeschlagen: {0}")]
    KeyDerivation(String),
}

pub type CryptoResult<T> = Result<T, CryptoError>;
