//! Fehlertypen fuer den Client

use cipherchat_crypto::CryptoError;
use cipherchat_protocol::{ErrorCode, WireError};
use thiserror::Error;

/// Fehler die bei der Server-Verbindung oder beim Ver-/Entschluesseln
/// auftreten koennen
#[derive(Debug, Error)]
pub enum ClientError {
    /// TCP-Verbindungsaufbau fehlgeschlagen
    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),

    /// Frame konnte nicht gelesen oder geschrieben werden
    #[error("Frame-Fehler: {0}")]
    Wire(#[from] WireError),

    /// Server hat die Verbindung geschlossen
    #[error("Verbindung vom Server getrennt")]
    Getrennt,

    /// Server hat mit Fehler geantwortet
    #[error("Server-Fehler ({code:?}): {message}")]
    Server { code: ErrorCode, message: String },

    /// Unerwartete Antwort vom Server
    #[error("Unerwartete Antwort: {0}")]
    UnerwarteteAntwort(String),

    /// Teilnehmer ist lokal nicht bekannt
    #[error("Unbekannter Teilnehmer: {0}")]
    UnbekannterPeer(String),

    /// Mit dem Teilnehmer wurde noch kein Schluessel ausgehandelt
    #[error("Kein ausgehandelter Schluessel fuer {0}")]
    KeinSchluessel(String),

    /// Kryptografie-Fehler (Kapselung, Umschlag)
    #[error("Krypto-Fehler: {0}")]
    Crypto(#[from] CryptoError),

    /// Entschluesselter Inhalt ist kein UTF-8
    #[error("Nachricht ist kein gueltiges UTF-8")]
    KeinText,
}

impl ClientError {
    /// Fehler-Code falls der Server die Anfrage abgelehnt hat
    pub fn server_code(&self) -> Option<ErrorCode> {
        match self {
            Self::Server { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Result-Typ fuer den Client
pub type ClientResult<T> = Result<T, ClientError>;
