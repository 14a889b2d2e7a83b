//! Fehlertypen fuer den Signaling-Service

use cipherchat_protocol::{ErrorCode, WireError};
use thiserror::Error;

/// Fehlertyp fuer den Signaling-Service
#[derive(Debug, Error)]
pub enum SignalingError {
    /// Benutzername ist bereits im Verzeichnis
    #[error("Benutzername bereits vergeben: {0}")]
    UsernameVergeben(String),

    /// Die Verbindung ist bereits unter einem Namen beigetreten
    #[error("Verbindung ist bereits als '{0}' beigetreten")]
    BereitsBeigetreten(String),

    /// Eintrag nicht im Verzeichnis
    #[error("Nicht gefunden: {0}")]
    NichtGefunden(String),

    /// Die anfragende Verbindung ist nicht beigetreten
    #[error("Absender ist nicht beigetreten")]
    QuelleNichtGefunden,

    /// Zielname ist nicht im Verzeichnis
    #[error("Ziel nicht gefunden: {0}")]
    ZielNichtGefunden(String),

    /// Protokollfehler (ungueltige Anfrage, falscher Zustand)
    #[error("Protokollfehler: {0}")]
    Protokoll(String),

    /// Das Ereignis fuer den Empfaenger passt nicht in einen Frame
    #[error("Nachricht nicht zustellbar: {0}")]
    Wire(#[from] WireError),
}

impl SignalingError {
    /// Erstellt einen Protokollfehler
    pub fn protokoll(msg: impl Into<String>) -> Self {
        Self::Protokoll(msg.into())
    }

    /// Fehler-Code fuer die Error-Response an den Aufrufer
    pub fn fehler_code(&self) -> ErrorCode {
        match self {
            Self::UsernameVergeben(_) => ErrorCode::UsernameTaken,
            Self::BereitsBeigetreten(_) => ErrorCode::AlreadyJoined,
            Self::QuelleNichtGefunden => ErrorCode::SourceNotFound,
            Self::ZielNichtGefunden(_) | Self::NichtGefunden(_) => ErrorCode::TargetNotFound,
            Self::Protokoll(_) => ErrorCode::InvalidRequest,
            Self::Wire(WireError::FrameZuGross { .. }) => ErrorCode::PayloadTooLarge,
            Self::Wire(_) => ErrorCode::InternalError,
        }
    }

    /// Label fuer `cipherchat_relay_failures_total{reason}`
    pub fn metrik_grund(&self) -> &'static str {
        match self {
            Self::QuelleNichtGefunden => "source_not_found",
            Self::ZielNichtGefunden(_) | Self::NichtGefunden(_) => "target_not_found",
            Self::UsernameVergeben(_) | Self::BereitsBeigetreten(_) | Self::Protokoll(_) => {
                "invalid_request"
            }
            Self::Wire(WireError::FrameZuGross { .. }) => "payload_too_large",
            Self::Wire(_) => "internal",
        }
    }
}

/// Result-Typ fuer den Signaling-Service
pub type SignalingResult<T> = Result<T, SignalingError>;
