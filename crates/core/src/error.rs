//! Fehlertypen fuer Cipherchat
//!
//! Zentraler Fehler-Enum fuer den Server-Start. Die Fach-Crates
//! (Signaling, Crypto, Client) definieren eigene Fehler.

use thiserror::Error;

/// Globaler Result-Alias fuer Cipherchat
pub type Result<T> = std::result::Result<T, CipherchatError>;

/// Crate-uebergreifende Fehler im Cipherchat-System
#[derive(Debug, Error)]
pub enum CipherchatError {
    // --- Konfiguration ---
    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),

    // --- Netzwerk ---
    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl CipherchatError {
    pub fn konfiguration(msg: impl Into<String>) -> Self {
        Self::Konfiguration(msg.into())
    }
}
