//! Gemeinsame Identifikationstypen fuer Cipherchat
//!
//! Verbindungen werden ueber ein Newtype identifiziert, damit sie zur
//! Compilezeit nicht mit Benutzernamen oder anderen Strings verwechselt
//! werden koennen.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Eindeutige Verbindungs-ID (eine pro Transport-Session)
///
/// Wird beim Verbindungsaufbau vergeben und bleibt fuer die gesamte
/// Lebensdauer der Verbindung unveraendert. Ein Reconnect erhaelt eine neue ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    /// Erstellt eine neue zufaellige ConnectionId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn:{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_id_eindeutig() {
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        assert_ne!(a, b, "Zwei neue ConnectionIds muessen verschieden sein");
    }

    #[test]
    fn connection_id_display() {
        let id = ConnectionId(Uuid::nil());
        assert!(id.to_string().starts_with("conn:"));
    }

    #[test]
    fn ids_sind_serde_kompatibel() {
        let id = ConnectionId::new();
        let json = serde_json::to_string(&id).unwrap();
        let id2: ConnectionId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, id2);
    }
}
