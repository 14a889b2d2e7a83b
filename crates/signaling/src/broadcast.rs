//! Event-Broadcaster – Stellt Nachrichten an verbundene Clients zu
//!
//! Der EventBroadcaster verwaltet die Send-Queues aller offenen Verbindungen,
//! beigetreten oder nicht. Die Zustellung ist nicht-blockierend: ist eine
//! Queue voll oder geschlossen, wird die Nachricht verworfen (hoechstens
//! einmal, keine Wiederholung).
//!
//! ## Selektives Senden
//! - An eine Verbindung: `an_verbindung_senden`
//! - An alle ausser einer: `an_alle_ausser_senden`

use cipherchat_core::ConnectionId;
use cipherchat_protocol::ControlMessage;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Standard-Groesse der Send-Queue pro Verbindung
pub const SEND_QUEUE_GROESSE: usize = 64;

// ---------------------------------------------------------------------------
// ClientSender
// ---------------------------------------------------------------------------

/// Handle auf die Send-Queue einer Verbindung
#[derive(Clone, Debug)]
pub struct ClientSender {
    pub connection_id: ConnectionId,
    pub tx: mpsc::Sender<ControlMessage>,
}

impl ClientSender {
    /// Sendet eine Nachricht nicht-blockierend an die Verbindung
    ///
    /// Gibt `false` zurueck wenn die Queue voll oder geschlossen ist.
    pub fn senden(&self, nachricht: ControlMessage) -> bool {
        match self.tx.try_send(nachricht) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(connection = %self.connection_id, "Send-Queue voll – Nachricht verworfen");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(connection = %self.connection_id, "Send-Queue geschlossen (Client getrennt)");
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// EventBroadcaster
// ---------------------------------------------------------------------------

/// Zentraler Broadcaster fuer alle offenen Verbindungen
///
/// Thread-safe via Arc + DashMap. Clone teilt den inneren Zustand.
#[derive(Clone, Default)]
pub struct EventBroadcaster {
    inner: Arc<DashMap<ConnectionId, ClientSender>>,
}

impl EventBroadcaster {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Registriert eine Verbindung und gibt ihre Empfangs-Queue zurueck
    ///
    /// Der Verbindungs-Task liest aus dieser Queue und schreibt auf den Socket.
    pub fn verbindung_registrieren(
        &self,
        connection_id: ConnectionId,
        queue_groesse: usize,
    ) -> mpsc::Receiver<ControlMessage> {
        let (tx, rx) = mpsc::channel(queue_groesse.max(1));
        self.inner
            .insert(connection_id, ClientSender { connection_id, tx });
        tracing::debug!(connection = %connection_id, "Verbindung im Broadcaster registriert");
        rx
    }

    /// Entfernt eine Verbindung aus dem Broadcaster
    pub fn verbindung_entfernen(&self, connection_id: &ConnectionId) {
        if self.inner.remove(connection_id).is_some() {
            tracing::debug!(connection = %connection_id, "Verbindung aus Broadcaster entfernt");
        }
    }

    /// Sendet eine Nachricht an eine einzelne Verbindung
    ///
    /// Gibt `true` zurueck wenn die Verbindung gefunden und die Nachricht
    /// eingereiht wurde.
    pub fn an_verbindung_senden(
        &self,
        connection_id: &ConnectionId,
        nachricht: ControlMessage,
    ) -> bool {
        // Sender klonen, damit kein Shard-Lock ueber try_send gehalten wird
        let sender = match self.inner.get(connection_id) {
            Some(s) => s.value().clone(),
            None => {
                tracing::debug!(connection = %connection_id, "Senden an unbekannte Verbindung");
                return false;
            }
        };
        sender.senden(nachricht)
    }

    /// Sendet eine Nachricht an alle Verbindungen ausser einer
    ///
    /// Gibt die Anzahl der erfolgreichen Sendungen zurueck.
    pub fn an_alle_ausser_senden(
        &self,
        ausgeschlossen: &ConnectionId,
        nachricht: ControlMessage,
    ) -> usize {
        let empfaenger: Vec<ClientSender> = self
            .inner
            .iter()
            .filter(|e| e.key() != ausgeschlossen)
            .map(|e| e.value().clone())
            .collect();

        empfaenger
            .iter()
            .filter(|s| s.senden(nachricht.clone()))
            .count()
    }

    /// Anzahl registrierter Verbindungen
    pub fn verbindung_anzahl(&self) -> usize {
        self.inner.len()
    }

    #[cfg(test)]
    pub(crate) fn ist_registriert(&self, connection_id: &ConnectionId) -> bool {
        self.inner.contains_key(connection_id)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
