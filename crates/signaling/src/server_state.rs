//! Gemeinsamer Server-Zustand fuer den Signaling-Service
//!
//! Haelt Verzeichnis, Broadcaster und Metriken, die sicher zwischen
//! tokio-Tasks geteilt werden koennen. Es gibt keinen prozessweiten
//! Singleton: jede Instanz hat ihr eigenes Verzeichnis.

use cipherchat_observability::CipherchatMetrics;
use cipherchat_protocol::{ControlMessage, FrameCodec};
use std::sync::Arc;

use crate::broadcast::{EventBroadcaster, SEND_QUEUE_GROESSE};
use crate::directory::UserDirectory;
use crate::error::SignalingResult;

/// Konfiguration fuer den Signaling-Service
#[derive(Debug, Clone)]
pub struct SignalingConfig {
    /// Anzeigename des Servers (nur fuer Logs)
    pub server_name: String,
    /// Maximale gleichzeitige TCP-Verbindungen
    pub max_verbindungen: u32,
    /// Keepalive-Intervall in Sekunden
    pub keepalive_sek: u64,
    /// Timeout fuer inaktive Verbindungen in Sekunden
    pub verbindungs_timeout_sek: u64,
    /// Groesse der ausgehenden Queue pro Verbindung
    pub send_queue_groesse: usize,
    /// Maximale Frame-Groesse in Bytes
    pub max_frame_groesse: usize,
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self {
            server_name: "Cipherchat Relay".to_string(),
            max_verbindungen: 1024,
            keepalive_sek: 30,
            verbindungs_timeout_sek: 90,
            send_queue_groesse: SEND_QUEUE_GROESSE,
            max_frame_groesse: cipherchat_protocol::wire::DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

/// Gemeinsamer Server-Zustand (thread-safe, Arc-geteilt)
pub struct SignalingState {
    /// Server-Konfiguration
    pub config: Arc<SignalingConfig>,
    /// Verzeichnis der beigetretenen Benutzer
    pub directory: UserDirectory,
    /// Send-Queues aller offenen Verbindungen
    pub broadcaster: EventBroadcaster,
    /// Prometheus-Metriken
    pub metriken: CipherchatMetrics,
}

impl SignalingState {
    /// Erstellt einen neuen SignalingState
    pub fn neu(config: SignalingConfig, metriken: CipherchatMetrics) -> Arc<Self> {
        Arc::new(Self {
            config: Arc::new(config),
            directory: UserDirectory::neu(),
            broadcaster: EventBroadcaster::neu(),
            metriken,
        })
    }

    /// Codec mit der konfigurierten Frame-Grenze
    pub fn codec(&self) -> FrameCodec {
        FrameCodec::with_max_size(self.config.max_frame_groesse)
    }

    /// Prueft ob ein Ereignis fuer eine andere Verbindung in einen Frame passt
    ///
    /// Ein Ereignis ist groesser als die Anfrage, die es ausloest. Passt es
    /// nicht, wird die Anfrage abgelehnt statt die Empfaenger-Verbindung
    /// zu gefaehrden.
    pub(crate) fn ereignis_pruefen(&self, ereignis: &ControlMessage) -> SignalingResult<()> {
        self.codec().pruefen(ereignis)?;
        Ok(())
    }

    /// Aktualisiert die Verzeichnis-Gauge
    pub(crate) fn beigetretene_aktualisieren(&self) {
        self.metriken
            .joined_users
            .set(self.directory.anzahl() as i64);
    }
}
