//! Server-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Server ohne Konfigurationsdatei
//! lauffaehig ist.

use cipherchat_core::CipherchatError;
use cipherchat_observability::logging::{log_format_gueltig, log_level_gueltig};
use cipherchat_signaling::SignalingConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Umgebungsvariable fuer den Pfad der Konfigurationsdatei
pub const ENV_CONFIG_PFAD: &str = "CIPHERCHAT_CONFIG";

/// Vollstaendige Server-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Allgemeine Server-Einstellungen
    pub server: ServerEinstellungen,
    /// Netzwerk-Einstellungen
    pub netzwerk: NetzwerkEinstellungen,
    /// Verbindungs-Einstellungen (Keepalive, Queues, Frames)
    pub verbindung: VerbindungsEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
    /// Observability-Einstellungen (Metriken, Health)
    pub observability: ObservabilityEinstellungen,
}

/// Allgemeine Server-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerEinstellungen {
    /// Anzeigename des Servers
    pub name: String,
    /// Maximale Anzahl gleichzeitiger Verbindungen
    pub max_verbindungen: u32,
}

impl Default for ServerEinstellungen {
    fn default() -> Self {
        Self {
            name: "Cipherchat Relay".into(),
            max_verbindungen: 1024,
        }
    }
}

/// Netzwerk-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetzwerkEinstellungen {
    /// Bind-Adresse fuer TCP und Observability
    pub bind_adresse: String,
    /// Port fuer die Client-Verbindungen
    pub tcp_port: u16,
}

impl Default for NetzwerkEinstellungen {
    fn default() -> Self {
        Self {
            bind_adresse: "0.0.0.0".into(),
            tcp_port: 7420,
        }
    }
}

/// Verbindungs-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VerbindungsEinstellungen {
    /// Ping-Intervall in Sekunden
    pub keepalive_sek: u64,
    /// Inaktivitaet bis zum Trennen in Sekunden
    pub verbindungs_timeout_sek: u64,
    /// Ausgehende Queue pro Verbindung (Nachrichten)
    pub send_queue_groesse: usize,
    /// Maximale Frame-Groesse in Bytes
    pub max_frame_groesse: usize,
}

impl Default for VerbindungsEinstellungen {
    fn default() -> Self {
        let signaling = SignalingConfig::default();
        Self {
            keepalive_sek: signaling.keepalive_sek,
            verbindungs_timeout_sek: signaling.verbindungs_timeout_sek,
            send_queue_groesse: signaling.send_queue_groesse,
            max_frame_groesse: signaling.max_frame_groesse,
        }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

/// Observability-Einstellungen (Metriken + Health-Check)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityEinstellungen {
    /// Aktiviert den Observability-Server
    pub aktiviert: bool,
    /// Port fuer Metriken und Health (Standard: 9300)
    pub port: u16,
}

impl Default for ObservabilityEinstellungen {
    fn default() -> Self {
        Self {
            aktiviert: true,
            port: 9300,
        }
    }
}

/// Herkunft einer geladenen Konfiguration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigQuelle {
    Datei,
    /// Datei fehlte, alle Werte sind Standardwerte
    Standardwerte,
}

impl ServerConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    ///
    /// Das Logging ist beim Laden noch nicht initialisiert, deshalb meldet
    /// der Aufrufer die Herkunft selbst.
    pub fn laden(pfad: &str) -> anyhow::Result<(Self, ConfigQuelle)> {
        let (config, quelle) = match std::fs::read_to_string(pfad) {
            Ok(inhalt) => {
                let config = toml::from_str::<Self>(&inhalt)
                    .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?;
                (config, ConfigQuelle::Datei)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                (Self::default(), ConfigQuelle::Standardwerte)
            }
            Err(e) => {
                return Err(anyhow::anyhow!(
                    "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
                ))
            }
        };

        config.pruefen()?;
        Ok((config, quelle))
    }

    /// Prueft Wertebereiche, die serde nicht abdeckt
    pub fn pruefen(&self) -> cipherchat_core::Result<()> {
        let v = &self.verbindung;
        if self.server.max_verbindungen == 0 {
            return Err(CipherchatError::konfiguration(
                "server.max_verbindungen muss groesser als 0 sein",
            ));
        }
        if v.keepalive_sek == 0 || v.verbindungs_timeout_sek == 0 {
            return Err(CipherchatError::konfiguration(
                "Keepalive und Timeout muessen groesser als 0 sein",
            ));
        }
        if v.verbindungs_timeout_sek <= v.keepalive_sek {
            return Err(CipherchatError::konfiguration(format!(
                "verbindung.verbindungs_timeout_sek ({}) muss groesser als keepalive_sek ({}) sein",
                v.verbindungs_timeout_sek, v.keepalive_sek
            )));
        }
        if v.send_queue_groesse == 0 || v.max_frame_groesse == 0 {
            return Err(CipherchatError::konfiguration(
                "Queue- und Frame-Groesse muessen groesser als 0 sein",
            ));
        }
        if !log_level_gueltig(&self.logging.level) {
            return Err(CipherchatError::konfiguration(format!(
                "Unbekanntes Log-Level '{}'",
                self.logging.level
            )));
        }
        if !log_format_gueltig(&self.logging.format) {
            return Err(CipherchatError::konfiguration(format!(
                "Unbekanntes Log-Format '{}' (erlaubt: text, json)",
                self.logging.format
            )));
        }
        self.tcp_bind_adresse()?;
        Ok(())
    }

    /// Gibt die vollstaendige Bind-Adresse fuer TCP zurueck
    pub fn tcp_bind_adresse(&self) -> cipherchat_core::Result<SocketAddr> {
        self.adresse(self.netzwerk.tcp_port)
    }

    /// Gibt die Bind-Adresse fuer den Observability-Server zurueck
    pub fn observability_bind_adresse(&self) -> cipherchat_core::Result<SocketAddr> {
        self.adresse(self.observability.port)
    }

    fn adresse(&self, port: u16) -> cipherchat_core::Result<SocketAddr> {
        format!("{}:{}", self.netzwerk.bind_adresse, port)
            .parse()
            .map_err(|e| {
                CipherchatError::konfiguration(format!(
                    "Ungueltige Bind-Adresse '{}': {e}",
                    self.netzwerk.bind_adresse
                ))
            })
    }

    /// Signaling-Konfiguration aus den Server-Einstellungen
    pub fn signaling_config(&self) -> SignalingConfig {
        SignalingConfig {
            server_name: self.server.name.clone(),
            max_verbindungen: self.server.max_verbindungen,
            keepalive_sek: self.verbindung.keepalive_sek,
            verbindungs_timeout_sek: self.verbindung.verbindungs_timeout_sek,
            send_queue_groesse: self.verbindung.send_queue_groesse,
            max_frame_groesse: self.verbindung.max_frame_groesse,
        }
    }
}
