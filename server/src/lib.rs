//! cipherchat-server – Bibliotheks-Root
//!
//! Verdrahtet Konfiguration, Signaling-Relay und Observability zu einem
//! lauffaehigen Server. Der oeffentliche Einstiegspunkt wird auch von den
//! Integrationstests genutzt.

pub mod config;

use cipherchat_core::Result;
use cipherchat_observability::{observability_server_starten, CipherchatMetrics, HealthState};
use cipherchat_signaling::{SignalingServer, SignalingState};
use config::ServerConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
}

/// Server mit gebundenem TCP-Socket, bereit fuer [`GebundenerServer::laufen`]
pub struct GebundenerServer {
    config: ServerConfig,
    signaling: SignalingServer,
    state: Arc<SignalingState>,
    metriken: CipherchatMetrics,
    health: HealthState,
    tcp_addr: SocketAddr,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Bindet den TCP-Listener ohne schon Verbindungen anzunehmen
    pub async fn binden(self) -> Result<GebundenerServer> {
        self.config.pruefen()?;

        let metriken = CipherchatMetrics::neu()?;
        let health = HealthState::neu();
        let state = SignalingState::neu(self.config.signaling_config(), metriken.clone());

        let signaling = SignalingServer::binden(state.clone(), self.config.tcp_bind_adresse()?).await?;
        let tcp_addr = signaling.lokale_addr()?;

        Ok(GebundenerServer {
            config: self.config,
            signaling,
            state,
            metriken,
            health,
            tcp_addr,
        })
    }

    /// Startet alle Subsysteme und laeuft bis Ctrl-C
    ///
    /// Reihenfolge:
    /// 1. TCP-Listener binden (Control-Protokoll)
    /// 2. Observability-Server starten (falls aktiviert)
    /// 3. Auf Ctrl-C warten, dann alle Verbindungen geordnet schliessen
    pub async fn starten(self) -> Result<()> {
        let gebunden = self.binden().await?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => tracing::info!("Shutdown-Signal empfangen, Server wird beendet"),
                Err(e) => tracing::error!(fehler = %e, "Ctrl-C-Handler fehlgeschlagen, Server wird beendet"),
            }
            let _ = shutdown_tx.send(true);
        });

        gebunden.laufen(shutdown_rx).await
    }
}

impl GebundenerServer {
    /// Tatsaechlich gebundene TCP-Adresse (relevant bei Port 0)
    pub fn tcp_addr(&self) -> SocketAddr {
        self.tcp_addr
    }

    pub fn state(&self) -> &Arc<SignalingState> {
        &self.state
    }

    pub fn health(&self) -> &HealthState {
        &self.health
    }

    /// Nimmt Verbindungen an bis `shutdown_rx` auf `true` wechselt
    pub async fn laufen(self, shutdown_rx: watch::Receiver<bool>) -> Result<()> {
        tracing::info!(
            server_name = %self.config.server.name,
            tcp = %self.tcp_addr,
            max_verbindungen = self.config.server.max_verbindungen,
            "Server startet"
        );

        let observability = if self.config.observability.aktiviert {
            let addr = self.config.observability_bind_adresse()?;
            let metriken = self.metriken.clone();
            let health = self.health.clone();
            let rx = shutdown_rx.clone();
            Some(tokio::spawn(async move {
                if let Err(e) = observability_server_starten(addr, metriken, health, rx).await {
                    tracing::error!(fehler = %e, "Observability-Server fehlgeschlagen");
                }
            }))
        } else {
            tracing::info!("Observability deaktiviert");
            None
        };

        self.health.listener_status_setzen(true);
        let ergebnis = self.signaling.starten(shutdown_rx).await;
        self.health.listener_status_setzen(false);

        if let Some(handle) = observability {
            let _ = handle.await;
        }

        ergebnis?;
        tracing::info!("Server beendet");
        Ok(())
    }
}
