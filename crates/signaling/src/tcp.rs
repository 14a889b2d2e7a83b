//! TCP-Listener – Bindet Socket, akzeptiert Verbindungen
//!
//! Der `SignalingServer` bindet einen TCP-Socket und startet fuer jede
//! eingehende Verbindung einen eigenen tokio-Task mit einer
//! `ClientConnection`. Die Tasks laufen auf dem Multi-Thread-Runtime.

use cipherchat_core::ConnectionId;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;

use crate::connection::ClientConnection;
use crate::server_state::SignalingState;

/// TCP-Signaling-Server
pub struct SignalingServer {
    state: Arc<SignalingState>,
    listener: TcpListener,
}

impl SignalingServer {
    /// Bindet den TCP-Socket
    ///
    /// Port 0 waehlt einen freien Port, siehe [`SignalingServer::lokale_addr`].
    pub async fn binden(state: Arc<SignalingState>, bind_addr: SocketAddr) -> std::io::Result<Self> {
        let listener = TcpListener::bind(bind_addr).await?;
        Ok(Self { state, listener })
    }

    /// Gibt die tatsaechlich gebundene Adresse zurueck
    pub fn lokale_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Akzeptiert Verbindungen bis `shutdown_rx` ein `true`-Signal empfaengt
    pub async fn starten(self, mut shutdown_rx: watch::Receiver<bool>) -> std::io::Result<()> {
        let lokale_addr = self.listener.local_addr()?;
        tracing::info!(
            adresse = %lokale_addr,
            server = %self.state.config.server_name,
            "TCP Signaling-Server gestartet"
        );

        loop {
            tokio::select! {
                // Neue eingehende Verbindung
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => self.annehmen(stream, peer_addr, &shutdown_rx),
                        Err(e) => {
                            tracing::error!(fehler = %e, "TCP-Accept-Fehler");
                            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                        }
                    }
                }

                // Shutdown-Signal
                Ok(()) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::info!("Signaling-Server: Shutdown-Signal empfangen");
                        break;
                    }
                }
            }
        }

        tracing::info!("TCP Signaling-Server gestoppt");
        Ok(())
    }

    fn annehmen(
        &self,
        stream: tokio::net::TcpStream,
        peer_addr: SocketAddr,
        shutdown_rx: &watch::Receiver<bool>,
    ) {
        // Verbindungs-Limit pruefen
        let offen = self.state.broadcaster.verbindung_anzahl();
        if offen >= self.state.config.max_verbindungen as usize {
            tracing::warn!(
                peer = %peer_addr,
                max = self.state.config.max_verbindungen,
                "Server voll – Verbindung abgelehnt"
            );
            drop(stream);
            return;
        }

        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(peer = %peer_addr, fehler = %e, "TCP_NODELAY nicht gesetzt");
        }

        // Vor dem Spawn registrieren, damit das Limit sofort greift
        let connection_id = ConnectionId::new();
        let ereignisse = self
            .state
            .broadcaster
            .verbindung_registrieren(connection_id, self.state.config.send_queue_groesse);

        tracing::debug!(connection = %connection_id, peer = %peer_addr, "Verbindung akzeptiert");

        let verbindung =
            ClientConnection::neu(Arc::clone(&self.state), connection_id, peer_addr, ereignisse);
        let shutdown_rx = shutdown_rx.clone();
        tokio::spawn(async move {
            verbindung.verarbeiten(stream, shutdown_rx).await;
        });
    }
}
