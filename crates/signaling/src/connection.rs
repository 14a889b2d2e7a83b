//! Client-Connection – Verwaltet eine einzelne TCP-Verbindung
//!
//! Jede TCP-Verbindung bekommt eine `ClientConnection` in einem eigenen
//! tokio-Task. Nachrichten einer Verbindung werden nacheinander verarbeitet,
//! verschiedene Verbindungen laufen parallel.
//!
//! ## State Machine
//! ```text
//! Verbunden -> Beigetreten
//!     |            |
//!     v            v
//!     +------> Getrennt
//! ```
//!
//! ## Keepalive
//! - Server sendet alle `keepalive_sek` einen Ping
//! - Kommt laenger als `verbindungs_timeout_sek` nichts an, wird getrennt
//! - Jeder Schreibvorgang hat dieselbe Frist: liest der Client nicht mehr,
//!   wird ebenfalls getrennt
//! - Trennen (egal aus welchem Grund) raeumt das Verzeichnis auf

use cipherchat_core::ConnectionId;
use cipherchat_protocol::control::jetzt_ms;
use cipherchat_protocol::{ControlMessage, ErrorCode, FrameCodec, WireError};
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};
use tokio_util::codec::Framed;

use crate::dispatcher::{abschied, DispatcherContext, MessageDispatcher};
use crate::server_state::SignalingState;

/// Verarbeitet eine einzelne TCP-Verbindung
///
/// Liest Frames via `FrameCodec`, dispatcht an den `MessageDispatcher` und
/// schreibt Antworten sowie Broadcaster-Ereignisse zurueck.
pub struct ClientConnection {
    state: Arc<SignalingState>,
    connection_id: ConnectionId,
    peer_addr: SocketAddr,
    /// Ereignisse aus dem Broadcaster (bereits registriert)
    ereignisse: mpsc::Receiver<ControlMessage>,
}

impl ClientConnection {
    /// Erstellt eine neue ClientConnection
    ///
    /// `ereignisse` stammt aus `EventBroadcaster::verbindung_registrieren`.
    pub fn neu(
        state: Arc<SignalingState>,
        connection_id: ConnectionId,
        peer_addr: SocketAddr,
        ereignisse: mpsc::Receiver<ControlMessage>,
    ) -> Self {
        Self {
            state,
            connection_id,
            peer_addr,
            ereignisse,
        }
    }

    /// Startet die Verbindungs-Verarbeitungsschleife
    ///
    /// Laeuft bis die Verbindung getrennt wird oder ein Shutdown-Signal
    /// eingeht. Danach ist die Verbindung aus Verzeichnis und Broadcaster
    /// entfernt.
    pub async fn verarbeiten(mut self, stream: TcpStream, mut shutdown_rx: watch::Receiver<bool>) {
        let connection_id = self.connection_id;
        let peer_addr = self.peer_addr;
        let config = Arc::clone(&self.state.config);
        let keepalive_intervall = Duration::from_secs(config.keepalive_sek.max(1));
        let timeout_dauer = Duration::from_secs(config.verbindungs_timeout_sek.max(1));

        self.state.metriken.connections.inc();
        tracing::info!(connection = %connection_id, peer = %peer_addr, "Neue Verbindung");

        let mut framed = Framed::new(stream, self.state.codec());
        let mut ctx = DispatcherContext::neu(connection_id, peer_addr);
        let dispatcher = MessageDispatcher::neu(Arc::clone(&self.state));

        let mut letzter_empfang = Instant::now();
        let mut ping_timer = interval_at(Instant::now() + keepalive_intervall, keepalive_intervall);
        ping_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut ping_request_id: u32 = 0;

        if *shutdown_rx.borrow() {
            let _ = senden(&mut framed, abschied(), timeout_dauer).await;
        } else {
            loop {
                tokio::select! {
                    // Eingehende Nachricht vom Client
                    frame = framed.next() => {
                        match frame {
                            Some(Ok(nachricht)) => {
                                letzter_empfang = Instant::now();
                                let request_id = nachricht.request_id;
                                tracing::trace!(connection = %connection_id, request_id, "Nachricht empfangen");

                                let Some(antwort) = dispatcher.dispatch(nachricht, &mut ctx) else {
                                    continue;
                                };
                                let gesendet = match senden(&mut framed, antwort, timeout_dauer).await {
                                    Gesendet::ZuGross => {
                                        // Antwort passt nicht, der Aufrufer erhaelt stattdessen einen Fehler
                                        let fehler = ControlMessage::error(
                                            request_id,
                                            ErrorCode::PayloadTooLarge,
                                            "Antwort ueberschreitet die Frame-Grenze",
                                        );
                                        senden(&mut framed, fehler, timeout_dauer).await
                                    }
                                    anderes => anderes,
                                };
                                if !self.weiter(gesendet) {
                                    break;
                                }
                            }
                            Some(Err(e)) => {
                                tracing::warn!(connection = %connection_id, fehler = %e, "Frame-Lesefehler");
                                break;
                            }
                            None => {
                                tracing::info!(connection = %connection_id, "Verbindung vom Client getrennt");
                                break;
                            }
                        }
                    }

                    // Ausgehendes Ereignis aus dem Broadcaster
                    Some(ausgehend) = self.ereignisse.recv() => {
                        let gesendet = senden(&mut framed, ausgehend, timeout_dauer).await;
                        if !self.weiter(gesendet) {
                            break;
                        }
                    }

                    // Keepalive-Ping und Timeout
                    _ = ping_timer.tick() => {
                        if letzter_empfang.elapsed() > timeout_dauer {
                            tracing::warn!(connection = %connection_id, "Verbindungs-Timeout");
                            break;
                        }
                        ping_request_id = ping_request_id.wrapping_add(1);
                        let ping = ControlMessage::ping(ping_request_id, jetzt_ms());
                        if !self.weiter(senden(&mut framed, ping, timeout_dauer).await) {
                            break;
                        }
                    }

                    // Shutdown-Signal
                    Ok(()) = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            tracing::info!(connection = %connection_id, "Shutdown-Signal – Verbindung wird getrennt");
                            let _ = senden(&mut framed, abschied(), timeout_dauer).await;
                            break;
                        }
                    }
                }
            }
        }

        dispatcher.verbindung_cleanup(&mut ctx);
        self.state.metriken.connections.dec();

        tracing::info!(connection = %connection_id, "Verbindungs-Task beendet");
    }

    /// Wertet ein Sende-Ergebnis aus, `false` beendet die Verbindung
    fn weiter(&self, gesendet: Gesendet) -> bool {
        match gesendet {
            Gesendet::Ok => true,
            Gesendet::ZuGross => {
                self.state.metriken.relay_fehlgeschlagen("frame_too_large");
                tracing::warn!(connection = %self.connection_id, "Nachricht ueberschreitet die Frame-Grenze, verworfen");
                true
            }
            Gesendet::Fehler(e) => {
                tracing::warn!(connection = %self.connection_id, fehler = %e, "Senden fehlgeschlagen");
                false
            }
            Gesendet::Zeitlimit => {
                tracing::warn!(connection = %self.connection_id, "Client liest nicht mehr, Schreib-Timeout");
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Schreiben
// ---------------------------------------------------------------------------

/// Ergebnis eines einzelnen Schreibvorgangs
enum Gesendet {
    Ok,
    /// Nachricht passt nicht in einen Frame, nichts wurde geschrieben
    ZuGross,
    Fehler(WireError),
    /// Der Client hat innerhalb der Frist nicht gelesen
    Zeitlimit,
}

/// Schreibt eine Nachricht, hoechstens `frist` lang
///
/// Ein Client der nicht mehr liest fuellt den Socket-Puffer. Ohne Frist
/// wuerde der Task dann im Senden haengen und weder Keepalive noch
/// Shutdown beachten.
async fn senden(
    framed: &mut Framed<TcpStream, FrameCodec>,
    nachricht: ControlMessage,
    frist: Duration,
) -> Gesendet {
    match timeout(frist, framed.send(nachricht)).await {
        Ok(Ok(())) => Gesendet::Ok,
        Ok(Err(e)) if e.nur_nachricht_betroffen() => Gesendet::ZuGross,
        Ok(Err(e)) => Gesendet::Fehler(e),
        Err(_) => Gesendet::Zeitlimit,
    }
}
