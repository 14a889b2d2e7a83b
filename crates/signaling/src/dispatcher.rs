//! Message-Dispatcher – Routet ControlMessages an Verzeichnis und Relay
//!
//! Der Dispatcher empfaengt ControlMessages einer Verbindung, fuehrt die
//! Operation aus und gibt die Antwort zurueck. Fehler werden als
//! Error-Response nur an den Aufrufer gemeldet, die Verbindung bleibt
//! nutzbar.
//!
//! ## Zustandspruefung
//! - `Join` nur im Zustand `Verbunden`
//! - `Negotiate` / `DirectMessage` setzen einen Verzeichnis-Eintrag voraus
//!   (sonst `SOURCE_NOT_FOUND`)
//! - `ListUsers` und Keepalive sind immer erlaubt
//!
//! ## Groessen
//! Benutzername und oeffentlicher Schluessel sind begrenzt, damit die
//! Teilnehmerliste auch bei voller Belegung in einen Frame passt.

use cipherchat_core::ConnectionId;
use cipherchat_protocol::control::{jetzt_ms, JoinRequest, UserLeftEvent, UserListResponse};
use cipherchat_protocol::{ControlMessage, ControlPayload, ErrorCode, UserInfo};
use std::net::SocketAddr;
use std::sync::Arc;

use crate::error::{SignalingError, SignalingResult};
use crate::relay;
use crate::server_state::SignalingState;

/// Maximale Laenge eines Benutzernamens in Zeichen
pub const MAX_USERNAME_LAENGE: usize = 64;

/// Maximale Laenge eines oeffentlichen Schluessels in Bytes
pub const MAX_PUBLIC_KEY_LAENGE: usize = 256;

// ---------------------------------------------------------------------------
// Verbindungszustand
// ---------------------------------------------------------------------------

/// Zustand einer Verbindung
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerbindungsZustand {
    /// Verbunden, noch nicht beigetreten
    Verbunden,
    /// Im Verzeichnis eingetragen
    Beigetreten { username: String },
    /// Verbindung beendet, Cleanup gelaufen
    Getrennt,
}

/// Dispatcher-Kontext – Informationen ueber die aktuelle Verbindung
pub struct DispatcherContext {
    pub connection_id: ConnectionId,
    pub peer_addr: SocketAddr,
    pub zustand: VerbindungsZustand,
}

impl DispatcherContext {
    pub fn neu(connection_id: ConnectionId, peer_addr: SocketAddr) -> Self {
        Self {
            connection_id,
            peer_addr,
            zustand: VerbindungsZustand::Verbunden,
        }
    }

    pub fn username(&self) -> Option<&str> {
        match &self.zustand {
            VerbindungsZustand::Beigetreten { username } => Some(username),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// MessageDispatcher
// ---------------------------------------------------------------------------

/// Zentraler Message-Dispatcher
pub struct MessageDispatcher {
    state: Arc<SignalingState>,
}

impl MessageDispatcher {
    pub fn neu(state: Arc<SignalingState>) -> Self {
        Self { state }
    }

    /// Verarbeitet eine eingehende ControlMessage und gibt die Antwort zurueck
    ///
    /// Gibt `None` zurueck wenn keine Antwort gesendet werden soll
    /// (Pong-Antworten auf Server-Pings).
    pub fn dispatch(
        &self,
        message: ControlMessage,
        ctx: &mut DispatcherContext,
    ) -> Option<ControlMessage> {
        let request_id = message.request_id;

        let ergebnis = match message.payload {
            // -------------------------------------------------------------------
            // Verzeichnis
            // -------------------------------------------------------------------
            ControlPayload::Join(req) => self.handle_join(req, request_id, ctx),

            ControlPayload::ListUsers => Ok(self.benutzerliste(request_id)),

            // -------------------------------------------------------------------
            // Relay
            // -------------------------------------------------------------------
            ControlPayload::Negotiate(req) => relay::aushandlung_weiterleiten(
                &self.state,
                &ctx.connection_id,
                &req.target_username,
                req.encapsulated_secret,
            )
            .map(|()| ControlMessage::ack(request_id)),

            ControlPayload::DirectMessage(req) => relay::nachricht_weiterleiten(
                &self.state,
                &ctx.connection_id,
                &req.target_username,
                req.envelope,
            )
            .map(|()| ControlMessage::ack(request_id)),

            // -------------------------------------------------------------------
            // Keepalive
            // -------------------------------------------------------------------
            ControlPayload::Ping(ping) => Ok(ControlMessage::pong(
                request_id,
                ping.timestamp_ms,
                jetzt_ms(),
            )),

            ControlPayload::Pong(_) => {
                tracing::trace!(connection = %ctx.connection_id, "Pong empfangen");
                return None;
            }

            // -------------------------------------------------------------------
            // Server -> Client Nachrichten vom Client
            // -------------------------------------------------------------------
            ControlPayload::UserList(_)
            | ControlPayload::Ack
            | ControlPayload::UserJoined(_)
            | ControlPayload::UserLeft(_)
            | ControlPayload::IncomingNegotiation(_)
            | ControlPayload::IncomingDirectMessage(_)
            | ControlPayload::Error(_) => {
                tracing::warn!(
                    connection = %ctx.connection_id,
                    request_id,
                    "Unerwartete Server->Client Nachricht vom Client empfangen"
                );
                Err(SignalingError::protokoll("Unerwartete Nachricht"))
            }
        };

        Some(ergebnis.unwrap_or_else(|e| {
            tracing::debug!(
                connection = %ctx.connection_id,
                request_id,
                fehler = %e,
                "Anfrage abgelehnt"
            );
            ControlMessage::error(request_id, e.fehler_code(), e.to_string())
        }))
    }

    fn handle_join(
        &self,
        req: JoinRequest,
        request_id: u32,
        ctx: &mut DispatcherContext,
    ) -> SignalingResult<ControlMessage> {
        if let Some(bisher) = ctx.username() {
            return Err(SignalingError::BereitsBeigetreten(bisher.to_string()));
        }
        if req.username.trim().is_empty() {
            return Err(SignalingError::protokoll("Benutzername darf nicht leer sein"));
        }
        if req.username.chars().count() > MAX_USERNAME_LAENGE {
            return Err(SignalingError::protokoll(format!(
                "Benutzername laenger als {MAX_USERNAME_LAENGE} Zeichen"
            )));
        }
        if req.public_key.len() > MAX_PUBLIC_KEY_LAENGE {
            return Err(SignalingError::protokoll(format!(
                "Oeffentlicher Schluessel laenger als {MAX_PUBLIC_KEY_LAENGE} Bytes"
            )));
        }
        self.state
            .ereignis_pruefen(&ControlMessage::ereignis(ControlPayload::UserJoined(UserInfo {
                username: req.username.clone(),
                public_key: req.public_key.clone(),
            })))?;

        let eintrag = self
            .state
            .directory
            .beitreten(&req.username, ctx.connection_id, req.public_key)?;

        ctx.zustand = VerbindungsZustand::Beigetreten {
            username: eintrag.username.clone(),
        };
        self.state.beigetretene_aktualisieren();

        let benachrichtigt = self.state.broadcaster.an_alle_ausser_senden(
            &ctx.connection_id,
            ControlMessage::ereignis(ControlPayload::UserJoined(eintrag.user_info())),
        );

        tracing::info!(
            connection = %ctx.connection_id,
            peer = %ctx.peer_addr,
            username = %eintrag.username,
            benachrichtigt,
            "Benutzer beigetreten"
        );

        Ok(self.benutzerliste(request_id))
    }

    fn benutzerliste(&self, request_id: u32) -> ControlMessage {
        let users = self
            .state
            .directory
            .momentaufnahme()
            .iter()
            .map(|e| e.user_info())
            .collect();

        ControlMessage::new(
            request_id,
            ControlPayload::UserList(UserListResponse { users }),
        )
    }

    /// Bereinigt alle Ressourcen einer Verbindung beim Trennen
    ///
    /// War die Verbindung beigetreten, wird der Eintrag entfernt und alle
    /// anderen Verbindungen erhalten `UserLeft`. Mehrfacher Aufruf ist
    /// wirkungslos.
    pub fn verbindung_cleanup(&self, ctx: &mut DispatcherContext) {
        let zustand = std::mem::replace(&mut ctx.zustand, VerbindungsZustand::Getrennt);
        self.state.broadcaster.verbindung_entfernen(&ctx.connection_id);

        if let VerbindungsZustand::Beigetreten { .. } = zustand {
            match self.state.directory.entfernen(&ctx.connection_id) {
                Ok(eintrag) => {
                    self.state.beigetretene_aktualisieren();
                    let benachrichtigt = self.state.broadcaster.an_alle_ausser_senden(
                        &ctx.connection_id,
                        ControlMessage::ereignis(ControlPayload::UserLeft(UserLeftEvent {
                            username: eintrag.username.clone(),
                        })),
                    );
                    tracing::info!(
                        connection = %ctx.connection_id,
                        username = %eintrag.username,
                        benachrichtigt,
                        "Benutzer hat das Verzeichnis verlassen"
                    );
                }
                Err(e) => {
                    tracing::warn!(connection = %ctx.connection_id, fehler = %e, "Verzeichnis-Eintrag fehlte beim Trennen");
                }
            }
        }

        tracing::debug!(connection = %ctx.connection_id, "Verbindungs-Ressourcen bereinigt");
    }
}

/// Fehler-Antwort fuer den Fall, dass der Server herunterfaehrt
pub(crate) fn abschied() -> ControlMessage {
    ControlMessage::error(0, ErrorCode::InternalError, "Server wird heruntergefahren")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
