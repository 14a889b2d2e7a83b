//! Aushandlungs- und Nachrichten-Relay
//!
//! Beide Relays loesen Absender und Ziel ueber das Verzeichnis auf und
//! stellen dem Ziel ein Ereignis mit dem Absendernamen zu. Der Inhalt
//! (Kapsel bzw. Umschlag) wird nie gelesen oder veraendert.
//!
//! Zustellung ist fire-and-forget: eine volle oder geschlossene Queue beim
//! Ziel wird geloggt und gezaehlt, der Aufrufer erhaelt trotzdem `Ok`.

use cipherchat_core::ConnectionId;
use cipherchat_protocol::control::{IncomingDirectMessageEvent, IncomingNegotiationEvent};
use cipherchat_protocol::{ControlMessage, ControlPayload};

use crate::directory::DirectoryEntry;
use crate::error::{SignalingError, SignalingResult};
use crate::server_state::SignalingState;

/// Leitet ein gekapseltes Secret an `ziel_username` weiter
pub fn aushandlung_weiterleiten(
    state: &SignalingState,
    absender: &ConnectionId,
    ziel_username: &str,
    kapsel: Vec<u8>,
) -> SignalingResult<()> {
    let (quelle, ziel) = aufloesen(state, absender, ziel_username)?;

    let ereignis = ControlMessage::ereignis(ControlPayload::IncomingNegotiation(
        IncomingNegotiationEvent {
            from_username: quelle.username.clone(),
            encapsulated_secret: kapsel,
        },
    ));
    groesse_pruefen(state, &ereignis)?;

    if zustellen(state, &ziel, ereignis) {
        state.metriken.negotiations_relayed_total.inc();
        tracing::debug!(von = %quelle.username, an = %ziel.username, "Aushandlung weitergeleitet");
    }
    Ok(())
}

/// Leitet einen verschluesselten Umschlag an `ziel_username` weiter
pub fn nachricht_weiterleiten(
    state: &SignalingState,
    absender: &ConnectionId,
    ziel_username: &str,
    umschlag: Vec<u8>,
) -> SignalingResult<()> {
    let (quelle, ziel) = aufloesen(state, absender, ziel_username)?;
    let groesse = umschlag.len();

    let ereignis = ControlMessage::ereignis(ControlPayload::IncomingDirectMessage(
        IncomingDirectMessageEvent {
            from_username: quelle.username.clone(),
            envelope: umschlag,
        },
    ));
    groesse_pruefen(state, &ereignis)?;

    if zustellen(state, &ziel, ereignis) {
        state.metriken.messages_relayed_total.inc();
        tracing::debug!(
            von = %quelle.username,
            an = %ziel.username,
            bytes = groesse,
            "Direktnachricht weitergeleitet"
        );
    }
    Ok(())
}

fn aufloesen(
    state: &SignalingState,
    absender: &ConnectionId,
    ziel_username: &str,
) -> SignalingResult<(DirectoryEntry, DirectoryEntry)> {
    let ergebnis = state
        .directory
        .suchen_nach_verbindung(absender)
        .map_err(|_| SignalingError::QuelleNichtGefunden)
        .and_then(|quelle| {
            state
                .directory
                .suchen(ziel_username)
                .map(|ziel| (quelle, ziel))
                .map_err(|_| SignalingError::ZielNichtGefunden(ziel_username.to_string()))
        });

    if let Err(ref e) = ergebnis {
        state.metriken.relay_fehlgeschlagen(e.metrik_grund());
    }
    ergebnis
}

fn groesse_pruefen(state: &SignalingState, ereignis: &ControlMessage) -> SignalingResult<()> {
    state.ereignis_pruefen(ereignis).inspect_err(|e| {
        state.metriken.relay_fehlgeschlagen(e.metrik_grund());
    })
}

fn zustellen(state: &SignalingState, ziel: &DirectoryEntry, ereignis: ControlMessage) -> bool {
    let zugestellt = state
        .broadcaster
        .an_verbindung_senden(&ziel.connection_id, ereignis);
    if !zugestellt {
        state.metriken.relay_fehlgeschlagen("queue_unavailable");
        tracing::warn!(an = %ziel.username, "Zustellung verworfen");
    }
    zugestellt
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
