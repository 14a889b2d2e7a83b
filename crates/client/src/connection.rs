//! Client-seitige TCP-Verbindung zum Cipherchat-Relay
//!
//! Nutzt den FrameCodec aus cipherchat-protocol fuer das Wire-Format
//! (u32 BE length + JSON payload). Alle Operationen sind async.
//!
//! Server-Ereignisse, die waehrend einer laufenden Anfrage eintreffen,
//! werden sofort auf den lokalen Zustand angewendet und fuer
//! [`ChatClient::naechstes_ereignis`] gepuffert. Server-Pings werden
//! automatisch beantwortet.

use cipherchat_crypto::{entschluesseln, kapseln, verschluesseln, Schluesselpaar};
use cipherchat_protocol::control::{
    jetzt_ms, DirectMessageRequest, JoinRequest, NegotiateRequest, UserListResponse,
};
use cipherchat_protocol::{ControlMessage, ControlPayload, ErrorCode, FrameCodec, UserInfo};
use futures_util::{SinkExt, StreamExt};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio_util::codec::Framed;

use crate::display::kurzform;
use crate::error::{ClientError, ClientResult};
use crate::peer::{Message, Peer};

// ---------------------------------------------------------------------------
// ClientEvent
// ---------------------------------------------------------------------------

/// Vom Server ausgeloeste Aenderung am lokalen Zustand
#[derive(Debug)]
pub enum ClientEvent {
    /// Ein neuer Teilnehmer ist beigetreten
    PeerBeigetreten(String),
    /// Ein Teilnehmer hat das Verzeichnis verlassen
    PeerVerlassen(String),
    /// Ein Teilnehmer hat einen Schluessel mit uns ausgehandelt
    AushandlungEmpfangen { von: String },
    /// Eine Direktnachricht wurde entschluesselt und im Verlauf abgelegt
    NachrichtEmpfangen { von: String, text: String },
    /// Eine Aushandlung oder Nachricht konnte nicht verarbeitet werden
    Verworfen { von: String, fehler: ClientError },
}

// ---------------------------------------------------------------------------
// ChatClient
// ---------------------------------------------------------------------------

/// Verbindung zum Relay samt lokalem Schluessel- und Nachrichtenzustand
pub struct ChatClient {
    framed: Framed<TcpStream, FrameCodec>,
    schluesselpaar: Schluesselpaar,
    username: Option<String>,
    peers: HashMap<String, Peer>,
    ausstehend: VecDeque<ClientEvent>,
    next_request_id: u32,
}

impl ChatClient {
    /// Baut eine TCP-Verbindung zum Relay auf und erzeugt ein frisches
    /// Schluesselpaar
    pub async fn verbinden(addr: impl ToSocketAddrs) -> ClientResult<Self> {
        let stream = TcpStream::connect(addr).await?;
        let peer_addr = stream.peer_addr()?;
        tracing::info!(server = %peer_addr, "TCP-Verbindung hergestellt");

        Ok(Self {
            framed: Framed::new(stream, FrameCodec::new()),
            schluesselpaar: Schluesselpaar::erzeugen(),
            username: None,
            peers: HashMap::new(),
            ausstehend: VecDeque::new(),
            next_request_id: 1,
        })
    }

    // -----------------------------------------------------------------------
    // Zugriff auf lokalen Zustand
    // -----------------------------------------------------------------------

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn public_key(&self) -> &[u8] {
        self.schluesselpaar.public_key()
    }

    pub fn peer(&self, username: &str) -> Option<&Peer> {
        self.peers.get(username)
    }

    /// Alle bekannten Teilnehmer, sortiert nach Name
    pub fn peers(&self) -> Vec<&Peer> {
        let mut peers: Vec<&Peer> = self.peers.values().collect();
        peers.sort_by(|a, b| a.username.cmp(&b.username));
        peers
    }

    // -----------------------------------------------------------------------
    // Operationen
    // -----------------------------------------------------------------------

    /// Tritt unter `username` bei und uebernimmt die Teilnehmerliste
    pub async fn beitreten(&mut self, username: &str) -> ClientResult<Vec<UserInfo>> {
        let antwort = self
            .anfrage(ControlPayload::Join(JoinRequest {
                username: username.to_string(),
                public_key: self.schluesselpaar.public_key().to_vec(),
            }))
            .await?;

        let users = Self::benutzerliste_aus(antwort)?;
        self.username = Some(username.to_string());
        self.peers_abgleichen(&users);

        tracing::info!(username, teilnehmer = users.len(), "Beigetreten");
        Ok(users)
    }

    /// Fragt die aktuelle Teilnehmerliste ab und gleicht sie lokal ab
    pub async fn benutzer_auflisten(&mut self) -> ClientResult<Vec<UserInfo>> {
        let antwort = self.anfrage(ControlPayload::ListUsers).await?;
        let users = Self::benutzerliste_aus(antwort)?;
        self.peers_abgleichen(&users);
        Ok(users)
    }

    /// Handelt einen neuen Schluessel mit `peer` aus
    ///
    /// Der Schluessel wird sofort lokal gespeichert, der Peer erhaelt die
    /// Kapsel ueber den Relay.
    pub async fn aushandeln(&mut self, peer: &str) -> ClientResult<()> {
        let public_key = self
            .peers
            .get(peer)
            .ok_or_else(|| ClientError::UnbekannterPeer(peer.to_string()))?
            .public_key
            .clone();

        let kapselung = kapseln(&public_key)?;
        tracing::debug!(peer, kapsel = %kurzform(&kapselung.kapsel), "Aushandlung gestartet");

        let antwort = self
            .anfrage(ControlPayload::Negotiate(NegotiateRequest {
                target_username: peer.to_string(),
                encapsulated_secret: kapselung.kapsel,
            }))
            .await?;
        Self::ack_erwarten(antwort)?;

        if let Some(p) = self.peers.get_mut(peer) {
            p.schluessel_setzen(kapselung.schluessel);
        }
        Ok(())
    }

    /// Verschluesselt `text` mit dem ausgehandelten Schluessel und sendet ihn
    pub async fn nachricht_senden(&mut self, peer: &str, text: &str) -> ClientResult<()> {
        let eintrag = self
            .peers
            .get(peer)
            .ok_or_else(|| ClientError::UnbekannterPeer(peer.to_string()))?;
        let schluessel = eintrag
            .schluessel()
            .ok_or_else(|| ClientError::KeinSchluessel(peer.to_string()))?;

        let umschlag = verschluesseln(text.as_bytes(), schluessel.as_bytes())?;
        tracing::debug!(peer, umschlag = %kurzform(&umschlag), "Direktnachricht verschluesselt");

        let antwort = self
            .anfrage(ControlPayload::DirectMessage(DirectMessageRequest {
                target_username: peer.to_string(),
                envelope: umschlag,
            }))
            .await?;
        Self::ack_erwarten(antwort)?;

        if let Some(p) = self.peers.get_mut(peer) {
            p.nachricht_anhaengen(Message::eigene(text));
        }
        Ok(())
    }

    /// Misst die Round-Trip-Time zum Server
    pub async fn ping(&mut self) -> ClientResult<Duration> {
        let start = std::time::Instant::now();
        let antwort = self
            .anfrage(ControlPayload::Ping(
                cipherchat_protocol::control::PingMessage {
                    timestamp_ms: jetzt_ms(),
                },
            ))
            .await?;
        match antwort {
            ControlPayload::Pong(_) => Ok(start.elapsed()),
            andere => Err(ClientError::UnerwarteteAntwort(format!("{:?}", andere))),
        }
    }

    /// Wartet auf das naechste Server-Ereignis und wendet es an
    pub async fn naechstes_ereignis(&mut self) -> ClientResult<ClientEvent> {
        if let Some(ereignis) = self.ausstehend.pop_front() {
            return Ok(ereignis);
        }

        loop {
            let nachricht = self.empfangen().await?;
            if nachricht.payload.ist_ereignis() {
                return Ok(self.ereignis_anwenden(nachricht.payload));
            }
            tracing::debug!(
                request_id = nachricht.request_id,
                "Nachricht ohne offene Anfrage ignoriert"
            );
        }
    }

    /// Schliesst die Verbindung. Der Server entfernt uns aus dem Verzeichnis.
    pub async fn trennen(mut self) -> ClientResult<()> {
        SinkExt::<ControlMessage>::close(&mut self.framed).await?;
        tracing::info!(username = ?self.username, "Verbindung getrennt");
        Ok(())
    }

    /// Sendet eine beliebige Anfrage und wartet auf die zugehoerige Antwort
    ///
    /// Error-Responses werden zu `ClientError::Server`.
    pub async fn anfrage(&mut self, payload: ControlPayload) -> ClientResult<ControlPayload> {
        let request_id = self.next_id();
        self.framed
            .send(ControlMessage::new(request_id, payload))
            .await?;

        loop {
            let nachricht = self.empfangen().await?;

            if nachricht.payload.ist_ereignis() {
                let ereignis = self.ereignis_anwenden(nachricht.payload);
                self.ausstehend.push_back(ereignis);
                continue;
            }

            if nachricht.request_id != request_id {
                // Abschiedsnachricht beim Server-Shutdown traegt request_id 0
                if let ControlPayload::Error(e) = nachricht.payload {
                    if e.code == ErrorCode::InternalError {
                        return Err(ClientError::Server {
                            code: e.code,
                            message: e.message,
                        });
                    }
                }
                continue;
            }

            return match nachricht.payload {
                ControlPayload::Error(e) => Err(ClientError::Server {
                    code: e.code,
                    message: e.message,
                }),
                payload => Ok(payload),
            };
        }
    }

    // -----------------------------------------------------------------------
    // Interne Helfer
    // -----------------------------------------------------------------------

    fn next_id(&mut self) -> u32 {
        let id = self.next_request_id;
        // 0 ist fuer Server-Ereignisse reserviert
        self.next_request_id = self.next_request_id.wrapping_add(1).max(1);
        id
    }

    /// Liest den naechsten Frame, beantwortet Pings automatisch
    async fn empfangen(&mut self) -> ClientResult<ControlMessage> {
        loop {
            let nachricht = match self.framed.next().await {
                Some(Ok(n)) => n,
                Some(Err(e)) => return Err(ClientError::Wire(e)),
                None => return Err(ClientError::Getrennt),
            };

            if let ControlPayload::Ping(ref ping) = nachricht.payload {
                let pong = ControlMessage::pong(nachricht.request_id, ping.timestamp_ms, jetzt_ms());
                self.framed.send(pong).await?;
                continue;
            }
            return Ok(nachricht);
        }
    }

    fn ereignis_anwenden(&mut self, payload: ControlPayload) -> ClientEvent {
        match payload {
            ControlPayload::UserJoined(info) => {
                let name = info.username.clone();
                if Some(name.as_str()) != self.username.as_deref() {
                    self.peers
                        .insert(name.clone(), Peer::neu(info.username, info.public_key));
                }
                ClientEvent::PeerBeigetreten(name)
            }

            ControlPayload::UserLeft(ev) => {
                self.peers.remove(&ev.username);
                ClientEvent::PeerVerlassen(ev.username)
            }

            ControlPayload::IncomingNegotiation(ev) => {
                let von = ev.from_username;
                match self.schluesselpaar.entkapseln(&ev.encapsulated_secret) {
                    Ok(schluessel) => {
                        self.peers
                            .entry(von.clone())
                            .or_insert_with(|| Peer::neu(von.clone(), Vec::new()))
                            .schluessel_setzen(schluessel);
                        tracing::debug!(von = %von, "Schluessel ausgehandelt");
                        ClientEvent::AushandlungEmpfangen { von }
                    }
                    Err(e) => {
                        tracing::warn!(von = %von, fehler = %e, "Aushandlung verworfen");
                        ClientEvent::Verworfen {
                            von,
                            fehler: e.into(),
                        }
                    }
                }
            }

            ControlPayload::IncomingDirectMessage(ev) => {
                let von = ev.from_username;
                match self.nachricht_oeffnen(&von, &ev.envelope) {
                    Ok(text) => ClientEvent::NachrichtEmpfangen { von, text },
                    Err(fehler) => {
                        tracing::warn!(von = %von, fehler = %fehler, "Direktnachricht verworfen");
                        ClientEvent::Verworfen { von, fehler }
                    }
                }
            }

            andere => ClientEvent::Verworfen {
                von: String::new(),
                fehler: ClientError::UnerwarteteAntwort(format!("{:?}", andere)),
            },
        }
    }

    fn nachricht_oeffnen(&mut self, von: &str, umschlag: &[u8]) -> ClientResult<String> {
        let peer = self
            .peers
            .get_mut(von)
            .ok_or_else(|| ClientError::UnbekannterPeer(von.to_string()))?;
        let schluessel = peer
            .schluessel()
            .ok_or_else(|| ClientError::KeinSchluessel(von.to_string()))?;

        let klartext = entschluesseln(umschlag, schluessel.as_bytes())?;
        let text = String::from_utf8(klartext).map_err(|_| ClientError::KeinText)?;
        peer.nachricht_anhaengen(Message::empfangene(text.clone()));
        Ok(text)
    }

    /// Uebernimmt neue Teilnehmer, behaelt Schluessel und Verlauf bekannter
    fn peers_abgleichen(&mut self, users: &[UserInfo]) {
        for user in users {
            if Some(user.username.as_str()) == self.username.as_deref() {
                continue;
            }
            match self.peers.get_mut(&user.username) {
                Some(p) if p.public_key == user.public_key => {}
                // Peer war nur aus einer eingehenden Aushandlung bekannt
                Some(p) if p.public_key.is_empty() => p.public_key = user.public_key.clone(),
                // Neuer Teilnehmer oder neue Sitzung unter altem Namen
                _ => {
                    self.peers.insert(
                        user.username.clone(),
                        Peer::neu(user.username.clone(), user.public_key.clone()),
                    );
                }
            }
        }
    }

    fn benutzerliste_aus(antwort: ControlPayload) -> ClientResult<Vec<UserInfo>> {
        match antwort {
            ControlPayload::UserList(UserListResponse { users }) => Ok(users),
            andere => Err(ClientError::UnerwarteteAntwort(format!("{:?}", andere))),
        }
    }

    fn ack_erwarten(antwort: ControlPayload) -> ClientResult<()> {
        match antwort {
            ControlPayload::Ack => Ok(()),
            andere => Err(ClientError::UnerwarteteAntwort(format!("{:?}", andere))),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
