//! Control-Protokoll (TCP)
//!
//! Definiert alle Nachrichten die zwischen Client und Relay ausgetauscht
//! werden.
//!
//! ## Design
//! - Request/Response Pattern: jede Anfrage hat eine `request_id: u32`,
//!   die Antwort traegt dieselbe ID
//! - Server-Push-Ereignisse (Beitritt, Austritt, eingehende Aushandlung,
//!   eingehende Nachricht) tragen `request_id = 0`
//! - Binaere Felder (Schluessel, Secrets, Umschlaege) sind Base64 im JSON
//! - Der Relay liest `encapsulated_secret` und `envelope` nie aus, er
//!   reicht sie unveraendert weiter

use serde::{Deserialize, Serialize};

/// Request-ID fuer Nachrichten die der Server unaufgefordert sendet
pub const EREIGNIS_REQUEST_ID: u32 = 0;

// ---------------------------------------------------------------------------
// Fehler-Codes
// ---------------------------------------------------------------------------

/// Standardisierte Fehler-Codes fuer Error-Responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Allgemein
    InternalError,
    InvalidRequest,
    // Verzeichnis
    UsernameTaken,
    AlreadyJoined,
    // Relay
    SourceNotFound,
    TargetNotFound,
    // Wire
    PayloadTooLarge,
}

// ---------------------------------------------------------------------------
// Verzeichnis-Nachrichten
// ---------------------------------------------------------------------------

/// Oeffentliche Sicht auf einen Verzeichnis-Eintrag
///
/// Die Verbindungs-ID bleibt serverintern und wird nie ausgeliefert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub username: String,
    #[serde(with = "crate::base64_bytes")]
    pub public_key: Vec<u8>,
}

/// Beitritt zum Verzeichnis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinRequest {
    pub username: String,
    /// Oeffentlicher Schluessel fuer die Schluessel-Aushandlung
    #[serde(with = "crate::base64_bytes")]
    pub public_key: Vec<u8>,
}

/// Momentaufnahme des Verzeichnisses (Antwort auf Join und ListUsers)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserListResponse {
    pub users: Vec<UserInfo>,
}

/// Ein Teilnehmer hat das Verzeichnis verlassen
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserLeftEvent {
    pub username: String,
}

// ---------------------------------------------------------------------------
// Relay-Nachrichten
// ---------------------------------------------------------------------------

/// Gekapseltes Secret an einen Teilnehmer weiterleiten
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NegotiateRequest {
    pub target_username: String,
    #[serde(with = "crate::base64_bytes")]
    pub encapsulated_secret: Vec<u8>,
}

/// Verschluesselten Umschlag an einen Teilnehmer weiterleiten
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectMessageRequest {
    pub target_username: String,
    #[serde(with = "crate::base64_bytes")]
    pub envelope: Vec<u8>,
}

/// Eingehende Schluessel-Aushandlung (an das Ziel zugestellt)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingNegotiationEvent {
    pub from_username: String,
    #[serde(with = "crate::base64_bytes")]
    pub encapsulated_secret: Vec<u8>,
}

/// Eingehende Direktnachricht (an das Ziel zugestellt)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingDirectMessageEvent {
    pub from_username: String,
    #[serde(with = "crate::base64_bytes")]
    pub envelope: Vec<u8>,
}

// ---------------------------------------------------------------------------
// Keepalive
// ---------------------------------------------------------------------------

/// Ping (Client -> Server oder Server -> Client)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PingMessage {
    /// Unix-Timestamp in Millisekunden fuer RTT-Messung
    pub timestamp_ms: u64,
}

/// Pong-Antwort (spiegelt Timestamp zurueck)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PongMessage {
    /// Originaler Timestamp aus dem Ping
    pub echo_timestamp_ms: u64,
    /// Eigener Timestamp der Gegenseite
    pub server_timestamp_ms: u64,
}

// ---------------------------------------------------------------------------
// Haupt-Enum: ControlPayload
// ---------------------------------------------------------------------------

/// Alle moeglichen Control-Nachrichten (typsicher via Tagged Enum)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlPayload {
    // Verzeichnis (Client -> Server)
    Join(JoinRequest),
    ListUsers,

    // Relay (Client -> Server)
    Negotiate(NegotiateRequest),
    DirectMessage(DirectMessageRequest),

    // Antworten (Server -> Client)
    UserList(UserListResponse),
    Ack,

    // Ereignisse (Server -> Client)
    UserJoined(UserInfo),
    UserLeft(UserLeftEvent),
    IncomingNegotiation(IncomingNegotiationEvent),
    IncomingDirectMessage(IncomingDirectMessageEvent),

    // Keepalive
    Ping(PingMessage),
    Pong(PongMessage),

    // Error
    Error(ErrorResponse),
}

impl ControlPayload {
    /// Gibt true zurueck fuer unaufgefordert gepushte Server-Ereignisse
    pub fn ist_ereignis(&self) -> bool {
        matches!(
            self,
            Self::UserJoined(_)
                | Self::UserLeft(_)
                | Self::IncomingNegotiation(_)
                | Self::IncomingDirectMessage(_)
        )
    }
}

/// Standardisierte Fehler-Antwort
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: ErrorCode,
    pub message: String,
}

// ---------------------------------------------------------------------------
// Control-Frame (Umschlag fuer alle Nachrichten)
// ---------------------------------------------------------------------------

/// Control-Protokoll-Nachricht mit Request/Response-Zuordnung
///
/// Jede Anfrage traegt eine `request_id` die der Client vergibt.
/// Der Server kopiert die ID in die Antwort damit der Client
/// Request und Response zuordnen kann.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlMessage {
    pub request_id: u32,
    pub payload: ControlPayload,
}

impl ControlMessage {
    /// Erstellt eine neue Control-Nachricht
    pub fn new(request_id: u32, payload: ControlPayload) -> Self {
        Self {
            request_id,
            payload,
        }
    }

    /// Erstellt ein Server-Push-Ereignis
    pub fn ereignis(payload: ControlPayload) -> Self {
        Self::new(EREIGNIS_REQUEST_ID, payload)
    }

    /// Erstellt eine leere Erfolgs-Bestaetigung
    pub fn ack(request_id: u32) -> Self {
        Self::new(request_id, ControlPayload::Ack)
    }

    /// Erstellt eine Ping-Nachricht
    pub fn ping(request_id: u32, timestamp_ms: u64) -> Self {
        Self::new(
            request_id,
            ControlPayload::Ping(PingMessage { timestamp_ms }),
        )
    }

    /// Erstellt eine Pong-Antwort
    pub fn pong(request_id: u32, echo_timestamp_ms: u64, server_timestamp_ms: u64) -> Self {
        Self::new(
            request_id,
            ControlPayload::Pong(PongMessage {
                echo_timestamp_ms,
                server_timestamp_ms,
            }),
        )
    }

    /// Erstellt eine Fehler-Antwort
    pub fn error(request_id: u32, code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(
            request_id,
            ControlPayload::Error(ErrorResponse {
                code,
                message: message.into(),
            }),
        )
    }

    /// Serialisiert die Nachricht als JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Deserialisiert eine Nachricht aus JSON
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

/// Aktueller Unix-Timestamp in Millisekunden (fuer Ping/Pong)
pub fn jetzt_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
