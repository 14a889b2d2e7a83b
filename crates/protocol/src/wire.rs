//! Wire-Format fuer TCP-Verbindungen
//!
//! Frame-basiertes Protokoll: Laenge (u32 big-endian) + JSON-Payload.
//!
//! ```text
//! +--------+--------+--------+--------+----...----+
//! | Laenge (u32 BE) | 4 Bytes        | Payload    |
//! +--------+--------+--------+--------+----...----+
//! ```
//!
//! Die Laenge zaehlt nur die Payload-Bytes. Ein verschluesselter Umschlag
//! landet Base64-kodiert im JSON, die Frame-Grenze muss also etwa 4/3 der
//! groessten erwarteten Nachricht abdecken.
//!
//! Ein zu grosser ausgehender Frame ist kein Verbindungsfehler: der Encoder
//! meldet [`WireError::FrameZuGross`] bevor er etwas in den Puffer schreibt,
//! die Verbindung bleibt danach benutzbar.

use bytes::{Buf, BufMut, BytesMut};
use std::io;
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder};

use crate::control::ControlMessage;

/// Standard-maximale Frame-Groesse (1 MB)
pub const DEFAULT_MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Groesse des Laengen-Felds in Bytes
pub const LENGTH_FIELD_SIZE: usize = 4;

/// Fehler beim Lesen oder Schreiben von Frames
#[derive(Debug, Error)]
pub enum WireError {
    #[error("IO-Fehler: {0}")]
    Io(#[from] io::Error),

    /// Payload ueberschreitet die Frame-Grenze
    #[error("Frame zu gross: {laenge} Bytes (Maximum: {maximum} Bytes)")]
    FrameZuGross { laenge: usize, maximum: usize },

    #[error("Ungueltiges JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl WireError {
    /// true wenn nur die eine Nachricht betroffen ist, nicht die Verbindung
    pub fn nur_nachricht_betroffen(&self) -> bool {
        matches!(self, Self::FrameZuGross { .. })
    }
}

pub type WireResult<T> = Result<T, WireError>;

/// tokio-util Codec fuer `ControlMessage`-Frames
///
/// Wird auf beiden Seiten (Relay und Client) mit
/// `tokio_util::codec::Framed` verwendet.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    max_frame_size: usize,
}

impl FrameCodec {
    /// Erstellt einen neuen `FrameCodec` mit Standard-Limit
    pub fn new() -> Self {
        Self::with_max_size(DEFAULT_MAX_FRAME_SIZE)
    }

    /// Erstellt einen `FrameCodec` mit eigener maximaler Frame-Groesse
    pub fn with_max_size(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }

    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    /// Prueft ob `nachricht` in einen Frame passt und gibt die Payload-Laenge zurueck
    ///
    /// Der Relay prueft damit ein Ereignis bevor er es einer fremden
    /// Verbindung zustellt.
    pub fn pruefen(&self, nachricht: &ControlMessage) -> WireResult<usize> {
        let laenge = serde_json::to_vec(nachricht)?.len();
        self.grenze_pruefen(laenge)?;
        Ok(laenge)
    }

    fn grenze_pruefen(&self, laenge: usize) -> WireResult<()> {
        if laenge > self.max_frame_size {
            return Err(WireError::FrameZuGross {
                laenge,
                maximum: self.max_frame_size,
            });
        }
        Ok(())
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for FrameCodec {
    type Item = ControlMessage;
    type Error = WireError;

    fn decode(&mut self, src: &mut BytesMut) -> WireResult<Option<Self::Item>> {
        let Some(kopf) = src.get(..LENGTH_FIELD_SIZE) else {
            return Ok(None);
        };
        let laenge = u32::from_be_bytes([kopf[0], kopf[1], kopf[2], kopf[3]]) as usize;
        self.grenze_pruefen(laenge)?;

        let gesamt = LENGTH_FIELD_SIZE + laenge;
        if src.len() < gesamt {
            src.reserve(gesamt - src.len());
            return Ok(None);
        }

        src.advance(LENGTH_FIELD_SIZE);
        let payload = src.split_to(laenge);
        Ok(Some(serde_json::from_slice(&payload)?))
    }
}

impl Encoder<ControlMessage> for FrameCodec {
    type Error = WireError;

    fn encode(&mut self, item: ControlMessage, dst: &mut BytesMut) -> WireResult<()> {
        let json = serde_json::to_vec(&item)?;
        self.grenze_pruefen(json.len())?;

        dst.reserve(LENGTH_FIELD_SIZE + json.len());
        dst.put_u32(json.len() as u32);
        dst.put_slice(&json);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
