//! Lokale Sicht auf andere Teilnehmer

use cipherchat_crypto::SecretBytes;

/// Eine Direktnachricht im lokalen Verlauf
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Entschluesselter Text
    pub body: String,
    /// `true` wenn lokal verfasst, `false` wenn empfangen
    pub own: bool,
}

impl Message {
    pub fn eigene(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            own: true,
        }
    }

    pub fn empfangene(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            own: false,
        }
    }
}

/// Ein anderer Teilnehmer aus Sicht des Clients
///
/// Der ausgehandelte Schluessel lebt nur hier, der Server kennt ihn nie.
/// Eine neue Aushandlung (in beide Richtungen) ersetzt den alten Schluessel.
#[derive(Debug, Clone)]
pub struct Peer {
    pub username: String,
    pub public_key: Vec<u8>,
    schluessel: Option<SecretBytes>,
    verlauf: Vec<Message>,
}

impl Peer {
    pub fn neu(username: impl Into<String>, public_key: Vec<u8>) -> Self {
        Self {
            username: username.into(),
            public_key,
            schluessel: None,
            verlauf: Vec::new(),
        }
    }

    pub fn schluessel(&self) -> Option<&SecretBytes> {
        self.schluessel.as_ref()
    }

    pub fn hat_schluessel(&self) -> bool {
        self.schluessel.is_some()
    }

    pub fn schluessel_setzen(&mut self, schluessel: SecretBytes) {
        self.schluessel = Some(schluessel);
    }

    /// Nachrichtenverlauf in Empfangs-/Sendereihenfolge
    pub fn verlauf(&self) -> &[Message] {
        &self.verlauf
    }

    pub fn nachricht_anhaengen(&mut self, nachricht: Message) {
        self.verlauf.push(nachricht);
    }
}
