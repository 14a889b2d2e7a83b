//! Benutzer-Verzeichnis – Wer ist unter welchem Namen beigetreten
//!
//! Zwei nebenlaeufige Indizes:
//! - `benutzer`: Username -> Eintrag (Primaerindex, eindeutiger Schluessel)
//! - `verbindungen`: ConnectionId -> Username (Rueckwaertsindex)
//!
//! ## Invarianten
//! - Hoechstens ein Eintrag pro Username
//! - Hoechstens ein Eintrag pro Verbindung
//! - Ein Eintrag wird nie ueberschrieben, nur entfernt
//!
//! Kein Lock ueber beide Maps: `beitreten` haelt den Shard des Usernamens
//! waehrend es den Rueckwaertsindex schreibt, alle anderen Operationen
//! greifen nacheinander auf die Maps zu.

use cipherchat_core::ConnectionId;
use cipherchat_protocol::UserInfo;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

use crate::error::{SignalingError, SignalingResult};

// ---------------------------------------------------------------------------
// DirectoryEntry
// ---------------------------------------------------------------------------

/// Ein beigetretener Benutzer
///
/// Alle Felder sind nach dem Beitritt unveraenderlich.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub username: String,
    pub connection_id: ConnectionId,
    pub public_key: Vec<u8>,
}

impl DirectoryEntry {
    /// Oeffentliche Sicht fuer Protokoll-Antworten (ohne Verbindungs-ID)
    pub fn user_info(&self) -> UserInfo {
        UserInfo {
            username: self.username.clone(),
            public_key: self.public_key.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// UserDirectory
// ---------------------------------------------------------------------------

/// Fluechtiges Verzeichnis aller beigetretenen Benutzer
///
/// Thread-safe via Arc + DashMap. Clone teilt den inneren Zustand.
#[derive(Clone, Default)]
pub struct UserDirectory {
    inner: Arc<UserDirectoryInner>,
}

#[derive(Default)]
struct UserDirectoryInner {
    benutzer: DashMap<String, DirectoryEntry>,
    verbindungen: DashMap<ConnectionId, String>,
}

impl UserDirectory {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Traegt einen Benutzer ein (compare-and-insert)
    ///
    /// Von zwei gleichzeitigen Beitritten mit demselben Namen gewinnt genau
    /// einer, der andere erhaelt `UsernameVergeben`.
    pub fn beitreten(
        &self,
        username: &str,
        connection_id: ConnectionId,
        public_key: Vec<u8>,
    ) -> SignalingResult<DirectoryEntry> {
        if let Some(bisher) = self.inner.verbindungen.get(&connection_id) {
            return Err(SignalingError::BereitsBeigetreten(bisher.value().clone()));
        }

        match self.inner.benutzer.entry(username.to_string()) {
            Entry::Occupied(_) => Err(SignalingError::UsernameVergeben(username.to_string())),
            Entry::Vacant(frei) => {
                let eintrag = DirectoryEntry {
                    username: username.to_string(),
                    connection_id,
                    public_key,
                };
                let gesperrt = frei.insert(eintrag.clone());
                self.inner
                    .verbindungen
                    .insert(connection_id, username.to_string());
                drop(gesperrt);

                tracing::debug!(username, connection = %connection_id, "Benutzer eingetragen");
                Ok(eintrag)
            }
        }
    }

    /// Sucht einen Eintrag nach Username
    pub fn suchen(&self, username: &str) -> SignalingResult<DirectoryEntry> {
        self.inner
            .benutzer
            .get(username)
            .map(|e| e.value().clone())
            .ok_or_else(|| SignalingError::NichtGefunden(username.to_string()))
    }

    /// Sucht den Eintrag einer Verbindung ueber den Rueckwaertsindex
    pub fn suchen_nach_verbindung(
        &self,
        connection_id: &ConnectionId,
    ) -> SignalingResult<DirectoryEntry> {
        let username = self
            .inner
            .verbindungen
            .get(connection_id)
            .map(|u| u.value().clone())
            .ok_or_else(|| SignalingError::NichtGefunden(connection_id.to_string()))?;

        match self.inner.benutzer.get(&username) {
            Some(e) if e.connection_id == *connection_id => Ok(e.value().clone()),
            _ => Err(SignalingError::NichtGefunden(connection_id.to_string())),
        }
    }

    /// Entfernt den Eintrag einer Verbindung und gibt ihn zurueck
    ///
    /// Der Haupteintrag verschwindet zuerst. `suchen_nach_verbindung`
    /// prueft den Haupteintrag mit, der Rueckwaertsindex darf also kurz
    /// nachhaengen.
    pub fn entfernen(&self, connection_id: &ConnectionId) -> SignalingResult<DirectoryEntry> {
        let username = self
            .inner
            .verbindungen
            .get(connection_id)
            .map(|u| u.value().clone())
            .ok_or_else(|| SignalingError::NichtGefunden(connection_id.to_string()))?;

        let entfernt = self
            .inner
            .benutzer
            .remove_if(&username, |_, e| e.connection_id == *connection_id);
        self.inner.verbindungen.remove(connection_id);

        let (_, eintrag) = entfernt.ok_or_else(|| SignalingError::NichtGefunden(username.clone()))?;

        tracing::debug!(username = %eintrag.username, connection = %connection_id, "Benutzer entfernt");
        Ok(eintrag)
    }

    /// Momentaufnahme aller Eintraege, sortiert nach Username
    pub fn momentaufnahme(&self) -> Vec<DirectoryEntry> {
        let mut eintraege: Vec<DirectoryEntry> = self
            .inner
            .benutzer
            .iter()
            .map(|e| e.value().clone())
            .collect();
        eintraege.sort_by(|a, b| a.username.cmp(&b.username));
        eintraege
    }

    /// Anzahl beigetretener Benutzer
    pub fn anzahl(&self) -> usize {
        self.inner.benutzer.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
