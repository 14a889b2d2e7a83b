//! cipherchat-client – Client-SDK fuer den Cipherchat-Relay
//!
//! Ein `ChatClient` haelt die TCP-Verbindung, das eigene Schluesselpaar und
//! pro bekanntem Teilnehmer einen `Peer` mit ausgehandeltem Schluessel und
//! Nachrichtenverlauf. Der Relay sieht nur Kapseln und Umschlaege.
//!
//! ```text
//! verbinden -> beitreten -> aushandeln(peer) -> nachricht_senden(peer, text)
//!                                  ^                     |
//!                                  +-- naechstes_ereignis (Push vom Server)
//! ```

pub mod connection;
pub mod display;
pub mod error;
pub mod peer;

pub use connection::{ChatClient, ClientEvent};
pub use display::kurzform;
pub use error::{ClientError, ClientResult};
pub use peer::{Message, Peer};
