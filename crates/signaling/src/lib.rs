//! cipherchat-signaling – Verzeichnis und Relay ueber TCP
//!
//! Dieser Crate implementiert den Relay-Service fuer Cipherchat. Clients
//! treten unter einem eindeutigen Namen bei, handeln paarweise Schluessel aus
//! und tauschen verschluesselte Direktnachrichten aus. Der Server sieht nur
//! Namen, oeffentliche Schluessel und undurchsichtige Bytes.
//!
//! ## Architektur
//!
//! ```text
//! TCP Listener (SignalingServer)
//!     |
//!     v
//! ClientConnection (pro Verbindung ein Task)
//!     |  State Machine: Verbunden -> Beigetreten -> Getrennt
//!     |
//!     v
//! MessageDispatcher
//!     |
//!     +-- UserDirectory   (Join, ListUsers, Cleanup)
//!     +-- relay           (Negotiate, DirectMessage)
//!
//! EventBroadcaster – Send-Queues aller offenen Verbindungen
//! ```

pub mod broadcast;
pub mod connection;
pub mod directory;
pub mod dispatcher;
pub mod error;
pub mod relay;
pub mod server_state;
pub mod tcp;

// Bequeme Re-Exporte
pub use broadcast::EventBroadcaster;
pub use connection::ClientConnection;
pub use directory::{DirectoryEntry, UserDirectory};
pub use dispatcher::MessageDispatcher;
pub use error::{SignalingError, SignalingResult};
pub use server_state::{SignalingConfig, SignalingState};
pub use tcp::SignalingServer;
