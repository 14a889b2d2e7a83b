//! cipherchat-protocol – Netzwerkprotokoll-Definitionen
//!
//! Dieses Crate definiert alle Nachrichtentypen die zwischen Client und
//! Relay ausgetauscht werden, sowie das Frame-Format auf dem Draht.

pub mod base64_bytes;
pub mod control;
pub mod wire;

pub use control::{ControlMessage, ControlPayload, ErrorCode, UserInfo};
pub use wire::{FrameCodec, WireError, WireResult};
