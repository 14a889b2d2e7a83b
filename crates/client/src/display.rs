//! Kurzdarstellung von Binaerdaten fuer Logs

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Zeichen, die am Anfang und Ende erhalten bleiben
const RAND: usize = 25;

/// Base64 eines Byte-Blobs, bei langen Werten in der Mitte gekuerzt
///
/// `kurzform(&[0u8; 100])` ergibt `AAAA…AAAA` mit je 25 Zeichen.
pub fn kurzform(bytes: &[u8]) -> String {
    let kodiert = STANDARD.encode(bytes);
    if kodiert.len() <= 2 * RAND {
        return kodiert;
    }
    // Base64 ist ASCII, Byte-Indizes sind Zeichengrenzen
    format!(
        "{}…{}",
        &kodiert[..RAND],
        &kodiert[kodiert.len() - RAND..]
    )
}
