//! Serde-Hilfsmodul: `Vec<u8>` als Base64-String im JSON
//!
//! Oeffentliche Schluessel, gekapselte Secrets und Umschlaege sind binaer.
//! Als JSON-Zahlenarray waeren sie etwa viermal so gross.
//!
//! ```rust,ignore
//! #[serde(with = "crate::base64_bytes")]
//! pub public_key: Vec<u8>,
//! ```

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Deserializer, Serializer};

pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&STANDARD.encode(bytes))
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    STANDARD
        .decode(text.as_bytes())
        .map_err(|e| serde::de::Error::custom(format!("Ungueltiges Base64: {e}")))
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Huelle {
        #[serde(with = "super")]
        daten: Vec<u8>,
    }

    #[test]
    fn bytes_werden_als_base64_string_kodiert() {
        let h = Huelle {
            daten: vec![0xde, 0xad, 0xbe, 0xef],
        };
        let json = serde_json::to_string(&h).unwrap();
        assert_eq!(json, r#"{"daten":"3q2+7w=="}"#);
    }

    #[test]
    fn ungueltiges_base64_wird_abgelehnt() {
        let result: Result<Huelle, _> = serde_json::from_str(r#"{"daten":"%%%"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn leere_bytes_bleiben_leer() {
        let decoded: Huelle = serde_json::from_str(r#"{"daten":""}"#).unwrap();
        assert!(decoded.daten.is_empty());
    }
}
