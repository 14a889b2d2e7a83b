//! Cipherchat Server – Einstiegspunkt
//!
//! Laedt die Konfiguration, initialisiert das Logging und startet den Server.

use anyhow::Result;
use cipherchat_server::config::{ConfigQuelle, ServerConfig, ENV_CONFIG_PFAD};
use cipherchat_server::Server;

#[tokio::main]
async fn main() -> Result<()> {
    let config_pfad = std::env::var(ENV_CONFIG_PFAD).unwrap_or_else(|_| "config.toml".into());

    // Standardwerte falls die Datei fehlt
    let (config, quelle) = ServerConfig::laden(&config_pfad)?;

    cipherchat_observability::logging_initialisieren(&config.logging.level, &config.logging.format);

    if quelle == ConfigQuelle::Standardwerte {
        tracing::warn!(
            pfad = %config_pfad,
            "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
        );
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_pfad,
        "Cipherchat Server wird initialisiert"
    );

    Server::neu(config).starten().await?;

    Ok(())
}
