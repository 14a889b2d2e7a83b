//! Prometheus-kompatible Metriken fuer Cipherchat
//!
//! Registrierte Metriken:
//! - `cipherchat_connections` – Gauge: Offene TCP-Verbindungen
//! - `cipherchat_joined_users` – Gauge: Beigetretene Benutzer im Verzeichnis
//! - `cipherchat_negotiations_relayed_total` – Counter: Weitergeleitete Aushandlungen
//! - `cipherchat_messages_relayed_total` – Counter: Weitergeleitete Direktnachrichten
//! - `cipherchat_relay_failures_total` – Counter: Fehlgeschlagene Relays (reason)

use anyhow::Result;
use axum::{extract::State, response::IntoResponse, routing::get, Router};
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Alle Cipherchat-Prometheus-Metriken
#[derive(Clone)]
pub struct CipherchatMetrics {
    pub registry: Arc<Registry>,

    pub connections: IntGauge,
    pub joined_users: IntGauge,
    pub negotiations_relayed_total: IntCounter,
    pub messages_relayed_total: IntCounter,
    pub relay_failures_total: IntCounterVec,
}

impl CipherchatMetrics {
    /// Erstellt und registriert alle Metriken in einer neuen Registry
    pub fn neu() -> Result<Self> {
        let registry = Registry::new();

        // --- Verbindungen ---
        let connections = IntGauge::with_opts(Opts::new(
            "cipherchat_connections",
            "Anzahl offener TCP-Verbindungen",
        ))?;
        registry.register(Box::new(connections.clone()))?;

        let joined_users = IntGauge::with_opts(Opts::new(
            "cipherchat_joined_users",
            "Anzahl beigetretener Benutzer",
        ))?;
        registry.register(Box::new(joined_users.clone()))?;

        // --- Relay ---
        let negotiations_relayed_total = IntCounter::with_opts(Opts::new(
            "cipherchat_negotiations_relayed_total",
            "Gesamtanzahl weitergeleiteter Schluessel-Aushandlungen",
        ))?;
        registry.register(Box::new(negotiations_relayed_total.clone()))?;

        let messages_relayed_total = IntCounter::with_opts(Opts::new(
            "cipherchat_messages_relayed_total",
            "Gesamtanzahl weitergeleiteter Direktnachrichten",
        ))?;
        registry.register(Box::new(messages_relayed_total.clone()))?;

        let relay_failures_total = IntCounterVec::new(
            Opts::new(
                "cipherchat_relay_failures_total",
                "Fehlgeschlagene Relays nach Grund",
            ),
            &["reason"],
        )?;
        registry.register(Box::new(relay_failures_total.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            connections,
            joined_users,
            negotiations_relayed_total,
            messages_relayed_total,
            relay_failures_total,
        })
    }

    /// Zaehlt einen fehlgeschlagenen Relay
    pub fn relay_fehlgeschlagen(&self, grund: &str) {
        self.relay_failures_total.with_label_values(&[grund]).inc();
    }

    /// Exportiert alle Metriken im Prometheus-Textformat
    pub fn exportieren(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Axum-Router fuer den `/metrics`-Endpunkt
pub fn metrics_router(metriken: CipherchatMetrics) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metriken)
}

async fn metrics_handler(State(metriken): State<CipherchatMetrics>) -> impl IntoResponse {
    match metriken.exportieren() {
        Ok(text) => (
            axum::http::StatusCode::OK,
            [(
                axum::http::header::CONTENT_TYPE,
                "text/plain; version=0.0.4",
            )],
            text,
        )
            .into_response(),
        Err(err) => {
            tracing::error!("Metriken-Export fehlgeschlagen: {err}");
            axum::http::StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metriken_erstellen_erfolgreich() {
        let metriken = CipherchatMetrics::neu().unwrap();
        assert!(!metriken.registry.gather().is_empty());
    }

    #[test]
    fn gauges_setzen() {
        let metriken = CipherchatMetrics::neu().unwrap();
        metriken.connections.inc();
        metriken.connections.inc();
        metriken.connections.dec();
        metriken.joined_users.set(7);
        assert_eq!(metriken.connections.get(), 1);
        assert_eq!(metriken.joined_users.get(), 7);
    }

    #[test]
    fn relay_fehler_mit_grund() {
        let metriken = CipherchatMetrics::neu().unwrap();
        metriken.relay_fehlgeschlagen("target_not_found");
        metriken.relay_fehlgeschlagen("target_not_found");
        metriken.relay_fehlgeschlagen("source_not_found");

        let wert = metriken
            .relay_failures_total
            .with_label_values(&["target_not_found"])
            .get();
        assert_eq!(wert, 2);
    }

    #[test]
    fn zwei_instanzen_kollidieren_nicht() {
        // Jede Instanz hat eine eigene Registry
        let a = CipherchatMetrics::neu().unwrap();
        let b = CipherchatMetrics::neu().unwrap();
        a.messages_relayed_total.inc();
        assert_eq!(b.messages_relayed_total.get(), 0);
    }

    #[test]
    fn metriken_export_prometheus_format() {
        let metriken = CipherchatMetrics::neu().unwrap();
        metriken.connections.set(3);
        metriken.negotiations_relayed_total.inc();
        metriken.relay_fehlgeschlagen("queue_full");

        let output = metriken.exportieren().unwrap();
        assert!(output.contains("cipherchat_connections 3"));
        assert!(output.contains("cipherchat_negotiations_relayed_total 1"));
        assert!(output.contains("cipherchat_relay_failures_total{reason=\"queue_full\"} 1"));
        assert!(output.contains("# HELP"));
        assert!(output.contains("# TYPE"));
    }

    #[tokio::test]
    async fn metrics_router_liefert_text() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let metriken = CipherchatMetrics::neu().unwrap();
        metriken.joined_users.set(2);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = metrics_router(metriken);
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /metrics HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut antwort = String::new();
        stream.read_to_string(&mut antwort).await.unwrap();

        assert!(antwort.starts_with("HTTP/1.1 200"));
        assert!(antwort.contains("cipherchat_joined_users 2"));
    }
}
