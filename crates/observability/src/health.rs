//! Health-Check-Endpunkt fuer Cipherchat
//!
//! Endpoint: `GET /health`
//! Response: JSON mit Status, Version, Uptime und Listener-Status

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Status des Health-Checks
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

/// Antwort des Health-Check-Endpunkts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    pub uptime_seconds: u64,
    pub listener_ready: bool,
}

/// Geteilter Zustand fuer den Health-Check-Handler
///
/// Der Signaling-Server setzt `listener_bereit`, sobald der TCP-Listener
/// gebunden ist, und nimmt es beim Shutdown zurueck.
#[derive(Clone)]
pub struct HealthState {
    start_time: Arc<Instant>,
    listener_bereit: Arc<AtomicBool>,
}

impl HealthState {
    pub fn neu() -> Self {
        Self {
            start_time: Arc::new(Instant::now()),
            listener_bereit: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn listener_bereit(&self) -> bool {
        self.listener_bereit.load(Ordering::Relaxed)
    }

    pub fn listener_status_setzen(&self, bereit: bool) {
        self.listener_bereit.store(bereit, Ordering::Relaxed);
    }

    pub fn antwort(&self) -> HealthResponse {
        let listener_ready = self.listener_bereit();
        HealthResponse {
            status: if listener_ready {
                HealthStatus::Healthy
            } else {
                HealthStatus::Unhealthy
            },
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: self.uptime_seconds(),
            listener_ready,
        }
    }
}

impl Default for HealthState {
    fn default() -> Self {
        Self::neu()
    }
}

/// Axum-Router fuer den `/health`-Endpunkt
pub fn health_router(state: HealthState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .with_state(state)
}

/// `GET /health` – gibt den Serverstatus zurueck
async fn health_handler(State(state): State<HealthState>) -> impl IntoResponse {
    let response = state.antwort();

    let http_status = match response.status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (http_status, Json(response))
}
