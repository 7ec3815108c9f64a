use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chairside_core::Clock;
use chairside_db::{LedgerSummary, SqlReservationStore};
use serde::Serialize;
use tracing::warn;

#[derive(Clone)]
pub struct HealthState {
    pub store: Arc<SqlReservationStore>,
    pub clock: Arc<dyn Clock>,
    pub sweep_interval_secs: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HoldLedgerReport {
    pub active: i64,
    pub awaiting_sweep: i64,
    pub sweep: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub detail: String,
    pub providers: i64,
    pub upcoming_appointments: i64,
    pub holds: HoldLedgerReport,
    pub checked_at: String,
}

pub fn router(state: HealthState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

/// Ready once the schema answers and the roster has at least one provider to book.
pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let now = state.clock.now();
    let sweep = match state.sweep_interval_secs {
        0 => "disabled".to_string(),
        secs => format!("every {secs}s"),
    };

    let (ready, detail, summary) = match state.store.ledger_summary(now).await {
        Ok(summary) if summary.providers == 0 => (
            false,
            "roster is empty, load providers with `chairside seed`".to_string(),
            summary,
        ),
        Ok(summary) => (true, "booking ledger reachable".to_string(), summary),
        Err(error) => {
            warn!(event_name = "system.health.degraded", error = %error, "ledger unreachable");
            (false, format!("booking ledger unreachable: {error}"), LedgerSummary::default())
        }
    };

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        detail,
        providers: summary.providers,
        upcoming_appointments: summary.upcoming_appointments,
        holds: HoldLedgerReport {
            active: summary.active_holds,
            awaiting_sweep: summary.awaiting_sweep,
            sweep,
        },
        checked_at: now.to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}
