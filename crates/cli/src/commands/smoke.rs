use std::sync::Arc;
use std::time::Instant;

use crate::commands::CommandResult;
use chairside_core::config::{AppConfig, LoadOptions};
use chairside_core::{
    BookingSettings, Clock, ConfirmBookingRequest, FreeSlotsQuery, PlaceHoldRequest,
    ReservationError, ReservationFacade, SystemClock,
};
use chairside_db::{
    connect_with_config, connect_with_settings, migrations, DemoSeedDataset, SqlReservationStore,
};
use serde::Serialize;

const SMOKE_PROVIDER: &str = "prov-ivanov";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum SmokeStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct SmokeCheck {
    name: &'static str,
    status: SmokeStatus,
    elapsed_ms: u64,
    message: String,
}

#[derive(Debug, Serialize)]
struct SmokeReport {
    command: &'static str,
    status: SmokeStatus,
    summary: String,
    total_elapsed_ms: u64,
    checks: Vec<SmokeCheck>,
}

pub fn run() -> CommandResult {
    let started = Instant::now();
    let mut checks = Vec::new();

    let config = match timed_check(|| AppConfig::load(LoadOptions::default())) {
        Ok((elapsed_ms, config)) => {
            checks.push(SmokeCheck {
                name: "config_validation",
                status: SmokeStatus::Pass,
                elapsed_ms,
                message: "configuration loaded and validated".to_string(),
            });
            config
        }
        Err((elapsed_ms, error)) => {
            checks.push(SmokeCheck {
                name: "config_validation",
                status: SmokeStatus::Fail,
                elapsed_ms,
                message: error.to_string(),
            });
            checks.push(skipped("db_connectivity"));
            checks.push(skipped("migration_visibility"));
            checks.push(skipped("booking_roundtrip"));
            return finalize_report(checks, elapsed_since(started));
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            checks.push(SmokeCheck {
                name: "db_connectivity",
                status: SmokeStatus::Fail,
                elapsed_ms: 0,
                message: format!("failed to initialize async runtime: {error}"),
            });
            checks.push(skipped("migration_visibility"));
            checks.push(skipped("booking_roundtrip"));
            return finalize_report(checks, elapsed_since(started));
        }
    };

    let db_started = Instant::now();
    let pool = match runtime.block_on(connect_with_config(&config.database)) {
        Ok(pool) => {
            checks.push(SmokeCheck {
                name: "db_connectivity",
                status: SmokeStatus::Pass,
                elapsed_ms: elapsed_since(db_started),
                message: format!("connected using `{}`", config.database.url),
            });
            pool
        }
        Err(error) => {
            checks.push(SmokeCheck {
                name: "db_connectivity",
                status: SmokeStatus::Fail,
                elapsed_ms: elapsed_since(db_started),
                message: format!("failed to connect: {error}"),
            });
            checks.push(skipped("migration_visibility"));
            checks.push(skipped("booking_roundtrip"));
            return finalize_report(checks, elapsed_since(started));
        }
    };

    let migration_started = Instant::now();
    let migration_result = runtime.block_on(async { migrations::run_pending(&pool).await });
    runtime.block_on(async {
        pool.close().await;
    });

    match migration_result {
        Ok(()) => checks.push(SmokeCheck {
            name: "migration_visibility",
            status: SmokeStatus::Pass,
            elapsed_ms: elapsed_since(migration_started),
            message: "migrations are visible and executable".to_string(),
        }),
        Err(error) => checks.push(SmokeCheck {
            name: "migration_visibility",
            status: SmokeStatus::Fail,
            elapsed_ms: elapsed_since(migration_started),
            message: format!("migration execution failed: {error}"),
        }),
    }

    let roundtrip_started = Instant::now();
    let roundtrip = runtime.block_on(booking_roundtrip(&config));
    checks.push(SmokeCheck {
        name: "booking_roundtrip",
        status: if roundtrip.is_ok() { SmokeStatus::Pass } else { SmokeStatus::Fail },
        elapsed_ms: elapsed_since(roundtrip_started),
        message: roundtrip.unwrap_or_else(|error| error),
    });

    finalize_report(checks, elapsed_since(started))
}

/// Hold, conflict, confirm and double-confirm against a scratch in-memory database,
/// so the operator's data is never touched.
async fn booking_roundtrip(config: &AppConfig) -> Result<String, String> {
    let settings =
        BookingSettings::from_config(&config.booking).map_err(|error| error.to_string())?;
    let pool = connect_with_settings("sqlite::memory:", 1, config.database.timeout_secs)
        .await
        .map_err(|error| format!("scratch database unavailable: {error}"))?;
    migrations::run_pending(&pool).await.map_err(|error| error.to_string())?;
    DemoSeedDataset::load(&pool).await.map_err(|error| error.to_string())?;

    let clock = Arc::new(SystemClock);
    let store = Arc::new(SqlReservationStore::new(pool.clone()));
    let facade = ReservationFacade::new(store, clock.clone(), settings);

    let query = FreeSlotsQuery { days: Some(7), duration_min: Some(30), tz: None };
    let free =
        facade.list_free_slots(SMOKE_PROVIDER, query).await.map_err(|error| error.to_string())?;
    let slot = free
        .days
        .iter()
        .flat_map(|day| day.slots.iter())
        .find(|slot| slot.range.start > clock.now())
        .ok_or_else(|| "no free slot found for the smoke provider".to_string())?;

    let request = || PlaceHoldRequest {
        provider_id: SMOKE_PROVIDER.to_string(),
        start: slot.range.start,
        end: slot.range.end,
        channel: "smoke".to_string(),
    };
    let hold = facade.place_hold(request()).await.map_err(|error| error.to_string())?;
    match facade.place_hold(request()).await {
        Err(ReservationError::SlotConflict) => {}
        other => return Err(format!("expected slot_conflict for second hold, got {other:?}")),
    }

    let patient = || ConfirmBookingRequest {
        patient_name: "Smoke Test".to_string(),
        patient_email: "smoke@example.com".to_string(),
        patient_phone: "555-010-0000".to_string(),
        appointment_type: "checkup".to_string(),
        notes: None,
        source: Some("smoke".to_string()),
        tz: None,
    };
    let confirmation = facade
        .confirm_booking(&hold.id.0, patient())
        .await
        .map_err(|error| error.to_string())?;
    match facade.confirm_booking(&hold.id.0, patient()).await {
        Err(ReservationError::HoldAlreadyUsed { .. }) => {}
        other => return Err(format!("expected hold_already_used on re-confirm, got {other:?}")),
    }

    pool.close().await;
    Ok(format!("booked {}", confirmation.confirmation_text))
}

fn elapsed_since(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

fn timed_check<T, E>(check: impl FnOnce() -> Result<T, E>) -> Result<(u64, T), (u64, E)> {
    let started = Instant::now();
    match check() {
        Ok(value) => Ok((elapsed_since(started), value)),
        Err(error) => Err((elapsed_since(started), error)),
    }
}

fn skipped(name: &'static str) -> SmokeCheck {
    SmokeCheck {
        name,
        status: SmokeStatus::Skipped,
        elapsed_ms: 0,
        message: "skipped due previous failure".to_string(),
    }
}

fn finalize_report(checks: Vec<SmokeCheck>, total_elapsed_ms: u64) -> CommandResult {
    let passed = checks.iter().filter(|check| check.status == SmokeStatus::Pass).count();
    let total = checks.len();
    let failed = checks.iter().any(|check| check.status == SmokeStatus::Fail);

    let report = SmokeReport {
        command: "smoke",
        status: if failed { SmokeStatus::Fail } else { SmokeStatus::Pass },
        summary: format!("smoke: {passed}/{total} checks passed in {total_elapsed_ms}ms"),
        total_elapsed_ms,
        checks,
    };

    let human = report.summary.clone();
    let machine = serde_json::to_string(&report).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"smoke\",\"status\":\"fail\",\"summary\":\"serialization failed\",\"error\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    });

    CommandResult { exit_code: if failed { 6 } else { 0 }, output: format!("{human}\n{machine}") }
}
