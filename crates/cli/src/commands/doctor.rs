use chairside_core::config::{AppConfig, LoadOptions};
use chairside_core::BookingSettings;
use chairside_db::connect_with_config;
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> String {
    let report = build_report();

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
    }

    render_human(&report)
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_booking_settings(&config));
            checks.push(check_database(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["booking_settings", "database_schema"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_booking_settings(config: &AppConfig) -> DoctorCheck {
    match BookingSettings::from_config(&config.booking) {
        Ok(settings) => DoctorCheck {
            name: "booking_settings",
            status: CheckStatus::Pass,
            details: format!(
                "hold ttl {}s, default zone {}, {}-minute slots over {} day(s)",
                settings.hold_ttl.num_seconds(),
                settings.default_timezone.name(),
                settings.slot_minutes,
                settings.horizon_days
            ),
        },
        Err(error) => DoctorCheck {
            name: "booking_settings",
            status: CheckStatus::Fail,
            details: error.to_string(),
        },
    }
}

/// Connects and reports whether the booking schema has been migrated and seeded.
fn check_database(config: &AppConfig) -> DoctorCheck {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return DoctorCheck {
                name: "database_schema",
                status: CheckStatus::Fail,
                details: format!("failed to initialize async runtime: {error}"),
            };
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_with_config(&config.database)
            .await
            .map_err(|error| format!("failed to connect to database: {error}"))?;

        let tables: i64 = sqlx::query_scalar(
            "SELECT COUNT(1) FROM sqlite_master
             WHERE type = 'table' AND name IN ('provider', 'hold', 'appointment')",
        )
        .fetch_one(&pool)
        .await
        .map_err(|error| format!("failed to inspect schema: {error}"))?;

        let providers = if tables == 3 {
            sqlx::query_scalar::<_, i64>("SELECT COUNT(1) FROM provider")
                .fetch_one(&pool)
                .await
                .map_err(|error| format!("failed to count providers: {error}"))?
        } else {
            0
        };

        pool.close().await;
        Ok::<(i64, i64), String>((tables, providers))
    });

    match result {
        Ok((3, providers)) => DoctorCheck {
            name: "database_schema",
            status: CheckStatus::Pass,
            details: format!(
                "connected using `{}`; booking schema present with {providers} provider(s)",
                config.database.url
            ),
        },
        Ok(_) => DoctorCheck {
            name: "database_schema",
            status: CheckStatus::Fail,
            details: "booking schema missing; run `chairside migrate`".to_string(),
        },
        Err(error) => {
            DoctorCheck { name: "database_schema", status: CheckStatus::Fail, details: error }
        }
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::{render_human, CheckStatus, DoctorCheck, DoctorReport};

    #[test]
    fn human_report_marks_each_check() {
        let report = DoctorReport {
            overall_status: CheckStatus::Fail,
            summary: "doctor: one or more readiness checks failed".to_string(),
            checks: vec![
                DoctorCheck {
                    name: "config_validation",
                    status: CheckStatus::Pass,
                    details: "ok".to_string(),
                },
                DoctorCheck {
                    name: "database_schema",
                    status: CheckStatus::Skipped,
                    details: "skipped".to_string(),
                },
            ],
        };

        let rendered = render_human(&report);
        assert!(rendered.contains("- [ok] config_validation: ok"));
        assert!(rendered.contains("- [skip] database_schema: skipped"));
    }
}
