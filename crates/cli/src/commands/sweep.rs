use std::sync::Arc;

use crate::commands::{prepare, CommandResult};
use chairside_core::{BookingSettings, ReservationFacade, SystemClock};
use chairside_db::{connect_with_config, migrations, SqlReservationStore};

/// One expiry pass over the hold ledger, for deployments that run the sweep from cron.
pub fn run() -> CommandResult {
    let (config, runtime) = match prepare("sweep") {
        Ok(prepared) => prepared,
        Err(failure) => return failure,
    };

    let settings = match BookingSettings::from_config(&config.booking) {
        Ok(settings) => settings,
        Err(error) => {
            return CommandResult::failure("sweep", "config_validation", error.to_string(), 2)
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_with_config(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;

        let store = Arc::new(SqlReservationStore::new(pool.clone()));
        let facade = ReservationFacade::new(store, Arc::new(SystemClock), settings);
        let expired = facade
            .expire_sweep()
            .await
            .map_err(|error| ("sweep_execution", error.to_string(), 6u8));

        pool.close().await;
        expired
    });

    match result {
        Ok(expired) => CommandResult::success_with_data(
            "sweep",
            format!("marked {expired} elapsed hold(s) expired"),
            Some(serde_json::json!({ "expired": expired })),
        ),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("sweep", error_class, message, exit_code)
        }
    }
}
