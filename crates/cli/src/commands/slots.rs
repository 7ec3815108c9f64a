use std::sync::Arc;

use crate::commands::{prepare, CommandResult};
use chairside_core::{BookingSettings, FreeSlotsQuery, ReservationFacade, SystemClock};
use chairside_db::{connect_with_config, migrations, SqlReservationStore};

#[derive(Debug, Clone, Default)]
pub struct SlotsArgs {
    pub provider_id: String,
    pub days: Option<u32>,
    pub duration_min: Option<u32>,
    pub tz: Option<String>,
}

/// Prints a provider's free slots, grouped by day, as the command payload.
pub fn run(args: SlotsArgs) -> CommandResult {
    let (config, runtime) = match prepare("slots") {
        Ok(prepared) => prepared,
        Err(failure) => return failure,
    };

    let settings = match BookingSettings::from_config(&config.booking) {
        Ok(settings) => settings,
        Err(error) => {
            return CommandResult::failure("slots", "config_validation", error.to_string(), 2)
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
        let query =
            FreeSlotsQuery { days: args.days, duration_min: args.duration_min, tz: args.tz };
        let slots = facade
            .list_free_slots(&args.provider_id, query)
            .await
            .map_err(|error| (error.code().as_str(), error.to_string(), 6u8));

        pool.close().await;
        slots
    });

    match result {
        Ok(free) => {
            let total: usize = free.days.iter().map(|day| day.slots.len()).sum();
            let message = format!(
                "{total} free {}-minute slot(s) for {} across {} day(s) ({})",
                free.duration_minutes,
                free.provider_id,
                free.days.len(),
                free.zone_label
            );
            match serde_json::to_value(&free) {
                Ok(data) => CommandResult::success_with_data("slots", message, Some(data)),
                Err(error) => {
                    CommandResult::failure("slots", "serialization", error.to_string(), 7)
                }
            }
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("slots", error_class, message, exit_code)
        }
    }
}
