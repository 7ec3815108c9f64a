use std::sync::Arc;

use chairside_core::config::{AppConfig, ConfigError, LoadOptions};
use chairside_core::{BookingSettings, Clock, ReservationFacade, SystemClock};
use chairside_db::{connect_with_config, migrations, DbPool, SqlReservationStore};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub store: Arc<SqlReservationStore>,
    pub clock: Arc<dyn Clock>,
    pub facade: Arc<ReservationFacade>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );
    let settings = BookingSettings::from_config(&config.booking)?;

    let db_pool =
        connect_with_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let store = Arc::new(SqlReservationStore::new(db_pool.clone()));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let facade = Arc::new(ReservationFacade::new(store.clone(), clock.clone(), settings));
    info!(
        event_name = "system.bootstrap.ready",
        correlation_id = "bootstrap",
        hold_ttl_secs = config.booking.hold_ttl_secs,
        default_timezone = %config.booking.default_timezone,
        "reservation services ready"
    );

    Ok(Application { config, db_pool, store, clock, facade })
}
