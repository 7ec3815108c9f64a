pub mod connection;
pub mod fixtures;
pub mod migrations;
pub mod repositories;

pub use connection::{connect_with_config, connect_with_settings, DbPool};
pub use fixtures::{DemoSeedDataset, ProviderSeedInfo, SeedResult, VerificationResult};
pub use repositories::{LedgerSummary, RepositoryError, SqlReservationStore};
