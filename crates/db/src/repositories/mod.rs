use chairside_core::errors::StoreError;
use thiserror::Error;

pub mod reservation;

pub use reservation::{LedgerSummary, SqlReservationStore};

/// Trigger messages raised by the exclusion constraints in the schema.
const HOLD_CONFLICT: &str = "hold_conflict";
const APPOINTMENTS_NO_OVERLAP: &str = "appointments_no_overlap";

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl RepositoryError {
    fn constraint(&self) -> Option<&str> {
        match self {
            Self::Database(sqlx::Error::Database(error)) => {
                let message = error.message();
                [HOLD_CONFLICT, APPOINTMENTS_NO_OVERLAP]
                    .into_iter()
                    .find(|name| message.contains(name))
            }
            _ => None,
        }
    }
}

impl From<RepositoryError> for StoreError {
    fn from(error: RepositoryError) -> Self {
        match error.constraint() {
            Some(HOLD_CONFLICT) => StoreError::SlotConflict,
            Some(APPOINTMENTS_NO_OVERLAP) => StoreError::AppointmentOverlap,
            _ => StoreError::Backend(error.to_string()),
        }
    }
}
