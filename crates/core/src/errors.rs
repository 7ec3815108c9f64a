use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::contact::ContactError;
use crate::domain::hold::{HoldId, HoldStatus};
use crate::domain::provider::ProviderId;

/// Failures reported by the schedule store and hold ledger.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("interval collides with an active hold or scheduled appointment")]
    SlotConflict,
    #[error("interval overlaps a scheduled appointment")]
    AppointmentOverlap,
    #[error("hold `{0}` does not exist")]
    HoldNotFound(HoldId),
    #[error("hold `{0}` has expired")]
    HoldExpired(HoldId),
    #[error("hold `{hold_id}` is already {}", .status.as_str())]
    HoldAlreadyUsed { hold_id: HoldId, status: HoldStatus },
    #[error("storage backend failure: {0}")]
    Backend(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ReservationError {
    #[error("requested interval collides with an active hold or scheduled appointment")]
    SlotConflict,
    #[error("hold `{0}` was not found")]
    HoldNotFound(HoldId),
    #[error("hold `{0}` has expired")]
    HoldExpired(HoldId),
    #[error("hold `{hold_id}` was already {}", .status.as_str())]
    HoldAlreadyUsed { hold_id: HoldId, status: HoldStatus },
    #[error("held interval now overlaps a scheduled appointment")]
    AppointmentOverlap,
    #[error("invalid patient contact: {0}")]
    InvalidContact(#[from] ContactError),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("provider `{0}` was not found")]
    ProviderNotFound(ProviderId),
    #[error("store failure: {0}")]
    Store(String),
}

impl From<StoreError> for ReservationError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::SlotConflict => Self::SlotConflict,
            StoreError::AppointmentOverlap => Self::AppointmentOverlap,
            StoreError::HoldNotFound(id) => Self::HoldNotFound(id),
            StoreError::HoldExpired(id) => Self::HoldExpired(id),
            StoreError::HoldAlreadyUsed { hold_id, status } => {
                Self::HoldAlreadyUsed { hold_id, status }
            }
            StoreError::Backend(message) => Self::Store(message),
        }
    }
}

/// Stable, caller-facing failure vocabulary shared by every booking surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    SlotConflict,
    HoldNotFound,
    HoldExpired,
    HoldAlreadyUsed,
    AppointmentOverlap,
    InvalidContact,
    InvalidRequest,
    ProviderNotFound,
    Internal,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SlotConflict => "slot_conflict",
            Self::HoldNotFound => "hold_not_found",
            Self::HoldExpired => "hold_expired",
            Self::HoldAlreadyUsed => "hold_already_used",
            Self::AppointmentOverlap => "appointment_overlap",
            Self::InvalidContact => "invalid_contact",
            Self::InvalidRequest => "invalid_request",
            Self::ProviderNotFound => "provider_not_found",
            Self::Internal => "internal",
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            Self::SlotConflict => "That time was just taken. Pick another slot.",
            Self::HoldNotFound => "That hold couldn't be found. Please reselect the time.",
            Self::HoldExpired => "That hold expired. Please pick the time again.",
            Self::HoldAlreadyUsed => "That hold was already used. Please pick another time.",
            Self::AppointmentOverlap => "That time just got booked. Please pick another slot.",
            Self::InvalidContact => "Please check your name, email, and phone number.",
            Self::InvalidRequest => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::ProviderNotFound => "That provider is not available for booking.",
            Self::Internal => "Sorry, we couldn't book right now. Please try again shortly.",
        }
    }

    /// Everything except `Internal` is an expected outcome the caller recovers from.
    pub fn is_expected(&self) -> bool {
        !matches!(self, Self::Internal)
    }
}

impl ReservationError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::SlotConflict => ErrorCode::SlotConflict,
            Self::HoldNotFound(_) => ErrorCode::HoldNotFound,
            Self::HoldExpired(_) => ErrorCode::HoldExpired,
            Self::HoldAlreadyUsed { .. } => ErrorCode::HoldAlreadyUsed,
            Self::AppointmentOverlap => ErrorCode::AppointmentOverlap,
            Self::InvalidContact(_) => ErrorCode::InvalidContact,
            Self::InvalidRequest(_) => ErrorCode::InvalidRequest,
            Self::ProviderNotFound(_) => ErrorCode::ProviderNotFound,
            Self::Store(_) => ErrorCode::Internal,
        }
    }

    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let code = self.code();
        // Store details stay in the logs; callers only ever see the generic text.
        let detail = match &self {
            Self::Store(_) => code.user_message().to_string(),
            other => other.to_string(),
        };
        InterfaceError { code, detail, correlation_id: correlation_id.into() }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{}: {detail}", .code.as_str())]
pub struct InterfaceError {
    pub code: ErrorCode,
    pub detail: String,
    pub correlation_id: String,
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        self.code.user_message()
    }
}
