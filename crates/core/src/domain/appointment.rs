use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::contact::PatientContact;
use crate::domain::hold::HoldId;
use crate::domain::interval::TimeRange;
use crate::domain::provider::ProviderId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AppointmentId(pub String);

impl std::fmt::Display for AppointmentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Canceled,
    Completed,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Canceled => "canceled",
            Self::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "scheduled" => Some(Self::Scheduled),
            "canceled" | "cancelled" => Some(Self::Canceled),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: AppointmentId,
    pub provider_id: ProviderId,
    #[serde(flatten)]
    pub range: TimeRange,
    pub status: AppointmentStatus,
    pub patient: PatientContact,
    pub appointment_type: String,
    pub notes: Option<String>,
    pub source: String,
    /// Audit link to the hold this appointment was redeemed from; `None` for direct inserts.
    pub origin_hold_id: Option<HoldId>,
    pub created_at: DateTime<Utc>,
}

impl Appointment {
    pub fn blocks(&self, range: &TimeRange) -> bool {
        self.status == AppointmentStatus::Scheduled && self.range.overlaps(range)
    }
}

/// Everything a confirmation needs besides the hold itself. Provider and interval are
/// always taken from the redeemed hold.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BookingDetails {
    pub appointment_id: AppointmentId,
    pub patient: PatientContact,
    pub appointment_type: String,
    pub notes: Option<String>,
    pub source: String,
}

impl BookingDetails {
    pub fn into_appointment(
        self,
        provider_id: ProviderId,
        range: TimeRange,
        origin_hold_id: HoldId,
        now: DateTime<Utc>,
    ) -> Appointment {
        Appointment {
            id: self.appointment_id,
            provider_id,
            range,
            status: AppointmentStatus::Scheduled,
            patient: self.patient,
            appointment_type: self.appointment_type,
            notes: self.notes,
            source: self.source,
            origin_hold_id: Some(origin_hold_id),
            created_at: now.trunc_subsecs(6),
        }
    }
}
