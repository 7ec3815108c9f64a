use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::interval::TimeRange;
use crate::domain::provider::ProviderId;

/// A free, fixed-length candidate interval. Computed on demand, never persisted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub provider_id: ProviderId,
    #[serde(flatten)]
    pub range: TimeRange,
}

/// Slots sharing one wall-clock date in the presentation timezone.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaySlots {
    pub day: NaiveDate,
    pub slots: Vec<Slot>,
}
