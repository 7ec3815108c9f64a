use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::appointment::{Appointment, AppointmentId, BookingDetails};
use crate::domain::hold::{Hold, HoldId, HoldRejection};
use crate::domain::interval::TimeRange;
use crate::domain::provider::{Provider, ProviderId};
use crate::errors::StoreError;

/// Provider directory plus the appointment schedule.
#[async_trait]
pub trait ScheduleStore: Send + Sync {
    /// Providers ordered by display name; `None` lists everyone.
    async fn list_providers(
        &self,
        service_category: Option<&str>,
    ) -> Result<Vec<Provider>, StoreError>;

    async fn find_provider(&self, provider_id: &ProviderId)
        -> Result<Option<Provider>, StoreError>;

    /// Inserts or replaces a provider with its categories and working hours.
    async fn save_provider(&self, provider: Provider) -> Result<(), StoreError>;

    /// Scheduled appointments of one provider overlapping `window`, ordered by start.
    async fn scheduled_appointments(
        &self,
        provider_id: &ProviderId,
        window: TimeRange,
    ) -> Result<Vec<Appointment>, StoreError>;

    async fn find_appointment(
        &self,
        appointment_id: &AppointmentId,
    ) -> Result<Option<Appointment>, StoreError>;

    /// Direct insert that bypasses holds. Still refuses to overlap a scheduled appointment.
    async fn insert_appointment(&self, appointment: Appointment) -> Result<(), StoreError>;
}

/// Durable record of holds. Readers apply the lazy expiry rule through `now`.
#[async_trait]
pub trait HoldLedger: Send + Sync {
    async fn find_hold(&self, hold_id: &HoldId) -> Result<Option<Hold>, StoreError>;

    /// Holds of one provider overlapping `window` that are still active at `now`.
    async fn active_holds(
        &self,
        provider_id: &ProviderId,
        window: TimeRange,
        now: DateTime<Utc>,
    ) -> Result<Vec<Hold>, StoreError>;

    /// Marks a hold released if it is still active at `now`. Returns `false` when
    /// nothing changed; an elapsed hold is left for the sweep.
    async fn release_hold(&self, hold_id: &HoldId, now: DateTime<Utc>)
        -> Result<bool, StoreError>;

    /// Persists `expired` on every active hold whose expiry has passed. Returns the count.
    async fn expire_elapsed(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;
}

/// Operations that must observe holds and appointments together, atomically.
#[async_trait]
pub trait ReservationStore: ScheduleStore + HoldLedger {
    /// Inserts `hold` unless its interval overlaps an active hold (at `hold.created_at`)
    /// or a scheduled appointment of the same provider.
    async fn claim_hold(&self, hold: Hold) -> Result<(), StoreError>;

    /// Consumes an active hold and inserts the appointment for its interval in one unit.
    async fn redeem_hold(
        &self,
        hold_id: &HoldId,
        details: BookingDetails,
        now: DateTime<Utc>,
    ) -> Result<Appointment, StoreError>;
}

/// Classifies a hold that could not be redeemed at `now`.
///
/// Returns `Ok` only when the hold is present and redeemable.
pub fn check_redeemable(
    hold_id: &HoldId,
    hold: Option<&Hold>,
    now: DateTime<Utc>,
) -> Result<(), StoreError> {
    let hold = hold.ok_or_else(|| StoreError::HoldNotFound(hold_id.clone()))?;
    hold.check_redeemable(now).map_err(|rejection| match rejection {
        HoldRejection::Expired => StoreError::HoldExpired(hold_id.clone()),
        HoldRejection::AlreadyUsed(status) => {
            StoreError::HoldAlreadyUsed { hold_id: hold_id.clone(), status }
        }
    })
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::check_redeemable;
    use crate::domain::hold::{Hold, HoldId, HoldStatus};
    use crate::domain::interval::TimeRange;
    use crate::domain::provider::ProviderId;
    use crate::errors::StoreError;

    #[test]
    fn redeemability_maps_onto_store_errors() {
        let now = Utc.with_ymd_and_hms(2026, 3, 3, 14, 0, 0).single().expect("timestamp");
        let id = HoldId("hold-9".to_string());
        let mut hold = Hold::new(
            id.clone(),
            ProviderId("prov-1".to_string()),
            TimeRange::new(now + Duration::hours(2), now + Duration::hours(3)).expect("range"),
            "phone",
            now,
            Duration::minutes(5),
        );

        assert_eq!(check_redeemable(&id, None, now), Err(StoreError::HoldNotFound(id.clone())));
        assert_eq!(check_redeemable(&id, Some(&hold), now), Ok(()));
        assert_eq!(
            check_redeemable(&id, Some(&hold), now + Duration::minutes(5)),
            Err(StoreError::HoldExpired(id.clone()))
        );

        hold.status = HoldStatus::Released;
        assert_eq!(
            check_redeemable(&id, Some(&hold), now),
            Err(StoreError::HoldAlreadyUsed { hold_id: id, status: HoldStatus::Released })
        );
    }
}
