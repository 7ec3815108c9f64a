use std::sync::Arc;

use chrono::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use crate::booking::store::ReservationStore;
use crate::clock::Clock;
use crate::domain::hold::{Hold, HoldId};
use crate::domain::interval::TimeRange;
use crate::domain::provider::ProviderId;
use crate::errors::{ReservationError, StoreError};

/// Places, releases, and expires holds.
pub struct HoldManager {
    store: Arc<dyn ReservationStore>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl HoldManager {
    pub fn new(store: Arc<dyn ReservationStore>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self { store, clock, ttl }
    }

    pub async fn create_hold(
        &self,
        provider_id: &ProviderId,
        range: TimeRange,
        channel: &str,
    ) -> Result<Hold, ReservationError> {
        if self.store.find_provider(provider_id).await?.is_none() {
            return Err(ReservationError::ProviderNotFound(provider_id.clone()));
        }

        let now = self.clock.now();
        if range.start <= now {
            return Err(ReservationError::InvalidRequest(
                "cannot hold an interval that has already started".to_string(),
            ));
        }

        let hold = Hold::new(
            HoldId(Uuid::new_v4().to_string()),
            provider_id.clone(),
            range,
            channel,
            now,
            self.ttl,
        );

        match self.store.claim_hold(hold.clone()).await {
            Ok(()) => {
                info!(
                    event_name = "booking.hold.created",
                    hold_id = %hold.id,
                    provider_id = %provider_id,
                    start = %range.start,
                    end = %range.end,
                    expires_at = %hold.expires_at,
                    channel,
                    "hold placed"
                );
                Ok(hold)
            }
            Err(StoreError::SlotConflict) => {
                info!(
                    event_name = "booking.hold.conflict",
                    provider_id = %provider_id,
                    start = %range.start,
                    end = %range.end,
                    channel,
                    "hold rejected, interval is taken"
                );
                Err(ReservationError::SlotConflict)
            }
            Err(error) => {
                warn!(
                    event_name = "booking.hold.store_failed",
                    provider_id = %provider_id,
                    error = %error,
                    "hold could not be stored"
                );
                Err(error.into())
            }
        }
    }

    /// Releasing a hold that is unknown or no longer active is a no-op.
    pub async fn release(&self, hold_id: &HoldId) -> Result<(), ReservationError> {
        let released = self.store.release_hold(hold_id, self.clock.now()).await?;
        info!(event_name = "booking.hold.released", hold_id = %hold_id, released, "hold release");
        Ok(())
    }

    /// Persists `expired` on elapsed holds. Lazy expiry already makes them inactive,
    /// so this only tidies storage.
    pub async fn expire_sweep(&self) -> Result<u64, ReservationError> {
        let now = self.clock.now();
        let expired = self.store.expire_elapsed(now).await?;
        if expired > 0 {
            info!(event_name = "booking.hold.swept", expired, "elapsed holds expired");
        }
        Ok(expired)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{DateTime, Duration, TimeZone, Utc};

    use super::HoldManager;
    use crate::booking::memory::InMemoryReservationStore;
    use crate::booking::store::HoldLedger;
    use crate::clock::ManualClock;
    use crate::domain::hold::HoldStatus;
    use crate::domain::interval::TimeRange;
    use crate::domain::provider::{Provider, ProviderId};
    use crate::errors::ReservationError;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 3, 14, 0, 0).single().expect("timestamp")
    }

    fn provider() -> Provider {
        Provider {
            id: ProviderId("prov-1".to_string()),
            display_name: "Dr. Ivanov".to_string(),
            timezone: "America/New_York".to_string(),
            service_categories: vec!["checkup".to_string()],
            working_hours: Vec::new(),
        }
    }

    async fn manager() -> (HoldManager, Arc<InMemoryReservationStore>, Arc<ManualClock>) {
        let store = Arc::new(InMemoryReservationStore::with_providers([provider()]).await);
        let clock = Arc::new(ManualClock::new(start()));
        let manager = HoldManager::new(store.clone(), clock.clone(), Duration::minutes(5));
        (manager, store, clock)
    }

    fn slot() -> TimeRange {
        TimeRange::new(start() + Duration::hours(1), start() + Duration::minutes(90))
            .expect("range")
    }

    #[tokio::test]
    async fn unknown_provider_is_rejected() {
        let (manager, _, _) = manager().await;
        let result = manager.create_hold(&ProviderId("ghost".to_string()), slot(), "widget").await;
        assert_eq!(
            result,
            Err(ReservationError::ProviderNotFound(ProviderId("ghost".to_string())))
        );
    }

    #[tokio::test]
    async fn started_interval_cannot_be_held() {
        let (manager, _, clock) = manager().await;
        clock.set(slot().start);
        let result = manager.create_hold(&provider().id, slot(), "widget").await;
        assert!(matches!(result, Err(ReservationError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn release_is_idempotent_and_frees_the_interval() {
        let (manager, store, _) = manager().await;
        let hold = manager.create_hold(&provider().id, slot(), "widget").await.expect("hold");

        manager.release(&hold.id).await.expect("release");
        manager.release(&hold.id).await.expect("second release");

        let stored = store.find_hold(&hold.id).await.expect("read").expect("hold exists");
        assert_eq!(stored.status, HoldStatus::Released);
        manager.create_hold(&provider().id, slot(), "phone").await.expect("interval is free again");
    }

    #[tokio::test]
    async fn sweep_marks_elapsed_holds() {
        let (manager, store, clock) = manager().await;
        let hold = manager.create_hold(&provider().id, slot(), "widget").await.expect("hold");

        assert_eq!(manager.expire_sweep().await, Ok(0));
        clock.advance(Duration::minutes(5));
        assert_eq!(manager.expire_sweep().await, Ok(1));
        assert_eq!(manager.expire_sweep().await, Ok(0));

        let stored = store.find_hold(&hold.id).await.expect("read").expect("hold exists");
        assert_eq!(stored.status, HoldStatus::Expired);
    }
}
