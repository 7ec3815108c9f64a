use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::booking::store::{check_redeemable, HoldLedger, ReservationStore, ScheduleStore};
use crate::domain::appointment::{Appointment, AppointmentId, AppointmentStatus, BookingDetails};
use crate::domain::hold::{Hold, HoldId, HoldStatus};
use crate::domain::interval::TimeRange;
use crate::domain::provider::{Provider, ProviderId};
use crate::errors::StoreError;

#[derive(Default)]
struct State {
    providers: BTreeMap<ProviderId, Provider>,
    appointments: Vec<Appointment>,
    holds: HashMap<HoldId, Hold>,
}

impl State {
    fn appointment_blocks(&self, provider_id: &ProviderId, range: &TimeRange) -> bool {
        self.appointments
            .iter()
            .any(|appointment| &appointment.provider_id == provider_id && appointment.blocks(range))
    }

    fn hold_blocks(&self, provider_id: &ProviderId, range: &TimeRange, now: DateTime<Utc>) -> bool {
        self.holds.values().any(|hold| {
            &hold.provider_id == provider_id && hold.is_active_at(now) && hold.range.overlaps(range)
        })
    }
}

/// Process-local store. Every operation runs under one write lock, so check-and-insert
/// is atomic across concurrent tasks.
#[derive(Default)]
pub struct InMemoryReservationStore {
    state: RwLock<State>,
}

impl InMemoryReservationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn with_providers(providers: impl IntoIterator<Item = Provider>) -> Self {
        let store = Self::new();
        {
            let mut state = store.state.write().await;
            for provider in providers {
                state.providers.insert(provider.id.clone(), provider);
            }
        }
        store
    }
}

#[async_trait]
impl ScheduleStore for InMemoryReservationStore {
    async fn list_providers(
        &self,
        service_category: Option<&str>,
    ) -> Result<Vec<Provider>, StoreError> {
        let state = self.state.read().await;
        let mut providers: Vec<Provider> = state
            .providers
            .values()
            .filter(|provider| service_category.map_or(true, |category| provider.offers(category)))
            .cloned()
            .collect();
        providers.sort_by(|a, b| a.display_name.cmp(&b.display_name).then(a.id.cmp(&b.id)));
        Ok(providers)
    }

    async fn find_provider(
        &self,
        provider_id: &ProviderId,
    ) -> Result<Option<Provider>, StoreError> {
        Ok(self.state.read().await.providers.get(provider_id).cloned())
    }

    async fn save_provider(&self, provider: Provider) -> Result<(), StoreError> {
        self.state.write().await.providers.insert(provider.id.clone(), provider);
        Ok(())
    }

    async fn scheduled_appointments(
        &self,
        provider_id: &ProviderId,
        window: TimeRange,
    ) -> Result<Vec<Appointment>, StoreError> {
        let state = self.state.read().await;
        let mut appointments: Vec<Appointment> = state
            .appointments
            .iter()
            .filter(|appointment| {
                &appointment.provider_id == provider_id && appointment.blocks(&window)
            })
            .cloned()
            .collect();
        appointments.sort_by_key(|appointment| appointment.range);
        Ok(appointments)
    }

    async fn find_appointment(
        &self,
        appointment_id: &AppointmentId,
    ) -> Result<Option<Appointment>, StoreError> {
        let state = self.state.read().await;
        Ok(state.appointments.iter().find(|appointment| &appointment.id == appointment_id).cloned())
    }

    async fn insert_appointment(&self, appointment: Appointment) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if appointment.status == AppointmentStatus::Scheduled
            && state.appointment_blocks(&appointment.provider_id, &appointment.range)
        {
            return Err(StoreError::AppointmentOverlap);
        }
        state.appointments.push(appointment);
        Ok(())
    }
}

#[async_trait]
impl HoldLedger for InMemoryReservationStore {
    async fn find_hold(&self, hold_id: &HoldId) -> Result<Option<Hold>, StoreError> {
        Ok(self.state.read().await.holds.get(hold_id).cloned())
    }

    async fn active_holds(
        &self,
        provider_id: &ProviderId,
        window: TimeRange,
        now: DateTime<Utc>,
    ) -> Result<Vec<Hold>, StoreError> {
        let state = self.state.read().await;
        let mut holds: Vec<Hold> = state
            .holds
            .values()
            .filter(|hold| {
                &hold.provider_id == provider_id
                    && hold.is_active_at(now)
                    && hold.range.overlaps(&window)
            })
            .cloned()
            .collect();
        holds.sort_by_key(|hold| hold.range);
        Ok(holds)
    }

    async fn release_hold(
        &self,
        hold_id: &HoldId,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        match state.holds.get_mut(hold_id) {
            Some(hold) if hold.is_active_at(now) => {
                hold.status = HoldStatus::Released;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn expire_elapsed(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut state = self.state.write().await;
        let mut expired = 0;
        for hold in state.holds.values_mut() {
            if hold.status == HoldStatus::Active && now >= hold.expires_at {
                hold.status = HoldStatus::Expired;
                expired += 1;
            }
        }
        Ok(expired)
    }
}

#[async_trait]
impl ReservationStore for InMemoryReservationStore {
    async fn claim_hold(&self, hold: Hold) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if state.hold_blocks(&hold.provider_id, &hold.range, hold.created_at)
            || state.appointment_blocks(&hold.provider_id, &hold.range)
        {
            return Err(StoreError::SlotConflict);
        }
        state.holds.insert(hold.id.clone(), hold);
        Ok(())
    }

    async fn redeem_hold(
        &self,
        hold_id: &HoldId,
        details: BookingDetails,
        now: DateTime<Utc>,
    ) -> Result<Appointment, StoreError> {
        let mut state = self.state.write().await;
        check_redeemable(hold_id, state.holds.get(hold_id), now)?;

        let (provider_id, range) = match state.holds.get(hold_id) {
            Some(hold) => (hold.provider_id.clone(), hold.range),
            None => return Err(StoreError::HoldNotFound(hold_id.clone())),
        };
        if state.appointment_blocks(&provider_id, &range) {
            return Err(StoreError::AppointmentOverlap);
        }

        let appointment = details.into_appointment(provider_id, range, hold_id.clone(), now);
        if let Some(hold) = state.holds.get_mut(hold_id) {
            hold.status = HoldStatus::Consumed;
        }
        state.appointments.push(appointment.clone());
        Ok(appointment)
    }
}
