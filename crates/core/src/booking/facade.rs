use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::booking::availability::{group_by_day, AvailabilityGenerator};
use crate::booking::confirm::BookingConfirmer;
use crate::booking::holds::HoldManager;
use crate::booking::present::{format_range, zone_label};
use crate::booking::store::ReservationStore;
use crate::booking::BookingSettings;
use crate::clock::Clock;
use crate::domain::appointment::{Appointment, AppointmentId, BookingDetails};
use crate::domain::contact::PatientContact;
use crate::domain::hold::{Hold, HoldId};
use crate::domain::interval::TimeRange;
use crate::domain::provider::{Provider, ProviderId};
use crate::domain::slot::DaySlots;
use crate::errors::ReservationError;

const MIN_SLOT_MINUTES: u32 = 5;
const MAX_SLOT_MINUTES: u32 = 480;
const DEFAULT_SOURCE: &str = "api";

#[derive(Clone, Debug, Default, Deserialize)]
pub struct FreeSlotsQuery {
    pub days: Option<u32>,
    pub duration_min: Option<u32>,
    pub tz: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FreeSlots {
    pub provider_id: ProviderId,
    pub timezone: String,
    pub zone_label: String,
    pub duration_minutes: u32,
    pub days: Vec<DaySlots>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct PlaceHoldRequest {
    pub provider_id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub channel: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ConfirmBookingRequest {
    pub patient_name: String,
    pub patient_email: String,
    pub patient_phone: String,
    pub appointment_type: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    /// Presentation zone for the confirmation text.
    #[serde(default)]
    pub tz: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BookingConfirmation {
    pub appointment: Appointment,
    pub confirmation_text: String,
}

/// The only entry point for unvalidated caller input. Every transport goes through here.
pub struct ReservationFacade {
    store: Arc<dyn ReservationStore>,
    clock: Arc<dyn Clock>,
    settings: BookingSettings,
    availability: AvailabilityGenerator,
    holds: HoldManager,
    confirmer: BookingConfirmer,
}

impl ReservationFacade {
    pub fn new(
        store: Arc<dyn ReservationStore>,
        clock: Arc<dyn Clock>,
        settings: BookingSettings,
    ) -> Self {
        Self {
            availability: AvailabilityGenerator::new(store.clone(), clock.clone()),
            holds: HoldManager::new(store.clone(), clock.clone(), settings.hold_ttl),
            confirmer: BookingConfirmer::new(store.clone(), clock.clone()),
            store,
            clock,
            settings,
        }
    }

    /// Providers offering `service_category`; a blank category lists everyone.
    pub async fn list_providers(
        &self,
        service_category: Option<&str>,
    ) -> Result<Vec<Provider>, ReservationError> {
        let category = service_category.map(str::trim).filter(|category| !category.is_empty());
        Ok(self.store.list_providers(category).await?)
    }

    pub async fn list_free_slots(
        &self,
        provider_id: &str,
        query: FreeSlotsQuery,
    ) -> Result<FreeSlots, ReservationError> {
        let provider_id = parse_provider_id(provider_id)?;
        let days = query.days.unwrap_or(self.settings.horizon_days);
        if days == 0 || days > self.settings.max_horizon_days {
            return Err(ReservationError::InvalidRequest(format!(
                "days must be in range 1..={}",
                self.settings.max_horizon_days
            )));
        }
        let duration_minutes = query.duration_min.unwrap_or(self.settings.slot_minutes);
        if !(MIN_SLOT_MINUTES..=MAX_SLOT_MINUTES).contains(&duration_minutes) {
            return Err(ReservationError::InvalidRequest(format!(
                "duration_min must be in range {MIN_SLOT_MINUTES}..={MAX_SLOT_MINUTES}"
            )));
        }
        let tz = self.presentation_tz(query.tz.as_deref())?;

        let slots = self.availability.generate(&provider_id, days, duration_minutes).await?;
        Ok(FreeSlots {
            provider_id,
            timezone: tz.name().to_string(),
            zone_label: zone_label(tz),
            duration_minutes,
            days: group_by_day(slots, tz),
        })
    }

    pub async fn place_hold(&self, request: PlaceHoldRequest) -> Result<Hold, ReservationError> {
        let provider_id = parse_provider_id(&request.provider_id)?;
        let range = TimeRange::new(request.start, request.end).ok_or_else(|| {
            ReservationError::InvalidRequest("end must be after start".to_string())
        })?;
        let channel = request.channel.trim();
        if channel.is_empty() {
            return Err(ReservationError::InvalidRequest("channel is required".to_string()));
        }

        self.holds.create_hold(&provider_id, range, channel).await
    }

    pub async fn release_hold(&self, hold_id: &str) -> Result<(), ReservationError> {
        let hold_id = parse_hold_id(hold_id)?;
        self.holds.release(&hold_id).await
    }

    pub async fn confirm_booking(
        &self,
        hold_id: &str,
        request: ConfirmBookingRequest,
    ) -> Result<BookingConfirmation, ReservationError> {
        let hold_id = parse_hold_id(hold_id)?;
        let tz = self.presentation_tz(request.tz.as_deref())?;
        let patient = PatientContact::normalize(
            &request.patient_name,
            &request.patient_email,
            &request.patient_phone,
        )?;
        let appointment_type = request.appointment_type.trim();
        if appointment_type.is_empty() {
            return Err(ReservationError::InvalidRequest(
                "appointment_type is required".to_string(),
            ));
        }

        let details = BookingDetails {
            appointment_id: AppointmentId(Uuid::new_v4().to_string()),
            patient,
            appointment_type: appointment_type.to_string(),
            notes: request
                .notes
                .map(|notes| notes.trim().to_string())
                .filter(|notes| !notes.is_empty()),
            source: request
                .source
                .map(|source| source.trim().to_string())
                .filter(|source| !source.is_empty())
                .unwrap_or_else(|| DEFAULT_SOURCE.to_string()),
        };

        let appointment = self.confirmer.confirm(&hold_id, details).await?;
        let confirmation_text = format_range(&appointment.range, tz);
        Ok(BookingConfirmation { appointment, confirmation_text })
    }

    /// Scheduled appointments from now through `days` ahead, ordered by start.
    pub async fn upcoming_appointments(
        &self,
        provider_id: &str,
        days: Option<u32>,
    ) -> Result<Vec<Appointment>, ReservationError> {
        let provider_id = parse_provider_id(provider_id)?;
        let days =
            days.unwrap_or(self.settings.horizon_days).clamp(1, self.settings.max_horizon_days);
        if self.store.find_provider(&provider_id).await?.is_none() {
            return Err(ReservationError::ProviderNotFound(provider_id));
        }

        let now = self.clock.now();
        let window = TimeRange::new(now, now + Duration::days(i64::from(days)))
            .ok_or_else(|| ReservationError::InvalidRequest("days must be positive".to_string()))?;
        let appointments = self.store.scheduled_appointments(&provider_id, window).await?;
        debug!(
            event_name = "booking.appointments.listed",
            provider_id = %provider_id,
            days,
            count = appointments.len(),
            "upcoming appointments listed"
        );
        Ok(appointments)
    }

    pub async fn expire_sweep(&self) -> Result<u64, ReservationError> {
        self.holds.expire_sweep().await
    }

    fn presentation_tz(&self, requested: Option<&str>) -> Result<Tz, ReservationError> {
        match requested.map(str::trim).filter(|name| !name.is_empty()) {
            Some(name) => name.parse::<Tz>().map_err(|_| {
                ReservationError::InvalidRequest(format!("unknown timezone `{name}`"))
            }),
            None => Ok(self.settings.default_timezone),
        }
    }
}

fn parse_provider_id(raw: &str) -> Result<ProviderId, ReservationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ReservationError::InvalidRequest("provider_id is required".to_string()));
    }
    Ok(ProviderId(trimmed.to_string()))
}

fn parse_hold_id(raw: &str) -> Result<HoldId, ReservationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ReservationError::InvalidRequest("hold_id is required".to_string()));
    }
    Ok(HoldId(trimmed.to_string()))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc, Weekday};

    use super::{ConfirmBookingRequest, FreeSlotsQuery, PlaceHoldRequest, ReservationFacade};
    use crate::booking::memory::InMemoryReservationStore;
    use crate::booking::BookingSettings;
    use crate::clock::ManualClock;
    use crate::domain::contact::ContactError;
    use crate::domain::provider::{Provider, ProviderId, WorkingWindow};
    use crate::errors::ReservationError;

    fn now() -> DateTime<Utc> {
        // Monday 2026-03-02 08:00 in New York.
        Utc.with_ymd_and_hms(2026, 3, 2, 13, 0, 0).single().expect("timestamp")
    }

    fn provider(id: &str, name: &str, categories: &[&str]) -> Provider {
        Provider {
            id: ProviderId(id.to_string()),
            display_name: name.to_string(),
            timezone: "America/New_York".to_string(),
            service_categories: categories.iter().map(|c| c.to_string()).collect(),
            working_hours: vec![WorkingWindow {
                weekday: Weekday::Mon,
                start: NaiveTime::from_hms_opt(9, 0, 0).expect("time"),
                end: NaiveTime::from_hms_opt(11, 0, 0).expect("time"),
            }],
        }
    }

    async fn facade() -> ReservationFacade {
        let store = InMemoryReservationStore::with_providers([
            provider("prov-1", "Dr. Ivanov", &["checkup", "cleaning"]),
            provider("prov-2", "Dr. Adams", &["orthodontics"]),
        ])
        .await;
        ReservationFacade::new(
            Arc::new(store),
            Arc::new(ManualClock::new(now())),
            BookingSettings::default(),
        )
    }

    fn confirm_request() -> ConfirmBookingRequest {
        ConfirmBookingRequest {
            patient_name: "Pat Doe".to_string(),
            patient_email: "pat@example.com".to_string(),
            patient_phone: "(555) 010-2233".to_string(),
            appointment_type: "checkup".to_string(),
            notes: Some("  ".to_string()),
            source: None,
            tz: None,
        }
    }

    #[tokio::test]
    async fn providers_are_filtered_and_ordered_by_name() {
        let facade = facade().await;

        let all = facade.list_providers(Some("  ")).await.expect("list");
        let names: Vec<_> = all.iter().map(|p| p.display_name.as_str()).collect();
        assert_eq!(names, vec!["Dr. Adams", "Dr. Ivanov"]);

        let cleaning = facade.list_providers(Some("Cleaning")).await.expect("list");
        assert_eq!(cleaning.len(), 1);
        assert_eq!(cleaning[0].id, ProviderId("prov-1".to_string()));
    }

    #[tokio::test]
    async fn free_slots_are_grouped_in_requested_zone() {
        let facade = facade().await;
        let query = FreeSlotsQuery { days: Some(1), duration_min: Some(30), tz: None };

        let free = facade.list_free_slots("prov-1", query).await.expect("slots");
        assert_eq!(free.zone_label, "ET");
        assert_eq!(free.days.len(), 1);
        assert_eq!(free.days[0].slots.len(), 4);
    }

    #[tokio::test]
    async fn slot_query_bounds_are_validated() {
        let facade = facade().await;

        let too_far = FreeSlotsQuery { days: Some(61), ..FreeSlotsQuery::default() };
        assert!(matches!(
            facade.list_free_slots("prov-1", too_far).await,
            Err(ReservationError::InvalidRequest(_))
        ));

        let bad_zone =
            FreeSlotsQuery { tz: Some("Mars/Base".to_string()), ..FreeSlotsQuery::default() };
        assert!(matches!(
            facade.list_free_slots("prov-1", bad_zone).await,
            Err(ReservationError::InvalidRequest(_))
        ));

        assert_eq!(
            facade.list_free_slots("nobody", FreeSlotsQuery::default()).await.err(),
            Some(ReservationError::ProviderNotFound(ProviderId("nobody".to_string())))
        );
    }

    #[tokio::test]
    async fn hold_then_confirm_produces_confirmation_text() {
        let facade = facade().await;
        let start = now() + Duration::hours(1);
        let hold = facade
            .place_hold(PlaceHoldRequest {
                provider_id: "prov-1".to_string(),
                start,
                end: start + Duration::minutes(30),
                channel: "widget".to_string(),
            })
            .await
            .expect("hold");

        let booked = facade.confirm_booking(&hold.id.0, confirm_request()).await.expect("book");
        assert_eq!(booked.confirmation_text, "Mon, Mar 2 9:00 AM – 9:30 AM (ET)");
        assert_eq!(booked.appointment.notes, None);
        assert_eq!(booked.appointment.source, "api");

        let upcoming = facade.upcoming_appointments("prov-1", Some(7)).await.expect("list");
        assert_eq!(upcoming.len(), 1);
    }

    #[tokio::test]
    async fn inverted_interval_and_bad_contact_are_rejected_before_the_store() {
        let facade = facade().await;
        let start = now() + Duration::hours(1);

        let inverted = facade
            .place_hold(PlaceHoldRequest {
                provider_id: "prov-1".to_string(),
                start,
                end: start,
                channel: "widget".to_string(),
            })
            .await;
        assert!(matches!(inverted, Err(ReservationError::InvalidRequest(_))));

        let mut request = confirm_request();
        request.patient_phone = "555-0102".to_string();
        assert_eq!(
            facade.confirm_booking("any-hold", request).await,
            Err(ReservationError::InvalidContact(ContactError::InvalidPhone))
        );
    }
}
