use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use tracing::debug;

use crate::booking::store::ReservationStore;
use crate::clock::Clock;
use crate::domain::interval::{merge_ranges, subtract_ranges, TimeRange};
use crate::domain::provider::{Provider, ProviderId};
use crate::domain::slot::{DaySlots, Slot};
use crate::errors::ReservationError;

/// Resolves a wall-clock time on `date` to an instant. In a DST fold the start of a
/// window takes the earlier instant and the end takes the later one; a time inside a
/// DST gap has no instant.
fn resolve_local(
    tz: Tz,
    date: NaiveDate,
    time: NaiveTime,
    earliest: bool,
) -> Option<DateTime<Utc>> {
    let local = tz.from_local_datetime(&date.and_time(time));
    let resolved = if earliest { local.earliest() } else { local.latest() };
    resolved.map(|instant| instant.with_timezone(&Utc))
}

/// Working windows as absolute ranges for `days` consecutive dates starting at `first_day`
/// in the provider's zone. Windows that cannot be resolved on a date are skipped.
pub fn working_ranges(
    provider: &Provider,
    tz: Tz,
    first_day: NaiveDate,
    days: u32,
) -> Vec<TimeRange> {
    let mut ranges = Vec::new();
    for date in first_day.iter_days().take(days as usize) {
        for window in provider.windows_for(date.weekday()) {
            let start = resolve_local(tz, date, window.start, true);
            let end = resolve_local(tz, date, window.end, false);
            if let Some(range) = start.zip(end).and_then(|(from, to)| TimeRange::new(from, to)) {
                ranges.push(range);
            }
        }
    }
    ranges.sort();
    ranges
}

/// Walks each window on a grid anchored at the window start, keeping candidates that fit
/// inside the window, start strictly after `now`, and avoid every busy range.
pub fn free_slots(
    provider_id: &ProviderId,
    windows: &[TimeRange],
    busy: &[TimeRange],
    duration: Duration,
    now: DateTime<Utc>,
) -> Vec<Slot> {
    if duration <= Duration::zero() {
        return Vec::new();
    }

    let busy = merge_ranges(busy.to_vec());
    let mut slots = Vec::new();
    for window in windows {
        let free = subtract_ranges(*window, &busy);
        let mut start = window.start;
        while start + duration <= window.end {
            let candidate = TimeRange { start, end: start + duration };
            if candidate.start > now && free.iter().any(|gap| gap.contains(&candidate)) {
                slots.push(Slot { provider_id: provider_id.clone(), range: candidate });
            }
            start += duration;
        }
    }
    slots.sort_by_key(|slot| slot.range);
    slots.dedup_by_key(|slot| slot.range);
    slots
}

/// Groups ordered slots by their wall-clock date in `tz`.
pub fn group_by_day(slots: Vec<Slot>, tz: Tz) -> Vec<DaySlots> {
    let mut days: Vec<DaySlots> = Vec::new();
    for slot in slots {
        let day = slot.range.start.with_timezone(&tz).date_naive();
        match days.last_mut() {
            Some(current) if current.day == day => current.slots.push(slot),
            _ => days.push(DaySlots { day, slots: vec![slot] }),
        }
    }
    days
}

/// Derives free slots from working hours minus appointments and active holds.
pub struct AvailabilityGenerator {
    store: Arc<dyn ReservationStore>,
    clock: Arc<dyn Clock>,
}

impl AvailabilityGenerator {
    pub fn new(store: Arc<dyn ReservationStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn generate(
        &self,
        provider_id: &ProviderId,
        horizon_days: u32,
        slot_minutes: u32,
    ) -> Result<Vec<Slot>, ReservationError> {
        let provider = self
            .store
            .find_provider(provider_id)
            .await?
            .ok_or_else(|| ReservationError::ProviderNotFound(provider_id.clone()))?;
        let tz = provider.tz().ok_or_else(|| {
            ReservationError::Store(format!(
                "provider `{}` has unknown timezone `{}`",
                provider.id, provider.timezone
            ))
        })?;

        let now = self.clock.now();
        let first_day = now.with_timezone(&tz).date_naive();
        let windows = working_ranges(&provider, tz, first_day, horizon_days);
        let (Some(first), Some(last)) = (windows.first(), windows.iter().map(|w| w.end).max())
        else {
            return Ok(Vec::new());
        };
        let Some(horizon) = TimeRange::new(first.start, last) else {
            return Ok(Vec::new());
        };

        let appointments = self.store.scheduled_appointments(provider_id, horizon).await?;
        let holds = self.store.active_holds(provider_id, horizon, now).await?;
        let busy: Vec<TimeRange> = appointments
            .iter()
            .map(|appointment| appointment.range)
            .chain(holds.iter().filter(|hold| hold.is_active_at(now)).map(|hold| hold.range))
            .collect();

        let slots = free_slots(
            provider_id,
            &windows,
            &busy,
            Duration::minutes(i64::from(slot_minutes)),
            now,
        );
        debug!(
            event_name = "booking.availability.generated",
            provider_id = %provider_id,
            horizon_days,
            slot_minutes,
            busy_ranges = busy.len(),
            slots = slots.len(),
            "free slots generated"
        );
        Ok(slots)
    }
}
