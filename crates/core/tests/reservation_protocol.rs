use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc, Weekday};
use proptest::prelude::*;

use chairside_core::{
    Appointment, AppointmentId, AppointmentStatus, BookingSettings, Clock, ConfirmBookingRequest,
    FreeSlotsQuery, HoldLedger, HoldStatus, InMemoryReservationStore, ManualClock, PatientContact,
    PlaceHoldRequest, Provider, ProviderId, ReservationError, ReservationFacade, ScheduleStore,
    TimeRange, WorkingWindow,
};

const PROVIDER: &str = "prov-x";

/// Monday 2026-03-02 08:00 America/New_York.
fn monday_morning() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 13, 0, 0).single().expect("timestamp")
}

/// Wall-clock time on Tuesday 2026-03-03 in New York (UTC-5).
fn tuesday(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 3, hour + 5, minute, 0).single().expect("timestamp")
}

fn provider() -> Provider {
    Provider {
        id: ProviderId(PROVIDER.to_string()),
        display_name: "Dr. Ivanov".to_string(),
        timezone: "America/New_York".to_string(),
        service_categories: vec!["checkup".to_string()],
        working_hours: vec![WorkingWindow {
            weekday: Weekday::Tue,
            start: NaiveTime::from_hms_opt(9, 0, 0).expect("time"),
            end: NaiveTime::from_hms_opt(17, 0, 0).expect("time"),
        }],
    }
}

struct Clinic {
    store: Arc<InMemoryReservationStore>,
    clock: Arc<ManualClock>,
    facade: ReservationFacade,
}

async fn clinic() -> Clinic {
    let store = Arc::new(InMemoryReservationStore::with_providers([provider()]).await);
    let clock = Arc::new(ManualClock::new(monday_morning()));
    let facade = ReservationFacade::new(store.clone(), clock.clone(), BookingSettings::default());
    Clinic { store, clock, facade }
}

fn hold_request(start: DateTime<Utc>, end: DateTime<Utc>, channel: &str) -> PlaceHoldRequest {
    PlaceHoldRequest { provider_id: PROVIDER.to_string(), start, end, channel: channel.to_string() }
}

fn patient(name: &str) -> ConfirmBookingRequest {
    ConfirmBookingRequest {
        patient_name: name.to_string(),
        patient_email: "patient@example.com".to_string(),
        patient_phone: "555-010-2233".to_string(),
        appointment_type: "checkup".to_string(),
        notes: None,
        source: Some("widget".to_string()),
        tz: None,
    }
}

fn overlapping_pairs(ranges: &[TimeRange]) -> usize {
    let mut count = 0;
    for (index, left) in ranges.iter().enumerate() {
        for right in &ranges[index + 1..] {
            if left.overlaps(right) {
                count += 1;
            }
        }
    }
    count
}

#[tokio::test]
async fn empty_day_offers_the_full_working_window() {
    let clinic = clinic().await;
    let query = FreeSlotsQuery { days: Some(2), duration_min: Some(30), tz: None };

    let free = clinic.facade.list_free_slots(PROVIDER, query).await.expect("slots");

    assert_eq!(free.days.len(), 1);
    let slots = &free.days[0].slots;
    assert_eq!(slots.len(), 16);
    assert_eq!(slots[0].range.start, tuesday(9, 0));
    assert_eq!(slots[15].range.end, tuesday(17, 0));
    assert!(slots.windows(2).all(|pair| pair[0].range.end == pair[1].range.start));
}

#[tokio::test]
async fn second_caller_gets_slot_conflict() {
    let clinic = clinic().await;
    clinic
        .facade
        .place_hold(hold_request(tuesday(10, 0), tuesday(10, 30), "widget"))
        .await
        .expect("first hold");

    let second =
        clinic.facade.place_hold(hold_request(tuesday(10, 0), tuesday(10, 30), "dashboard")).await;
    assert_eq!(second.err(), Some(ReservationError::SlotConflict));

    let partial =
        clinic.facade.place_hold(hold_request(tuesday(10, 15), tuesday(10, 45), "form")).await;
    assert_eq!(partial.err(), Some(ReservationError::SlotConflict));
}

#[tokio::test]
async fn confirm_after_ttl_reports_expired() {
    let clinic = clinic().await;
    let hold = clinic
        .facade
        .place_hold(hold_request(tuesday(10, 0), tuesday(10, 30), "widget"))
        .await
        .expect("hold");

    clinic.clock.advance(Duration::seconds(301));
    let result = clinic.facade.confirm_booking(&hold.id.0, patient("Pat")).await;

    assert_eq!(result.err(), Some(ReservationError::HoldExpired(hold.id)));
}

#[tokio::test]
async fn direct_insert_under_hold_yields_overlap() {
    let clinic = clinic().await;
    let hold = clinic
        .facade
        .place_hold(hold_request(tuesday(10, 0), tuesday(10, 30), "widget"))
        .await
        .expect("hold");

    let staff_booking = Appointment {
        id: AppointmentId("staff-1".to_string()),
        provider_id: ProviderId(PROVIDER.to_string()),
        range: TimeRange::new(tuesday(10, 0), tuesday(10, 30)).expect("range"),
        status: AppointmentStatus::Scheduled,
        patient: PatientContact::normalize("Walk In", "walkin@example.com", "5550109999")
            .expect("contact"),
        appointment_type: "emergency".to_string(),
        notes: None,
        source: "dashboard".to_string(),
        origin_hold_id: None,
        created_at: monday_morning(),
    };
    clinic.store.insert_appointment(staff_booking).await.expect("direct insert");

    let result = clinic.facade.confirm_booking(&hold.id.0, patient("Pat")).await;
    assert_eq!(result.err(), Some(ReservationError::AppointmentOverlap));
}

#[tokio::test]
async fn adjacent_holds_both_confirm() {
    let clinic = clinic().await;
    let first = clinic
        .facade
        .place_hold(hold_request(tuesday(10, 0), tuesday(10, 30), "widget"))
        .await
        .expect("first hold");
    let second = clinic
        .facade
        .place_hold(hold_request(tuesday(10, 30), tuesday(11, 0), "widget"))
        .await
        .expect("second hold");

    let a = clinic.facade.confirm_booking(&first.id.0, patient("Pat")).await.expect("first");
    let b = clinic.facade.confirm_booking(&second.id.0, patient("Sam")).await.expect("second");

    assert!(!a.appointment.range.overlaps(&b.appointment.range));
    let booked = clinic.facade.upcoming_appointments(PROVIDER, Some(3)).await.expect("list");
    assert_eq!(booked.len(), 2);
}

#[tokio::test]
async fn release_twice_equals_release_once() {
    let clinic = clinic().await;
    let hold = clinic
        .facade
        .place_hold(hold_request(tuesday(10, 0), tuesday(10, 30), "widget"))
        .await
        .expect("hold");

    clinic.facade.release_hold(&hold.id.0).await.expect("release");
    let after_one = clinic.store.find_hold(&hold.id).await.expect("read");
    clinic.facade.release_hold(&hold.id.0).await.expect("release again");
    let after_two = clinic.store.find_hold(&hold.id).await.expect("read");
    assert_eq!(after_one, after_two);

    clinic.facade.release_hold("never-existed").await.expect("missing hold is a no-op");
}

#[tokio::test]
async fn releasing_after_ttl_still_reports_expired_on_confirm() {
    let clinic = clinic().await;
    let hold = clinic
        .facade
        .place_hold(hold_request(tuesday(10, 0), tuesday(10, 30), "widget"))
        .await
        .expect("hold");

    clinic.clock.advance(Duration::minutes(6));
    clinic.facade.release_hold(&hold.id.0).await.expect("release is a no-op");

    let stored = clinic.store.find_hold(&hold.id).await.expect("read").expect("hold exists");
    assert_eq!(stored.status, HoldStatus::Active);
    let result = clinic.facade.confirm_booking(&hold.id.0, patient("Pat")).await;
    assert_eq!(result.err(), Some(ReservationError::HoldExpired(hold.id)));
}

#[tokio::test]
async fn confirm_twice_reports_already_used() {
    let clinic = clinic().await;
    let hold = clinic
        .facade
        .place_hold(hold_request(tuesday(10, 0), tuesday(10, 30), "widget"))
        .await
        .expect("hold");

    clinic.facade.confirm_booking(&hold.id.0, patient("Pat")).await.expect("book");
    for _ in 0..2 {
        let again = clinic.facade.confirm_booking(&hold.id.0, patient("Pat")).await;
        assert!(matches!(again, Err(ReservationError::HoldAlreadyUsed { .. })));
    }
}

#[tokio::test]
async fn ttl_law_applies_to_availability_without_a_sweep() {
    let clinic = clinic().await;
    clinic
        .facade
        .place_hold(hold_request(tuesday(10, 0), tuesday(10, 30), "widget"))
        .await
        .expect("hold");
    let query = || FreeSlotsQuery { days: Some(2), duration_min: Some(30), tz: None };

    let held = clinic.facade.list_free_slots(PROVIDER, query()).await.expect("slots");
    assert_eq!(held.days[0].slots.len(), 15);

    clinic.clock.advance(Duration::minutes(5));
    let lapsed = clinic.facade.list_free_slots(PROVIDER, query()).await.expect("slots");
    assert_eq!(lapsed.days[0].slots.len(), 16);
}

#[tokio::test]
async fn new_holder_wins_at_the_expiry_instant() {
    let clinic = clinic().await;
    let original = clinic
        .facade
        .place_hold(hold_request(tuesday(10, 0), tuesday(10, 30), "widget"))
        .await
        .expect("hold");

    clinic.clock.set(original.expires_at);
    let successor = clinic
        .facade
        .place_hold(hold_request(tuesday(10, 0), tuesday(10, 30), "dashboard"))
        .await
        .expect("expired hold no longer blocks");

    let late = clinic.facade.confirm_booking(&original.id.0, patient("Pat")).await;
    assert_eq!(late.err(), Some(ReservationError::HoldExpired(original.id)));
    clinic.facade.confirm_booking(&successor.id.0, patient("Sam")).await.expect("successor books");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_holds_on_one_interval_have_a_single_winner() {
    let clinic = Arc::new(clinic().await);
    let mut tasks = Vec::new();
    for caller in 0..16 {
        let clinic = clinic.clone();
        tasks.push(tokio::spawn(async move {
            let minute = if caller % 2 == 0 { 0 } else { 15 };
            clinic
                .facade
                .place_hold(hold_request(
                    tuesday(10, minute),
                    tuesday(10, minute + 30),
                    &format!("caller-{caller}"),
                ))
                .await
        }));
    }

    let mut winners = 0;
    for task in tasks {
        match task.await.expect("task joins") {
            Ok(_) => winners += 1,
            Err(error) => assert_eq!(error, ReservationError::SlotConflict),
        }
    }
    assert_eq!(winners, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_confirms_never_double_book() {
    let clinic = Arc::new(clinic().await);
    let first = clinic
        .facade
        .place_hold(hold_request(tuesday(10, 0), tuesday(10, 30), "widget"))
        .await
        .expect("hold");

    let mut tasks = Vec::new();
    for attempt in 0..8 {
        let clinic = clinic.clone();
        let hold_id = first.id.0.clone();
        tasks.push(tokio::spawn(async move {
            clinic.facade.confirm_booking(&hold_id, patient(&format!("Patient {attempt}"))).await
        }));
    }

    let mut booked = 0;
    for task in tasks {
        if task.await.expect("task joins").is_ok() {
            booked += 1;
        }
    }
    assert_eq!(booked, 1);
}

#[derive(Clone, Debug)]
enum Step {
    Hold { slot: u8, length: u8 },
    Confirm { pick: u8 },
    Release { pick: u8 },
    Wait { seconds: u16 },
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        4 => (0u8..24, 1u8..5).prop_map(|(slot, length)| Step::Hold { slot, length }),
        3 => any::<u8>().prop_map(|pick| Step::Confirm { pick }),
        1 => any::<u8>().prop_map(|pick| Step::Release { pick }),
        2 => (0u16..400).prop_map(|seconds| Step::Wait { seconds }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn no_two_scheduled_appointments_or_active_holds_overlap(
        steps in proptest::collection::vec(step(), 1..40)
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("runtime");

        let (appointment_overlaps, hold_overlaps) = runtime.block_on(async {
            let clinic = clinic().await;
            let mut hold_ids = Vec::new();

            for step in steps {
                match step {
                    Step::Hold { slot, length } => {
                        let start = tuesday(9, 0) + Duration::minutes(15 * i64::from(slot));
                        let end = start + Duration::minutes(15 * i64::from(length));
                        if let Ok(hold) =
                            clinic.facade.place_hold(hold_request(start, end, "prop")).await
                        {
                            hold_ids.push(hold.id);
                        }
                    }
                    Step::Confirm { pick } if !hold_ids.is_empty() => {
                        let hold_id = &hold_ids[usize::from(pick) % hold_ids.len()];
                        let _ = clinic.facade.confirm_booking(&hold_id.0, patient("Prop")).await;
                    }
                    Step::Release { pick } if !hold_ids.is_empty() => {
                        let hold_id = &hold_ids[usize::from(pick) % hold_ids.len()];
                        let _ = clinic.facade.release_hold(&hold_id.0).await;
                    }
                    Step::Wait { seconds } => {
                        clinic.clock.advance(Duration::seconds(i64::from(seconds)));
                    }
                    _ => {}
                }
            }

            let day = TimeRange::new(tuesday(0, 0), tuesday(18, 0)).expect("day");
            let provider_id = ProviderId(PROVIDER.to_string());
            let appointments: Vec<TimeRange> = clinic
                .store
                .scheduled_appointments(&provider_id, day)
                .await
                .expect("appointments")
                .into_iter()
                .map(|appointment| appointment.range)
                .collect();
            let holds: Vec<TimeRange> = clinic
                .store
                .active_holds(&provider_id, day, clinic.clock.now())
                .await
                .expect("holds")
                .into_iter()
                .map(|hold| hold.range)
                .collect();

            (overlapping_pairs(&appointments), overlapping_pairs(&holds))
        });

        prop_assert_eq!(appointment_overlaps, 0);
        prop_assert_eq!(hold_overlaps, 0);
    }
}
