pub mod booking;
pub mod clock;
pub mod config;
pub mod domain;
pub mod errors;

pub use booking::facade::{
    BookingConfirmation, ConfirmBookingRequest, FreeSlots, FreeSlotsQuery, PlaceHoldRequest,
    ReservationFacade,
};
pub use booking::memory::InMemoryReservationStore;
pub use booking::store::{HoldLedger, ReservationStore, ScheduleStore};
pub use booking::BookingSettings;
pub use clock::{Clock, ManualClock, SystemClock};
pub use domain::appointment::{Appointment, AppointmentId, AppointmentStatus, BookingDetails};
pub use domain::contact::{ContactError, PatientContact};
pub use domain::hold::{Hold, HoldId, HoldStatus};
pub use domain::interval::TimeRange;
pub use domain::provider::{Provider, ProviderId, WorkingWindow};
pub use domain::slot::{DaySlots, Slot};
pub use errors::{ErrorCode, InterfaceError, ReservationError, StoreError};
