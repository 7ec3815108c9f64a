use std::sync::Arc;

use tracing::{info, warn};

use crate::booking::store::ReservationStore;
use crate::clock::Clock;
use crate::domain::appointment::{Appointment, BookingDetails};
use crate::domain::hold::HoldId;
use crate::errors::{ReservationError, StoreError};

/// Turns an active hold into a scheduled appointment.
pub struct BookingConfirmer {
    store: Arc<dyn ReservationStore>,
    clock: Arc<dyn Clock>,
}

impl BookingConfirmer {
    pub fn new(store: Arc<dyn ReservationStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// The hold is consumed and the appointment inserted together, or neither happens.
    /// A hold whose expiry equals `now` is already expired.
    pub async fn confirm(
        &self,
        hold_id: &HoldId,
        details: BookingDetails,
    ) -> Result<Appointment, ReservationError> {
        let now = self.clock.now();
        match self.store.redeem_hold(hold_id, details, now).await {
            Ok(appointment) => {
                info!(
                    event_name = "booking.appointment.confirmed",
                    hold_id = %hold_id,
                    appointment_id = %appointment.id,
                    provider_id = %appointment.provider_id,
                    start = %appointment.range.start,
                    end = %appointment.range.end,
                    source = %appointment.source,
                    "appointment booked"
                );
                Ok(appointment)
            }
            Err(StoreError::Backend(message)) => {
                warn!(
                    event_name = "booking.appointment.store_failed",
                    hold_id = %hold_id,
                    error = %message,
                    "confirmation could not be stored"
                );
                Err(ReservationError::Store(message))
            }
            Err(error) => {
                let error = ReservationError::from(error);
                info!(
                    event_name = "booking.appointment.rejected",
                    hold_id = %hold_id,
                    code = error.code().as_str(),
                    "confirmation rejected"
                );
                Err(error)
            }
        }
    }
}
