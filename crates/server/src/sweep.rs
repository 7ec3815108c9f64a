use std::sync::Arc;
use std::time::Duration;

use chairside_core::ReservationFacade;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

/// Starts the periodic expiry sweep. An interval of zero leaves expiry fully lazy.
pub fn spawn(facade: Arc<ReservationFacade>, interval_secs: u64) -> Option<JoinHandle<()>> {
    if interval_secs == 0 {
        info!(
            event_name = "system.sweep.disabled",
            correlation_id = "bootstrap",
            "hold expiry sweep disabled"
        );
        return None;
    }

    info!(
        event_name = "system.sweep.start",
        correlation_id = "bootstrap",
        interval_secs,
        "hold expiry sweep started"
    );

    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            run_once(&facade).await;
        }
    }))
}

/// One sweep pass. Failures are logged and retried on the next tick.
pub async fn run_once(facade: &ReservationFacade) -> u64 {
    match facade.expire_sweep().await {
        Ok(expired) => expired,
        Err(error) => {
            error!(
                event_name = "system.sweep.failed",
                correlation_id = "sweep",
                error = %error,
                "hold expiry sweep failed"
            );
            0
        }
    }
}
