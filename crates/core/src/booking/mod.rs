//! Two-phase slot reservation: availability, holds with a TTL, and confirmation.

pub mod availability;
pub mod confirm;
pub mod facade;
pub mod holds;
pub mod memory;
pub mod present;
pub mod store;

use chrono::Duration;
use chrono_tz::Tz;

use crate::config::{BookingConfig, ConfigError};

/// Runtime form of the `[booking]` config section.
#[derive(Clone, Debug)]
pub struct BookingSettings {
    pub hold_ttl: Duration,
    pub default_timezone: Tz,
    pub horizon_days: u32,
    pub slot_minutes: u32,
    pub max_horizon_days: u32,
}

impl Default for BookingSettings {
    fn default() -> Self {
        Self {
            hold_ttl: Duration::minutes(5),
            default_timezone: chrono_tz::America::New_York,
            horizon_days: 14,
            slot_minutes: 30,
            max_horizon_days: 60,
        }
    }
}

impl BookingSettings {
    pub fn from_config(config: &BookingConfig) -> Result<Self, ConfigError> {
        let ttl_secs = i64::try_from(config.hold_ttl_secs).map_err(|_| {
            ConfigError::Validation("booking.hold_ttl_secs is out of range".to_string())
        })?;

        Ok(Self {
            hold_ttl: Duration::seconds(ttl_secs),
            default_timezone: config.timezone()?,
            horizon_days: config.horizon_days,
            slot_minutes: config.slot_minutes,
            max_horizon_days: config.max_horizon_days,
        })
    }
}
