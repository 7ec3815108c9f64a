use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::interval::TimeRange;
use crate::domain::provider::ProviderId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HoldId(pub String);

impl std::fmt::Display for HoldId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HoldStatus {
    Active,
    Consumed,
    Expired,
    Released,
}

impl HoldStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Consumed => "consumed",
            Self::Expired => "expired",
            Self::Released => "released",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "active" => Some(Self::Active),
            "consumed" => Some(Self::Consumed),
            "expired" => Some(Self::Expired),
            "released" => Some(Self::Released),
            _ => None,
        }
    }
}

/// Why a hold cannot be redeemed into an appointment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HoldRejection {
    Expired,
    AlreadyUsed(HoldStatus),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hold {
    pub id: HoldId,
    pub provider_id: ProviderId,
    #[serde(flatten)]
    pub range: TimeRange,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub status: HoldStatus,
    pub channel: String,
}

impl Hold {
    /// Hold timestamps keep microsecond precision, the resolution stores persist.
    pub fn new(
        id: HoldId,
        provider_id: ProviderId,
        range: TimeRange,
        channel: impl Into<String>,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        let now = now.trunc_subsecs(6);
        Self {
            id,
            provider_id,
            range,
            created_at: now,
            expires_at: now + ttl,
            status: HoldStatus::Active,
            channel: channel.into(),
        }
    }

    /// A hold stops being active at the instant `expires_at` is reached, sweep or not.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.status == HoldStatus::Active && now < self.expires_at
    }

    /// Status as every reader must see it: active-but-past-expiry reads as expired.
    pub fn effective_status(&self, now: DateTime<Utc>) -> HoldStatus {
        match self.status {
            HoldStatus::Active if now >= self.expires_at => HoldStatus::Expired,
            status => status,
        }
    }

    pub fn check_redeemable(&self, now: DateTime<Utc>) -> Result<(), HoldRejection> {
        match self.effective_status(now) {
            HoldStatus::Active => Ok(()),
            HoldStatus::Expired => Err(HoldRejection::Expired),
            status @ (HoldStatus::Consumed | HoldStatus::Released) => {
                Err(HoldRejection::AlreadyUsed(status))
            }
        }
    }
}
