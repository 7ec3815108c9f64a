use async_trait::async_trait;
use chrono::{DateTime, NaiveTime, SecondsFormat, Utc};
use sqlx::{sqlite::SqliteRow, Row};

use chairside_core::booking::store::{
    check_redeemable, HoldLedger, ReservationStore, ScheduleStore,
};
use chairside_core::domain::appointment::{
    Appointment, AppointmentId, AppointmentStatus, BookingDetails,
};
use chairside_core::domain::contact::PatientContact;
use chairside_core::domain::hold::{Hold, HoldId, HoldStatus};
use chairside_core::domain::interval::TimeRange;
use chairside_core::domain::provider::{
    weekday_from_index, weekday_index, Provider, ProviderId, WorkingWindow,
};
use chairside_core::errors::StoreError;

use super::RepositoryError;
use crate::DbPool;

const APPOINTMENT_COLUMNS: &str = "id, provider_id, start_at, end_at, status, patient_name,
    patient_email, patient_phone, appointment_type, notes, source, origin_hold_id, created_at";

const HOLD_COLUMNS: &str =
    "id, provider_id, start_at, end_at, created_at, expires_at, status, channel";

/// Point-in-time counts over the roster, the hold ledger and the schedule.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LedgerSummary {
    pub providers: i64,
    pub active_holds: i64,
    /// Holds past `expires_at` whose stored status is still `active`.
    pub awaiting_sweep: i64,
    pub upcoming_appointments: i64,
}

/// SQLite-backed schedule store and hold ledger.
#[derive(Clone)]
pub struct SqlReservationStore {
    pool: DbPool,
}

impl SqlReservationStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn ledger_summary(
        &self,
        now: DateTime<Utc>,
    ) -> Result<LedgerSummary, RepositoryError> {
        let now = encode_timestamp(now);
        let row = sqlx::query(
            "SELECT
                (SELECT COUNT(1) FROM provider) AS providers,
                (SELECT COUNT(1) FROM hold
                  WHERE status = 'active' AND expires_at > ?) AS active_holds,
                (SELECT COUNT(1) FROM hold
                  WHERE status = 'active' AND expires_at <= ?) AS awaiting_sweep,
                (SELECT COUNT(1) FROM appointment
                  WHERE status = 'scheduled' AND end_at > ?) AS upcoming_appointments",
        )
        .bind(&now)
        .bind(&now)
        .bind(&now)
        .fetch_one(&self.pool)
        .await?;

        Ok(LedgerSummary {
            providers: row.try_get("providers")?,
            active_holds: row.try_get("active_holds")?,
            awaiting_sweep: row.try_get("awaiting_sweep")?,
            upcoming_appointments: row.try_get("upcoming_appointments")?,
        })
    }

    async fn hydrate_provider(&self, row: SqliteRow) -> Result<Provider, RepositoryError> {
        let id: String = row.try_get("id")?;

        let service_categories: Vec<String> = sqlx::query_scalar(
            "SELECT service_key FROM provider_service WHERE provider_id = ? ORDER BY service_key",
        )
        .bind(&id)
        .fetch_all(&self.pool)
        .await?;

        let working_hours = sqlx::query(
            "SELECT weekday, start_time, end_time
             FROM provider_working_hours
             WHERE provider_id = ?
             ORDER BY weekday ASC, start_time ASC",
        )
        .bind(&id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(working_window_from_row)
        .collect::<Result<Vec<_>, _>>()?;

        Ok(Provider {
            id: ProviderId(id),
            display_name: row.try_get("display_name")?,
            timezone: row.try_get("timezone")?,
            service_categories,
            working_hours,
        })
    }

    async fn list_providers_inner(
        &self,
        service_category: Option<&str>,
    ) -> Result<Vec<Provider>, RepositoryError> {
        let rows = match service_category {
            Some(category) => {
                sqlx::query(
                    "SELECT id, display_name, timezone
                     FROM provider
                     WHERE EXISTS (
                         SELECT 1 FROM provider_service
                         WHERE provider_id = provider.id AND lower(service_key) = lower(?)
                     )
                     ORDER BY display_name ASC, id ASC",
                )
                .bind(category.trim())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT id, display_name, timezone
                     FROM provider
                     ORDER BY display_name ASC, id ASC",
                )
                .fetch_all(&self.pool)
                .await?
            }
        };

        let mut providers = Vec::with_capacity(rows.len());
        for row in rows {
            providers.push(self.hydrate_provider(row).await?);
        }
        Ok(providers)
    }

    async fn find_provider_inner(
        &self,
        provider_id: &ProviderId,
    ) -> Result<Option<Provider>, RepositoryError> {
        let row = sqlx::query("SELECT id, display_name, timezone FROM provider WHERE id = ?")
            .bind(&provider_id.0)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate_provider(row).await?)),
            None => Ok(None),
        }
    }

    async fn save_provider_inner(&self, provider: Provider) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO provider (id, display_name, timezone) VALUES (?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                display_name = excluded.display_name,
                timezone = excluded.timezone",
        )
        .bind(&provider.id.0)
        .bind(&provider.display_name)
        .bind(&provider.timezone)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM provider_service WHERE provider_id = ?")
            .bind(&provider.id.0)
            .execute(&mut *tx)
            .await?;
        for category in &provider.service_categories {
            sqlx::query(
                "INSERT INTO provider_service (provider_id, service_key) VALUES (?, ?)
                 ON CONFLICT(provider_id, service_key) DO NOTHING",
            )
            .bind(&provider.id.0)
            .bind(category.trim())
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("DELETE FROM provider_working_hours WHERE provider_id = ?")
            .bind(&provider.id.0)
            .execute(&mut *tx)
            .await?;
        for window in provider.working_hours.iter().filter(|window| window.start < window.end) {
            sqlx::query(
                "INSERT INTO provider_working_hours (provider_id, weekday, start_time, end_time)
                 VALUES (?, ?, ?, ?)
                 ON CONFLICT(provider_id, weekday, start_time) DO UPDATE SET
                    end_time = excluded.end_time",
            )
            .bind(&provider.id.0)
            .bind(i64::from(weekday_index(window.weekday)))
            .bind(encode_time(window.start))
            .bind(encode_time(window.end))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn scheduled_appointments_inner(
        &self,
        provider_id: &ProviderId,
        window: TimeRange,
    ) -> Result<Vec<Appointment>, RepositoryError> {
        sqlx::query(&format!(
            "SELECT {APPOINTMENT_COLUMNS}
             FROM appointment
             WHERE provider_id = ?
               AND status = 'scheduled'
               AND start_at < ?
               AND ? < end_at
             ORDER BY start_at ASC"
        ))
        .bind(&provider_id.0)
        .bind(encode_timestamp(window.end))
        .bind(encode_timestamp(window.start))
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(appointment_from_row)
        .collect()
    }

    async fn find_appointment_inner(
        &self,
        appointment_id: &AppointmentId,
    ) -> Result<Option<Appointment>, RepositoryError> {
        let row =
            sqlx::query(&format!("SELECT {APPOINTMENT_COLUMNS} FROM appointment WHERE id = ?"))
                .bind(&appointment_id.0)
                .fetch_optional(&self.pool)
                .await?;

        row.map(appointment_from_row).transpose()
    }

    async fn insert_appointment_inner(
        &self,
        appointment: &Appointment,
    ) -> Result<(), RepositoryError> {
        insert_appointment_query(appointment).execute(&self.pool).await?;
        Ok(())
    }

    async fn find_hold_inner(&self, hold_id: &HoldId) -> Result<Option<Hold>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {HOLD_COLUMNS} FROM hold WHERE id = ?"))
            .bind(&hold_id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.map(hold_from_row).transpose()
    }

    async fn active_holds_inner(
        &self,
        provider_id: &ProviderId,
        window: TimeRange,
        now: DateTime<Utc>,
    ) -> Result<Vec<Hold>, RepositoryError> {
        sqlx::query(&format!(
            "SELECT {HOLD_COLUMNS}
             FROM hold
             WHERE provider_id = ?
               AND status = 'active'
               AND expires_at > ?
               AND start_at < ?
               AND ? < end_at
             ORDER BY start_at ASC"
        ))
        .bind(&provider_id.0)
        .bind(encode_timestamp(now))
        .bind(encode_timestamp(window.end))
        .bind(encode_timestamp(window.start))
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(hold_from_row)
        .collect()
    }

    async fn release_hold_inner(
        &self,
        hold_id: &HoldId,
        now: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE hold SET status = 'released'
             WHERE id = ? AND status = 'active' AND expires_at > ?",
        )
        .bind(&hold_id.0)
        .bind(encode_timestamp(now))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn expire_elapsed_inner(&self, now: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            "UPDATE hold SET status = 'expired' WHERE status = 'active' AND expires_at <= ?",
        )
        .bind(encode_timestamp(now))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn claim_hold_inner(&self, hold: &Hold) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO hold (
                id, provider_id, start_at, end_at, created_at, expires_at, status, channel
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&hold.id.0)
        .bind(&hold.provider_id.0)
        .bind(encode_timestamp(hold.range.start))
        .bind(encode_timestamp(hold.range.end))
        .bind(encode_timestamp(hold.created_at))
        .bind(encode_timestamp(hold.expires_at))
        .bind(hold.status.as_str())
        .bind(&hold.channel)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn redeem_hold_inner(
        &self,
        hold_id: &HoldId,
        details: BookingDetails,
        now: DateTime<Utc>,
    ) -> Result<Result<Appointment, StoreError>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        // Writing first takes the database write lock before anything is read.
        let consumed = sqlx::query(
            "UPDATE hold SET status = 'consumed'
             WHERE id = ? AND status = 'active' AND expires_at > ?",
        )
        .bind(&hold_id.0)
        .bind(encode_timestamp(now))
        .execute(&mut *tx)
        .await?;

        let row = sqlx::query(&format!("SELECT {HOLD_COLUMNS} FROM hold WHERE id = ?"))
            .bind(&hold_id.0)
            .fetch_optional(&mut *tx)
            .await?;
        let hold = row.map(hold_from_row).transpose()?;

        if consumed.rows_affected() == 0 {
            tx.rollback().await?;
            let rejection = match check_redeemable(hold_id, hold.as_ref(), now) {
                Err(rejection) => rejection,
                Ok(()) => StoreError::Backend(format!("hold `{hold_id}` changed during confirm")),
            };
            return Ok(Err(rejection));
        }

        let Some(hold) = hold else {
            tx.rollback().await?;
            return Ok(Err(StoreError::HoldNotFound(hold_id.clone())));
        };

        let appointment =
            details.into_appointment(hold.provider_id, hold.range, hold_id.clone(), now);
        match insert_appointment_query(&appointment).execute(&mut *tx).await {
            Ok(_) => {}
            Err(error) => {
                tx.rollback().await?;
                return Ok(Err(RepositoryError::from(error).into()));
            }
        }

        tx.commit().await?;
        Ok(Ok(appointment))
    }
}

#[async_trait]
impl ScheduleStore for SqlReservationStore {
    async fn list_providers(
        &self,
        service_category: Option<&str>,
    ) -> Result<Vec<Provider>, StoreError> {
        Ok(self.list_providers_inner(service_category).await?)
    }

    async fn find_provider(
        &self,
        provider_id: &ProviderId,
    ) -> Result<Option<Provider>, StoreError> {
        Ok(self.find_provider_inner(provider_id).await?)
    }

    async fn save_provider(&self, provider: Provider) -> Result<(), StoreError> {
        Ok(self.save_provider_inner(provider).await?)
    }

    async fn scheduled_appointments(
        &self,
        provider_id: &ProviderId,
        window: TimeRange,
    ) -> Result<Vec<Appointment>, StoreError> {
        Ok(self.scheduled_appointments_inner(provider_id, window).await?)
    }

    async fn find_appointment(
        &self,
        appointment_id: &AppointmentId,
    ) -> Result<Option<Appointment>, StoreError> {
        Ok(self.find_appointment_inner(appointment_id).await?)
    }

    async fn insert_appointment(&self, appointment: Appointment) -> Result<(), StoreError> {
        Ok(self.insert_appointment_inner(&appointment).await?)
    }
}

#[async_trait]
impl HoldLedger for SqlReservationStore {
    async fn find_hold(&self, hold_id: &HoldId) -> Result<Option<Hold>, StoreError> {
        Ok(self.find_hold_inner(hold_id).await?)
    }

    async fn active_holds(
        &self,
        provider_id: &ProviderId,
        window: TimeRange,
        now: DateTime<Utc>,
    ) -> Result<Vec<Hold>, StoreError> {
        Ok(self.active_holds_inner(provider_id, window, now).await?)
    }

    async fn release_hold(
        &self,
        hold_id: &HoldId,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        Ok(self.release_hold_inner(hold_id, now).await?)
    }

    async fn expire_elapsed(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        Ok(self.expire_elapsed_inner(now).await?)
    }
}

#[async_trait]
impl ReservationStore for SqlReservationStore {
    async fn claim_hold(&self, hold: Hold) -> Result<(), StoreError> {
        Ok(self.claim_hold_inner(&hold).await?)
    }

    async fn redeem_hold(
        &self,
        hold_id: &HoldId,
        details: BookingDetails,
        now: DateTime<Utc>,
    ) -> Result<Appointment, StoreError> {
        self.redeem_hold_inner(hold_id, details, now).await?
    }
}

fn insert_appointment_query(
    appointment: &Appointment,
) -> sqlx::query::Query<'_, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'_>> {
    sqlx::query(
        "INSERT INTO appointment (
            id,
            provider_id,
            start_at,
            end_at,
            status,
            patient_name,
            patient_email,
            patient_phone,
            appointment_type,
            notes,
            source,
            origin_hold_id,
            created_at
         ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&appointment.id.0)
    .bind(&appointment.provider_id.0)
    .bind(encode_timestamp(appointment.range.start))
    .bind(encode_timestamp(appointment.range.end))
    .bind(appointment.status.as_str())
    .bind(&appointment.patient.name)
    .bind(&appointment.patient.email)
    .bind(&appointment.patient.phone)
    .bind(&appointment.appointment_type)
    .bind(appointment.notes.as_deref())
    .bind(&appointment.source)
    .bind(appointment.origin_hold_id.as_ref().map(|hold_id| hold_id.0.as_str()))
    .bind(encode_timestamp(appointment.created_at))
}

fn appointment_from_row(row: SqliteRow) -> Result<Appointment, RepositoryError> {
    let status: String = row.try_get("status")?;
    let status = AppointmentStatus::parse(&status).ok_or_else(|| {
        RepositoryError::Decode(format!("invalid appointment status `{status}`"))
    })?;

    Ok(Appointment {
        id: AppointmentId(row.try_get("id")?),
        provider_id: ProviderId(row.try_get("provider_id")?),
        range: parse_range(row.try_get("start_at")?, row.try_get("end_at")?)?,
        status,
        patient: PatientContact {
            name: row.try_get("patient_name")?,
            email: row.try_get("patient_email")?,
            phone: row.try_get("patient_phone")?,
        },
        appointment_type: row.try_get("appointment_type")?,
        notes: row.try_get("notes")?,
        source: row.try_get("source")?,
        origin_hold_id: row.try_get::<Option<String>, _>("origin_hold_id")?.map(HoldId),
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
    })
}

fn hold_from_row(row: SqliteRow) -> Result<Hold, RepositoryError> {
    let status: String = row.try_get("status")?;
    let status = HoldStatus::parse(&status)
        .ok_or_else(|| RepositoryError::Decode(format!("invalid hold status `{status}`")))?;

    Ok(Hold {
        id: HoldId(row.try_get("id")?),
        provider_id: ProviderId(row.try_get("provider_id")?),
        range: parse_range(row.try_get("start_at")?, row.try_get("end_at")?)?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
        expires_at: parse_timestamp("expires_at", row.try_get("expires_at")?)?,
        status,
        channel: row.try_get("channel")?,
    })
}

fn working_window_from_row(row: SqliteRow) -> Result<WorkingWindow, RepositoryError> {
    let index: i64 = row.try_get("weekday")?;
    let weekday = weekday_from_index(index)
        .ok_or_else(|| RepositoryError::Decode(format!("invalid weekday index `{index}`")))?;

    Ok(WorkingWindow {
        weekday,
        start: parse_time("start_time", row.try_get("start_time")?)?,
        end: parse_time("end_time", row.try_get("end_time")?)?,
    })
}

/// Fixed-width UTC text, so SQL string comparison orders instants correctly.
pub(crate) fn encode_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn encode_time(value: NaiveTime) -> String {
    value.format("%H:%M:%S").to_string()
}

fn parse_timestamp(column: &str, value: String) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(&value).map(|timestamp| timestamp.with_timezone(&Utc)).map_err(
        |error| {
            RepositoryError::Decode(format!("invalid timestamp in `{column}`: `{value}` ({error})"))
        },
    )
}

fn parse_time(column: &str, value: String) -> Result<NaiveTime, RepositoryError> {
    NaiveTime::parse_from_str(&value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(&value, "%H:%M"))
        .map_err(|error| {
            RepositoryError::Decode(format!("invalid time in `{column}`: `{value}` ({error})"))
        })
}

fn parse_range(start: String, end: String) -> Result<TimeRange, RepositoryError> {
    let start = parse_timestamp("start_at", start)?;
    let end = parse_timestamp("end_at", end)?;
    TimeRange::new(start, end).ok_or_else(|| {
        RepositoryError::Decode(format!("stored range is empty or inverted: {start} .. {end}"))
    })
}
