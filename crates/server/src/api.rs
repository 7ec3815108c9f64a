//! JSON booking API.
//!
//! - `GET    /api/v1/providers?service=`                          list providers
//! - `GET    /api/v1/providers/{provider_id}/slots`               free slots by day
//! - `GET    /api/v1/providers/{provider_id}/appointments?days=`  upcoming appointments
//! - `POST   /api/v1/holds`                                       place a hold
//! - `DELETE /api/v1/holds/{hold_id}`                             release a hold
//! - `POST   /api/v1/holds/{hold_id}/confirm`                     confirm a booking

use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use chairside_core::{
    Appointment, BookingConfirmation, ConfirmBookingRequest, ErrorCode, FreeSlots,
    FreeSlotsQuery, InterfaceError, PlaceHoldRequest, Provider, ReservationError,
    ReservationFacade,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};
use uuid::Uuid;

const CORRELATION_HEADER: &str = "x-correlation-id";

#[derive(Clone)]
pub struct ApiState {
    facade: Arc<ReservationFacade>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProvidersQuery {
    pub service: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AppointmentsQuery {
    pub days: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct ProvidersResponse {
    pub providers: Vec<Provider>,
}

#[derive(Debug, Serialize)]
pub struct AppointmentsResponse {
    pub appointments: Vec<Appointment>,
}

#[derive(Debug, Serialize)]
pub struct HoldPlaced {
    pub hold_id: String,
    pub provider_id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: &'static str,
    pub correlation_id: String,
}

/// A failed request, already mapped onto the caller-facing vocabulary.
#[derive(Debug)]
pub struct ApiError(InterfaceError);

impl ApiError {
    fn new(error: ReservationError, correlation_id: &str) -> Self {
        let interface = error.clone().into_interface(correlation_id);
        if interface.code.is_expected() {
            debug!(
                event_name = "http.request.rejected",
                correlation_id = %correlation_id,
                error_code = interface.code.as_str(),
                error = %error,
                "request rejected"
            );
        } else {
            error!(
                event_name = "http.request.failed",
                correlation_id = %correlation_id,
                error = %error,
                "request failed with an internal error"
            );
        }
        Self(interface)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.0.code.as_str(),
            message: self.0.user_message(),
            correlation_id: self.0.correlation_id,
        };
        (status_for(self.0.code), Json(body)).into_response()
    }
}

pub fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::SlotConflict | ErrorCode::AppointmentOverlap => StatusCode::CONFLICT,
        ErrorCode::HoldNotFound | ErrorCode::ProviderNotFound => StatusCode::NOT_FOUND,
        ErrorCode::HoldExpired | ErrorCode::HoldAlreadyUsed => StatusCode::GONE,
        ErrorCode::InvalidContact => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorCode::InvalidRequest => StatusCode::BAD_REQUEST,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn router(facade: Arc<ReservationFacade>) -> Router {
    Router::new()
        .route("/api/v1/providers", get(list_providers))
        .route("/api/v1/providers/{provider_id}/slots", get(list_free_slots))
        .route("/api/v1/providers/{provider_id}/appointments", get(list_appointments))
        .route("/api/v1/holds", post(place_hold))
        .route("/api/v1/holds/{hold_id}", delete(release_hold))
        .route("/api/v1/holds/{hold_id}/confirm", post(confirm_booking))
        .with_state(ApiState { facade })
}

fn correlation_id(headers: &HeaderMap) -> String {
    headers
        .get(CORRELATION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

fn bad_json(rejection: JsonRejection, correlation_id: &str) -> ApiError {
    ApiError::new(ReservationError::InvalidRequest(rejection.body_text()), correlation_id)
}

fn bad_query(rejection: QueryRejection, correlation_id: &str) -> ApiError {
    ApiError::new(ReservationError::InvalidRequest(rejection.body_text()), correlation_id)
}

async fn list_providers(
    State(state): State<ApiState>,
    headers: HeaderMap,
    query: Result<Query<ProvidersQuery>, QueryRejection>,
) -> Result<Json<ProvidersResponse>, ApiError> {
    let correlation_id = correlation_id(&headers);
    let Query(query) = query.map_err(|rejection| bad_query(rejection, &correlation_id))?;

    let providers = state
        .facade
        .list_providers(query.service.as_deref())
        .await
        .map_err(|error| ApiError::new(error, &correlation_id))?;
    Ok(Json(ProvidersResponse { providers }))
}

async fn list_free_slots(
    State(state): State<ApiState>,
    Path(provider_id): Path<String>,
    headers: HeaderMap,
    query: Result<Query<FreeSlotsQuery>, QueryRejection>,
) -> Result<Json<FreeSlots>, ApiError> {
    let correlation_id = correlation_id(&headers);
    let Query(query) = query.map_err(|rejection| bad_query(rejection, &correlation_id))?;

    let slots = state
        .facade
        .list_free_slots(&provider_id, query)
        .await
        .map_err(|error| ApiError::new(error, &correlation_id))?;
    Ok(Json(slots))
}

async fn list_appointments(
    State(state): State<ApiState>,
    Path(provider_id): Path<String>,
    headers: HeaderMap,
    query: Result<Query<AppointmentsQuery>, QueryRejection>,
) -> Result<Json<AppointmentsResponse>, ApiError> {
    let correlation_id = correlation_id(&headers);
    let Query(query) = query.map_err(|rejection| bad_query(rejection, &correlation_id))?;

    let appointments = state
        .facade
        .upcoming_appointments(&provider_id, query.days)
        .await
        .map_err(|error| ApiError::new(error, &correlation_id))?;
    Ok(Json(AppointmentsResponse { appointments }))
}

async fn place_hold(
    State(state): State<ApiState>,
    headers: HeaderMap,
    payload: Result<Json<PlaceHoldRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<HoldPlaced>), ApiError> {
    let correlation_id = correlation_id(&headers);
    let Json(request) = payload.map_err(|rejection| bad_json(rejection, &correlation_id))?;

    let hold = state
        .facade
        .place_hold(request)
        .await
        .map_err(|error| ApiError::new(error, &correlation_id))?;
    Ok((
        StatusCode::CREATED,
        Json(HoldPlaced {
            hold_id: hold.id.0,
            provider_id: hold.provider_id.0,
            start: hold.range.start,
            end: hold.range.end,
            expires_at: hold.expires_at,
        }),
    ))
}

async fn release_hold(
    State(state): State<ApiState>,
    Path(hold_id): Path<String>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let correlation_id = correlation_id(&headers);
    state
        .facade
        .release_hold(&hold_id)
        .await
        .map_err(|error| ApiError::new(error, &correlation_id))?;
    Ok(StatusCode::NO_CONTENT)
}

async fn confirm_booking(
    State(state): State<ApiState>,
    Path(hold_id): Path<String>,
    headers: HeaderMap,
    payload: Result<Json<ConfirmBookingRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<BookingConfirmation>), ApiError> {
    let correlation_id = correlation_id(&headers);
    let Json(request) = payload.map_err(|rejection| bad_json(rejection, &correlation_id))?;

    let confirmation = state
        .facade
        .confirm_booking(&hold_id, request)
        .await
        .map_err(|error| ApiError::new(error, &correlation_id))?;
    Ok((StatusCode::CREATED, Json(confirmation)))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        Router,
    };
    use chairside_core::{
        BookingSettings, ErrorCode, InMemoryReservationStore, ManualClock, Provider, ProviderId,
        ReservationFacade, WorkingWindow,
    };
    use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc, Weekday};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::{router, status_for};

    fn monday_morning() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 13, 0, 0).single().expect("timestamp")
    }

    async fn app() -> (Router, Arc<ManualClock>) {
        let provider = Provider {
            id: ProviderId("prov-1".to_string()),
            display_name: "Dr. Ivanov".to_string(),
            timezone: "America/New_York".to_string(),
            service_categories: vec!["cleaning".to_string()],
            working_hours: vec![WorkingWindow {
                weekday: Weekday::Tue,
                start: NaiveTime::from_hms_opt(9, 0, 0).expect("time"),
                end: NaiveTime::from_hms_opt(12, 0, 0).expect("time"),
            }],
        };
        let store = Arc::new(InMemoryReservationStore::with_providers([provider]).await);
        let clock = Arc::new(ManualClock::new(monday_morning()));
        let facade = ReservationFacade::new(store, clock.clone(), BookingSettings::default());
        (router(Arc::new(facade)), clock)
    }

    async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .header("x-correlation-id", "req-test");
        let request = match body {
            Some(body) => builder.body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");

        let response = app.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        (status, value)
    }

    fn hold_body(start: &str, end: &str) -> Value {
        json!({
            "provider_id": "prov-1",
            "start": start,
            "end": end,
            "channel": "widget",
        })
    }

    fn confirm_body() -> Value {
        json!({
            "patient_name": "Pat Doe",
            "patient_email": "Pat@Example.com",
            "patient_phone": "(555) 010-2233",
            "appointment_type": "cleaning",
        })
    }

    #[test]
    fn error_codes_map_to_documented_statuses() {
        assert_eq!(status_for(ErrorCode::SlotConflict), StatusCode::CONFLICT);
        assert_eq!(status_for(ErrorCode::AppointmentOverlap), StatusCode::CONFLICT);
        assert_eq!(status_for(ErrorCode::HoldNotFound), StatusCode::NOT_FOUND);
        assert_eq!(status_for(ErrorCode::HoldExpired), StatusCode::GONE);
        assert_eq!(status_for(ErrorCode::HoldAlreadyUsed), StatusCode::GONE);
        assert_eq!(status_for(ErrorCode::InvalidContact), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(status_for(ErrorCode::InvalidRequest), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(ErrorCode::Internal), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn providers_filter_by_service() {
        let (app, _) = app().await;

        let (status, body) = send(&app, "GET", "/api/v1/providers?service=cleaning", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["providers"][0]["id"], "prov-1");

        let (_, body) = send(&app, "GET", "/api/v1/providers?service=orthodontics", None).await;
        assert_eq!(body["providers"], json!([]));
    }

    #[tokio::test]
    async fn slots_are_grouped_by_day_with_zone_label() {
        let (app, _) = app().await;

        let (status, body) =
            send(&app, "GET", "/api/v1/providers/prov-1/slots?days=2&duration_min=60", None)
                .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["zone_label"], "ET");
        assert_eq!(body["days"][0]["day"], "2026-03-03");
        assert_eq!(body["days"][0]["slots"].as_array().map(Vec::len), Some(3));
    }

    #[tokio::test]
    async fn unknown_provider_is_not_found() {
        let (app, _) = app().await;

        let (status, body) = send(&app, "GET", "/api/v1/providers/nobody/slots", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "provider_not_found");
        assert_eq!(body["correlation_id"], "req-test");
    }

    #[tokio::test]
    async fn hold_then_confirm_books_once() {
        let (app, _) = app().await;

        let (status, hold) = send(
            &app,
            "POST",
            "/api/v1/holds",
            Some(hold_body("2026-03-03T15:00:00Z", "2026-03-03T15:30:00Z")),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(hold["expires_at"], "2026-03-02T13:05:00Z");
        let hold_id = hold["hold_id"].as_str().expect("hold id").to_string();

        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/holds",
            Some(hold_body("2026-03-03T15:00:00Z", "2026-03-03T15:30:00Z")),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "slot_conflict");

        let uri = format!("/api/v1/holds/{hold_id}/confirm");
        let (status, confirmed) = send(&app, "POST", &uri, Some(confirm_body())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(confirmed["appointment"]["patient"]["phone"], "15550102233");
        assert_eq!(confirmed["confirmation_text"], "Tue, Mar 3 10:00 AM – 10:30 AM (ET)");

        let (status, body) = send(&app, "POST", &uri, Some(confirm_body())).await;
        assert_eq!(status, StatusCode::GONE);
        assert_eq!(body["error"], "hold_already_used");

        let (status, body) =
            send(&app, "GET", "/api/v1/providers/prov-1/appointments?days=3", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["appointments"].as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn confirm_after_ttl_is_gone() {
        let (app, clock) = app().await;

        let (_, hold) = send(
            &app,
            "POST",
            "/api/v1/holds",
            Some(hold_body("2026-03-03T15:00:00Z", "2026-03-03T15:30:00Z")),
        )
        .await;
        let hold_id = hold["hold_id"].as_str().expect("hold id").to_string();

        clock.advance(Duration::seconds(301));
        let uri = format!("/api/v1/holds/{hold_id}/confirm");
        let (status, body) = send(&app, "POST", &uri, Some(confirm_body())).await;
        assert_eq!(status, StatusCode::GONE);
        assert_eq!(body["error"], "hold_expired");
    }

    #[tokio::test]
    async fn bad_contact_and_malformed_bodies_are_rejected() {
        let (app, _) = app().await;

        let (_, hold) = send(
            &app,
            "POST",
            "/api/v1/holds",
            Some(hold_body("2026-03-03T15:00:00Z", "2026-03-03T15:30:00Z")),
        )
        .await;
        let hold_id = hold["hold_id"].as_str().expect("hold id").to_string();

        let mut body = confirm_body();
        body["patient_email"] = json!("not-an-email");
        let uri = format!("/api/v1/holds/{hold_id}/confirm");
        let (status, error) = send(&app, "POST", &uri, Some(body)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(error["error"], "invalid_contact");

        let (status, error) =
            send(&app, "POST", "/api/v1/holds", Some(json!({ "provider_id": "prov-1" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error["error"], "invalid_request");
    }

    #[tokio::test]
    async fn release_is_idempotent_and_frees_the_slot() {
        let (app, _) = app().await;
        let body = hold_body("2026-03-03T15:00:00Z", "2026-03-03T15:30:00Z");

        let (_, hold) = send(&app, "POST", "/api/v1/holds", Some(body.clone())).await;
        let uri = format!("/api/v1/holds/{}", hold["hold_id"].as_str().expect("hold id"));

        let (status, _) = send(&app, "DELETE", &uri, None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(&app, "DELETE", &uri, None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = send(&app, "POST", "/api/v1/holds", Some(body)).await;
        assert_eq!(status, StatusCode::CREATED);
    }
}
