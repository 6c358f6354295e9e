//! Admin handlers: session, raffle management, participants, reports and
//! CSV exports. Everything except login requires an [`AdminSession`].

use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::{
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
        StatusCode,
    },
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use raffle_core::availability::{reconcile, Reconciliation};
use raffle_core::reports::{self, MonthlyTrend, ParticipantFilter, RafflePerformance, Summary};
use raffle_core::validation::validate_new;
use raffle_core::{export, Participant, PaymentStatus, RaffleForm};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::api::{json_body, query_params, today, AppState, RaffleView};
use crate::auth::{AdminSession, Credentials, DASHBOARD_PATH};
use crate::errors::{Result, ServerError};

const TOP_RAFFLES: usize = 5;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/admin/login", post(login))
        .route("/admin/logout", post(logout))
        .route("/admin/session", get(session))
        .route("/admin/dashboard", get(dashboard))
        .route("/admin/raffles", post(create_raffle))
        .route(
            "/admin/raffles/:id",
            get(raffle_detail).put(update_raffle).delete(delete_raffle),
        )
        .route("/admin/raffles/:id/reconciliation", get(reconciliation))
        .route("/admin/raffles/:id/participants.csv", get(raffle_participants_csv))
        .route("/admin/participants", get(list_participants))
        .route("/admin/participants.csv", get(participants_csv))
        .route("/admin/participants/:id/payment", patch(update_payment))
        .route("/admin/reports/summary", get(report_summary))
        .route("/admin/reports/raffles", get(report_raffles))
        .route("/admin/reports/monthly", get(report_monthly))
        .route("/admin/reports/:kind/csv", get(report_csv))
}

fn csv_attachment(prefix: &str, body: String) -> Response {
    let filename = export::filename(prefix, today());
    (
        [
            (CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        body,
    )
        .into_response()
}

// ─────────────────────────────────────────────────────────
// Response shapes
// ─────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub username: String,
    pub expires_at: DateTime<Utc>,
    pub redirect_to: &'static str,
}

#[derive(Serialize)]
pub struct SessionResponse {
    pub username: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct DashboardResponse {
    pub summary: Summary,
    pub top_raffles: Vec<RafflePerformance>,
    pub raffles: Vec<RafflePerformance>,
}

#[derive(Serialize)]
pub struct AdminRaffleResponse {
    pub raffle: RaffleView,
    pub participants: Vec<Participant>,
    pub reconciliation: Reconciliation,
}

#[derive(Serialize)]
pub struct ParticipantsResponse {
    pub count: usize,
    pub participants: Vec<Participant>,
}

#[derive(Serialize)]
pub struct PerformanceResponse {
    pub raffles: Vec<RafflePerformance>,
}

#[derive(Serialize)]
pub struct MonthlyResponse {
    pub months: Vec<MonthlyTrend>,
}

#[derive(Debug, Deserialize)]
pub struct PaymentUpdate {
    pub payment_status: PaymentStatus,
}

// ─────────────────────────────────────────────────────────
// Session
// ─────────────────────────────────────────────────────────

/// `POST /admin/login`
pub async fn login(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<Credentials>, JsonRejection>,
) -> Result<Json<LoginResponse>> {
    let credentials = json_body(payload)?;
    let session = state
        .sessions
        .login(&credentials)
        .await
        .ok_or_else(|| ServerError::Unauthorized("invalid username or password".to_string()))?;

    info!("Admin {} logged in", session.username);
    Ok(Json(LoginResponse {
        token: session.token,
        username: session.username,
        expires_at: session.expires_at,
        redirect_to: DASHBOARD_PATH,
    }))
}

/// `POST /admin/logout`
pub async fn logout(
    State(state): State<Arc<AppState>>,
    AdminSession(session): AdminSession,
) -> StatusCode {
    state.sessions.logout(&session.token).await;
    info!("Admin {} logged out", session.username);
    StatusCode::NO_CONTENT
}

/// `GET /admin/session`
pub async fn session(AdminSession(session): AdminSession) -> Json<SessionResponse> {
    Json(SessionResponse {
        username: session.username,
        issued_at: session.issued_at,
        expires_at: session.expires_at,
    })
}

// ─────────────────────────────────────────────────────────
// Dashboard & raffles
// ─────────────────────────────────────────────────────────

/// `GET /admin/dashboard`
pub async fn dashboard(
    State(state): State<Arc<AppState>>,
    _admin: AdminSession,
) -> Result<Json<DashboardResponse>> {
    let raffles = state.store.list_raffles().await?;
    let participants = state.store.list_participants().await?;
    let performance = reports::raffle_performance(&raffles, &participants);
    Ok(Json(DashboardResponse {
        summary: reports::summary(&raffles, &participants),
        top_raffles: reports::top_raffles(&performance, TOP_RAFFLES),
        raffles: performance,
    }))
}

/// `POST /admin/raffles`
pub async fn create_raffle(
    State(state): State<Arc<AppState>>,
    AdminSession(session): AdminSession,
    payload: std::result::Result<Json<RaffleForm>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let form = json_body(payload)?;
    let draft = validate_new(&form)?;
    let raffle = state.store.create_raffle(draft).await?;
    info!(
        "Raffle {} \"{}\" created by {}",
        raffle.id, raffle.title, session.username
    );
    Ok((StatusCode::CREATED, Json(RaffleView::from(raffle))))
}

/// `GET /admin/raffles/:id`
pub async fn raffle_detail(
    State(state): State<Arc<AppState>>,
    _admin: AdminSession,
    Path(id): Path<String>,
) -> Result<Json<AdminRaffleResponse>> {
    let raffle = state.require_raffle(&id).await?;
    let participants = state.store.list_by_raffle(&id).await?;
    Ok(Json(AdminRaffleResponse {
        reconciliation: reconcile(&raffle, &participants),
        raffle: raffle.into(),
        participants,
    }))
}

/// `PUT /admin/raffles/:id`
pub async fn update_raffle(
    State(state): State<Arc<AppState>>,
    AdminSession(session): AdminSession,
    Path(id): Path<String>,
    payload: std::result::Result<Json<RaffleForm>, JsonRejection>,
) -> Result<Json<RaffleView>> {
    let form = json_body(payload)?;
    let raffle = state.store.update_raffle(&id, &form).await?;
    info!("Raffle {} updated by {}", raffle.id, session.username);
    Ok(Json(raffle.into()))
}

/// `DELETE /admin/raffles/:id`
pub async fn delete_raffle(
    State(state): State<Arc<AppState>>,
    AdminSession(session): AdminSession,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    state.store.delete_raffle(&id).await?;
    info!("Raffle {id} deleted by {}", session.username);
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /admin/raffles/:id/reconciliation`
pub async fn reconciliation(
    State(state): State<Arc<AppState>>,
    _admin: AdminSession,
    Path(id): Path<String>,
) -> Result<Json<Reconciliation>> {
    let raffle = state.require_raffle(&id).await?;
    let participants = state.store.list_by_raffle(&id).await?;
    let report = reconcile(&raffle, &participants);
    if !report.is_consistent() {
        warn!(
            "Raffle {id} sold count drifted: recorded {}, actual {}",
            report.recorded_sold, report.actual_sold
        );
    }
    Ok(Json(report))
}

/// `GET /admin/raffles/:id/participants.csv`
pub async fn raffle_participants_csv(
    State(state): State<Arc<AppState>>,
    _admin: AdminSession,
    Path(id): Path<String>,
) -> Result<Response> {
    let raffle = state.require_raffle(&id).await?;
    let participants = state.store.list_by_raffle(&raffle.id).await?;
    Ok(csv_attachment(
        &format!("participants-raffle-{}", raffle.id),
        export::raffle_participants_csv(&participants),
    ))
}

// ─────────────────────────────────────────────────────────
// Participants
// ─────────────────────────────────────────────────────────

async fn filtered_participants(
    state: &AppState,
    query: std::result::Result<Query<ParticipantFilter>, QueryRejection>,
) -> Result<Vec<Participant>> {
    let filter = query_params(query)?;
    Ok(filter.apply(state.store.list_participants().await?))
}

/// `GET /admin/participants[?search=&status=&raffle_id=]`
pub async fn list_participants(
    State(state): State<Arc<AppState>>,
    _admin: AdminSession,
    query: std::result::Result<Query<ParticipantFilter>, QueryRejection>,
) -> Result<Json<ParticipantsResponse>> {
    let participants = filtered_participants(&state, query).await?;
    Ok(Json(ParticipantsResponse {
        count: participants.len(),
        participants,
    }))
}

/// `GET /admin/participants.csv`
pub async fn participants_csv(
    State(state): State<Arc<AppState>>,
    _admin: AdminSession,
    query: std::result::Result<Query<ParticipantFilter>, QueryRejection>,
) -> Result<Response> {
    let participants = filtered_participants(&state, query).await?;
    let raffles = state.store.list_raffles().await?;
    Ok(csv_attachment(
        "participants",
        export::participants_csv(&participants, &raffles),
    ))
}

/// `PATCH /admin/participants/:id/payment`
pub async fn update_payment(
    State(state): State<Arc<AppState>>,
    AdminSession(session): AdminSession,
    Path(id): Path<String>,
    payload: std::result::Result<Json<PaymentUpdate>, JsonRejection>,
) -> Result<Json<Participant>> {
    let update = json_body(payload)?;
    let participant = state
        .store
        .set_payment_status(&id, update.payment_status)
        .await?;
    info!(
        "Payment of participant {id} marked {} by {}",
        participant.payment_status, session.username
    );
    Ok(Json(participant))
}

// ─────────────────────────────────────────────────────────
// Reports
// ─────────────────────────────────────────────────────────

/// `GET /admin/reports/summary`
pub async fn report_summary(
    State(state): State<Arc<AppState>>,
    _admin: AdminSession,
) -> Result<Json<Summary>> {
    let raffles = state.store.list_raffles().await?;
    let participants = state.store.list_participants().await?;
    Ok(Json(reports::summary(&raffles, &participants)))
}

/// `GET /admin/reports/raffles`
pub async fn report_raffles(
    State(state): State<Arc<AppState>>,
    _admin: AdminSession,
) -> Result<Json<PerformanceResponse>> {
    let raffles = state.store.list_raffles().await?;
    let participants = state.store.list_participants().await?;
    Ok(Json(PerformanceResponse {
        raffles: reports::raffle_performance(&raffles, &participants),
    }))
}

/// `GET /admin/reports/monthly`
pub async fn report_monthly(
    State(state): State<Arc<AppState>>,
    _admin: AdminSession,
) -> Result<Json<MonthlyResponse>> {
    let raffles = state.store.list_raffles().await?;
    let participants = state.store.list_participants().await?;
    Ok(Json(MonthlyResponse {
        months: reports::monthly_trend(&raffles, &participants),
    }))
}

/// `GET /admin/reports/:kind/csv` for `general`, `raffles` or `monthly`.
pub async fn report_csv(
    State(state): State<Arc<AppState>>,
    _admin: AdminSession,
    Path(kind): Path<String>,
) -> Result<Response> {
    let raffles = state.store.list_raffles().await?;
    let participants = state.store.list_participants().await?;
    let (prefix, body) = match kind.as_str() {
        "general" => (
            "report-general",
            export::general_csv(&reports::summary(&raffles, &participants)),
        ),
        "raffles" => (
            "report-raffles",
            export::raffles_csv(&reports::raffle_performance(&raffles, &participants)),
        ),
        "monthly" => (
            "report-monthly",
            export::monthly_csv(&reports::monthly_trend(&raffles, &participants)),
        ),
        other => {
            return Err(ServerError::BadRequest(format!(
                "unknown report {other:?} (expected general, raffles or monthly)"
            )))
        }
    };
    Ok(csv_attachment(prefix, body))
}
