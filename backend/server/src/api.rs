//! Axum REST API: shared state, router and the public storefront handlers.

use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use raffle_core::{
    Money, Participant, PurchaseRequest, Raffle, RaffleError, RaffleStatus, TicketSelection,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::admin;
use crate::auth::SessionStore;
use crate::config::Config;
use crate::errors::{Result, ServerError};
use crate::store::{self, RaffleStore};

pub struct AppState {
    pub store: Arc<dyn RaffleStore>,
    pub sessions: SessionStore,
    pub config: Config,
}

impl AppState {
    pub fn new(store: Arc<dyn RaffleStore>, config: Config) -> Self {
        let sessions = SessionStore::new(
            config.admin_username.clone(),
            config.admin_password.clone(),
            config.session_ttl(),
        );
        Self {
            store,
            sessions,
            config,
        }
    }

    pub(crate) async fn require_raffle(&self, id: &str) -> Result<Raffle> {
        self.store
            .find_raffle(id)
            .await?
            .ok_or_else(|| RaffleError::raffle_not_found(id).into())
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/raffles", get(list_raffles))
        .route("/raffles/:id", get(get_raffle))
        .route("/raffles/:id/availability", get(get_availability))
        .route("/raffles/:id/random", get(random_numbers))
        .route("/raffles/:id/purchases", post(purchase))
        .merge(admin::routes())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub(crate) fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Unwrap a JSON body, turning extractor rejections into our error shape.
pub(crate) fn json_body<T>(payload: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|e| ServerError::BadRequest(e.body_text()))
}

pub(crate) fn query_params<T>(query: std::result::Result<Query<T>, QueryRejection>) -> Result<T> {
    query
        .map(|Query(params)| params)
        .map_err(|e| ServerError::BadRequest(e.body_text()))
}

// ─────────────────────────────────────────────────────────
// Response shapes
// ─────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Serialize)]
pub struct RaffleView {
    #[serde(flatten)]
    pub raffle: Raffle,
    pub progress_percent: f64,
}

impl From<Raffle> for RaffleView {
    fn from(raffle: Raffle) -> Self {
        Self {
            progress_percent: raffle.progress_percent(),
            raffle,
        }
    }
}

#[derive(Serialize)]
pub struct RafflesResponse {
    pub count: usize,
    pub raffles: Vec<RaffleView>,
}

#[derive(Serialize)]
pub struct RaffleDetail {
    #[serde(flatten)]
    pub raffle: RaffleView,
    pub available_count: usize,
}

#[derive(Serialize)]
pub struct AvailabilityResponse {
    pub raffle_id: String,
    pub total_numbers: u32,
    pub available_count: usize,
    pub available: Vec<u32>,
}

#[derive(Serialize)]
pub struct RandomResponse {
    pub raffle_id: String,
    pub numbers: Vec<u32>,
    pub total_price: Money,
}

#[derive(Serialize)]
pub struct PurchaseResponse {
    pub participant: Participant,
    pub message: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ListQuery {
    pub status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RandomQuery {
    pub count: Option<usize>,
}

// ─────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────

/// `GET /health`
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// `GET /raffles[?status=]`
pub async fn list_raffles(
    State(state): State<Arc<AppState>>,
    query: std::result::Result<Query<ListQuery>, QueryRejection>,
) -> Result<Json<RafflesResponse>> {
    let status = match query_params(query)?.status.filter(|s| !s.is_empty()) {
        Some(raw) => Some(raw.parse::<RaffleStatus>().map_err(ServerError::BadRequest)?),
        None => None,
    };

    let raffles: Vec<RaffleView> = state
        .store
        .list_raffles()
        .await?
        .into_iter()
        .filter(|r| status.map_or(true, |s| r.status == s))
        .map(RaffleView::from)
        .collect();

    Ok(Json(RafflesResponse {
        count: raffles.len(),
        raffles,
    }))
}

/// `GET /raffles/:id`
pub async fn get_raffle(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<RaffleDetail>> {
    let raffle = state.require_raffle(&id).await?;
    let available = store::available_numbers(state.store.as_ref(), &id).await?;
    Ok(Json(RaffleDetail {
        raffle: raffle.into(),
        available_count: available.len(),
    }))
}

/// `GET /raffles/:id/availability`
pub async fn get_availability(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<AvailabilityResponse>> {
    let raffle = state.require_raffle(&id).await?;
    let available = store::available_numbers(state.store.as_ref(), &id).await?;
    Ok(Json(AvailabilityResponse {
        raffle_id: raffle.id,
        total_numbers: raffle.total_numbers,
        available_count: available.len(),
        available,
    }))
}

/// `GET /raffles/:id/random?count=N`
///
/// Suggests up to `N` available numbers (default 1), capped at the
/// per-purchase limit. Nothing is reserved.
pub async fn random_numbers(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    query: std::result::Result<Query<RandomQuery>, QueryRejection>,
) -> Result<Json<RandomResponse>> {
    let count = query_params(query)?.count.unwrap_or(1);
    let raffle = state.require_raffle(&id).await?;
    let available = store::available_numbers(state.store.as_ref(), &id).await?;

    let mut selection = TicketSelection::new(available);
    selection.pick_random(count, &mut rand::thread_rng());

    Ok(Json(RandomResponse {
        raffle_id: raffle.id,
        numbers: selection.sorted(),
        total_price: selection.total_price(raffle.price),
    }))
}

/// `POST /raffles/:id/purchases`
pub async fn purchase(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: std::result::Result<Json<PurchaseRequest>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let request = json_body(payload)?;
    let raffle = state.require_raffle(&id).await?;
    let order = raffle_core::validation::validate_purchase(&raffle, &request, today())?;

    let participant = match state.store.claim_numbers(order).await {
        Ok(p) => p,
        Err(ServerError::Domain(RaffleError::NumbersTaken { raffle_id, numbers })) => {
            warn!("Purchase rejected in raffle {raffle_id}: numbers {numbers:?} already held");
            return Err(RaffleError::NumbersTaken { raffle_id, numbers }.into());
        }
        Err(e) => return Err(e),
    };

    info!(
        "Purchase {} recorded in raffle {}: numbers {:?}, total {}",
        participant.id, participant.raffle_id, participant.numbers, participant.total_paid
    );
    let message = format!(
        "Reserved {} number(s); payment pending",
        participant.numbers.len()
    );
    Ok((
        StatusCode::CREATED,
        Json(PurchaseResponse {
            participant,
            message,
        }),
    ))
}

// ─────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────
