use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::health::HealthState;
use crate::config::{MIN_PHONE_LEN, NEW_USER_BALANCE};
use crate::engine::SettlementHandle;
use crate::error::{AppError, Result};
use crate::ledger::Ledger;
use crate::session::{Account, SessionStore, UserSession};
use crate::state::SiteStore;
use crate::types::{
    now_ms, Bet, BetOutcome, BetStatus, BettingOption, CurrencySettings, LedgerEntry, LedgerReason,
    LiveStream, StreamStatus, Transaction, TxDecision, TxKind, TxStatus,
};

/// Header carrying the user session token.
const SESSION_HEADER: &str = "x-session-token";
/// Header carrying the admin session token.
const ADMIN_HEADER: &str = "x-admin-token";

#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<SiteStore>,
    pub sessions: Arc<SessionStore>,
    pub ledger: Arc<Ledger>,
    pub engine: SettlementHandle,
    pub health: Arc<HealthState>,
    pub auth_delay_ms: u64,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(get_health))
        // user auth
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/me", get(get_me))
        .route("/me/ledger", get(get_my_ledger))
        // public listings
        .route("/options", get(get_options))
        .route("/streams", get(get_streams))
        // betting & payments
        .route("/bets", post(place_bet).get(get_my_bets))
        .route("/transactions", get(get_my_transactions))
        .route("/transactions/deposit", post(request_deposit))
        .route("/transactions/withdraw", post(request_withdraw))
        // admin
        .route("/admin/login", post(admin_login))
        .route("/admin/logout", post(admin_logout))
        .route("/admin/bets", get(admin_get_bets))
        .route("/admin/bets/:id/settle", post(admin_settle_bet))
        .route("/admin/transactions", get(admin_get_transactions))
        .route(
            "/admin/transactions/:id/resolve",
            post(admin_resolve_transaction),
        )
        .route(
            "/admin/currency",
            get(admin_get_currency).put(admin_update_currency),
        )
        .route("/admin/options", get(admin_get_options).post(admin_create_option))
        .route("/admin/options/:id", put(admin_update_option))
        .route("/admin/streams", post(admin_create_stream))
        .route("/admin/streams/:id", put(admin_update_stream))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Auth helpers
// ---------------------------------------------------------------------------

fn token_header(headers: &HeaderMap, name: &str) -> Result<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .ok_or(AppError::Unauthorized)
}

fn require_user(state: &ApiState, headers: &HeaderMap) -> Result<UserSession> {
    let token = token_header(headers, SESSION_HEADER)?;
    state.sessions.user_session(&token).ok_or(AppError::Unauthorized)
}

fn require_admin(state: &ApiState, headers: &HeaderMap) -> Result<()> {
    let token = token_header(headers, ADMIN_HEADER)?;
    state
        .sessions
        .admin_session(&token)
        .map(|_| ())
        .ok_or(AppError::Unauthorized)
}

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct AdminLoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct SessionResponse {
    pub token: String,
    pub name: String,
    pub email: String,
    pub balance: f64,
}

#[derive(Serialize)]
pub struct MeResponse {
    pub name: String,
    pub email: String,
    pub balance: f64,
}

#[derive(Deserialize)]
pub struct PlaceBetRequest {
    pub option_id: u64,
    pub selection: String,
    pub amount: f64,
}

#[derive(Deserialize)]
pub struct DepositRequest {
    pub amount: f64,
    pub receipt_image: Option<String>,
}

#[derive(Deserialize)]
pub struct WithdrawRequest {
    pub amount: f64,
    pub phone_number: String,
}

#[derive(Deserialize)]
pub struct SettleBetRequest {
    pub outcome: BetOutcome,
}

#[derive(Deserialize)]
pub struct ResolveTxRequest {
    pub decision: TxDecision,
    pub notes: Option<String>,
}

#[derive(Deserialize)]
pub struct BetsQuery {
    pub status: Option<BetStatus>,
}

#[derive(Deserialize)]
pub struct TransactionsQuery {
    pub status: Option<TxStatus>,
    pub kind: Option<TxKind>,
}

#[derive(Deserialize)]
pub struct NewOptionRequest {
    pub title: String,
    pub description: String,
    pub option1: String,
    pub option2: String,
    pub odds1: String,
    pub odds2: String,
    #[serde(default)]
    pub live_stream: bool,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Deserialize)]
pub struct NewStreamRequest {
    pub name: String,
    pub status: StreamStatus,
    pub viewers: u32,
    pub quality: String,
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

async fn get_health(State(state): State<ApiState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "engine_running": state.health.engine_running(),
        "commands_processed": state.health.commands_processed(),
        "last_command_at_ms": state.health.last_command_at_ms(),
        "bets": state.store.bet_count(),
        "transactions": state.store.transaction_count(),
    }))
}

// ---------------------------------------------------------------------------
// User auth
// ---------------------------------------------------------------------------

async fn register(
    State(state): State<ApiState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<SessionResponse>> {
    if req.name.trim().is_empty() || req.email.trim().is_empty() || req.password.is_empty() {
        return Err(AppError::Validation(
            "name, email, and password are required".to_string(),
        ));
    }
    simulate_auth_delay(&state).await;

    let account = Account {
        name: req.name.trim().to_string(),
        email: req.email.trim().to_string(),
        password: req.password,
        created_at_ms: now_ms(),
    };
    state.sessions.add_account(account.clone())?;
    state
        .ledger
        .credit(&account.email, NEW_USER_BALANCE, LedgerReason::Seed, None);
    let session = state.sessions.issue_user_session(&account);
    info!(email = %account.email, "account registered");

    Ok(Json(SessionResponse {
        balance: state.ledger.balance(&account.email),
        token: session.token,
        name: session.name,
        email: session.email,
    }))
}

async fn login(
    State(state): State<ApiState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<SessionResponse>> {
    simulate_auth_delay(&state).await;
    let account = state.sessions.verify_credentials(&req.email, &req.password)?;
    let session = state.sessions.issue_user_session(&account);
    info!(email = %account.email, "user signed in");

    Ok(Json(SessionResponse {
        balance: state.ledger.balance(&account.email),
        token: session.token,
        name: session.name,
        email: session.email,
    }))
}

async fn logout(State(state): State<ApiState>, headers: HeaderMap) -> Result<Json<serde_json::Value>> {
    let token = token_header(&headers, SESSION_HEADER)?;
    state.sessions.revoke_user_session(&token);
    Ok(Json(serde_json::json!({ "logged_out": true })))
}

async fn get_me(State(state): State<ApiState>, headers: HeaderMap) -> Result<Json<MeResponse>> {
    let session = require_user(&state, &headers)?;
    Ok(Json(MeResponse {
        balance: state.ledger.balance(&session.email),
        name: session.name,
        email: session.email,
    }))
}

async fn get_my_ledger(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<Vec<LedgerEntry>>> {
    let session = require_user(&state, &headers)?;
    Ok(Json(state.ledger.entries_for(&session.email)))
}

/// Mirrors the original auth mock's simulated processing delay.
async fn simulate_auth_delay(state: &ApiState) {
    if state.auth_delay_ms > 0 {
        tokio::time::sleep(Duration::from_millis(state.auth_delay_ms)).await;
    }
}

// ---------------------------------------------------------------------------
// Public listings
// ---------------------------------------------------------------------------

async fn get_options(State(state): State<ApiState>) -> Json<Vec<BettingOption>> {
    Json(state.store.active_options())
}

async fn get_streams(State(state): State<ApiState>) -> Json<Vec<LiveStream>> {
    Json(state.store.streams())
}

// ---------------------------------------------------------------------------
// Betting & payments
// ---------------------------------------------------------------------------

async fn place_bet(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(req): Json<PlaceBetRequest>,
) -> Result<Json<Bet>> {
    let session = require_user(&state, &headers)?;
    let bet = state
        .engine
        .place_bet(
            session.email,
            session.name,
            req.option_id,
            req.selection,
            req.amount,
        )
        .await?;
    Ok(Json(bet))
}

async fn get_my_bets(State(state): State<ApiState>, headers: HeaderMap) -> Result<Json<Vec<Bet>>> {
    let session = require_user(&state, &headers)?;
    Ok(Json(state.store.bets_for_user(&session.email)))
}

async fn request_deposit(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(req): Json<DepositRequest>,
) -> Result<Json<Transaction>> {
    let session = require_user(&state, &headers)?;
    let tx = state
        .engine
        .request_deposit(session.email, session.name, req.amount, req.receipt_image)
        .await?;
    Ok(Json(tx))
}

async fn request_withdraw(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(req): Json<WithdrawRequest>,
) -> Result<Json<Transaction>> {
    let session = require_user(&state, &headers)?;
    let tx = state
        .engine
        .request_withdraw(session.email, session.name, req.amount, req.phone_number)
        .await?;
    Ok(Json(tx))
}

async fn get_my_transactions(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Transaction>>> {
    let session = require_user(&state, &headers)?;
    Ok(Json(state.store.transactions_for_user(&session.email)))
}

// ---------------------------------------------------------------------------
// Admin
// ---------------------------------------------------------------------------

async fn admin_login(
    State(state): State<ApiState>,
    Json(req): Json<AdminLoginRequest>,
) -> Result<Json<serde_json::Value>> {
    let session = state.sessions.admin_login(&req.username, &req.password)?;
    info!(username = %session.username, "admin signed in");
    Ok(Json(serde_json::json!({
        "token": session.token,
        "username": session.username,
    })))
}

async fn admin_logout(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>> {
    let token = token_header(&headers, ADMIN_HEADER)?;
    state.sessions.revoke_admin_session(&token);
    Ok(Json(serde_json::json!({ "logged_out": true })))
}

async fn admin_get_bets(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Query(params): Query<BetsQuery>,
) -> Result<Json<Vec<Bet>>> {
    require_admin(&state, &headers)?;
    Ok(Json(state.store.bets(params.status)))
}

async fn admin_settle_bet(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<u64>,
    Json(req): Json<SettleBetRequest>,
) -> Result<Json<Bet>> {
    require_admin(&state, &headers)?;
    let bet = state.engine.settle_bet(id, req.outcome).await?;
    Ok(Json(bet))
}

async fn admin_get_transactions(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Query(params): Query<TransactionsQuery>,
) -> Result<Json<Vec<Transaction>>> {
    require_admin(&state, &headers)?;
    let txs = state
        .store
        .transactions(params.status)
        .into_iter()
        .filter(|t| params.kind.map_or(true, |k| t.kind == k))
        .collect();
    Ok(Json(txs))
}

async fn admin_resolve_transaction(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<u64>,
    Json(req): Json<ResolveTxRequest>,
) -> Result<Json<Transaction>> {
    require_admin(&state, &headers)?;
    let tx = state
        .engine
        .resolve_transaction(id, req.decision, req.notes)
        .await?;
    Ok(Json(tx))
}

async fn admin_get_currency(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<CurrencySettings>> {
    require_admin(&state, &headers)?;
    Ok(Json(state.store.currency()))
}

async fn admin_update_currency(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(settings): Json<CurrencySettings>,
) -> Result<Json<CurrencySettings>> {
    require_admin(&state, &headers)?;
    // The collection number is the only validated field; limit ranges are
    // stored as entered.
    if settings.gcash_number.trim().len() < MIN_PHONE_LEN {
        return Err(AppError::Validation(
            "please enter a valid GCash number".to_string(),
        ));
    }
    state.store.set_currency(settings.clone());
    info!(currency = %settings.currency, "currency settings updated");
    Ok(Json(settings))
}

async fn admin_get_options(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<Vec<BettingOption>>> {
    require_admin(&state, &headers)?;
    Ok(Json(state.store.all_options()))
}

async fn admin_create_option(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(req): Json<NewOptionRequest>,
) -> Result<Json<BettingOption>> {
    require_admin(&state, &headers)?;
    validate_odds(&req.odds1)?;
    validate_odds(&req.odds2)?;
    let option = BettingOption {
        id: state.store.alloc_id(),
        title: req.title,
        description: req.description,
        option1: req.option1,
        option2: req.option2,
        odds1: req.odds1,
        odds2: req.odds2,
        live_stream: req.live_stream,
        active: req.active,
    };
    state.store.add_option(option.clone());
    info!(option_id = option.id, title = %option.title, "betting option created");
    Ok(Json(option))
}

async fn admin_update_option(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<u64>,
    Json(req): Json<NewOptionRequest>,
) -> Result<Json<BettingOption>> {
    require_admin(&state, &headers)?;
    validate_odds(&req.odds1)?;
    validate_odds(&req.odds2)?;
    let option = state.store.update_option(BettingOption {
        id,
        title: req.title,
        description: req.description,
        option1: req.option1,
        option2: req.option2,
        odds1: req.odds1,
        odds2: req.odds2,
        live_stream: req.live_stream,
        active: req.active,
    })?;
    Ok(Json(option))
}

async fn admin_create_stream(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(req): Json<NewStreamRequest>,
) -> Result<Json<LiveStream>> {
    require_admin(&state, &headers)?;
    let stream = LiveStream {
        id: state.store.alloc_id(),
        name: req.name,
        status: req.status,
        viewers: req.viewers,
        quality: req.quality,
    };
    state.store.add_stream(stream.clone());
    Ok(Json(stream))
}

async fn admin_update_stream(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<u64>,
    Json(req): Json<NewStreamRequest>,
) -> Result<Json<LiveStream>> {
    require_admin(&state, &headers)?;
    let stream = state.store.update_stream(LiveStream {
        id,
        name: req.name,
        status: req.status,
        viewers: req.viewers,
        quality: req.quality,
    })?;
    Ok(Json(stream))
}

/// Odds entered by admins must parse — bets are priced from them later.
fn validate_odds(odds: &str) -> Result<()> {
    odds.trim()
        .parse::<f64>()
        .map(|_| ())
        .map_err(|_| AppError::Validation(format!("odds '{odds}' are not numeric")))
}
