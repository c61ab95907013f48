//! REST routes
//!
//! Every route except `GET /health` requires the client API key in the
//! `x-api-key` header. Payment-status lookups never 404 for unknown
//! identifiers; they answer with an `UNKNOWN` status body instead.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, Query, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use tidepay::engine::types::{
    InputType, LnUrlAuthRequestData, LnUrlCallbackStatus, LnUrlPayRequestData,
    LnUrlWithdrawRequestData, ListPaymentsRequest, Payment, PaymentLimits,
    PrepareLnUrlPayResponse, RecommendedFees,
};
use tidepay::handler::{ReceivePaymentOutcome, SendPaymentOutcome, SignedMessage};
use tidepay::{Error as CoreError, Gateway, PaymentStatus, SendPaymentArgs};

/// Header carrying the client API key
pub const API_KEY_HEADER: &str = "x-api-key";

/// Shared route state
#[derive(Clone)]
pub struct AppState {
    /// Lifecycle owner of the payment handler
    pub gateway: Arc<Gateway>,
    /// API key clients must present
    pub api_secret: Arc<str>,
}

/// Build the daemon's router
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/v1/payments/send", post(send_payment))
        .route("/v1/payments/receive", post(receive_payment))
        .route("/v1/payments/send-onchain", post(send_onchain))
        .route("/v1/payments", get(list_payments))
        .route("/v1/payments/{identifier}/status", get(check_payment_status))
        .route("/v1/limits/lightning", get(lightning_limits))
        .route("/v1/limits/onchain", get(onchain_limits))
        .route("/v1/fees/recommended", get(recommended_fees))
        .route("/v1/rates", get(all_exchange_rates))
        .route("/v1/rates/{currency}", get(exchange_rate))
        .route("/v1/messages/sign", post(sign_message))
        .route("/v1/messages/check", post(check_message))
        .route("/v1/lnurl/parse", post(parse_input))
        .route("/v1/lnurl/pay/prepare", post(prepare_lnurl_pay))
        .route("/v1/lnurl/pay", post(lnurl_pay))
        .route("/v1/lnurl/auth", post(lnurl_auth))
        .route("/v1/lnurl/withdraw", post(lnurl_withdraw))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            require_api_key,
        ));

    Router::new()
        .route("/health", get(health))
        .merge(protected)
        .with_state(state)
}

// ==================== Auth ====================

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

async fn require_api_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    if state.api_secret.is_empty() {
        return ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "API key not configured on server",
        )
        .into_response();
    }

    let presented = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    if !constant_time_eq(presented.as_bytes(), state.api_secret.as_bytes()) {
        return ApiError::new(StatusCode::UNAUTHORIZED, "invalid API key").into_response();
    }

    next.run(request).await
}

// ==================== Errors ====================

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                error: self.message,
            }),
        )
            .into_response()
    }
}

impl From<CoreError> for ApiError {
    fn from(e: CoreError) -> Self {
        let status = match &e {
            CoreError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            CoreError::RateUnavailable(_) => StatusCode::NOT_FOUND,
            CoreError::Engine(_) => StatusCode::BAD_GATEWAY,
            CoreError::Config(_) | CoreError::Webhook(_) | CoreError::Anyhow(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self::new(status, e.to_string())
    }
}

// ==================== Bodies ====================

#[derive(Deserialize)]
struct ReceivePaymentBody {
    amount: u64,
    #[serde(default = "default_method")]
    method: String,
    description: Option<String>,
    asset_id: Option<String>,
}

fn default_method() -> String {
    "LIGHTNING".to_string()
}

#[derive(Deserialize)]
struct SendOnchainBody {
    address: String,
    amount_sat: Option<u64>,
    #[serde(default)]
    drain: bool,
    fee_rate_sat_per_vbyte: Option<u32>,
}

#[derive(Serialize)]
struct SendOnchainResponse {
    status: &'static str,
    address: String,
    fees_sat: u64,
}

#[derive(Deserialize)]
struct ListPaymentsQuery {
    from_timestamp: Option<u64>,
    to_timestamp: Option<u64>,
    offset: Option<u32>,
    limit: Option<u32>,
}

#[derive(Serialize)]
struct PaymentListResponse {
    payments: Vec<Payment>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    engine_synced: bool,
}

#[derive(Serialize)]
struct RatesResponse {
    rates: HashMap<String, f64>,
}

#[derive(Serialize)]
struct RateResponse {
    currency: String,
    rate: f64,
}

#[derive(Deserialize)]
struct SignMessageBody {
    message: String,
}

#[derive(Deserialize)]
struct CheckMessageBody {
    message: String,
    pubkey: String,
    signature: String,
}

#[derive(Serialize)]
struct CheckMessageResult {
    is_valid: bool,
}

#[derive(Deserialize)]
struct ParseInputBody {
    input: String,
}

#[derive(Deserialize)]
struct PrepareLnurlPayBody {
    data: LnUrlPayRequestData,
    amount_sat: u64,
    comment: Option<String>,
    validate_success_action_url: Option<bool>,
}

#[derive(Deserialize)]
struct LnurlPayBody {
    prepare_response: PrepareLnUrlPayResponse,
}

#[derive(Deserialize)]
struct LnurlAuthBody {
    data: LnUrlAuthRequestData,
}

#[derive(Serialize)]
struct LnurlAuthResult {
    success: bool,
}

#[derive(Deserialize)]
struct LnurlWithdrawBody {
    data: LnUrlWithdrawRequestData,
    amount_msat: u64,
    description: Option<String>,
}

// ==================== Handlers ====================

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        engine_synced: state.gateway.is_synced().await,
    })
}

async fn send_payment(
    State(state): State<AppState>,
    Json(body): Json<SendPaymentArgs>,
) -> Result<Json<SendPaymentOutcome>, ApiError> {
    let handler = state.gateway.handler().await?;
    Ok(Json(handler.send_payment(body).await?))
}

async fn receive_payment(
    State(state): State<AppState>,
    Json(body): Json<ReceivePaymentBody>,
) -> Result<Json<ReceivePaymentOutcome>, ApiError> {
    let handler = state.gateway.handler().await?;
    let outcome = handler
        .receive_payment(body.amount, &body.method, body.description, body.asset_id)
        .await?;
    Ok(Json(outcome))
}

async fn send_onchain(
    State(state): State<AppState>,
    Json(body): Json<SendOnchainBody>,
) -> Result<Json<SendOnchainResponse>, ApiError> {
    let handler = state.gateway.handler().await?;
    let prepared = handler
        .prepare_pay_onchain(body.amount_sat, body.drain, body.fee_rate_sat_per_vbyte)
        .await?;
    let fees_sat = prepared.total_fees_sat;
    handler.pay_onchain(&body.address, prepared).await?;
    Ok(Json(SendOnchainResponse {
        status: "initiated",
        address: body.address,
        fees_sat,
    }))
}

async fn list_payments(
    State(state): State<AppState>,
    Query(query): Query<ListPaymentsQuery>,
) -> Result<Json<PaymentListResponse>, ApiError> {
    let handler = state.gateway.handler().await?;
    let payments = handler
        .list_payments(ListPaymentsRequest {
            from_timestamp: query.from_timestamp,
            to_timestamp: query.to_timestamp,
            offset: query.offset,
            limit: query.limit,
            ..Default::default()
        })
        .await?;
    Ok(Json(PaymentListResponse { payments }))
}

async fn check_payment_status(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> Result<Json<PaymentStatus>, ApiError> {
    let handler = state.gateway.handler().await?;
    Ok(Json(handler.check_payment_status(&identifier).await?))
}

async fn lightning_limits(
    State(state): State<AppState>,
) -> Result<Json<PaymentLimits>, ApiError> {
    let handler = state.gateway.handler().await?;
    Ok(Json(handler.fetch_lightning_limits().await?))
}

async fn onchain_limits(State(state): State<AppState>) -> Result<Json<PaymentLimits>, ApiError> {
    let handler = state.gateway.handler().await?;
    Ok(Json(handler.fetch_onchain_limits().await?))
}

async fn recommended_fees(
    State(state): State<AppState>,
) -> Result<Json<RecommendedFees>, ApiError> {
    let handler = state.gateway.handler().await?;
    Ok(Json(handler.recommended_fees().await?))
}

async fn all_exchange_rates(
    State(state): State<AppState>,
) -> Result<Json<RatesResponse>, ApiError> {
    let handler = state.gateway.handler().await?;
    let rates = handler
        .fetch_fiat_rates()
        .await?
        .into_iter()
        .map(|rate| (rate.coin, rate.value))
        .collect();
    Ok(Json(RatesResponse { rates }))
}

async fn exchange_rate(
    State(state): State<AppState>,
    Path(currency): Path<String>,
) -> Result<Json<RateResponse>, ApiError> {
    let handler = state.gateway.handler().await?;
    let rate = handler.exchange_rate(&currency).await?;
    Ok(Json(RateResponse {
        currency: rate.coin,
        rate: rate.value,
    }))
}

async fn sign_message(
    State(state): State<AppState>,
    Json(body): Json<SignMessageBody>,
) -> Result<Json<SignedMessage>, ApiError> {
    let handler = state.gateway.handler().await?;
    Ok(Json(handler.sign_message(&body.message).await?))
}

async fn check_message(
    State(state): State<AppState>,
    Json(body): Json<CheckMessageBody>,
) -> Result<Json<CheckMessageResult>, ApiError> {
    let handler = state.gateway.handler().await?;
    let is_valid = handler
        .check_message(&body.message, &body.pubkey, &body.signature)
        .await?;
    Ok(Json(CheckMessageResult { is_valid }))
}

async fn parse_input(
    State(state): State<AppState>,
    Json(body): Json<ParseInputBody>,
) -> Result<Json<InputType>, ApiError> {
    let handler = state.gateway.handler().await?;
    Ok(Json(handler.parse_input(&body.input).await?))
}

async fn prepare_lnurl_pay(
    State(state): State<AppState>,
    Json(body): Json<PrepareLnurlPayBody>,
) -> Result<Json<PrepareLnUrlPayResponse>, ApiError> {
    let handler = state.gateway.handler().await?;
    let response = handler
        .prepare_lnurl_pay(
            body.data,
            body.amount_sat,
            body.comment,
            body.validate_success_action_url,
        )
        .await?;
    Ok(Json(response))
}

async fn lnurl_pay(
    State(state): State<AppState>,
    Json(body): Json<LnurlPayBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let handler = state.gateway.handler().await?;
    let result = handler.lnurl_pay(body.prepare_response).await?;
    let value = serde_json::to_value(result)
        .map_err(|e| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(Json(value))
}

async fn lnurl_auth(
    State(state): State<AppState>,
    Json(body): Json<LnurlAuthBody>,
) -> Result<Json<LnurlAuthResult>, ApiError> {
    let handler = state.gateway.handler().await?;
    let success = handler.lnurl_auth(body.data).await?;
    Ok(Json(LnurlAuthResult { success }))
}

async fn lnurl_withdraw(
    State(state): State<AppState>,
    Json(body): Json<LnurlWithdrawBody>,
) -> Result<Json<LnUrlCallbackStatus>, ApiError> {
    let handler = state.gateway.handler().await?;
    let status = handler
        .lnurl_withdraw(body.data, body.amount_msat, body.description)
        .await?;
    Ok(Json(status))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"secret", b"secret"));
        assert!(!constant_time_eq(b"secret", b"secrex"));
        assert!(!constant_time_eq(b"secret", b"secre"));
        assert!(constant_time_eq(b"", b""));
    }

    #[test]
    fn test_core_error_mapping() {
        let err: ApiError = CoreError::InvalidArgument("bad".to_string()).into();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);

        let err: ApiError = CoreError::RateUnavailable("XXX".to_string()).into();
        assert_eq!(err.status, StatusCode::NOT_FOUND);

        let err: ApiError =
            CoreError::Engine(tidepay::EngineError::NotFound).into();
        assert_eq!(err.status, StatusCode::BAD_GATEWAY);
    }
}
