use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use rental_shared::{MethodReply, PaymentEntry};
use serde::{Deserialize, Serialize};
use crate::error::StoreError;
use crate::handlers::{MethodCall, MethodHandler};

#[derive(Clone)]
pub struct AppState {
    pub handler: MethodHandler,
}

#[derive(Debug, Deserialize)]
pub struct InvoiceUpdate {
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiResult = Result<Json<MethodReply>, (StatusCode, Json<ErrorResponse>)>;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/method/:method", post(call_method))
        .route("/webhooks/payment-entry", post(payment_entry))
        .route("/webhooks/sales-invoice", post(sales_invoice))
        .route("/health", get(health_check))
        .with_state(state)
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
}

fn bad_request(error: String) -> (StatusCode, Json<ErrorResponse>) {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse { error }))
}

fn respond(result: Result<MethodReply, StoreError>) -> ApiResult {
    match result {
        Ok(reply) => Ok(Json(reply)),
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: format!("Document store failure: {}", e),
            }),
        )),
    }
}

pub async fn call_method(State(state): State<AppState>, Path(method): Path<String>, body: Bytes) -> ApiResult {
    let args = if body.iter().all(u8::is_ascii_whitespace) {
        serde_json::Value::Object(Default::default())
    } else {
        serde_json::from_slice(&body).map_err(|e| bad_request(format!("Invalid JSON body: {}", e)))?
    };

    let call = MethodCall::parse(&method, args).map_err(|e| {
        tracing::info!("Rejected call to {}: {}", method, e);
        bad_request(format!("Cannot call {}: {}", method, e))
    })?;

    respond(state.handler.handle(call).await)
}

pub async fn payment_entry(State(state): State<AppState>, Json(payment): Json<PaymentEntry>) -> ApiResult {
    tracing::info!("Payment entry {} received", payment.name);
    respond(state.handler.handle_payment_entry(payment).await)
}

pub async fn sales_invoice(State(state): State<AppState>, Json(update): Json<InvoiceUpdate>) -> ApiResult {
    tracing::info!("Sales invoice {} updated", update.name);
    respond(state.handler.handle_invoice_update(&update.name).await)
}

pub async fn health_check() -> &'static str {
    "OK"
}
