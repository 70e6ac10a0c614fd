//! Simple REST API server example for the marketplace core.
//!
//! Run with: `cargo run --example server`
//!
//! ## Endpoints
//!
//! - `POST /accounts` - Open a provider account
//! - `GET /accounts` - List all accounts
//! - `GET /accounts/:id` - Get an account by ID
//! - `POST /requests` - Publish a service request
//! - `GET /requests` - List all requests
//! - `POST /contacts/quote` - Price a contact without committing
//! - `POST /contacts` - Purchase contact with a request
//! - `POST /payments/webhook` - Apply a payment-processor event
//! - `POST /topup/sweep` - Run the auto top-up sweep now
//!
//! ## Example Usage
//!
//! ```bash
//! # Open an account and credit it via a (fake) webhook
//! curl -X POST http://localhost:3000/accounts \
//!   -H "Content-Type: application/json" -d '{"account_id": 1}'
//! curl -X POST http://localhost:3000/payments/webhook \
//!   -H "Content-Type: application/json" \
//!   -d '{"status": "succeeded", "reference": "pi_1", "account_id": 1,
//!        "credits": 100, "amount_minor": 2500, "purpose": "credit_purchase"}'
//!
//! # Publish a request and buy contact with it
//! curl -X POST http://localhost:3000/requests \
//!   -H "Content-Type: application/json" \
//!   -d '{"customer_id": 50, "category": "plumbing", "city": "London"}'
//! curl -X POST http://localhost:3000/contacts \
//!   -H "Content-Type: application/json" \
//!   -d '{"provider_id": 1, "request_id": 1, "message": "Can start Monday"}'
//! ```

use async_trait::async_trait;
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::Utc;
use leadmarket_rs::{
    AccountId, AutoTopUpSweeper, ChargeRequest, ContactWorkflow, CoreError, EventQueue,
    GatewayError, LeadRequest, Ledger, PaymentEvent, PaymentGateway, PaymentPurpose,
    PaymentReconciler, PricingConfig, RequestBoard, RequestId, SweepConfig, Urgency,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::net::TcpListener;

// === Request/Response DTOs ===

/// Request body for publishing a service request.
#[derive(Debug, Deserialize)]
pub struct PublishRequest {
    pub customer_id: u64,
    pub category: String,
    pub city: Option<String>,
    pub budget: Option<i64>,
    pub urgency: Option<Urgency>,
    #[serde(default)]
    pub promotional: bool,
}

#[derive(Debug, Deserialize)]
pub struct OpenAccountRequest {
    pub account_id: u64,
}

#[derive(Debug, Deserialize)]
pub struct ContactRequest {
    pub provider_id: u64,
    pub request_id: u64,
    pub message: Option<String>,
}

/// Response body for account information.
#[derive(Debug, Serialize)]
pub struct AccountResponse {
    pub account: u64,
    pub balance: i64,
    pub leads_contacted: u64,
    pub credits_spent: u64,
    pub credits_purchased: u64,
}

#[derive(Debug, Serialize)]
pub struct ContactResponse {
    pub request_id: u64,
    pub provider_id: u64,
    pub cost: u32,
    pub free: bool,
    pub new_balance: i64,
}

/// Response body for errors.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

// === Application State ===

/// Shared application state wiring the core components together.
#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<Ledger>,
    pub board: Arc<RequestBoard>,
    pub events: Arc<EventQueue>,
    pub workflow: Arc<ContactWorkflow>,
    pub reconciler: Arc<PaymentReconciler>,
    pub sweeper: Arc<AutoTopUpSweeper>,
    pub next_request_id: Arc<AtomicU64>,
}

/// Demo gateway: accepts every charge and immediately reports success back
/// through the reconciler, standing in for the webhook round trip.
struct InstantGateway {
    ledger: Arc<Ledger>,
    reconciler: Arc<PaymentReconciler>,
}

#[async_trait]
impl PaymentGateway for InstantGateway {
    async fn charge(&self, request: &ChargeRequest) -> Result<(), GatewayError> {
        let credits = self
            .ledger
            .entry_by_ref(&request.reference)
            .map(|entry| entry.amount as u32)
            .unwrap_or(0);
        let _ = self.reconciler.apply(PaymentEvent::Succeeded {
            reference: request.reference.clone(),
            account_id: request.account_id,
            credits,
            amount_minor: request.amount_minor,
            purpose: PaymentPurpose::AutoTopUp,
        });
        Ok(())
    }

    // demo gateway: decodes without checking the signature
    fn verify_webhook_signature(
        &self,
        payload: &[u8],
        _signature: &str,
    ) -> Result<PaymentEvent, GatewayError> {
        serde_json::from_slice(payload).map_err(|e| GatewayError::Permanent(e.to_string()))
    }
}

// === Error Handling ===

/// Wrapper for converting `CoreError` into HTTP responses.
pub struct AppError(CoreError);

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        AppError(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = match &self.0 {
            CoreError::InvalidAmount => (StatusCode::BAD_REQUEST, "INVALID_AMOUNT"),
            CoreError::InsufficientCredits => {
                (StatusCode::UNPROCESSABLE_ENTITY, "INSUFFICIENT_CREDITS")
            }
            CoreError::AccountNotFound => (StatusCode::NOT_FOUND, "ACCOUNT_NOT_FOUND"),
            CoreError::RequestNotFound => (StatusCode::NOT_FOUND, "REQUEST_NOT_FOUND"),
            CoreError::RequestExpiredOrInactive => (StatusCode::GONE, "REQUEST_INACTIVE"),
            CoreError::DuplicateContact => (StatusCode::CONFLICT, "DUPLICATE_CONTACT"),
            CoreError::PaymentRefNotFound => (StatusCode::NOT_FOUND, "PAYMENT_REF_NOT_FOUND"),
            CoreError::PaymentRefInUse => (StatusCode::CONFLICT, "PAYMENT_REF_IN_USE"),
            CoreError::PurchaseAlreadyPending => {
                (StatusCode::CONFLICT, "PURCHASE_ALREADY_PENDING")
            }
            CoreError::AutoTopUpNotConfigured => {
                (StatusCode::BAD_REQUEST, "AUTO_TOP_UP_NOT_CONFIGURED")
            }
            CoreError::LedgerInconsistency { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "LEDGER_INCONSISTENCY")
            }
        };

        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
                code: code.to_string(),
            }),
        )
            .into_response()
    }
}

// === Handlers ===

/// POST /accounts - Open a provider account.
async fn open_account(
    State(state): State<AppState>,
    Json(request): Json<OpenAccountRequest>,
) -> StatusCode {
    if state.ledger.open_account(AccountId(request.account_id)) {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    }
}

/// GET /accounts/:id - Get account by ID.
async fn get_account(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<AccountResponse>, AppError> {
    let account_id = AccountId(id);
    let balance = state.ledger.balance(account_id)?;
    let stats = state.ledger.stats(account_id)?;
    Ok(Json(AccountResponse {
        account: id,
        balance,
        leads_contacted: stats.leads_contacted,
        credits_spent: stats.credits_spent,
        credits_purchased: stats.credits_purchased,
    }))
}

/// GET /accounts - List all accounts.
async fn list_accounts(State(state): State<AppState>) -> Json<Vec<AccountResponse>> {
    let accounts = state
        .ledger
        .account_ids()
        .into_iter()
        .filter_map(|account_id| {
            let balance = state.ledger.balance(account_id).ok()?;
            let stats = state.ledger.stats(account_id).ok()?;
            Some(AccountResponse {
                account: account_id.0,
                balance,
                leads_contacted: stats.leads_contacted,
                credits_spent: stats.credits_spent,
                credits_purchased: stats.credits_purchased,
            })
        })
        .collect();
    Json(accounts)
}

/// POST /requests - Publish a service request.
async fn publish_request(
    State(state): State<AppState>,
    Json(body): Json<PublishRequest>,
) -> (StatusCode, Json<serde_json::Value>) {
    let id = RequestId(state.next_request_id.fetch_add(1, Ordering::Relaxed));
    let mut request = LeadRequest::new(id, AccountId(body.customer_id), body.category, Utc::now());
    request.city = body.city;
    request.budget = body.budget;
    request.urgency = body.urgency.unwrap_or(Urgency::Flexible);
    request.promotional = body.promotional;
    state.board.publish(request);
    (
        StatusCode::CREATED,
        Json(serde_json::json!({ "request_id": id.0 })),
    )
}

/// GET /requests - List all requests.
async fn list_requests(State(state): State<AppState>) -> Json<Vec<LeadRequest>> {
    Json(state.board.snapshot())
}

/// POST /contacts/quote - Price a contact without committing.
async fn quote_contact(
    State(state): State<AppState>,
    Json(body): Json<ContactRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let quote = state.workflow.check_contact(
        AccountId(body.provider_id),
        RequestId(body.request_id),
        Utc::now(),
    )?;
    Ok(Json(serde_json::json!({
        "cost": quote.cost,
        "free": quote.free,
        "balance": quote.balance,
        "affordable": quote.affordable,
    })))
}

/// POST /contacts - Purchase contact with a request.
async fn commit_contact(
    State(state): State<AppState>,
    Json(body): Json<ContactRequest>,
) -> Result<(StatusCode, Json<ContactResponse>), AppError> {
    let receipt = state.workflow.commit_contact(
        AccountId(body.provider_id),
        RequestId(body.request_id),
        body.message,
        Utc::now(),
    )?;
    Ok((
        StatusCode::CREATED,
        Json(ContactResponse {
            request_id: receipt.request_id.0,
            provider_id: receipt.provider_id.0,
            cost: receipt.cost,
            free: receipt.free,
            new_balance: receipt.new_balance,
        }),
    ))
}

/// POST /payments/webhook - Apply a payment-processor event.
async fn payment_webhook(
    State(state): State<AppState>,
    Json(event): Json<PaymentEvent>,
) -> Result<StatusCode, AppError> {
    state.reconciler.apply(event)?;
    Ok(StatusCode::OK)
}

/// POST /topup/sweep - Run the auto top-up sweep now.
async fn run_sweep(State(state): State<AppState>) -> Json<serde_json::Value> {
    let report = state.sweeper.run_sweep().await;
    Json(serde_json::json!({
        "eligible": report.eligible,
        "charged": report.charged,
        "failed": report.failed,
        "skipped": report.skipped,
    }))
}

// === Router ===

fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/accounts", post(open_account).get(list_accounts))
        .route("/accounts/{id}", get(get_account))
        .route("/requests", post(publish_request).get(list_requests))
        .route("/contacts/quote", post(quote_contact))
        .route("/contacts", post(commit_contact))
        .route("/payments/webhook", post(payment_webhook))
        .route("/topup/sweep", post(run_sweep))
        .with_state(state)
}

// === Main ===

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let ledger = Arc::new(Ledger::new());
    let board = Arc::new(RequestBoard::new());
    let events = Arc::new(EventQueue::new());
    let workflow = Arc::new(ContactWorkflow::new(
        Arc::clone(&ledger),
        Arc::clone(&board),
        PricingConfig::default(),
        Arc::clone(&events),
    ));
    let reconciler = Arc::new(PaymentReconciler::new(
        Arc::clone(&ledger),
        Arc::clone(&events),
    ));
    let gateway = Arc::new(InstantGateway {
        ledger: Arc::clone(&ledger),
        reconciler: Arc::clone(&reconciler),
    });
    let sweeper = Arc::new(AutoTopUpSweeper::new(
        Arc::clone(&ledger),
        gateway,
        Arc::clone(&events),
        SweepConfig::default(),
    ));

    let state = AppState {
        ledger,
        board,
        events,
        workflow,
        reconciler,
        sweeper,
        next_request_id: Arc::new(AtomicU64::new(1)),
    };

    let app = create_router(state);

    let listener = TcpListener::bind("127.0.0.1:3000").await.unwrap();
    println!("Marketplace API server running on http://127.0.0.1:3000");
    println!();
    println!("Endpoints:");
    println!("  POST /accounts          - Open a provider account");
    println!("  GET  /accounts          - List all accounts");
    println!("  GET  /accounts/:id      - Get account by ID");
    println!("  POST /requests          - Publish a service request");
    println!("  GET  /requests          - List all requests");
    println!("  POST /contacts/quote    - Price a contact");
    println!("  POST /contacts          - Purchase contact with a request");
    println!("  POST /payments/webhook  - Apply a payment event");
    println!("  POST /topup/sweep       - Run the auto top-up sweep");

    axum::serve(listener, app).await.unwrap();
}
