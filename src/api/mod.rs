// Axum web server layer

use axum::error_handling::HandleErrorLayer;
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use axum::{BoxError, Router};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

pub mod handlers;
pub mod middleware;
pub mod responses;

use crate::auth::AdminGate;
use crate::core::errors::AppError;
use crate::core::models::{FullRegistration, PaymentStatus, Registration};
use crate::core::receipt::ReceiptBlob;

/// Configuration struct
// Re-export Config from config module
pub use crate::config::Config;

/// Application state containing all shared dependencies
///
/// Store implementations sit behind trait seams so the key-value backend
/// is swappable (and mockable in tests). All components are wrapped in
/// Arc for shared ownership across async tasks.
#[derive(Clone)]
pub struct AppState {
    pub registrations: Arc<dyn RegistrationStore + Send + Sync>,
    pub full_records: Arc<dyn FullRecordStore + Send + Sync>,
    pub receipts: Arc<dyn ReceiptStore + Send + Sync>,
    pub admin_gate: Arc<AdminGate>,
    pub config: Arc<Config>,
}

/// Summary-record repository: owns the per-registration hash and the
/// creation-ordered index of all registration ids.
#[async_trait::async_trait]
pub trait RegistrationStore: Send + Sync {
    /// Persist a new summary record and append its id to the index.
    /// The record write is primary: if it fails the whole submission
    /// fails. The index append is secondary and tolerated on failure.
    async fn create(&self, registration: &Registration) -> Result<(), AppError>;

    /// Resolve one record; `None` when the id is unknown. Internal
    /// receipt indirections are rewritten to fetchable routes.
    async fn get(&self, id: &str) -> Result<Option<Registration>, AppError>;

    /// All records, sorted by creation time descending regardless of the
    /// physical order the index returns. Ids that fail to resolve are
    /// discarded (tolerant of partial writes).
    async fn list_all(&self) -> Result<Vec<Registration>, AppError>;

    /// In-place update of the payment status only. Idempotent; reports
    /// success as a bool since this is a retryable admin action.
    async fn update_status(&self, id: &str, status: PaymentStatus) -> bool;

    /// Point the summary record at an uploaded receipt.
    async fn set_receipt_ref(&self, id: &str, receipt_url: &str) -> Result<(), AppError>;

    /// Verify backend connectivity (health endpoint).
    async fn ping(&self) -> Result<(), AppError>;
}

/// Full-record cache: write-once complete submission payloads with
/// bounded retention, looked up by id only.
#[async_trait::async_trait]
pub trait FullRecordStore: Send + Sync {
    async fn put(&self, record: &FullRegistration) -> Result<(), AppError>;
    async fn get(&self, id: &str) -> Result<Option<FullRegistration>, AppError>;
}

/// Payment-proof blob storage, keyed by registration id, last-write-wins.
#[async_trait::async_trait]
pub trait ReceiptStore: Send + Sync {
    async fn put(&self, id: &str, blob: &ReceiptBlob) -> Result<(), AppError>;
    async fn get(&self, id: &str) -> Result<Option<ReceiptBlob>, AppError>;
}

/// Create the Axum router with all routes and middleware
///
/// Middleware stack (outermost to innermost):
/// - Request timeout (tower::timeout) with HandleErrorLayer mapping
///   `Elapsed` to 408
/// - Body size limit - sized above the receipt ceiling so multipart
///   uploads reach the validator instead of dying at the transport
/// - Admin gate (route_layer on /api/admin/* only) - rejects with the
///   same 404 a missing resource would produce
///
/// `GET /api/inscricoes` without an id is also admin-gated, but inline in
/// the handler since the same route serves the public payment page when
/// an id is present.
pub fn create_router(app_state: &AppState) -> Router<AppState> {
    let admin_routes = Router::new()
        .route("/api/admin/registrations", get(handlers::admin_list_handler))
        .route(
            "/api/admin/registrations/:id",
            patch(handlers::admin_update_status_handler),
        )
        .route(
            "/api/admin/registrations/:id/full",
            get(handlers::admin_full_record_handler),
        )
        .route("/api/admin/export.csv", get(handlers::admin_export_csv_handler))
        .route_layer(axum::middleware::from_fn_with_state(
            app_state.clone(),
            middleware::admin_gate_middleware,
        ));

    let mut router = Router::new()
        .route(
            "/api/inscricoes",
            post(handlers::submit_registration_handler).get(handlers::get_registrations_handler),
        )
        .route("/api/comprovante", post(handlers::upload_receipt_handler))
        .route("/api/receipt/:id", get(handlers::get_receipt_handler))
        .route("/health", get(handlers::health_handler))
        .merge(admin_routes);

    // Body size limit: axum's extractor limit and the tower-http layer
    // both sized from config (default is well above the 5 MiB receipt
    // ceiling so oversize files get the validation message, not a 413)
    let body_limit = app_state.config.body_size_limit_bytes;
    router = router
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Apply timeout layer with HandleErrorLayer to convert timeout errors
    // to HTTP responses. HandleErrorLayer must come BEFORE timeout to
    // catch the timeout error.
    let timeout_secs = app_state.config.request_timeout_secs;
    let middleware_stack = ServiceBuilder::new()
        .layer(HandleErrorLayer::new(|e: BoxError| async move {
            let status = if e.is::<tower::timeout::error::Elapsed>() {
                StatusCode::REQUEST_TIMEOUT
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            (status, e.to_string())
        }))
        .timeout(Duration::from_secs(timeout_secs))
        .into_inner();

    router.layer(middleware_stack)
}
