// Request handlers for API endpoints

use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{Local, SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info, warn};

use crate::api::middleware::extract_admin_key_parts;
use crate::api::responses::{
    ApiError, FlowError, HealthResponse, SubmitResponse, UploadResponse,
};
use crate::api::AppState;
use crate::core::csv::export_csv;
use crate::core::models::{
    new_registration_id, receipt_indirection_token, FullRegistration, PaymentStatus, Registration,
    SubmitRegistration,
};
use crate::core::pricing;
use crate::core::receipt::ReceiptBlob;
use std::str::FromStr;

/// User-facing failure message for the submission flow; storage detail
/// stays in the logs.
const SUBMIT_ERROR_MESSAGE: &str =
    "Erro ao salvar inscrição. Por favor, verifique a configuração do servidor e tente novamente.";

/// Submit a new registration
///
/// POST /api/inscricoes
///
/// Request flow:
/// 1. Mint a fresh id and submission timestamp
/// 2. Compute the fee from the pricing policy (client-supplied money
///    fields are never trusted)
/// 3. Persist the admin summary record (primary write; appends to the
///    index internally)
/// 4. Persist the full record for the payment page (primary write)
/// 5. Return `{success, id}` so the client can redirect to payment
pub async fn submit_registration_handler(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Json(form): Json<SubmitRegistration>,
) -> Result<Json<SubmitResponse>, FlowError> {
    let request_id = headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let now = Utc::now();
    let id = new_registration_id(now);
    let data_inscricao = now.to_rfc3339_opts(SecondsFormat::Millis, true);

    // Pricing is evaluated on the server at submission time, local
    // wall-clock, end-of-day inclusive on the cutoff dates
    let valor_inscricao = pricing::registration_fee(Local::now().naive_local());
    let valor_camisa = pricing::shirt_fee(form.quero_camisa);
    let valor_total = valor_inscricao + valor_camisa;

    let full = FullRegistration {
        form,
        valor_inscricao,
        valor_camisa,
        valor_total,
        data_inscricao,
        id: id.clone(),
    };
    let summary = Registration::summary_of(&full);

    info!(
        id = %id,
        request_id = %request_id,
        valor_total = valor_total,
        wants_shirt = %summary.wants_shirt,
        "Received registration submission"
    );

    app_state.registrations.create(&summary).await.map_err(|e| {
        error!(error = %e, id = %id, request_id = %request_id, "Failed to persist summary record");
        FlowError::from_app_error(&e, SUBMIT_ERROR_MESSAGE)
    })?;

    app_state.full_records.put(&full).await.map_err(|e| {
        error!(error = %e, id = %id, request_id = %request_id, "Failed to persist full record");
        FlowError::from_app_error(&e, SUBMIT_ERROR_MESSAGE)
    })?;

    info!(id = %id, request_id = %request_id, "Registration saved");

    Ok(Json(SubmitResponse {
        success: true,
        message: "Inscrição salva com sucesso!".to_string(),
        id,
    }))
}

/// Query parameters for fetching registrations
#[derive(Debug, Deserialize)]
pub struct InscricoesQuery {
    pub id: Option<String>,
    pub k: Option<String>,
}

/// Fetch a registration by id, or list all (admin-gated)
///
/// GET /api/inscricoes?id={id} - full record for the payment page; when
/// the full record has expired, a degraded projection built from the
/// summary is returned instead (better than nothing).
///
/// GET /api/inscricoes - full listing; requires the admin credential and
/// answers 404 without it, exactly like an unknown route.
pub async fn get_registrations_handler(
    State(app_state): State<AppState>,
    Query(query): Query<InscricoesQuery>,
    headers: HeaderMap,
) -> Result<Response, FlowError> {
    let Some(id) = query.id.as_deref().filter(|id| !id.is_empty()) else {
        return list_registrations(&app_state, query.k.as_deref(), &headers).await;
    };

    match app_state.full_records.get(id).await {
        Ok(Some(full)) => return Ok(Json(json!({ "inscricao": full })).into_response()),
        Ok(None) => {}
        Err(e) => {
            error!(error = %e, id = %id, "Failed to fetch full record");
            return Err(FlowError::from_app_error(&e, "Erro ao buscar inscrição"));
        }
    }

    // Full record expired or never written: degrade to the summary
    let summary = app_state.registrations.get(id).await.map_err(|e| {
        error!(error = %e, id = %id, "Failed to fetch summary record");
        FlowError::from_app_error(&e, "Erro ao buscar inscrição")
    })?;

    match summary {
        Some(reg) => {
            let wants_shirt = reg.wants_shirt == "true";
            let projection = json!({
                "inscricao": {
                    "id": reg.id,
                    "nomeAcampante": reg.name,
                    "celularResponsavelLegal": reg.phone,
                    "idadeAcampante": reg.age,
                    "cidadeResponsavel": reg.city,
                    "queroCamisa": wants_shirt,
                    "tamanhoCamisa": reg.shirt_size,
                    "valorInscricao": 0,
                    "valorCamisa": pricing::shirt_fee(wants_shirt),
                    "valorTotal": 0,
                }
            });
            Ok(Json(projection).into_response())
        }
        None => Ok((StatusCode::NOT_FOUND, Json(json!({ "inscricao": null }))).into_response()),
    }
}

async fn list_registrations(
    app_state: &AppState,
    query_key: Option<&str>,
    headers: &HeaderMap,
) -> Result<Response, FlowError> {
    let supplied = extract_admin_key_parts(query_key, headers);
    if !app_state.admin_gate.validate(supplied.as_deref()) {
        return Ok((StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" }))).into_response());
    }

    let registrations = app_state.registrations.list_all().await.map_err(|e| {
        error!(error = %e, "Failed to list registrations");
        FlowError::from_app_error(&e, "Erro ao buscar inscrições")
    })?;

    Ok(Json(json!({ "inscricoes": registrations })).into_response())
}

/// Upload a payment receipt
///
/// POST /api/comprovante
///
/// Multipart form: file field `comprovante`, text field `inscricaoId`.
/// Validates content type against the allow-list and size against the
/// 5 MiB ceiling before anything is persisted. The blob write is primary;
/// pointing the summary record at it is best-effort (a missing reference
/// just reads as "no receipt yet" in the admin panel).
pub async fn upload_receipt_handler(
    State(app_state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, FlowError> {
    let mut file: Option<(String, String, Vec<u8>)> = None;
    let mut inscricao_id: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        warn!(error = %e, "Malformed multipart payload");
        FlowError::validation("Dados incompletos")
    })? {
        let name = field.name().map(|s| s.to_string());
        match name.as_deref() {
            Some("comprovante") => {
                let filename = field.file_name().unwrap_or("comprovante").to_string();
                let content_type = field.content_type().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(|e| {
                    warn!(error = %e, "Failed to read uploaded file");
                    FlowError::validation("Dados incompletos")
                })?;
                file = Some((filename, content_type, bytes.to_vec()));
            }
            Some("inscricaoId") => {
                let value = field.text().await.map_err(|e| {
                    warn!(error = %e, "Failed to read inscricaoId field");
                    FlowError::validation("Dados incompletos")
                })?;
                inscricao_id = Some(value);
            }
            _ => {}
        }
    }

    let (filename, content_type, bytes) =
        file.ok_or_else(|| FlowError::validation("Dados incompletos"))?;
    let id = inscricao_id
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| FlowError::validation("Dados incompletos"))?;

    info!(
        id = %id,
        filename = %filename,
        content_type = %content_type,
        size = bytes.len(),
        "Received receipt upload"
    );

    ReceiptBlob::validate(&content_type, bytes.len())
        .map_err(|e| FlowError::from_app_error(&e, "Arquivo inválido"))?;

    let blob = ReceiptBlob {
        content_type,
        bytes,
    };

    app_state.receipts.put(&id, &blob).await.map_err(|e| {
        error!(error = %e, id = %id, "Failed to store receipt blob");
        FlowError::from_app_error(&e, "Erro ao salvar comprovante no banco de dados")
    })?;

    // Best-effort secondary write: the blob is durable either way and
    // stays retrievable by id until the reference catches up
    let token = receipt_indirection_token(&id);
    if let Err(e) = app_state.registrations.set_receipt_ref(&id, &token).await {
        warn!(
            error = %e,
            id = %id,
            "Failed to update receipt reference on summary record"
        );
    }

    let extension = filename.rsplit('.').next().unwrap_or("bin");
    let arquivo = format!("{}-{}.{}", id, Utc::now().timestamp_millis(), extension);

    info!(id = %id, arquivo = %arquivo, "Receipt stored");

    Ok(Json(UploadResponse {
        success: true,
        message: "Comprovante enviado com sucesso!".to_string(),
        arquivo,
    }))
}

/// Fetch a stored receipt by registration id
///
/// GET /api/receipt/{id}
///
/// Returns the receipt as a directly displayable data URL; this is the
/// route internal `kv://receipt/` references resolve to.
pub async fn get_receipt_handler(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, FlowError> {
    match app_state.receipts.get(&id).await {
        Ok(Some(blob)) => Ok(Json(json!({
            "success": true,
            "receiptUrl": blob.to_data_url(),
        }))
        .into_response()),
        Ok(None) => Ok((
            StatusCode::NOT_FOUND,
            Json(json!({
                "success": false,
                "message": "Comprovante não encontrado",
            })),
        )
            .into_response()),
        Err(e) => {
            error!(error = %e, id = %id, "Failed to fetch receipt");
            Err(FlowError::from_app_error(&e, "Erro ao buscar comprovante"))
        }
    }
}

/// List all registrations (admin)
///
/// GET /api/admin/registrations
/// Gated by admin_gate_middleware.
pub async fn admin_list_handler(
    State(app_state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let registrations = app_state.registrations.list_all().await.map_err(|e| {
        error!(error = %e, "Failed to list registrations");
        ApiError::from_app_error(&e, "Erro ao buscar inscrições")
    })?;

    info!(count = registrations.len(), "Admin listing served");

    Ok(Json(json!({ "registrations": registrations })))
}

/// Body for the status patch endpoint
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
    #[serde(default)]
    pub payment_status: Option<String>,
}

/// Update the payment status of one registration (admin)
///
/// PATCH /api/admin/registrations/{id}
/// Gated by admin_gate_middleware. Any of the three states can be set at
/// any time, including moving approved back to pending.
pub async fn admin_update_status_handler(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<UpdateStatusRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let status = body
        .payment_status
        .as_deref()
        .and_then(|s| PaymentStatus::from_str(s).ok())
        .ok_or_else(|| ApiError::new(StatusCode::BAD_REQUEST, "paymentStatus inválido"))?;

    info!(id = %id, status = %status, "Admin status update");

    if !app_state.registrations.update_status(&id, status).await {
        return Err(ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "Erro ao atualizar status",
        ));
    }

    Ok(Json(json!({ "success": true })))
}

/// Fetch the full record of one registration (admin)
///
/// GET /api/admin/registrations/{id}/full
/// Gated by admin_gate_middleware.
pub async fn admin_full_record_handler(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let full = app_state.full_records.get(&id).await.map_err(|e| {
        error!(error = %e, id = %id, "Failed to fetch full record");
        ApiError::from_app_error(&e, "Erro ao buscar dados completos")
    })?;

    match full {
        Some(record) => Ok(Json(json!({ "inscricao": record }))),
        None => Err(ApiError::new(
            StatusCode::NOT_FOUND,
            "Inscrição não encontrada",
        )),
    }
}

/// Export all registrations as CSV (admin)
///
/// GET /api/admin/export.csv
/// Gated by admin_gate_middleware. UTF-8 with BOM so Excel opens it
/// correctly; standard quoting for awkward field values.
pub async fn admin_export_csv_handler(
    State(app_state): State<AppState>,
) -> Result<Response, ApiError> {
    let registrations = app_state.registrations.list_all().await.map_err(|e| {
        error!(error = %e, "Failed to export registrations");
        ApiError::from_app_error(&e, "Erro ao exportar CSV")
    })?;

    let csv = export_csv(&registrations);

    info!(count = registrations.len(), "CSV export served");

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"inscritos-acampamento-carnaval-2026.csv\"",
            ),
        ],
        csv,
    )
        .into_response())
}

/// Health check handler
///
/// GET /health
///
/// Reports store connectivity without blocking: a slow backend is
/// reported as slow, not as an outage.
pub async fn health_handler(State(app_state): State<AppState>) -> Json<HealthResponse> {
    let redis_status = match tokio::time::timeout(
        std::time::Duration::from_millis(500),
        app_state.registrations.ping(),
    )
    .await
    {
        Ok(Ok(())) => "connected".to_string(),
        Ok(Err(e)) => {
            warn!(error = %e, "Store ping failed");
            format!("error: {}", e.user_message())
        }
        Err(_) => "slow: timeout".to_string(),
    };

    Json(HealthResponse {
        status: "healthy".to_string(),
        redis: redis_status,
    })
}
