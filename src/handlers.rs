use crate::auth::TokenVerifier;
use crate::cache::FileCache;
use crate::config::Config;
use crate::errors::AppError;
use crate::mapping;
use crate::models::EvaluateResponse;
use crate::services::SyntageService;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;

/// Shared application state injected into handlers.
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Durable TTL cache for proxied insight responses.
    pub cache: FileCache,
    /// Client for the Syntage insights API.
    pub syntage: SyntageService,
    /// Firebase ID-token verifier used by the auth middleware.
    pub verifier: TokenVerifier,
}

/// Health check endpoint.
///
/// Returns the service status, version, and health information.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "rust-insights-api",
            "version": "0.1.0"
        })),
    )
}

/// POST /map-to-evaluate-request
///
/// Accepts the full composite insights document (no strict validation,
/// legacy integrations send varying shapes) and returns the normalized
/// four-block evaluation document.
pub async fn map_to_evaluate_request(
    Json(payload): Json<Value>,
) -> Result<Json<EvaluateResponse>, AppError> {
    if !payload.is_object() {
        return Err(AppError::BadRequest(
            "Request body must be a JSON object".to_string(),
        ));
    }

    match payload.get("summaryData") {
        Some(Value::Object(summary)) if !summary.is_empty() => {}
        _ => {
            return Err(AppError::BadRequest("summaryData is required".to_string()));
        }
    }

    if let Some(rfc) = payload
        .get("summaryData")
        .and_then(|s| s.get("rfc"))
        .and_then(Value::as_str)
    {
        if !mapping::is_valid_rfc(rfc) {
            tracing::warn!("summaryData.rfc has unexpected format: {}", rfc);
        }
    }

    let result = mapping::map_to_evaluate_request(&payload, Utc::now());
    Ok(Json(result))
}

/// POST /map-to-evaluate-request-by-ids
///
/// Alternative entry point taking entity/business ids. Aggregating the
/// source documents server-side still depends on upstream endpoints that
/// do not expose the summary section, so this validates the ids and
/// points the caller at the full-document endpoint.
pub async fn map_to_evaluate_request_by_ids(
    Json(payload): Json<Value>,
) -> Result<Json<Value>, AppError> {
    let entity_id = payload
        .get("entity_id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::BadRequest("entity_id is required".to_string()))?;
    let business_id = payload
        .get("business_id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::BadRequest("business_id is required".to_string()))?;

    Ok(Json(json!({
        "message": "Esta funcionalidad requiere integración con los endpoints existentes",
        "entity_id": entity_id,
        "business_id": business_id,
        "note": "Use el endpoint /map-to-evaluate-request con datos completos por ahora"
    })))
}

/// Shared proxy path: cache lookup, upstream fetch, cache fill.
async fn proxy_insight(state: &AppState, path: String) -> Result<Json<Value>, AppError> {
    let data = state.syntage.fetch_insight(&state.cache, &path).await?;
    Ok(Json(data))
}

/// GET /invoicing-annual-comparison/:entity_id
pub async fn invoicing_annual_comparison(
    State(state): State<Arc<AppState>>,
    Path(entity_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    tracing::info!("GET /invoicing-annual-comparison/{}", entity_id);
    proxy_insight(
        &state,
        format!(
            "entities/{}/insights/metrics/invoicing-annual-comparison",
            entity_id
        ),
    )
    .await
}

/// GET /vendor-network-insight/:entity_id
pub async fn vendor_network_insight(
    State(state): State<Arc<AppState>>,
    Path(entity_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    tracing::info!("GET /vendor-network-insight/{}", entity_id);
    proxy_insight(
        &state,
        format!("entities/{}/insights/metrics/vendor-network", entity_id),
    )
    .await
}

/// GET /customer-network-insight/:entity_id
pub async fn customer_network_insight(
    State(state): State<Arc<AppState>>,
    Path(entity_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    tracing::info!("GET /customer-network-insight/{}", entity_id);
    proxy_insight(
        &state,
        format!("entities/{}/insights/metrics/customer-network", entity_id),
    )
    .await
}

/// GET /customer-invoice-concentration/:entity_id
pub async fn customer_invoice_concentration(
    State(state): State<Arc<AppState>>,
    Path(entity_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    tracing::info!("GET /customer-invoice-concentration/{}", entity_id);
    proxy_insight(
        &state,
        format!("insights/{}/customer-concentration", entity_id),
    )
    .await
}

/// GET /financial-ratios/:business_id
pub async fn financial_ratios(
    State(state): State<Arc<AppState>>,
    Path(business_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    tracing::info!("GET /financial-ratios/{}", business_id);
    proxy_insight(&state, format!("insights/{}/financial-ratios", business_id)).await
}

/// GET /financial-institutions/:business_id
pub async fn financial_institutions(
    State(state): State<Arc<AppState>>,
    Path(business_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    tracing::info!("GET /financial-institutions/{}", business_id);
    proxy_insight(
        &state,
        format!("insights/{}/financial-institutions", business_id),
    )
    .await
}

/// GET /supplier-invoice-concentration/:business_id
pub async fn supplier_invoice_concentration(
    State(state): State<Arc<AppState>>,
    Path(business_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    tracing::info!("GET /supplier-invoice-concentration/{}", business_id);
    proxy_insight(
        &state,
        format!("insights/{}/supplier-concentration", business_id),
    )
    .await
}

/// GET /employees/:business_id
pub async fn employees(
    State(state): State<Arc<AppState>>,
    Path(business_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    tracing::info!("GET /employees/{}", business_id);
    proxy_insight(&state, format!("insights/{}/employees", business_id)).await
}

/// GET /expenditures/:business_id
pub async fn expenditures(
    State(state): State<Arc<AppState>>,
    Path(business_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    tracing::info!("GET /expenditures/{}", business_id);
    proxy_insight(&state, format!("insights/{}/expenditures", business_id)).await
}

/// GET /government-customers/:business_id
pub async fn government_customers(
    State(state): State<Arc<AppState>>,
    Path(business_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    tracing::info!("GET /government-customers/{}", business_id);
    proxy_insight(
        &state,
        format!("insights/{}/government-customers", business_id),
    )
    .await
}

/// GET /invoicing-blacklist/:business_id
pub async fn invoicing_blacklist(
    State(state): State<Arc<AppState>>,
    Path(business_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    tracing::info!("GET /invoicing-blacklist/{}", business_id);
    proxy_insight(
        &state,
        format!("insights/{}/invoicing-blacklist", business_id),
    )
    .await
}

/// GET /risk-calculations/:business_id
pub async fn risk_calculations(
    State(state): State<Arc<AppState>>,
    Path(business_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    tracing::info!("GET /risk-calculations/{}", business_id);
    proxy_insight(&state, format!("insights/{}/risks", business_id)).await
}

/// GET /sales-revenue/:business_id
pub async fn sales_revenue(
    State(state): State<Arc<AppState>>,
    Path(business_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    tracing::info!("GET /sales-revenue/{}", business_id);
    proxy_insight(&state, format!("insights/{}/sales-revenue", business_id)).await
}
