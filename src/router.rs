//! Router construction: route table, auth middleware, and the security
//! layers shared by every protected endpoint.

use std::sync::Arc;

use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    middleware as axum_mw,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};

use crate::auth;
use crate::handlers::{self, AppState};

/// Build the full axum router with all routes and middleware.
///
/// Every route except `/health` requires a verified bearer token and sits
/// behind rate limiting and a request body size cap.
pub fn build_router(state: Arc<AppState>) -> Router {
    // Rate limiter: 10 requests/second per IP, burst of 20
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(10)
            .burst_size(20)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .unwrap(),
    );

    let cors = cors_layer(&state.config.allowed_origins);

    let protected_routes = Router::new()
        // Normalization endpoints
        .route(
            "/map-to-evaluate-request",
            post(handlers::map_to_evaluate_request),
        )
        .route(
            "/map-to-evaluate-request-by-ids",
            post(handlers::map_to_evaluate_request_by_ids),
        )
        // Syntage insight proxies (entity-scoped)
        .route(
            "/invoicing-annual-comparison/:entity_id",
            get(handlers::invoicing_annual_comparison),
        )
        .route(
            "/vendor-network-insight/:entity_id",
            get(handlers::vendor_network_insight),
        )
        .route(
            "/customer-network-insight/:entity_id",
            get(handlers::customer_network_insight),
        )
        .route(
            "/customer-invoice-concentration/:entity_id",
            get(handlers::customer_invoice_concentration),
        )
        // Syntage insight proxies (business-scoped)
        .route("/financial-ratios/:business_id", get(handlers::financial_ratios))
        .route(
            "/financial-institutions/:business_id",
            get(handlers::financial_institutions),
        )
        .route(
            "/supplier-invoice-concentration/:business_id",
            get(handlers::supplier_invoice_concentration),
        )
        .route("/employees/:business_id", get(handlers::employees))
        .route("/expenditures/:business_id", get(handlers::expenditures))
        .route(
            "/government-customers/:business_id",
            get(handlers::government_customers),
        )
        .route(
            "/invoicing-blacklist/:business_id",
            get(handlers::invoicing_blacklist),
        )
        .route("/risk-calculations/:business_id", get(handlers::risk_calculations))
        .route("/sales-revenue/:business_id", get(handlers::sales_revenue))
        .layer(axum_mw::from_fn_with_state(
            state.clone(),
            auth::require_auth,
        ))
        .layer(
            ServiceBuilder::new()
                // Request size limit: 5MB max payload (prevents memory exhaustion)
                .layer(RequestBodyLimitLayer::new(5 * 1024 * 1024))
                // Rate limiting: 10 req/sec per IP, burst of 20
                .layer(GovernorLayer {
                    config: governor_conf,
                }),
        );

    // Health check bypasses auth and rate limiting
    Router::new()
        .route("/health", get(handlers::health))
        .merge(protected_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// CORS restricted to the configured origins; permissive only when no
/// origin list is configured (local development).
fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.is_empty() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-requested-with"),
        ])
        .allow_credentials(true)
}
