use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

use crate::handlers::{self, AppState};
use crate::{ingest, pages, session};

/// Largest accepted lead submission.
const MAX_SUBMISSION_BYTES: usize = 64 * 1024;

/// Builds the full application router.
///
/// `main` serves exactly this router, and the integration tests drive it
/// directly, so both exercise the same middleware stack.
pub fn build_router(state: Arc<AppState>) -> anyhow::Result<Router> {
    let internal_api = Router::new()
        .route("/session", get(handlers::session_user))
        .route("/leads", get(handlers::list_leads))
        .route("/leads/stats", get(handlers::lead_stats))
        .route(
            "/leads/:id",
            patch(handlers::update_lead_status).delete(handlers::delete_lead),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            session::require_api_session,
        ));

    let protected_pages = Router::new()
        .route("/dashboard", get(pages::dashboard))
        .route("/leads", get(pages::leads))
        .route("/leads/:id/status", post(pages::update_status))
        .route("/leads/:id/delete", post(pages::delete))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            session::require_page_session,
        ));

    let app = Router::new()
        .route("/health", get(handlers::health))
        .route("/", get(pages::index))
        .route("/login", get(pages::login_form).post(pages::login))
        .route("/logout", post(pages::logout))
        .merge(protected_pages)
        .nest("/api/internal", internal_api)
        .merge(ingest_routes(&state)?)
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    Ok(app)
}

/// The public intake route with its own limits and cross-origin headers.
fn ingest_routes(state: &AppState) -> anyhow::Result<Router<Arc<AppState>>> {
    let router = Router::new().route(
        "/api/leads",
        post(ingest::submit_lead).options(ingest::preflight),
    );

    let router = match state.config.ingest_rate_per_second {
        Some(rate) => {
            // Rate limiting: per client IP, burst of twice the steady rate.
            // The governor takes a replenish interval, not a rate.
            let governor_conf = Arc::new(
                GovernorConfigBuilder::default()
                    .per_millisecond((1000 / rate).max(1))
                    .burst_size(rate.saturating_mul(2).min(u32::MAX as u64) as u32)
                    .key_extractor(SmartIpKeyExtractor)
                    .finish()
                    .ok_or_else(|| anyhow::anyhow!("Invalid ingestion rate limit: {}/s", rate))?,
            );
            tracing::info!("Ingestion rate limit: {}/s per IP", rate);
            router.layer(GovernorLayer {
                config: governor_conf,
            })
        }
        None => router,
    };

    // Body limit sits inside the header layers so a 413 still carries CORS headers
    let router = router.layer(RequestBodyLimitLayer::new(MAX_SUBMISSION_BYTES));

    Ok(ingest::with_cors_headers(router))
}
