//! Router configuration for the API server.

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::CorsLayer;

use super::handlers;
use super::AppState;

/// Create the main router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        // Searches
        .route(
            "/api/searches",
            get(handlers::list_searches).post(handlers::create_search),
        )
        .route("/api/searches/:search_id", delete(handlers::delete_search))
        .route(
            "/api/searches/:search_id/toggle",
            post(handlers::toggle_search),
        )
        .route(
            "/api/searches/:search_id/scrape",
            post(handlers::trigger_scrape),
        )
        // Offers
        .route("/api/offers", get(handlers::list_offers))
        .route("/api/offers/:offer_id", delete(handlers::delete_offer))
        .route(
            "/api/offers/:offer_id/status",
            post(handlers::set_offer_status),
        )
        // Stats
        .route("/api/stats", get(handlers::get_stats))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
