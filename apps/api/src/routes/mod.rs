pub mod health;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::catch_panic::CatchPanicLayer;

use crate::errors::panic_response;
use crate::extraction::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let router = Router::new()
        .route("/health", get(health::health_handler))
        .route(
            "/extract_department",
            post(handlers::handle_extract_department),
        )
        .with_state(state);

    catch_panics(router)
}

/// Unhandled faults become a 500 with the `{"error": ...}` body instead of a dropped connection.
fn catch_panics(router: Router) -> Router {
    router.layer(CatchPanicLayer::custom(panic_response))
}
