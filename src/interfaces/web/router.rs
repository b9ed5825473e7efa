use axum::{
    Router,
    body::Body,
    http::{HeaderValue, Request, header},
    middleware,
    middleware::Next,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use super::AppState;
use super::auth;
use super::handlers::{agent, callback, system};

pub(crate) fn build_api_router(state: AppState) -> Router {
    // Only the worker callback is authenticated; clients poll anonymously by id
    let callback_routes = Router::new()
        .route("/internal/agent-result", post(callback::agent_result))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_callback_token,
        ));

    Router::new()
        .route("/", get(system::index))
        .route("/healthz", get(system::healthz))
        .route("/api/agent", post(agent::create_agent_request))
        .route("/api/agent/{request_id}", get(agent::get_agent_request))
        .merge(callback_routes)
        .layer(middleware::from_fn(security_headers))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn security_headers(req: Request<Body>, next: Next) -> axum::response::Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}
