use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

use super::AppState;
use super::error::ApiError;

/// Guards the worker callback route. Runs before the body is read, so a
/// rejected caller never reaches payload parsing or the store.
pub async fn require_callback_token(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let presented = req
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "));

    match presented {
        Some(token) if constant_time_eq(token.as_bytes(), state.callback_token.as_bytes()) => {
            next.run(req).await
        }
        Some(_) => {
            warn!("Rejected callback with invalid token");
            ApiError::Unauthorized.into_response()
        }
        None => {
            warn!("Rejected callback without bearer token");
            ApiError::Unauthorized.into_response()
        }
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter()
        .zip(b.iter())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interfaces::web::test_support::test_state;
    use axum::{Router, http::StatusCode, middleware, routing::post};
    use tower::util::ServiceExt;

    fn protected_app(state: AppState) -> Router {
        Router::new()
            .route("/protected", post(|| async { StatusCode::NO_CONTENT }))
            .layer(middleware::from_fn_with_state(
                state.clone(),
                require_callback_token,
            ))
            .with_state(state)
    }

    async fn call(app: Router, auth: Option<&str>) -> StatusCode {
        let mut req = Request::builder().method("POST").uri("/protected");
        if let Some(value) = auth {
            req = req.header("authorization", value);
        }
        app.oneshot(req.body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn matching_bearer_token_passes() {
        let (state, _h) = test_state().await;
        let status = call(protected_app(state), Some("Bearer test-callback-token")).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn missing_or_malformed_header_is_rejected() {
        let (state, _h) = test_state().await;
        assert_eq!(
            call(protected_app(state.clone()), None).await,
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            call(protected_app(state.clone()), Some("test-callback-token")).await,
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            call(protected_app(state), Some("Basic test-callback-token")).await,
            StatusCode::UNAUTHORIZED
        );
    }

    #[tokio::test]
    async fn wrong_token_is_rejected() {
        let (state, _h) = test_state().await;
        assert_eq!(
            call(protected_app(state.clone()), Some("Bearer nope")).await,
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            call(protected_app(state), Some("Bearer test-callback-token-extra")).await,
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn constant_time_eq_compares_content_and_length() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
        assert!(constant_time_eq(b"", b""));
    }
}
