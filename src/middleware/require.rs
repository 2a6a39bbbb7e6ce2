use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::Method,
    middleware::Next,
    response::Response,
};

use tracing::info;

use crate::auth::Principal;
use crate::authz::{Decision, Requirements};
use crate::error::ApiError;
use crate::state::AppState;

type GuardFuture = Pin<Box<dyn Future<Output = Result<Response, ApiError>> + Send>>;

/// Route guard for `middleware::from_fn_with_state`.
///
/// ```ignore
/// Router::new()
///     .route("/users", get(users::index))
///     .route_layer(middleware::from_fn_with_state(state.clone(), require(Requirements::permissions("view users"))));
/// ```
///
/// No principal answers 401, a principal lacking every listed capability 403.
pub fn require(requirements: Requirements) -> impl Fn(State<AppState>, Request, Next) -> GuardFuture + Clone {
    let requirements = Arc::new(requirements);
    move |State(state): State<AppState>, request: Request, next: Next| {
        let requirements = requirements.clone();
        Box::pin(async move {
            let principal = request.extensions().get::<Principal>().cloned();
            match state.gate.authorize(principal.as_ref(), &requirements).await? {
                Decision::Authorized => {
                    if state.config.security.enable_audit_logging && request.method() != Method::GET {
                        if let Some(principal) = &principal {
                            info!(target: "audit", user_id = principal.id, method = %request.method(), path = %request.uri().path(), "authorized write");
                        }
                    }
                    Ok(next.run(request).await)
                }
                Decision::RequiresLogin => Err(ApiError::unauthorized("Unauthenticated.")),
                Decision::Denied => Err(ApiError::forbidden("User does not have the right permissions.")),
            }
        })
    }
}
