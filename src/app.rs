use std::net::SocketAddr;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{get, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use crate::api::locale::localize;
use crate::authz::Requirements;
use crate::handlers::{auth, brands, categories, colors, health, permissions, products, roles, sizes, users, variants};
use crate::middleware::{authenticate, require, throttle};
use crate::state::AppState;

/// Full application router with the middleware stack applied.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/health", get(health::check))
        .route("/auth/login", post(auth::login))
        .merge(session_routes(&state))
        .merge(user_routes(&state))
        .merge(role_routes(&state))
        .merge(permission_routes(&state))
        .merge(catalog_routes(&state));

    Router::new()
        .route("/", get(health::root))
        .nest("/api/v1", api)
        .layer(
            // Outermost first: the locale is in scope before authentication
            // and throttling can produce an error response.
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors(&state))
                .layer(DefaultBodyLimit::max(state.config.api.max_request_size_bytes))
                .layer(from_fn_with_state(state.clone(), localize))
                .layer(from_fn_with_state(state.clone(), authenticate))
                .layer(from_fn_with_state(state.clone(), throttle)),
        )
        .with_state(state)
}

/// Routes guarded by `requirements`.
fn guarded(state: &AppState, requirements: Requirements, routes: Router<AppState>) -> Router<AppState> {
    routes.route_layer(from_fn_with_state(state.clone(), require(requirements)))
}

fn session_routes(state: &AppState) -> Router<AppState> {
    guarded(
        state,
        Requirements::authenticated(),
        Router::new()
            .route("/auth/logout", post(auth::logout))
            .route("/user-profile", get(auth::profile))
            .route("/my-permissions", get(auth::my_permissions))
            .route("/check-permission", post(auth::check_permission)),
    )
}

fn user_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .merge(guarded(
            state,
            Requirements::permissions("view users"),
            Router::new()
                .route("/users", get(users::index))
                .route("/users/:id", get(users::show))
                .route("/users/:id/permissions", get(users::permissions))
                .route("/users/:id/has-role", post(users::has_role))
                .route("/users/:id/has-permission", post(users::has_permission)),
        ))
        .merge(guarded(state, Requirements::permissions("create users"), Router::new().route("/users", post(users::store))))
        .merge(guarded(state, Requirements::permissions("edit users"), Router::new().route("/users/:id", put(users::update))))
        .merge(guarded(
            state,
            Requirements::permissions("delete users"),
            Router::new().route("/users/:id", axum::routing::delete(users::destroy)),
        ))
        .merge(guarded(
            state,
            Requirements::permissions("restore users"),
            Router::new()
                .route("/users/trashed", get(users::trashed))
                .route("/users/:id/restore", post(users::restore)),
        ))
        .merge(guarded(
            state,
            Requirements::role_or_permission("Super Admin|assign permissions"),
            Router::new().route(
                "/users/:id/roles",
                get(users::roles)
                    .post(users::assign_role)
                    .delete(users::remove_role)
                    .put(users::sync_roles),
            ),
        ))
}

fn role_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .merge(guarded(
            state,
            Requirements::permissions("view roles"),
            Router::new()
                .route("/roles", get(roles::index))
                .route("/roles/permissions", get(roles::all_permissions))
                .route("/roles/:id", get(roles::show)),
        ))
        .merge(guarded(state, Requirements::permissions("create roles"), Router::new().route("/roles", post(roles::store))))
        .merge(guarded(state, Requirements::permissions("edit roles"), Router::new().route("/roles/:id", put(roles::update))))
        .merge(guarded(
            state,
            Requirements::permissions("delete roles"),
            Router::new().route("/roles/:id", axum::routing::delete(roles::destroy)),
        ))
        .merge(guarded(
            state,
            Requirements::permissions("assign permissions"),
            Router::new().route("/roles/:id/permissions", put(roles::sync_permissions)),
        ))
}

fn permission_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .merge(guarded(
            state,
            Requirements::permissions("view permissions"),
            Router::new()
                .route("/permissions", get(permissions::index))
                .route("/permissions/:id", get(permissions::show))
                .route("/permissions/:id/roles", get(permissions::roles)),
        ))
        .merge(guarded(
            state,
            Requirements::permissions("create permissions"),
            Router::new().route("/permissions", post(permissions::store)),
        ))
        .merge(guarded(
            state,
            Requirements::permissions("edit permissions"),
            Router::new().route("/permissions/:id", put(permissions::update)),
        ))
        .merge(guarded(
            state,
            Requirements::permissions("delete permissions"),
            Router::new().route("/permissions/:id", axum::routing::delete(permissions::destroy)),
        ))
}

/// Products, variants and the catalog master data share the product permissions.
fn catalog_routes(state: &AppState) -> Router<AppState> {
    use axum::routing::delete;

    let read = Router::new()
        .route("/products", get(products::index))
        .route("/products/:id", get(products::show))
        .route("/products/:id/variants", get(variants::index))
        .route("/categories", get(categories::index))
        .route("/categories/hierarchy", get(categories::hierarchy))
        .route("/categories/:id", get(categories::show))
        .route("/brands", get(brands::index))
        .route("/brands/:id", get(brands::show))
        .route("/colors", get(colors::index))
        .route("/colors/:id", get(colors::show))
        .route("/sizes", get(sizes::index))
        .route("/sizes/:id", get(sizes::show));

    let create = Router::new()
        .route("/products", post(products::store))
        .route("/products/:id/variants", post(variants::store))
        .route("/categories", post(categories::store))
        .route("/brands", post(brands::store))
        .route("/colors", post(colors::store))
        .route("/sizes", post(sizes::store));

    let edit = Router::new()
        .route("/products/:id", put(products::update))
        .route("/products/:id/variants/:variant_id", put(variants::update))
        .route("/categories/:id", put(categories::update))
        .route("/brands/:id", put(brands::update))
        .route("/colors/:id", put(colors::update))
        .route("/sizes/:id", put(sizes::update));

    let remove = Router::new()
        .route("/products/:id", delete(products::destroy))
        .route("/products/:id/variants/:variant_id", delete(variants::destroy))
        .route("/categories/:id", delete(categories::destroy))
        .route("/brands/:id", delete(brands::destroy))
        .route("/colors/:id", delete(colors::destroy))
        .route("/sizes/:id", delete(sizes::destroy));

    Router::new()
        .merge(guarded(state, Requirements::permissions("view products"), read))
        .merge(guarded(state, Requirements::permissions("create products"), create))
        .merge(guarded(state, Requirements::permissions("edit products"), edit))
        .merge(guarded(state, Requirements::permissions("delete products"), remove))
}

fn cors(state: &AppState) -> CorsLayer {
    let security = &state.config.security;
    if !security.enable_cors || security.cors_origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT, header::ACCEPT_LANGUAGE])
}

/// Binds `port` on all interfaces and serves until the process stops.
pub async fn serve(state: AppState, port: u16) -> std::io::Result<()> {
    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Listening on http://{}", bind_addr);
    axum::serve(listener, router(state).into_make_service_with_connect_info::<SocketAddr>()).await
}
