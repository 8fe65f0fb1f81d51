//! HTTP surface of vidtube: an axum router over Postgres (sea-orm) with
//! cookie/bearer token sessions from `vidtube-session`.

use axum::{Router, middleware, routing::get};

pub mod auth;
pub mod comments;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod healthcheck;
pub mod likes;
pub mod pagination;
pub mod password;
pub mod playlists;
pub mod response;
pub mod security;
pub mod state;
pub mod store;
pub mod subscriptions;
pub mod tweets;
pub mod users;
pub mod validate;
pub mod videos;

use state::AppState;

/// Builds the `/api/v1` router. Everything except healthcheck, register,
/// login and refresh-token sits behind [`security::require_user`].
pub fn app(state: AppState) -> Router {
    let gate = middleware::from_fn_with_state(state.clone(), security::require_user);

    let api = Router::new()
        .route("/healthcheck", get(healthcheck::healthcheck))
        .nest(
            "/users",
            users::public_router().merge(users::router().route_layer(gate.clone())),
        )
        .nest("/videos", videos::router().route_layer(gate.clone()))
        .nest("/comments", comments::router().route_layer(gate.clone()))
        .nest("/likes", likes::router().route_layer(gate.clone()))
        .nest("/subscriptions", subscriptions::router().route_layer(gate.clone()))
        .nest("/tweets", tweets::router().route_layer(gate.clone()))
        .nest("/playlists", playlists::router().route_layer(gate.clone()))
        .nest("/dashboard", dashboard::router().route_layer(gate));

    Router::new()
        .nest("/api/v1", api)
        .layer(middleware::from_fn_with_state(state.clone(), security::origin_guard))
        .layer(middleware::from_fn(security::request_id))
        .with_state(state)
}
