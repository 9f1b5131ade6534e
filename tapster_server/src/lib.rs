//! A drinks catalog served over HTTP
//!
//! Reading the menu is public. Everything else requires a bearer token
//! granting the route's permission, verified by a [`tapster_oauth2::Authority`].

#![warn(
    unused_import_braces,
    unused_imports,
    unused_qualifications
)]
#![deny(
    missing_debug_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code,
    unused_must_use
)]

use axum::{
    extract::FromRef,
    http::{header, Method},
    routing::{get, patch},
    Router,
};
use tapster_oauth2::Authority;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod config;
pub mod drinks;
pub mod error;
pub mod routes;

use drinks::Catalog;

/// Shared state handed to every handler
#[derive(Clone, Debug, FromRef)]
pub struct AppState {
    pub authority: Authority,
    pub catalog: Catalog,
}

impl AppState {
    pub fn new(authority: Authority) -> Self {
        Self {
            authority,
            catalog: Catalog::new(),
        }
    }
}

/// Builds the router with CORS and request tracing applied
pub fn app(state: AppState) -> Router {
    Router::new()
        .route(
            "/drinks",
            get(routes::list_drinks).post(routes::create_drink),
        )
        .route("/drinks-detail", get(routes::drinks_detail))
        .route(
            "/drinks/:id",
            patch(routes::update_drink).delete(routes::delete_drink),
        )
        .fallback(routes::not_found)
        .with_state(state)
        .layer(cors())
        .layer(TraceLayer::new_for_http())
}

fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}
