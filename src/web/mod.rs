//! HTTP layer wiring (axum router + shared services).
//!
//! - `auth.rs`: session guard plus signup/login/logout handlers
//! - `invoices.rs`, `clients.rs`: owner-scoped CRUD routes
//! - `dto.rs`: request DTOs, validation and response JSON shapes
//! - `errors.rs`: `AppError` and the JSON error body

use std::sync::Arc;

use axum::{
    Extension, Router, middleware,
    routing::{get, post},
};
use tower_sessions::{MemoryStore, SessionManagerLayer};

use crate::db::Database;
use crate::invoice_gen::InvoiceGenerator;

pub mod auth;
pub mod clients;
pub mod dto;
pub mod errors;
pub mod invoices;

pub use errors::AppError;

/// Shared handles the handlers work against.
pub struct AppServices {
    pub db: Database,
    pub generator: InvoiceGenerator,
}

impl AppServices {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            generator: InvoiceGenerator::new(),
        }
    }
}

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(services: Arc<AppServices>) -> Router {
    // Sessions must work over plain HTTP in local runs.
    let session_layer = SessionManagerLayer::new(MemoryStore::default()).with_secure(false);

    let auth_state = auth::AuthState {
        services: services.clone(),
    };

    // Owner-scoped routes: everything here requires a signed-in user.
    let protected = Router::new()
        .nest("/invoices", invoices::router())
        .nest("/clients", clients::router())
        .layer(middleware::from_fn_with_state(
            auth_state,
            auth::require_login,
        ));

    Router::new()
        .route("/", get(invoices::home))
        .route("/signup", post(auth::signup))
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/logout", post(auth::logout))
        .merge(protected)
        .layer(Extension(services))
        .layer(session_layer)
}
