pub mod admin;
pub mod health;
pub mod notifications;

use axum::Router;
use axum::middleware::from_fn_with_state;

use crate::middleware::gate::authorization_gate;
use crate::state::AppState;

/// Build the complete API router with all routes behind the authorization gate.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .merge(notifications::router())
        .merge(admin::router())
        .layer(from_fn_with_state(state.clone(), authorization_gate))
        .with_state(state)
}
