pub mod auth;
pub mod handlers;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::manager::ConnectionManager;
use crate::transport::Transport;

/// Shared state for the admin routes.
pub struct AdminState<T: Transport> {
    pub manager: ConnectionManager<T>,
    pub api_key: Arc<str>,
}

impl<T: Transport> Clone for AdminState<T> {
    fn clone(&self) -> Self {
        Self {
            manager: self.manager.clone(),
            api_key: Arc::clone(&self.api_key),
        }
    }
}

/// `/healthz` is open; everything under `/admin` needs the bearer key.
pub fn setup_admin_router<T: Transport>(manager: ConnectionManager<T>, api_key: &str) -> Router {
    let state = AdminState {
        manager,
        api_key: Arc::from(api_key),
    };

    let admin = Router::new()
        .route("/admin/stats", get(get_stats::<T>))
        .route("/admin/reconnect", post(post_reconnect::<T>))
        .route("/admin/probe", post(post_probe::<T>))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            admin_auth_middleware::<T>,
        ));

    Router::new()
        .route("/healthz", get(get_healthz::<T>))
        .merge(admin)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
