use api_state::ApiState;
use axum::{extract::FromRef, routing::get, Router};
use routes::{ask::ask, liveness::live, readiness::ready};
use tower_http::trace::TraceLayer;

pub mod api_state;
pub mod error;
mod routes;

/// Question answering endpoint plus the probes used by process supervisors.
pub fn api_routes<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    ApiState: FromRef<S>,
{
    Router::new()
        .route("/", get(ask))
        .route("/ready", get(ready))
        .route("/live", get(live))
        .layer(TraceLayer::new_for_http())
}
