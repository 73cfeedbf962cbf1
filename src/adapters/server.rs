use crate::core::breaker::{BreakerStats, CircuitBreakerState};
use crate::core::service::RecommendationService;
use crate::domain::model::{Recommendation, Store};
use crate::domain::ports::PageFetcher;
use crate::utils::error::{GatewayError, Result};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    pub breakers: Vec<BreakerStats>,
}

pub fn router<S, R>(service: Arc<RecommendationService<S, R>>) -> Router
where
    S: PageFetcher<Store> + 'static,
    R: PageFetcher<Recommendation> + 'static,
{
    Router::new()
        .route("/health", get(health::<S, R>))
        .route("/{customer_id}", get(recommend::<S, R>))
        .with_state(service)
}

async fn recommend<S, R>(
    State(service): State<Arc<RecommendationService<S, R>>>,
    Path(customer_id): Path<String>,
) -> Response
where
    S: PageFetcher<Store> + 'static,
    R: PageFetcher<Recommendation> + 'static,
{
    match service.recommend(&customer_id).wait().await {
        Ok(details) => Json(details).into_response(),
        Err(err) => {
            let status = match err {
                GatewayError::InvalidCustomerId { .. } => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            tracing::error!(error = %err, status = status.as_u16(), "recommendation request failed");
            (status, Json(serde_json::json!({ "error": err.to_string() }))).into_response()
        }
    }
}

async fn health<S, R>(State(service): State<Arc<RecommendationService<S, R>>>) -> Json<HealthReport>
where
    S: PageFetcher<Store> + 'static,
    R: PageFetcher<Recommendation> + 'static,
{
    let breakers = service.breakers();
    let status = if breakers
        .iter()
        .all(|breaker| breaker.state == CircuitBreakerState::Closed)
    {
        "healthy"
    } else {
        "degraded"
    };

    Json(HealthReport {
        status,
        timestamp: Utc::now(),
        breakers,
    })
}

/// Serves `router` until `shutdown` is cancelled.
pub async fn serve(router: Router, bind_address: &str, shutdown: CancellationToken) -> Result<()> {
    let listener = TcpListener::bind(bind_address).await?;
    tracing::info!(bind = %listener.local_addr()?, "🚀 listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    tracing::info!("server stopped");
    Ok(())
}
