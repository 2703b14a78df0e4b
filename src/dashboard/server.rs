//! Local HTTP surface exposing the dashboard snapshot and controls

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post},
    Router,
};
use log::{info, warn};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use super::client::GridApi;
use super::controller::Dashboard;
use super::errors::{DashboardError, DashboardResult};
use super::state::DashboardSnapshot;
use super::types::GridParams;
use super::view::{SideFilter, SortKey, StatusFilter};

type Shared<A> = Arc<Dashboard<A>>;

impl IntoResponse for DashboardError {
    fn into_response(self) -> Response {
        let status = match &self {
            DashboardError::Busy { .. } => StatusCode::CONFLICT,
            DashboardError::InvalidParams(_) => StatusCode::UNPROCESSABLE_ENTITY,
            DashboardError::Api(_) => StatusCode::BAD_GATEWAY,
            DashboardError::Config(_) | DashboardError::Server(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct FilterRequest {
    #[serde(default)]
    pub side: Option<SideFilter>,
    #[serde(default)]
    pub status: Option<StatusFilter>,
}

/// Routes over a shared dashboard
pub fn router<A: GridApi + 'static>(dashboard: Shared<A>) -> Router {
    Router::new()
        .route("/api/dashboard", get(snapshot_handler::<A>))
        .route("/api/dashboard/sort/:key", post(sort_handler::<A>))
        .route("/api/dashboard/filter", post(filter_handler::<A>))
        .route("/api/dashboard/page/:page", post(page_handler::<A>))
        .route("/api/dashboard/grid", post(create_handler::<A>))
        .route("/api/dashboard/grid/stop", post(stop_handler::<A>))
        .route("/api/dashboard/grid/:symbol", delete(cancel_handler::<A>))
        .with_state(dashboard)
}

/// Bind `host:port` and serve until `shutdown` is cancelled
pub async fn start_server<A: GridApi + 'static>(
    dashboard: Shared<A>,
    host: &str,
    port: u16,
    shutdown: CancellationToken,
) -> DashboardResult<()> {
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .map_err(|e| DashboardError::Server(format!("invalid address {}:{}: {}", host, port, e)))?;

    let listener = TcpListener::bind(addr).await?;
    info!("Dashboard server running on http://{}", addr);
    serve(listener, dashboard, shutdown).await
}

/// Serve on an already bound listener
pub async fn serve<A: GridApi + 'static>(
    listener: TcpListener,
    dashboard: Shared<A>,
    shutdown: CancellationToken,
) -> DashboardResult<()> {
    axum::serve(listener, router(dashboard))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}

async fn snapshot_handler<A: GridApi + 'static>(
    State(dashboard): State<Shared<A>>,
) -> Json<DashboardSnapshot> {
    Json(dashboard.snapshot().await)
}

async fn sort_handler<A: GridApi + 'static>(
    State(dashboard): State<Shared<A>>,
    Path(key): Path<String>,
) -> Result<Json<DashboardSnapshot>, DashboardError> {
    let key: SortKey = key.parse()?;
    dashboard.toggle_sort(key).await;
    Ok(Json(dashboard.snapshot().await))
}

async fn filter_handler<A: GridApi + 'static>(
    State(dashboard): State<Shared<A>>,
    Json(request): Json<FilterRequest>,
) -> Json<DashboardSnapshot> {
    dashboard.set_filter(request.side, request.status).await;
    Json(dashboard.snapshot().await)
}

async fn page_handler<A: GridApi + 'static>(
    State(dashboard): State<Shared<A>>,
    Path(page): Path<usize>,
) -> Json<DashboardSnapshot> {
    dashboard.set_page(page).await;
    Json(dashboard.snapshot().await)
}

async fn create_handler<A: GridApi + 'static>(
    State(dashboard): State<Shared<A>>,
    Json(params): Json<GridParams>,
) -> Result<Json<DashboardSnapshot>, DashboardError> {
    if let Err(e) = dashboard.create(params).await {
        warn!("Create request failed: {}", e);
        return Err(e);
    }
    Ok(Json(dashboard.snapshot().await))
}

async fn stop_handler<A: GridApi + 'static>(
    State(dashboard): State<Shared<A>>,
) -> Result<Json<DashboardSnapshot>, DashboardError> {
    dashboard.stop().await?;
    Ok(Json(dashboard.snapshot().await))
}

async fn cancel_handler<A: GridApi + 'static>(
    State(dashboard): State<Shared<A>>,
    Path(symbol): Path<String>,
) -> Result<Json<DashboardSnapshot>, DashboardError> {
    dashboard.cancel(&symbol).await?;
    Ok(Json(dashboard.snapshot().await))
}
