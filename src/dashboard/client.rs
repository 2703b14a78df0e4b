//! REST surface of the grid service - abstracted so it can be mocked in tests

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::errors::{
    classify_decode, classify_response, classify_transport, ApiResult, DashboardError,
    DashboardResult,
};
use super::types::{
    orders_from_value, Balance, GridParams, Health, MarketInfo, MarketPrice, OperationAck, Order,
    StatsPeriod, StatsSummary, StatusResponse,
};

/// Calls exposed by the grid service
#[async_trait]
pub trait GridApi: Send + Sync {
    /// USDT balance of the trading account
    async fn balance(&self) -> ApiResult<Balance>;

    /// Open orders for a symbol; a non-array body is an empty list
    async fn open_orders(&self, symbol: &str) -> ApiResult<Vec<Order>>;

    async fn market_info(&self, symbol: &str) -> ApiResult<MarketInfo>;

    async fn market_price(&self, symbol: &str) -> ApiResult<MarketPrice>;

    /// Poll whether a grid is running and its snapshot
    async fn grid_status(&self) -> ApiResult<StatusResponse>;

    async fn stats_summary(&self, period: StatsPeriod) -> ApiResult<StatsSummary>;

    /// Liveness check of the service root
    async fn health(&self) -> ApiResult<Health>;

    /// Start a grid; answers with the same shape as the status poll
    async fn create_grid(&self, params: &GridParams) -> ApiResult<StatusResponse>;

    /// Stop the active grid
    async fn stop_grid(&self) -> ApiResult<OperationAck>;

    /// Cancel every grid order for a symbol
    async fn cancel_grid(&self, symbol: &str) -> ApiResult<OperationAck>;
}

// ============================================================================
// HTTP Implementation
// ============================================================================

/// reqwest-backed client with a bounded per-request timeout
#[derive(Debug, Clone)]
pub struct HttpGridApi {
    client: Client,
    base_url: String,
    base: Url,
}

impl HttpGridApi {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> DashboardResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DashboardError::Config(format!("failed to build HTTP client: {}", e)))?;

        let base_url = base_url.into().trim_end_matches('/').to_string();
        let base = Url::parse(&base_url)
            .map_err(|e| DashboardError::Config(format!("invalid base url {}: {}", base_url, e)))?;
        if base.cannot_be_a_base() {
            return Err(DashboardError::Config(format!(
                "base url {} cannot carry a path",
                base_url
            )));
        }

        Ok(Self {
            client,
            base_url,
            base,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Endpoint under the base path; each segment is percent-encoded, so a
    /// symbol like `AIPG/USDT` stays one segment.
    fn segments_url(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> ApiResult<T> {
        let response = request.send().await.map_err(|e| classify_transport(&e))?;
        let status = response.status();
        let url = response.url().path().to_string();
        let body = response.text().await.map_err(|e| classify_transport(&e))?;
        debug!("{} -> {}", url, status);

        if !status.is_success() {
            return Err(classify_response(status, &body));
        }

        serde_json::from_str(&body).map_err(|e| classify_decode(&e))
    }
}

#[async_trait]
impl GridApi for HttpGridApi {
    async fn balance(&self) -> ApiResult<Balance> {
        self.send(self.client.get(self.url("/api/balance/usdt"))).await
    }

    async fn open_orders(&self, symbol: &str) -> ApiResult<Vec<Order>> {
        let raw: Value = self
            .send(self.client.get(self.segments_url(&["api", "orders", symbol])))
            .await?;
        orders_from_value(raw).map_err(|e| classify_decode(&e))
    }

    async fn market_info(&self, symbol: &str) -> ApiResult<MarketInfo> {
        self.send(self.client.get(self.segments_url(&["api", "market-info", symbol])))
            .await
    }

    async fn market_price(&self, symbol: &str) -> ApiResult<MarketPrice> {
        self.send(self.client.get(self.segments_url(&["api", "market-price", symbol])))
            .await
    }

    async fn grid_status(&self) -> ApiResult<StatusResponse> {
        self.send(self.client.get(self.url("/api/grid/status"))).await
    }

    async fn stats_summary(&self, period: StatsPeriod) -> ApiResult<StatsSummary> {
        self.send(
            self.client
                .get(self.url("/api/stats/summary"))
                .query(&[("period", period.as_str())]),
        )
        .await
    }

    async fn health(&self) -> ApiResult<Health> {
        self.send(self.client.get(self.url("/"))).await
    }

    async fn create_grid(&self, params: &GridParams) -> ApiResult<StatusResponse> {
        self.send(self.client.post(self.url("/api/grid/create")).json(params))
            .await
    }

    async fn stop_grid(&self) -> ApiResult<OperationAck> {
        self.send(self.client.post(self.url("/api/grid/stop"))).await
    }

    async fn cancel_grid(&self, symbol: &str) -> ApiResult<OperationAck> {
        self.send(self.client.delete(self.segments_url(&["api", "grid", symbol])))
            .await
    }
}

// ============================================================================
// Mock Implementation for Testing
// ============================================================================

/// In-memory service for exercising the dashboard without a network.
pub mod mock {
    use super::*;
    use crate::dashboard::errors::ApiError;
    use std::sync::Arc;
    use tokio::sync::{Mutex, Notify};

    /// Canned responses per endpoint plus a log of calls made
    pub struct MockGridApi {
        pub balance: Arc<Mutex<ApiResult<Balance>>>,
        pub orders: Arc<Mutex<ApiResult<Vec<Order>>>>,
        pub market_info: Arc<Mutex<ApiResult<MarketInfo>>>,
        pub market_price: Arc<Mutex<ApiResult<MarketPrice>>>,
        pub status: Arc<Mutex<ApiResult<StatusResponse>>>,
        pub stats: Arc<Mutex<ApiResult<StatsSummary>>>,
        pub create_response: Arc<Mutex<ApiResult<StatusResponse>>>,
        pub stop_response: Arc<Mutex<ApiResult<OperationAck>>>,
        pub cancel_response: Arc<Mutex<ApiResult<OperationAck>>>,
        pub created: Arc<Mutex<Vec<GridParams>>>,
        pub calls: Arc<Mutex<Vec<String>>>,
        /// When set, `grid_status` waits for a notification before answering
        pub status_gate: Arc<Mutex<Option<Arc<Notify>>>>,
    }

    impl Default for MockGridApi {
        fn default() -> Self {
            Self::new()
        }
    }

    impl MockGridApi {
        /// A service with no grid running and empty account data
        pub fn new() -> Self {
            Self {
                balance: Arc::new(Mutex::new(Ok(Balance::default()))),
                orders: Arc::new(Mutex::new(Ok(Vec::new()))),
                market_info: Arc::new(Mutex::new(Ok(MarketInfo::default()))),
                market_price: Arc::new(Mutex::new(Ok(MarketPrice::default()))),
                status: Arc::new(Mutex::new(Ok(StatusResponse::stopped()))),
                stats: Arc::new(Mutex::new(Ok(StatsSummary::default()))),
                create_response: Arc::new(Mutex::new(Ok(StatusResponse::stopped()))),
                stop_response: Arc::new(Mutex::new(Ok(OperationAck::default()))),
                cancel_response: Arc::new(Mutex::new(Ok(OperationAck::default()))),
                created: Arc::new(Mutex::new(Vec::new())),
                calls: Arc::new(Mutex::new(Vec::new())),
                status_gate: Arc::new(Mutex::new(None)),
            }
        }

        /// Hold every later `grid_status` call until the returned handle is
        /// notified. The response is read after the release.
        pub async fn gate_status(&self) -> Arc<Notify> {
            let gate = Arc::new(Notify::new());
            *self.status_gate.lock().await = Some(gate.clone());
            gate
        }

        pub async fn set_balance(&self, result: ApiResult<Balance>) {
            *self.balance.lock().await = result;
        }

        pub async fn set_orders(&self, result: ApiResult<Vec<Order>>) {
            *self.orders.lock().await = result;
        }

        pub async fn set_market_price(&self, result: ApiResult<MarketPrice>) {
            *self.market_price.lock().await = result;
        }

        pub async fn set_status(&self, result: ApiResult<StatusResponse>) {
            *self.status.lock().await = result;
        }

        pub async fn set_create_response(&self, result: ApiResult<StatusResponse>) {
            *self.create_response.lock().await = result;
        }

        pub async fn set_stop_response(&self, result: ApiResult<OperationAck>) {
            *self.stop_response.lock().await = result;
        }

        pub async fn set_cancel_response(&self, result: ApiResult<OperationAck>) {
            *self.cancel_response.lock().await = result;
        }

        /// Make every read endpoint fail the same way
        pub async fn fail_reads(&self, err: ApiError) {
            *self.balance.lock().await = Err(err.clone());
            *self.orders.lock().await = Err(err.clone());
            *self.market_info.lock().await = Err(err.clone());
            *self.market_price.lock().await = Err(err.clone());
            *self.status.lock().await = Err(err.clone());
            *self.stats.lock().await = Err(err);
        }

        pub async fn call_count(&self, name: &str) -> usize {
            self.calls.lock().await.iter().filter(|c| *c == name).count()
        }

        async fn record(&self, name: &str) {
            self.calls.lock().await.push(name.to_string());
        }
    }

    #[async_trait]
    impl GridApi for MockGridApi {
        async fn balance(&self) -> ApiResult<Balance> {
            self.record("balance").await;
            self.balance.lock().await.clone()
        }

        async fn open_orders(&self, _symbol: &str) -> ApiResult<Vec<Order>> {
            self.record("open_orders").await;
            self.orders.lock().await.clone()
        }

        async fn market_info(&self, _symbol: &str) -> ApiResult<MarketInfo> {
            self.record("market_info").await;
            self.market_info.lock().await.clone()
        }

        async fn market_price(&self, _symbol: &str) -> ApiResult<MarketPrice> {
            self.record("market_price").await;
            self.market_price.lock().await.clone()
        }

        async fn grid_status(&self) -> ApiResult<StatusResponse> {
            self.record("grid_status").await;
            let gate = self.status_gate.lock().await.clone();
            if let Some(gate) = gate {
                gate.notified().await;
            }
            self.status.lock().await.clone()
        }

        async fn stats_summary(&self, _period: StatsPeriod) -> ApiResult<StatsSummary> {
            self.record("stats_summary").await;
            self.stats.lock().await.clone()
        }

        async fn health(&self) -> ApiResult<Health> {
            self.record("health").await;
            Ok(Health {
                status: "ok".into(),
                message: "mock".into(),
            })
        }

        async fn create_grid(&self, params: &GridParams) -> ApiResult<StatusResponse> {
            self.record("create_grid").await;
            self.created.lock().await.push(params.clone());
            self.create_response.lock().await.clone()
        }

        async fn stop_grid(&self) -> ApiResult<OperationAck> {
            self.record("stop_grid").await;
            self.stop_response.lock().await.clone()
        }

        async fn cancel_grid(&self, _symbol: &str) -> ApiResult<OperationAck> {
            self.record("cancel_grid").await;
            self.cancel_response.lock().await.clone()
        }
    }
}
