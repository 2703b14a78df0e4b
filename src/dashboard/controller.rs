//! Dashboard controller: reads, polls and mutating operations over one state

use std::sync::Arc;

use log::{debug, info, warn};
use tokio::sync::RwLock;

use super::client::GridApi;
use super::errors::{ApiResult, DashboardError, DashboardResult};
use super::fetch::fetch_all;
use super::lock::{LockState, Operation, OperationGuard, OperationLock};
use super::state::{DashboardSnapshot, DashboardState};
use super::types::{GridParams, StatsPeriod, StatusResponse};
use super::view::{SideFilter, SortKey, StatusFilter};

/// Revision observed when a poll started
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollTicket {
    revision: u64,
}

/// Owns the dashboard state and every transition applied to it.
///
/// The state lock is only taken for short critical sections, never across a
/// call to the remote service.
pub struct Dashboard<A: GridApi> {
    api: Arc<A>,
    symbol: String,
    stats_period: StatsPeriod,
    state: RwLock<DashboardState>,
    lock: OperationLock,
}

impl<A: GridApi> Dashboard<A> {
    pub fn new(
        api: Arc<A>,
        symbol: impl Into<String>,
        stats_period: StatsPeriod,
        items_per_page: usize,
    ) -> Self {
        Self {
            api,
            symbol: symbol.into(),
            stats_period,
            state: RwLock::new(DashboardState::new(items_per_page)),
            lock: OperationLock::new(),
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn operation_state(&self) -> LockState {
        self.lock.state()
    }

    /// Full read of every source.
    ///
    /// Loading indicators are raised only for the first call. If a mutating
    /// operation is applied while the reads are in flight, the status part of
    /// the result is dropped.
    pub async fn load(&self) {
        let revision = {
            let mut state = self.state.write().await;
            state.begin_load();
            state.revision()
        };

        let outcome = fetch_all(self.api.as_ref(), &self.symbol, self.stats_period).await;
        if outcome.failures() > 0 {
            debug!("{} of the dashboard reads failed", outcome.failures());
        }

        let mut state = self.state.write().await;
        if state.revision() == revision && self.lock.is_idle() {
            state.apply_fetch(outcome);
        } else {
            state.apply_fetch_discarding_status(outcome);
        }
    }

    /// Lower the loading indicators of a load that was dropped midway
    pub async fn abort_load(&self) {
        self.state.write().await.abort_load();
    }

    /// Start a status poll, or `None` while a mutating operation is in flight
    pub async fn begin_poll(&self) -> Option<PollTicket> {
        if !self.lock.is_idle() {
            debug!("Skipping poll while {:?} is in flight", self.lock.state());
            return None;
        }
        let revision = self.state.read().await.revision();
        Some(PollTicket { revision })
    }

    /// Apply a status poll result unless it was superseded.
    ///
    /// Returns whether the result was applied.
    pub async fn apply_poll(&self, ticket: PollTicket, result: ApiResult<StatusResponse>) -> bool {
        let mut state = self.state.write().await;

        if state.revision() != ticket.revision || !self.lock.is_idle() {
            debug!(
                "Discarding poll started at revision {} (now {}, lock {:?})",
                ticket.revision,
                state.revision(),
                self.lock.state()
            );
            return false;
        }

        match result {
            Ok(response) => {
                state.apply_status(response);
                state.finish_sync();
            }
            Err(e) => state.apply_status_error(&e),
        }
        true
    }

    /// One status poll. Returns whether it changed the state.
    pub async fn poll(&self) -> bool {
        let Some(ticket) = self.begin_poll().await else {
            return false;
        };
        let result = self.api.grid_status().await;
        self.apply_poll(ticket, result).await
    }

    fn acquire(&self, op: Operation) -> DashboardResult<OperationGuard<'_>> {
        self.lock.try_acquire(op).ok_or_else(|| DashboardError::Busy {
            current: self.lock.state().operation().unwrap_or(op),
        })
    }

    /// Start a grid with the given parameters
    pub async fn create(&self, params: GridParams) -> DashboardResult<()> {
        params.validate()?;
        let _guard = self.acquire(Operation::Create)?;

        info!(
            "Creating grid: symbol={} positions={} amount={} distance={}..{}",
            params.symbol,
            params.positions,
            params.total_amount,
            params.min_distance,
            params.max_distance
        );

        match self.api.create_grid(&params).await {
            Ok(response) => {
                if !response.is_running() {
                    warn!("Create returned without a running grid");
                }
                self.state
                    .write()
                    .await
                    .apply_operation_status(Operation::Create, response);
                Ok(())
            }
            Err(e) => {
                self.state
                    .write()
                    .await
                    .record_operation_error(Operation::Create, &e);
                Err(e.into())
            }
        }
    }

    /// Stop the running grid, then refresh everything
    pub async fn stop(&self) -> DashboardResult<()> {
        let guard = self.acquire(Operation::Stop)?;
        info!("Stopping grid");

        match self.api.stop_grid().await {
            Ok(ack) => {
                if ack.is_error() {
                    warn!(
                        "Stop acknowledged with error: {}",
                        ack.message.as_deref().unwrap_or("no message")
                    );
                }
                self.state.write().await.apply_stopped();
            }
            Err(e) => {
                self.state
                    .write()
                    .await
                    .record_operation_error(Operation::Stop, &e);
                return Err(e.into());
            }
        }

        drop(guard);
        self.load().await;
        Ok(())
    }

    /// Cancel the grid orders of `symbol`, then refresh everything
    pub async fn cancel(&self, symbol: &str) -> DashboardResult<()> {
        if symbol.trim().is_empty() {
            return Err(DashboardError::InvalidParams("symbol cannot be empty".into()));
        }
        let guard = self.acquire(Operation::Cancel)?;
        info!("Cancelling grid orders for {}", symbol);

        match self.api.cancel_grid(symbol).await {
            Ok(ack) => {
                if ack.is_error() {
                    warn!(
                        "Cancel acknowledged with error: {}",
                        ack.message.as_deref().unwrap_or("no message")
                    );
                }
                self.state.write().await.apply_cancelled();
            }
            Err(e) => {
                self.state
                    .write()
                    .await
                    .record_operation_error(Operation::Cancel, &e);
                return Err(e.into());
            }
        }

        drop(guard);
        self.load().await;
        Ok(())
    }

    pub async fn toggle_sort(&self, key: SortKey) {
        self.state.write().await.view_mut().toggle_sort(key);
    }

    /// Change the side and/or status filter; either change resets the page
    pub async fn set_filter(&self, side: Option<SideFilter>, status: Option<StatusFilter>) {
        let mut state = self.state.write().await;
        if let Some(side) = side {
            state.view_mut().set_side_filter(side);
        }
        if let Some(status) = status {
            state.view_mut().set_status_filter(status);
        }
        state.clamp_page();
    }

    pub async fn set_page(&self, page: usize) {
        let mut state = self.state.write().await;
        state.view_mut().set_page(page);
        state.clamp_page();
    }

    pub async fn snapshot(&self) -> DashboardSnapshot {
        let operation = self.lock.state();
        self.state.read().await.snapshot(operation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::client::mock::MockGridApi;
    use crate::dashboard::errors::ApiError;
    use crate::dashboard::fetch::Source;
    use crate::dashboard::view::SortDirection;
    use crate::dashboard::types::{Balance, GridStatus, Order, OperationAck, OrderSide};

    fn order(id: &str, side: OrderSide, price: &str) -> Order {
        Order {
            symbol: "BTCUSDT".into(),
            order_id: id.into(),
            side,
            price: price.into(),
            orig_qty: "1".into(),
            executed_qty: "0".into(),
            order_type: "LIMIT".into(),
            state: "NEW".into(),
        }
    }

    fn snapshot(symbol: &str) -> GridStatus {
        GridStatus {
            symbol: symbol.into(),
            current_price: Some(100.0),
            balance: Some(Balance {
                currency: "usdt".into(),
                available_amount: "90".into(),
                frozen_amount: "10".into(),
                total_amount: "100".into(),
            }),
            open_orders: vec![
                order("1", OrderSide::Buy, "99"),
                order("2", OrderSide::Sell, "101"),
            ],
            positions: 5,
            total_amount: 100.0,
            min_distance: 0.5,
            max_distance: 10.0,
            is_running: true,
            ..Default::default()
        }
    }

    fn dashboard(api: MockGridApi) -> Dashboard<MockGridApi> {
        Dashboard::new(Arc::new(api), "BTCUSDT", StatsPeriod::All, 10)
    }

    #[tokio::test]
    async fn test_create_adopts_response_snapshot() {
        let api = MockGridApi::new();
        api.set_create_response(Ok(StatusResponse {
            status: Some("success".into()),
            is_running: Some(true),
            grid_status: Some(snapshot("BTCUSDT")),
        }))
        .await;
        let dash = dashboard(api);

        let params = GridParams::new("BTCUSDT", 5, 100.0, 0.5, 10.0);
        dash.create(params.clone()).await.unwrap();

        let snap = dash.snapshot().await;
        assert!(snap.is_running);
        assert_eq!(snap.grid_status.as_ref().unwrap().symbol, "BTCUSDT");
        assert_eq!(snap.open_order_count, 2);
        assert_eq!(snap.operation, LockState::Idle);
        assert!(snap.controls_enabled);
        assert_eq!(*dash.api().created.lock().await, vec![params]);
    }

    #[tokio::test]
    async fn test_create_failure_is_shown_and_releases_lock() {
        let api = MockGridApi::new();
        api.set_create_response(Err(ApiError::Application {
            status: 400,
            message: "Insufficient balance".into(),
        }))
        .await;
        let dash = dashboard(api);

        let err = dash.create(GridParams::default()).await.unwrap_err();
        assert!(matches!(err, DashboardError::Api(ApiError::Application { .. })));

        let snap = dash.snapshot().await;
        assert_eq!(snap.operation, LockState::Idle);
        let shown = snap.error.unwrap();
        assert_eq!(shown.message, "Insufficient balance");
        assert_eq!(shown.source, Source::Operation);
    }

    #[tokio::test]
    async fn test_invalid_params_never_reach_the_service() {
        let dash = dashboard(MockGridApi::new());
        let params = GridParams::new("BTCUSDT", 1, 100.0, 0.5, 10.0);

        let err = dash.create(params).await.unwrap_err();
        assert!(matches!(err, DashboardError::InvalidParams(_)));
        assert_eq!(dash.api().call_count("create_grid").await, 0);
    }

    #[tokio::test]
    async fn test_operation_refused_while_busy() {
        let dash = dashboard(MockGridApi::new());
        let _held = dash.lock.try_acquire(Operation::Create).unwrap();

        let err = dash.stop().await.unwrap_err();
        assert!(matches!(
            err,
            DashboardError::Busy {
                current: Operation::Create
            }
        ));
        assert_eq!(dash.api().call_count("stop_grid").await, 0);
    }

    #[tokio::test]
    async fn test_poll_skipped_while_busy() {
        let api = MockGridApi::new();
        api.set_status(Ok(StatusResponse::running_with(snapshot("BTCUSDT"))))
            .await;
        let dash = dashboard(api);

        {
            let _held = dash.lock.try_acquire(Operation::Stop).unwrap();
            assert!(!dash.poll().await);
            assert_eq!(dash.api().call_count("grid_status").await, 0);
        }

        assert!(dash.poll().await);
        assert!(dash.snapshot().await.is_running);
    }

    #[tokio::test]
    async fn test_stop_wins_over_stale_running_poll() {
        let api = MockGridApi::new();
        api.set_status(Ok(StatusResponse::running_with(snapshot("BTCUSDT"))))
            .await;
        let dash = dashboard(api);
        dash.load().await;
        assert!(dash.snapshot().await.is_running);

        // A poll starts and sees the grid still running
        let ticket = dash.begin_poll().await.unwrap();
        let stale = dash.api().grid_status().await;

        dash.api().set_status(Ok(StatusResponse::stopped())).await;
        dash.stop().await.unwrap();

        assert!(!dash.apply_poll(ticket, stale).await);
        let snap = dash.snapshot().await;
        assert!(!snap.is_running);
        assert!(snap.grid_status.is_none());
    }

    #[tokio::test]
    async fn test_stop_with_error_ack_still_clears() {
        let api = MockGridApi::new();
        api.set_create_response(Ok(StatusResponse::running_with(snapshot("BTCUSDT"))))
            .await;
        api.set_stop_response(Ok(OperationAck {
            status: Some("error".into()),
            message: Some("No active grid".into()),
        }))
        .await;
        let dash = dashboard(api);
        dash.create(GridParams::new("BTCUSDT", 5, 100.0, 0.5, 10.0))
            .await
            .unwrap();

        dash.stop().await.unwrap();
        assert!(dash.snapshot().await.grid_status.is_none());
        // Refresh ran after the lock was released
        assert_eq!(dash.api().call_count("balance").await, 1);
    }

    #[tokio::test]
    async fn test_cancel_refreshes_orders() {
        let api = MockGridApi::new();
        api.set_orders(Ok(vec![order("1", OrderSide::Buy, "99")])).await;
        let dash = dashboard(api);
        dash.load().await;
        assert_eq!(dash.snapshot().await.open_order_count, 1);

        dash.api().set_orders(Ok(Vec::new())).await;
        dash.cancel("BTCUSDT").await.unwrap();

        let snap = dash.snapshot().await;
        assert_eq!(snap.open_order_count, 0);
        assert_eq!(snap.operation, LockState::Idle);
        assert_eq!(dash.api().call_count("cancel_grid").await, 1);
    }

    #[tokio::test]
    async fn test_routine_network_failure_keeps_previous_state() {
        let api = MockGridApi::new();
        api.set_status(Ok(StatusResponse::running_with(snapshot("BTCUSDT"))))
            .await;
        let dash = dashboard(api);
        dash.load().await;

        dash.api()
            .set_status(Err(ApiError::Network("timed out".into())))
            .await;
        assert!(dash.poll().await);

        let snap = dash.snapshot().await;
        assert!(snap.is_running);
        assert!(snap.error.is_none());
    }

    #[tokio::test]
    async fn test_view_changes_flow_into_snapshot() {
        let api = MockGridApi::new();
        api.set_orders(Ok(vec![
            order("a", OrderSide::Buy, "10"),
            order("b", OrderSide::Sell, "5"),
            order("c", OrderSide::Buy, "8"),
        ]))
        .await;
        let dash = dashboard(api);
        dash.load().await;

        let prices: Vec<String> = dash
            .snapshot()
            .await
            .orders
            .orders
            .into_iter()
            .map(|o| o.price)
            .collect();
        assert_eq!(prices, vec!["5", "8", "10"]);

        dash.toggle_sort(SortKey::Price).await;
        dash.set_filter(Some(SideFilter::Buy), None).await;

        let snap = dash.snapshot().await;
        assert_eq!(snap.view.current_page, 1);
        // First click on price selects it ascending
        assert_eq!(snap.view.sort.direction, SortDirection::Asc);
        let ids: Vec<String> = snap.orders.orders.into_iter().map(|o| o.order_id).collect();
        assert_eq!(ids, vec!["c", "a"]);

        dash.toggle_sort(SortKey::Price).await;
        let snap = dash.snapshot().await;
        let ids: Vec<String> = snap.orders.orders.into_iter().map(|o| o.order_id).collect();
        assert_eq!(ids, vec!["a", "c"]);

        dash.set_page(7).await;
        assert_eq!(dash.snapshot().await.view.current_page, 1);
    }
}
