//! Canonical dashboard state and its serializable snapshot

use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::Serialize;

use super::errors::ApiError;
use super::fetch::{FetchOutcome, MarketSnapshot, Source};
use super::lock::{LockState, Operation};
use super::reconcile::{poll_error_disposition, reconcile, ErrorDisposition, PollPhase};
use super::types::{Balance, GridStatus, Order, StatsSummary, StatusResponse};
use super::view::{available_states, derive, OrderPage, OrderView};

/// Per-source loading indicators, only raised during the first load
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadingFlags {
    pub balance: bool,
    pub orders: bool,
    pub market: bool,
    pub status: bool,
    pub stats: bool,
}

impl LoadingFlags {
    fn all() -> Self {
        Self {
            balance: true,
            orders: true,
            market: true,
            status: true,
            stats: true,
        }
    }

    pub fn any(&self) -> bool {
        self.balance || self.orders || self.market || self.status || self.stats
    }
}

/// The single error currently shown to the operator
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayedError {
    pub message: String,
    pub source: Source,
    pub at: DateTime<Utc>,
}

/// Everything the dashboard knows, owned in one place.
///
/// Balance, open orders and market data are replaced wholesale by successful
/// fetches and left untouched by failed ones. `grid_status` is present only
/// while the remote strategy runs.
#[derive(Debug, Clone)]
pub struct DashboardState {
    balance: Option<Balance>,
    open_orders: Vec<Order>,
    market: Option<MarketSnapshot>,
    stats: Option<StatsSummary>,
    grid_status: Option<GridStatus>,
    is_running: bool,
    error: Option<DisplayedError>,
    loading: LoadingFlags,
    initial_load_done: bool,
    revision: u64,
    last_synced: Option<DateTime<Utc>>,
    view: OrderView,
}

impl DashboardState {
    pub fn new(items_per_page: usize) -> Self {
        Self {
            balance: None,
            open_orders: Vec::new(),
            market: None,
            stats: None,
            grid_status: None,
            is_running: false,
            error: None,
            loading: LoadingFlags::default(),
            initial_load_done: false,
            revision: 0,
            last_synced: None,
            view: OrderView::new(items_per_page),
        }
    }

    pub fn is_running(&self) -> bool {
        self.is_running
    }

    pub fn grid_status(&self) -> Option<&GridStatus> {
        self.grid_status.as_ref()
    }

    pub fn balance(&self) -> Option<&Balance> {
        self.balance.as_ref()
    }

    pub fn open_orders(&self) -> &[Order] {
        &self.open_orders
    }

    pub fn market(&self) -> Option<&MarketSnapshot> {
        self.market.as_ref()
    }

    pub fn stats(&self) -> Option<&StatsSummary> {
        self.stats.as_ref()
    }

    pub fn error(&self) -> Option<&DisplayedError> {
        self.error.as_ref()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error.as_ref().map(|e| e.message.as_str())
    }

    pub fn loading(&self) -> LoadingFlags {
        self.loading
    }

    pub fn initial_load_done(&self) -> bool {
        self.initial_load_done
    }

    /// Bumped by every applied mutating operation
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn view(&self) -> &OrderView {
        &self.view
    }

    /// Phase the next read belongs to
    pub fn phase(&self) -> PollPhase {
        if self.initial_load_done {
            PollPhase::Routine
        } else {
            PollPhase::Initial
        }
    }

    /// Raise loading indicators, but only before the first load completed
    pub fn begin_load(&mut self) {
        if !self.initial_load_done {
            self.loading = LoadingFlags::all();
        }
    }

    /// A load was abandoned before its results arrived
    pub fn abort_load(&mut self) {
        self.loading = LoadingFlags::default();
    }

    /// Apply the results of one `fetch_all`.
    ///
    /// Status goes last: a running snapshot carries its own balance and
    /// orders, which supersede the separately fetched ones.
    pub fn apply_fetch(&mut self, outcome: FetchOutcome) {
        self.apply_reads(outcome, true);
    }

    /// Like `apply_fetch`, but a mutating operation landed while the reads
    /// were in flight, so the status payload is out of date.
    pub fn apply_fetch_discarding_status(&mut self, outcome: FetchOutcome) {
        self.apply_reads(outcome, false);
    }

    fn apply_reads(&mut self, outcome: FetchOutcome, with_status: bool) {
        let phase = self.phase();
        // A newer running snapshot owns balance and orders; reads that
        // started before it must not replace them.
        let snapshot_owned = !with_status && self.grid_status.is_some();
        if snapshot_owned {
            debug!("Keeping balance and orders from the running snapshot");
        }

        match outcome.balance {
            _ if snapshot_owned => {}
            Ok(balance) => {
                self.balance = Some(balance);
                self.clear_error_from(Source::Balance);
            }
            Err(e) => self.record_read_error(Source::Balance, &e, phase),
        }
        self.loading.balance = false;

        match outcome.orders {
            _ if snapshot_owned => {}
            Ok(orders) => {
                self.replace_orders(orders);
                self.clear_error_from(Source::Orders);
            }
            Err(e) => self.record_read_error(Source::Orders, &e, phase),
        }
        self.loading.orders = false;

        match outcome.market {
            Ok(market) => {
                self.market = Some(market);
                self.clear_error_from(Source::Market);
            }
            Err(e) => self.record_read_error(Source::Market, &e, phase),
        }
        self.loading.market = false;

        match outcome.stats {
            Ok(stats) => {
                self.stats = Some(stats);
                self.clear_error_from(Source::Stats);
            }
            Err(e) => self.record_read_error(Source::Stats, &e, phase),
        }
        self.loading.stats = false;

        match outcome.status {
            Ok(response) if with_status => self.apply_status(response),
            Ok(_) => debug!("Dropping status from a superseded fetch"),
            Err(e) if with_status => self.record_read_error(Source::Status, &e, phase),
            Err(_) => {}
        }
        self.loading.status = false;

        self.finish_sync();
    }

    /// Reconcile a successful status payload
    pub fn apply_status(&mut self, response: StatusResponse) {
        let reconciled = reconcile(self.grid_status.as_ref(), response);

        if reconciled.is_running != self.is_running {
            info!(
                "Grid is now {}",
                if reconciled.is_running { "running" } else { "stopped" }
            );
        }

        self.is_running = reconciled.is_running;
        self.grid_status = reconciled.status;

        if let Some(status) = &self.grid_status {
            if let Some(balance) = &status.balance {
                self.balance = Some(balance.clone());
            }
            let orders = status.open_orders.clone();
            self.replace_orders(orders);
        }

        self.clear_error_from(Source::Status);
    }

    /// A status poll failed
    pub fn apply_status_error(&mut self, err: &ApiError) {
        let phase = self.phase();
        self.record_read_error(Source::Status, err, phase);
        self.loading.status = false;
    }

    /// Mark the end of a read cycle
    pub fn finish_sync(&mut self) {
        self.initial_load_done = true;
        self.last_synced = Some(Utc::now());
    }

    /// A mutating operation succeeded and produced a new status payload
    pub fn apply_operation_status(&mut self, op: Operation, response: StatusResponse) {
        self.revision += 1;
        debug!("{} applied, revision {}", op, self.revision);
        self.apply_status(response);
        self.clear_error_from(Source::Operation);
    }

    /// `stop` succeeded: hard reset to not running
    pub fn apply_stopped(&mut self) {
        self.apply_operation_status(Operation::Stop, StatusResponse::stopped());
    }

    /// `cancel` succeeded; the order list is refreshed separately
    pub fn apply_cancelled(&mut self) {
        self.revision += 1;
        debug!("cancel applied, revision {}", self.revision);
        self.clear_error_from(Source::Operation);
    }

    /// Errors of user-triggered operations are always shown
    pub fn record_operation_error(&mut self, op: Operation, err: &ApiError) {
        let message = err.user_message();
        info!("{} failed: {}", op, message);
        self.show_error(Source::Operation, message);
    }

    pub fn view_mut(&mut self) -> &mut OrderView {
        &mut self.view
    }

    /// Pull the stored page back into range after the list or filter changed
    pub fn clamp_page(&mut self) {
        self.view.derive(&self.open_orders);
    }

    /// Serializable view model for a rendering layer
    pub fn snapshot(&self, operation: LockState) -> DashboardSnapshot {
        let orders = derive(
            &self.open_orders,
            &self.view.filter,
            &self.view.sort,
            self.view.current_page,
            self.view.items_per_page,
        );

        DashboardSnapshot {
            is_running: self.is_running,
            grid_status: self.grid_status.clone(),
            balance: self.balance.clone(),
            market: self.market.clone(),
            stats: self.stats.clone(),
            error: self.error.clone(),
            operation,
            controls_enabled: operation == LockState::Idle,
            loading: self.loading,
            initial_load_done: self.initial_load_done,
            last_synced: self.last_synced,
            open_order_count: self.open_orders.len(),
            order_states: available_states(&self.open_orders),
            view: self.view.clone(),
            orders,
        }
    }

    fn replace_orders(&mut self, orders: Vec<Order>) {
        self.open_orders = orders;
        self.clamp_page();
    }

    fn record_read_error(&mut self, source: Source, err: &ApiError, phase: PollPhase) {
        match poll_error_disposition(phase, err, self.error_message()) {
            ErrorDisposition::Show(message) => self.show_error(source, message),
            ErrorDisposition::Suppress => debug!("Suppressed {:?} error: {}", source, err),
        }
    }

    fn show_error(&mut self, source: Source, message: String) {
        self.error = Some(DisplayedError {
            message,
            source,
            at: Utc::now(),
        });
    }

    fn clear_error_from(&mut self, source: Source) {
        if self.error.as_ref().map(|e| e.source) == Some(source) {
            self.error = None;
        }
    }
}

/// Point-in-time copy of the dashboard for rendering
#[derive(Debug, Clone, Serialize)]
pub struct DashboardSnapshot {
    pub is_running: bool,
    pub grid_status: Option<GridStatus>,
    pub balance: Option<Balance>,
    pub market: Option<MarketSnapshot>,
    pub stats: Option<StatsSummary>,
    pub error: Option<DisplayedError>,
    pub operation: LockState,
    /// Create, stop and cancel triggers are enabled only while idle
    pub controls_enabled: bool,
    pub loading: LoadingFlags,
    pub initial_load_done: bool,
    pub last_synced: Option<DateTime<Utc>>,
    pub open_order_count: usize,
    pub order_states: Vec<String>,
    pub view: OrderView,
    pub orders: OrderPage,
}

impl DashboardSnapshot {
    /// One-line summary for logs
    pub fn summary_line(&self) -> String {
        let balance = self
            .balance
            .as_ref()
            .and_then(|b| b.available())
            .map(|v| format!("{:.2}", v))
            .unwrap_or_else(|| "n/a".to_string());

        let price = self
            .grid_status
            .as_ref()
            .and_then(|s| s.current_price)
            .or_else(|| self.market.as_ref().map(|m| m.price.price))
            .map(|p| format!("{}", p))
            .unwrap_or_else(|| "n/a".to_string());

        let mut line = format!(
            "{} | price={} | available={} | open_orders={}",
            if self.is_running { "RUNNING" } else { "STOPPED" },
            price,
            balance,
            self.open_order_count
        );

        if let Some(status) = &self.grid_status {
            line.push_str(&format!(
                " | trades={} pnl={:.4}",
                status.stats.total_trades, status.stats.realized_pnl
            ));
        }

        if let Some(error) = &self.error {
            line.push_str(&format!(" | error: {}", error.message));
        }

        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::fetch::MarketSnapshot;
    use crate::dashboard::types::{GridStats, MarketInfo, MarketPrice, OrderSide, StatsSummary};

    fn order(id: &str, price: &str) -> Order {
        Order {
            symbol: "AIPG_USDT".into(),
            order_id: id.into(),
            side: OrderSide::Buy,
            price: price.into(),
            orig_qty: "10".into(),
            executed_qty: "0".into(),
            order_type: "LIMIT".into(),
            state: "NEW".into(),
        }
    }

    fn balance(available: &str) -> Balance {
        Balance {
            currency: "usdt".into(),
            available_amount: available.into(),
            frozen_amount: "0".into(),
            total_amount: available.into(),
        }
    }

    fn running(price: f64, orders: Vec<Order>) -> StatusResponse {
        StatusResponse::running_with(GridStatus {
            symbol: "AIPG_USDT".into(),
            current_price: Some(price),
            balance: Some(balance("99")),
            open_orders: orders,
            positions: 20,
            stats: GridStats {
                total_trades: 2,
                ..Default::default()
            },
            ..Default::default()
        })
    }

    fn outcome_ok() -> FetchOutcome {
        FetchOutcome {
            balance: Ok(balance("150")),
            orders: Ok(vec![order("1", "0.1")]),
            market: Ok(MarketSnapshot {
                info: MarketInfo {
                    symbol: "aipg_usdt".into(),
                    ..Default::default()
                },
                price: MarketPrice {
                    price: 0.11,
                    market_info: None,
                },
            }),
            status: Ok(StatusResponse::stopped()),
            stats: Ok(StatsSummary::default()),
        }
    }

    fn network() -> ApiError {
        ApiError::Network("connection refused".into())
    }

    #[test]
    fn test_initial_failure_leaves_slot_unset_and_shows_error() {
        let mut state = DashboardState::new(10);
        state.begin_load();
        assert!(state.loading().any());

        let mut outcome = outcome_ok();
        outcome.balance = Err(network());
        outcome.orders = Err(network());
        state.apply_fetch(outcome);

        assert!(state.balance().is_none());
        assert!(state.open_orders().is_empty());
        assert!(state.market().is_some());
        assert!(state.error().is_some());
        assert!(!state.loading().any());
        assert!(state.initial_load_done());
    }

    #[test]
    fn test_aborted_load_lowers_loading_flags() {
        let mut state = DashboardState::new(10);
        state.begin_load();
        state.abort_load();
        assert!(!state.loading().any());
        assert!(!state.initial_load_done());
    }

    #[test]
    fn test_refresh_failure_keeps_previous_values() {
        let mut state = DashboardState::new(10);
        state.apply_fetch(outcome_ok());

        state.begin_load();
        assert!(!state.loading().any(), "no loading flicker on refresh");

        let mut outcome = outcome_ok();
        outcome.balance = Err(network());
        outcome.orders = Err(network());
        state.apply_fetch(outcome);

        assert_eq!(state.balance().unwrap().available(), Some(150.0));
        assert_eq!(state.open_orders().len(), 1);
        // Network errors on refresh stay silent
        assert!(state.error().is_none());
    }

    #[test]
    fn test_running_snapshot_supersedes_separate_reads() {
        let mut state = DashboardState::new(10);
        let mut outcome = outcome_ok();
        outcome.status = Ok(running(0.12, vec![order("7", "0.2"), order("8", "0.3")]));
        state.apply_fetch(outcome);

        assert!(state.is_running());
        assert_eq!(state.balance().unwrap().available(), Some(99.0));
        assert_eq!(state.open_orders().len(), 2);
    }

    #[test]
    fn test_superseded_fetch_keeps_operation_result() {
        let mut state = DashboardState::new(10);
        state.apply_stopped();

        let mut outcome = outcome_ok();
        outcome.status = Ok(running(0.12, vec![order("7", "0.2")]));
        state.apply_fetch_discarding_status(outcome);

        assert!(!state.is_running());
        assert!(state.grid_status().is_none());
        assert_eq!(state.open_orders().len(), 1);
    }

    #[test]
    fn test_superseded_fetch_keeps_newer_running_snapshot_data() {
        let mut state = DashboardState::new(10);
        state.apply_operation_status(
            Operation::Create,
            running(0.12, vec![order("7", "0.2"), order("8", "0.3")]),
        );

        let mut outcome = outcome_ok();
        outcome.balance = Ok(balance("200"));
        outcome.orders = Ok(Vec::new());
        outcome.market = Ok(MarketSnapshot {
            info: MarketInfo::default(),
            price: MarketPrice {
                price: 0.5,
                market_info: None,
            },
        });
        outcome.status = Ok(StatusResponse::stopped());
        state.apply_fetch_discarding_status(outcome);

        assert!(state.is_running());
        assert_eq!(state.grid_status().unwrap().open_orders.len(), 2);
        assert_eq!(state.open_orders().len(), 2);
        assert_eq!(state.balance().unwrap().available(), Some(99.0));
        // Sources the snapshot does not carry are still refreshed
        assert_eq!(state.market().unwrap().price.price, 0.5);
    }

    #[test]
    fn test_stop_transition_is_hard_reset() {
        let mut state = DashboardState::new(10);
        state.apply_status(running(0.12, vec![order("7", "0.2")]));
        assert!(state.grid_status().is_some());

        state.apply_status(StatusResponse::stopped());
        assert!(!state.is_running());
        assert!(state.grid_status().is_none());
    }

    #[test]
    fn test_routine_error_shown_once_and_cleared_by_success() {
        let mut state = DashboardState::new(10);
        state.apply_fetch(outcome_ok());

        let err = ApiError::Application {
            status: 500,
            message: "Database connection error. Please try again later.".into(),
        };
        state.apply_status_error(&err);
        let first = state.error().cloned().unwrap();
        assert_eq!(first.source, Source::Status);

        // Same message again does not replace the banner
        state.apply_status_error(&err);
        assert_eq!(state.error().unwrap().at, first.at);

        state.apply_status(StatusResponse::stopped());
        assert!(state.error().is_none());
    }

    #[test]
    fn test_success_of_other_source_keeps_error() {
        let mut state = DashboardState::new(10);
        state.apply_fetch(outcome_ok());
        state.record_operation_error(
            Operation::Create,
            &ApiError::Application {
                status: 500,
                message: "Insufficient balance".into(),
            },
        );

        state.apply_status(StatusResponse::stopped());
        assert_eq!(state.error_message(), Some("Insufficient balance"));

        state.apply_operation_status(Operation::Create, running(0.1, vec![]));
        assert!(state.error().is_none());
    }

    #[test]
    fn test_operations_bump_revision() {
        let mut state = DashboardState::new(10);
        assert_eq!(state.revision(), 0);
        state.apply_stopped();
        state.apply_cancelled();
        assert_eq!(state.revision(), 2);
    }

    #[test]
    fn test_shrinking_order_list_clamps_page() {
        let mut state = DashboardState::new(2);
        let orders: Vec<Order> = (0..6).map(|i| order(&i.to_string(), "1")).collect();
        state.apply_status(running(0.1, orders));
        state.view_mut().set_page(3);
        state.clamp_page();
        assert_eq!(state.view().current_page, 3);

        state.apply_status(running(0.1, vec![order("1", "1")]));
        assert_eq!(state.view().current_page, 1);
    }

    #[test]
    fn test_snapshot_and_summary() {
        let mut state = DashboardState::new(10);
        state.apply_status(running(0.12, vec![order("1", "0.1")]));

        let snapshot = state.snapshot(LockState::Stop);
        assert!(!snapshot.controls_enabled);
        assert_eq!(snapshot.orders.total, 1);
        assert_eq!(snapshot.order_states, vec!["NEW"]);

        let line = snapshot.summary_line();
        assert!(line.starts_with("RUNNING"));
        assert!(line.contains("available=99.00"));
        assert!(line.contains("trades=2"));

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["operation"], "stop");
        assert_eq!(json["view"]["sort"]["key"], "price");
    }
}
