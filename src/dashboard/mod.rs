//! Grid Trading Dashboard
//!
//! Client-side core of a dashboard for a remote grid-trading service: it
//! reads balance, open orders, market data and strategy status over REST,
//! keeps them in one canonical state and lets an operator create, stop or
//! cancel the grid.
//!
//! # Architecture
//!
//! - [`errors`] - Error classification and dashboard errors
//! - [`types`] - Wire types (Balance, Order, GridStatus, GridParams, ...)
//! - [`client`] - Service abstraction (`GridApi`), reqwest client and mock
//! - [`fetch`] - Concurrent, failure-isolated reads
//! - [`reconcile`] - Status payload merge and poll error policy
//! - [`lock`] - Single-flight operation lock
//! - [`view`] - Filtering, sorting and pagination of open orders
//! - [`state`] - Canonical state and the serializable snapshot
//! - [`controller`] - Operations over the state
//! - [`scheduler`] - Periodic status polling
//! - [`server`] - Local HTTP surface
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use grid_dashboard::dashboard::{
//!     Dashboard, GridParams, HttpGridApi, PollingScheduler, StatsPeriod,
//! };
//!
//! let api = HttpGridApi::new("http://localhost:8000", Duration::from_secs(10))?;
//! let dashboard = Arc::new(Dashboard::new(Arc::new(api), "AIPG_USDT", StatsPeriod::All, 10));
//!
//! let mut polling = PollingScheduler::start(dashboard.clone(), Duration::from_secs(30));
//! dashboard.create(GridParams::default()).await?;
//! println!("{}", dashboard.snapshot().await.summary_line());
//! polling.stop().await;
//! ```
//!
//! # Testing
//!
//! ```rust,ignore
//! use grid_dashboard::dashboard::client::mock::MockGridApi;
//!
//! let api = MockGridApi::new();
//! api.set_status(Ok(StatusResponse::stopped())).await;
//! ```

pub mod client;
pub mod controller;
pub mod errors;
pub mod fetch;
pub mod lock;
pub mod reconcile;
pub mod scheduler;
pub mod server;
pub mod state;
pub mod types;
pub mod view;

// Re-export commonly used types
pub use client::{GridApi, HttpGridApi};
pub use controller::{Dashboard, PollTicket};
pub use errors::{ApiError, ApiResult, DashboardError, DashboardResult};
pub use fetch::{fetch_all, FetchOutcome, MarketSnapshot, Source};
pub use lock::{LockState, Operation, OperationGuard, OperationLock};
pub use reconcile::{poll_error_disposition, reconcile, ErrorDisposition, PollPhase, Reconciled};
pub use scheduler::{PollingHandle, PollingScheduler, DEFAULT_POLL_INTERVAL};
pub use server::{router, start_server};
pub use state::{DashboardSnapshot, DashboardState, DisplayedError, LoadingFlags};
pub use types::{
    Balance, GridParams, GridStats, GridStatus, Health, MarketInfo, MarketPrice, OperationAck,
    Order, OrderSide, StatsPeriod, StatsSummary, StatsTotals, StatusResponse,
};
pub use view::{
    derive, OrderPage, OrderView, SideFilter, SortConfig, SortDirection, SortKey, StatusFilter,
    ViewFilter, DEFAULT_PAGE_SIZE,
};
