//! Concurrent, failure-isolated reads of every dashboard data source

use futures_util::future::join5;
use log::warn;
use serde::Serialize;

use super::client::GridApi;
use super::errors::ApiResult;
use super::types::{Balance, MarketInfo, MarketPrice, Order, StatsPeriod, StatsSummary, StatusResponse};

/// Data source behind one piece of dashboard state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Balance,
    Orders,
    Market,
    Status,
    Stats,
    Operation,
}

/// Market metadata and last price, fetched together
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketSnapshot {
    pub info: MarketInfo,
    pub price: MarketPrice,
}

/// Independent results of one `fetch_all`
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub balance: ApiResult<Balance>,
    pub orders: ApiResult<Vec<Order>>,
    pub market: ApiResult<MarketSnapshot>,
    pub status: ApiResult<StatusResponse>,
    pub stats: ApiResult<StatsSummary>,
}

impl FetchOutcome {
    /// Number of sources that failed
    pub fn failures(&self) -> usize {
        [
            self.balance.is_err(),
            self.orders.is_err(),
            self.market.is_err(),
            self.status.is_err(),
            self.stats.is_err(),
        ]
        .iter()
        .filter(|failed| **failed)
        .count()
    }
}

fn logged<T>(source: Source, result: ApiResult<T>) -> ApiResult<T> {
    if let Err(e) = &result {
        warn!("Fetching {:?} failed: {}", source, e);
    }
    result
}

async fn fetch_market<A: GridApi + ?Sized>(api: &A, symbol: &str) -> ApiResult<MarketSnapshot> {
    let (info, price) = tokio::join!(api.market_info(symbol), api.market_price(symbol));
    Ok(MarketSnapshot {
        info: info?,
        price: price?,
    })
}

/// Issue every read call concurrently.
///
/// Completions may arrive in any order; each lands in its own field, so one
/// failing call never affects the others.
pub async fn fetch_all<A: GridApi + ?Sized>(
    api: &A,
    symbol: &str,
    period: StatsPeriod,
) -> FetchOutcome {
    let (balance, orders, market, status, stats) = join5(
        api.balance(),
        api.open_orders(symbol),
        fetch_market(api, symbol),
        api.grid_status(),
        api.stats_summary(period),
    )
    .await;

    FetchOutcome {
        balance: logged(Source::Balance, balance),
        orders: logged(Source::Orders, orders),
        market: logged(Source::Market, market),
        status: logged(Source::Status, status),
        stats: logged(Source::Stats, stats),
    }
}
