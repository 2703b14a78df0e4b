//! Wire and domain types exchanged with the grid service

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::errors::{DashboardError, DashboardResult};

/// Accepts a decimal transmitted either as a string or as a JSON number and
/// keeps its textual form. `null` becomes an empty string.
mod decimal {
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(serde_json::Number),
    }

    pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Option::<Raw>::deserialize(deserializer)? {
            Some(Raw::Text(s)) => s,
            Some(Raw::Number(n)) => n.to_string(),
            None => String::new(),
        })
    }
}

/// Parse a decimal string for display or comparison
pub fn parse_decimal(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Order side as reported by the exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderSide {
    #[serde(rename = "BUY", alias = "buy", alias = "Buy")]
    Buy,
    #[serde(rename = "SELL", alias = "sell", alias = "Sell")]
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "BUY",
            OrderSide::Sell => "SELL",
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Account balance for one currency; amounts stay decimal strings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Balance {
    #[serde(default)]
    pub currency: String,
    #[serde(default, deserialize_with = "decimal::deserialize")]
    pub available_amount: String,
    #[serde(default, deserialize_with = "decimal::deserialize")]
    pub frozen_amount: String,
    #[serde(default, deserialize_with = "decimal::deserialize")]
    pub total_amount: String,
}

impl Balance {
    pub fn available(&self) -> Option<f64> {
        parse_decimal(&self.available_amount)
    }

    pub fn frozen(&self) -> Option<f64> {
        parse_decimal(&self.frozen_amount)
    }

    pub fn total(&self) -> Option<f64> {
        parse_decimal(&self.total_amount)
    }
}

/// An open order on the exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(default)]
    pub symbol: String,
    /// Unique within a symbol
    #[serde(deserialize_with = "decimal::deserialize")]
    pub order_id: String,
    pub side: OrderSide,
    #[serde(default, deserialize_with = "decimal::deserialize")]
    pub price: String,
    #[serde(default, deserialize_with = "decimal::deserialize")]
    pub orig_qty: String,
    #[serde(default, deserialize_with = "decimal::deserialize")]
    pub executed_qty: String,
    #[serde(rename = "type", default)]
    pub order_type: String,
    #[serde(default)]
    pub state: String,
}

impl Order {
    pub fn price_value(&self) -> Option<f64> {
        parse_decimal(&self.price)
    }

    pub fn orig_qty_value(&self) -> Option<f64> {
        parse_decimal(&self.orig_qty)
    }

    pub fn executed_qty_value(&self) -> Option<f64> {
        parse_decimal(&self.executed_qty)
    }

    /// Fraction of the order already executed, in [0, 1]
    pub fn fill_ratio(&self) -> f64 {
        match (self.executed_qty_value(), self.orig_qty_value()) {
            (Some(done), Some(orig)) if orig > 0.0 => (done / orig).clamp(0.0, 1.0),
            _ => 0.0,
        }
    }
}

/// Interpret an orders payload; anything that is not an array is empty
pub fn orders_from_value(value: Value) -> Result<Vec<Order>, serde_json::Error> {
    match value {
        Value::Array(_) => serde_json::from_value(value),
        _ => Ok(Vec::new()),
    }
}

fn lenient_orders<'de, D>(deserializer: D) -> Result<Vec<Order>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    orders_from_value(value).map_err(serde::de::Error::custom)
}

/// Trading statistics of the running grid
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GridStats {
    #[serde(default)]
    pub total_trades: u64,
    #[serde(default)]
    pub total_volume: f64,
    #[serde(default)]
    pub total_fees: f64,
    #[serde(default)]
    pub realized_pnl: f64,
}

/// Snapshot of a running grid strategy.
///
/// Only exists while the remote strategy runs; a stopped strategy is
/// represented by the absence of this value, never by a zeroed one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GridStatus {
    pub symbol: String,
    #[serde(default)]
    pub current_price: Option<f64>,
    #[serde(default)]
    pub balance: Option<Balance>,
    #[serde(default, deserialize_with = "lenient_orders")]
    pub open_orders: Vec<Order>,
    #[serde(default)]
    pub positions: u32,
    #[serde(default)]
    pub stats: GridStats,
    #[serde(default)]
    pub total_amount: f64,
    #[serde(default)]
    pub min_distance: f64,
    #[serde(default)]
    pub max_distance: f64,
    #[serde(default)]
    pub upper_price: Option<f64>,
    #[serde(default)]
    pub lower_price: Option<f64>,
    #[serde(default)]
    pub grid_spread: Option<f64>,
    #[serde(default)]
    pub avg_distance: Option<f64>,
    #[serde(default)]
    pub is_running: bool,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Payload of the status poll and of the create call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_running: Option<bool>,
    #[serde(default)]
    pub grid_status: Option<GridStatus>,
}

impl StatusResponse {
    /// Response reporting a running grid
    pub fn running_with(status: GridStatus) -> Self {
        Self {
            status: None,
            is_running: Some(true),
            grid_status: Some(status),
        }
    }

    /// Response reporting no active grid
    pub fn stopped() -> Self {
        Self {
            status: None,
            is_running: Some(false),
            grid_status: None,
        }
    }

    /// The top-level flag wins; the create response only carries it inside
    /// the snapshot.
    pub fn is_running(&self) -> bool {
        match self.is_running {
            Some(flag) => flag,
            None => self
                .grid_status
                .as_ref()
                .map(|s| s.is_running)
                .unwrap_or(false),
        }
    }
}

/// Market metadata for a symbol
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketInfo {
    pub symbol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, rename = "currentPrice", skip_serializing_if = "Option::is_none")]
    pub current_price: Option<f64>,
}

/// Last traded price for a symbol
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketPrice {
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_info: Option<MarketInfo>,
}

/// Acknowledgement body of stop and cancel
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationAck {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl OperationAck {
    pub fn is_error(&self) -> bool {
        self.status.as_deref() == Some("error")
    }
}

/// Response of the service health check
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Health {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: String,
}

/// Aggregation window for the stats summary
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatsPeriod {
    #[default]
    All,
    Day,
    Week,
    Month,
}

impl StatsPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatsPeriod::All => "all",
            StatsPeriod::Day => "day",
            StatsPeriod::Week => "week",
            StatsPeriod::Month => "month",
        }
    }
}

impl FromStr for StatsPeriod {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "all" => Ok(StatsPeriod::All),
            "day" => Ok(StatsPeriod::Day),
            "week" => Ok(StatsPeriod::Week),
            "month" => Ok(StatsPeriod::Month),
            other => Err(DashboardError::Config(format!(
                "unknown stats period '{}'",
                other
            ))),
        }
    }
}

/// Aggregated totals over all grids in a period
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsTotals {
    #[serde(default)]
    pub total_trades: u64,
    #[serde(default)]
    pub total_volume: f64,
    #[serde(default)]
    pub total_fees: f64,
    #[serde(default)]
    pub total_pnl: f64,
    #[serde(default)]
    pub net_profit: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsSummary {
    #[serde(default)]
    pub period: String,
    #[serde(default)]
    pub summary: StatsTotals,
}

/// Parameters submitted to start a grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridParams {
    pub symbol: String,
    pub positions: u32,
    pub total_amount: f64,
    /// Percentage below the current price for the nearest level
    pub min_distance: f64,
    /// Percentage above the current price for the farthest level
    pub max_distance: f64,
}

impl Default for GridParams {
    fn default() -> Self {
        Self {
            symbol: "AIPG_USDT".to_string(),
            positions: 20,
            total_amount: 200.0,
            min_distance: 0.5,
            max_distance: 10.0,
        }
    }
}

impl GridParams {
    pub const MIN_POSITIONS: u32 = 2;
    pub const MAX_POSITIONS: u32 = 50;

    pub fn new(
        symbol: impl Into<String>,
        positions: u32,
        total_amount: f64,
        min_distance: f64,
        max_distance: f64,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            positions,
            total_amount,
            min_distance,
            max_distance,
        }
    }

    /// Reject parameters the service would refuse or misuse
    pub fn validate(&self) -> DashboardResult<()> {
        if self.symbol.trim().is_empty() {
            return Err(DashboardError::InvalidParams("symbol cannot be empty".into()));
        }

        if !(Self::MIN_POSITIONS..=Self::MAX_POSITIONS).contains(&self.positions) {
            return Err(DashboardError::InvalidParams(format!(
                "positions must be between {} and {}",
                Self::MIN_POSITIONS,
                Self::MAX_POSITIONS
            )));
        }

        if !(self.total_amount.is_finite() && self.total_amount > 0.0) {
            return Err(DashboardError::InvalidParams(
                "total_amount must be positive".into(),
            ));
        }

        if !(self.min_distance.is_finite() && self.min_distance > 0.0) {
            return Err(DashboardError::InvalidParams(
                "min_distance must be positive".into(),
            ));
        }

        if !(self.max_distance.is_finite() && self.max_distance > self.min_distance) {
            return Err(DashboardError::InvalidParams(
                "max_distance must be greater than min_distance".into(),
            ));
        }

        Ok(())
    }
}
