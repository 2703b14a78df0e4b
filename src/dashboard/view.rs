//! Filtered, sorted and paginated view of the open orders

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::DashboardError;
use super::types::{parse_decimal, Order, OrderSide};

/// Default number of orders per page
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Column the order table is sorted by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortKey {
    Side,
    Price,
    OrigQty,
    ExecutedQty,
    State,
}

impl SortKey {
    fn is_numeric(&self) -> bool {
        matches!(self, SortKey::Price | SortKey::OrigQty | SortKey::ExecutedQty)
    }
}

impl FromStr for SortKey {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "side" => Ok(SortKey::Side),
            "price" => Ok(SortKey::Price),
            "origQty" | "orig_qty" => Ok(SortKey::OrigQty),
            "executedQty" | "executed_qty" => Ok(SortKey::ExecutedQty),
            "state" => Ok(SortKey::State),
            other => Err(DashboardError::InvalidParams(format!(
                "unknown sort key '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn flipped(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }
}

/// The single active sort key and its direction.
///
/// Until the operator picks a column the table is shown by price ascending,
/// and that initial order does not count as a selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortConfig {
    pub key: SortKey,
    pub direction: SortDirection,
    #[serde(default)]
    pub selected: bool,
}

impl Default for SortConfig {
    fn default() -> Self {
        Self {
            key: SortKey::Price,
            direction: SortDirection::Asc,
            selected: false,
        }
    }
}

impl SortConfig {
    /// An explicitly chosen key and direction
    pub fn new(key: SortKey, direction: SortDirection) -> Self {
        Self {
            key,
            direction,
            selected: true,
        }
    }

    /// Same selected key flips the direction; a new key starts ascending
    pub fn toggle(&mut self, key: SortKey) {
        if self.selected && self.key == key {
            self.direction = self.direction.flipped();
        } else {
            self.key = key;
            self.direction = SortDirection::Asc;
            self.selected = true;
        }
    }

    fn compare(&self, a: &Order, b: &Order) -> Ordering {
        let ordering = if self.key.is_numeric() {
            let value = |o: &Order| {
                let raw = match self.key {
                    SortKey::Price => &o.price,
                    SortKey::OrigQty => &o.orig_qty,
                    _ => &o.executed_qty,
                };
                parse_decimal(raw).unwrap_or(0.0)
            };
            value(a).total_cmp(&value(b))
        } else {
            match self.key {
                SortKey::Side => a.side.as_str().cmp(b.side.as_str()),
                _ => a.state.cmp(&b.state),
            }
        };

        match self.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SideFilter {
    #[default]
    All,
    Buy,
    Sell,
}

impl SideFilter {
    fn accepts(&self, side: OrderSide) -> bool {
        match self {
            SideFilter::All => true,
            SideFilter::Buy => side == OrderSide::Buy,
            SideFilter::Sell => side == OrderSide::Sell,
        }
    }
}

/// `ALL` or one exact order state such as `NEW`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StatusFilter {
    #[default]
    All,
    State(String),
}

impl From<String> for StatusFilter {
    fn from(s: String) -> Self {
        if s.eq_ignore_ascii_case("ALL") {
            StatusFilter::All
        } else {
            StatusFilter::State(s)
        }
    }
}

impl From<StatusFilter> for String {
    fn from(f: StatusFilter) -> Self {
        f.to_string()
    }
}

impl fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusFilter::All => f.write_str("ALL"),
            StatusFilter::State(s) => f.write_str(s),
        }
    }
}

impl StatusFilter {
    fn accepts(&self, state: &str) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::State(s) => s == state,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewFilter {
    pub side: SideFilter,
    pub status: StatusFilter,
}

/// One page of the derived order list
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderPage {
    pub orders: Vec<Order>,
    /// 1-based, clamped to `[1, max(1, page_count)]`
    pub page: usize,
    /// Zero when nothing matches the filter
    pub page_count: usize,
    /// Orders left after filtering
    pub total: usize,
    pub items_per_page: usize,
}

/// Filter, sort and slice `orders`, in that fixed order.
///
/// The sort is stable, so orders with equal keys keep their service order.
pub fn derive(
    orders: &[Order],
    filter: &ViewFilter,
    sort: &SortConfig,
    page: usize,
    items_per_page: usize,
) -> OrderPage {
    let per_page = items_per_page.max(1);

    let mut rows: Vec<&Order> = orders
        .iter()
        .filter(|o| filter.side.accepts(o.side))
        .filter(|o| filter.status.accepts(&o.state))
        .collect();
    rows.sort_by(|a, b| sort.compare(a, b));

    let total = rows.len();
    let page_count = total.div_ceil(per_page);
    let page = page.clamp(1, page_count.max(1));

    let orders = rows
        .into_iter()
        .skip((page - 1) * per_page)
        .take(per_page)
        .cloned()
        .collect();

    OrderPage {
        orders,
        page,
        page_count,
        total,
        items_per_page: per_page,
    }
}

/// Operator-controlled table settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderView {
    pub filter: ViewFilter,
    pub sort: SortConfig,
    pub current_page: usize,
    pub items_per_page: usize,
}

impl Default for OrderView {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl OrderView {
    pub fn new(items_per_page: usize) -> Self {
        Self {
            filter: ViewFilter::default(),
            sort: SortConfig::default(),
            current_page: 1,
            items_per_page: items_per_page.max(1),
        }
    }

    pub fn set_side_filter(&mut self, side: SideFilter) {
        self.filter.side = side;
        self.current_page = 1;
    }

    pub fn set_status_filter(&mut self, status: StatusFilter) {
        self.filter.status = status;
        self.current_page = 1;
    }

    pub fn toggle_sort(&mut self, key: SortKey) {
        self.sort.toggle(key);
    }

    pub fn set_page(&mut self, page: usize) {
        self.current_page = page.max(1);
    }

    /// Derive the visible page and pull the stored page back into range
    pub fn derive(&mut self, orders: &[Order]) -> OrderPage {
        let page = derive(
            orders,
            &self.filter,
            &self.sort,
            self.current_page,
            self.items_per_page,
        );
        self.current_page = page.page;
        page
    }
}

/// Distinct order states, sorted, for the status filter choices
pub fn available_states(orders: &[Order]) -> Vec<String> {
    let mut states: Vec<String> = orders.iter().map(|o| o.state.clone()).collect();
    states.sort();
    states.dedup();
    states
}
