#![deny(unreachable_pub)]
pub mod config;
pub mod dashboard;
pub mod runner;

pub use config::{ConfigError, Settings};
pub use dashboard::{Dashboard, DashboardError, DashboardResult, DashboardSnapshot, GridApi};
pub use runner::DashboardRunner;
