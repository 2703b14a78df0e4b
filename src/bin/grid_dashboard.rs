//! Grid Dashboard Binary
//!
//! Polls a grid trading service and logs a summary after every sync.
//!
//! ```bash
//! cargo run --bin grid_dashboard -- config.toml
//! ```
//!
//! Any setting can be overridden from the environment or a `.env` file,
//! e.g. `APP_API__BASE_URL=http://localhost:8000`.

use std::env;
use std::process::ExitCode;

use grid_dashboard::DashboardRunner;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let config_path = env::args().nth(1).unwrap_or_else(|| "config.toml".to_string());

    let runner = match DashboardRunner::new(&config_path) {
        Ok(runner) => runner,
        Err(e) => {
            eprintln!("Failed to load {}: {}", config_path, e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = runner.run().await {
        log::error!("Dashboard exited with error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
