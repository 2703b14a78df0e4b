use std::path::Path;
use std::sync::Arc;

use log::{error, info, warn};
use tokio_util::sync::CancellationToken;

use crate::config::Settings;
use crate::dashboard::{
    server, Dashboard, DashboardError, DashboardResult, GridApi, HttpGridApi, PollingScheduler,
};

/// Runs the dashboard against the configured grid service
pub struct DashboardRunner {
    config: Settings,
}

impl DashboardRunner {
    /// Create a new runner from a configuration file
    pub fn new(config_path: impl AsRef<Path>) -> DashboardResult<Self> {
        let path = config_path.as_ref();
        let path = path.to_str().ok_or_else(|| {
            DashboardError::Config(format!("config path is not valid UTF-8: {}", path.display()))
        })?;
        let config = Settings::new(path)?;
        Ok(Self { config })
    }

    pub fn from_settings(config: Settings) -> Self {
        Self { config }
    }

    pub fn settings(&self) -> &Settings {
        &self.config
    }

    /// Run until Ctrl+C
    pub async fn run(self) -> DashboardResult<()> {
        // 1. Setup Logging
        if std::env::var("RUST_LOG").is_err() {
            std::env::set_var("RUST_LOG", &self.config.log.level);
        }
        env_logger::try_init().ok();

        info!("Starting DashboardRunner...");

        // 2. Setup Client
        let api = HttpGridApi::new(&self.config.api.base_url, self.config.request_timeout())?;
        match api.health().await {
            Ok(health) => info!(
                "Grid service at {} is {}: {}",
                api.base_url(),
                health.status,
                health.message
            ),
            Err(e) => warn!(
                "Grid service at {} not reachable yet: {}",
                api.base_url(),
                e
            ),
        }

        // 3. Dashboard and polling
        let dashboard_config = &self.config.dashboard;
        let dashboard = Arc::new(Dashboard::new(
            Arc::new(api),
            dashboard_config.symbol.clone(),
            dashboard_config.stats_period,
            dashboard_config.page_size,
        ));

        let mut polling = PollingScheduler::start(dashboard.clone(), self.config.poll_interval());
        let mut synced = polling.subscribe();

        // 4. Optional local server
        let shutdown = CancellationToken::new();
        let server_task = if self.config.server.enabled {
            let dashboard = dashboard.clone();
            let host = self.config.server.host.clone();
            let port = self.config.server.port;
            let shutdown = shutdown.clone();
            Some(tokio::spawn(async move {
                if let Err(e) = server::start_server(dashboard, &host, port, shutdown).await {
                    error!("Dashboard server failed: {}", e);
                }
            }))
        } else {
            None
        };

        // 5. Log every sync until interrupted
        loop {
            tokio::select! {
                signal = tokio::signal::ctrl_c() => {
                    if let Err(e) = signal {
                        warn!("Failed to listen for Ctrl+C: {}", e);
                    }
                    info!("Shutdown requested");
                    break;
                }
                changed = synced.changed() => {
                    if changed.is_err() {
                        warn!("Polling ended unexpectedly");
                        break;
                    }
                    if let Some(snapshot) = synced.borrow_and_update().as_ref() {
                        info!("{}", snapshot.summary_line());
                    }
                }
            }
        }

        polling.stop().await;
        shutdown.cancel();
        if let Some(task) = server_task {
            task.await.ok();
        }

        info!("DashboardRunner stopped");
        Ok(())
    }
}
