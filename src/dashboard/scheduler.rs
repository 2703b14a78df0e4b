//! Periodic status polling with an explicit start/stop lifecycle

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::client::GridApi;
use super::controller::Dashboard;
use super::state::DashboardSnapshot;

/// Default time between status polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

pub struct PollingScheduler;

impl PollingScheduler {
    /// Run the initial load right away, then poll the status every `period`.
    pub fn start<A>(dashboard: Arc<Dashboard<A>>, period: Duration) -> PollingHandle
    where
        A: GridApi + 'static,
    {
        let token = CancellationToken::new();
        let (tx, rx) = watch::channel(None);
        let join = tokio::spawn(run(dashboard, period, token.clone(), tx));
        PollingHandle {
            token,
            join: Some(join),
            synced: rx,
        }
    }
}

async fn run<A: GridApi>(
    dashboard: Arc<Dashboard<A>>,
    period: Duration,
    token: CancellationToken,
    synced: watch::Sender<Option<DashboardSnapshot>>,
) {
    info!(
        "Polling {} every {}s",
        dashboard.symbol(),
        period.as_secs_f64()
    );

    tokio::select! {
        _ = token.cancelled() => {
            debug!("Stopped before the initial load finished");
            dashboard.abort_load().await;
            return;
        }
        _ = dashboard.load() => {}
    }
    synced.send_replace(Some(dashboard.snapshot().await));

    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately and the initial load covered it
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let Some(ticket) = dashboard.begin_poll().await else {
            continue;
        };

        let result = tokio::select! {
            _ = token.cancelled() => break,
            result = dashboard.api().grid_status() => result,
        };

        if token.is_cancelled() {
            break;
        }

        if dashboard.apply_poll(ticket, result).await {
            synced.send_replace(Some(dashboard.snapshot().await));
        }
    }

    debug!("Polling loop for {} exited", dashboard.symbol());
}

/// Controls a running scheduler
pub struct PollingHandle {
    token: CancellationToken,
    join: Option<JoinHandle<()>>,
    synced: watch::Receiver<Option<DashboardSnapshot>>,
}

impl PollingHandle {
    /// Snapshot published after every applied load or poll
    pub fn subscribe(&self) -> watch::Receiver<Option<DashboardSnapshot>> {
        self.synced.clone()
    }

    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancel polling and wait for the task to exit.
    ///
    /// A poll in flight is abandoned and its result never applied.
    pub async fn stop(&mut self) {
        self.token.cancel();
        if let Some(join) = self.join.take() {
            if let Err(e) = join.await {
                warn!("Polling task ended abnormally: {}", e);
            }
        }
        info!("Polling stopped");
    }
}

impl Drop for PollingHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::client::mock::MockGridApi;
    use crate::dashboard::types::{GridStatus, StatsPeriod, StatusResponse};

    fn dashboard() -> Arc<Dashboard<MockGridApi>> {
        Arc::new(Dashboard::new(
            Arc::new(MockGridApi::new()),
            "AIPG_USDT",
            StatsPeriod::All,
            10,
        ))
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_load_then_periodic_status_polls() {
        let dash = dashboard();
        let mut handle = PollingScheduler::start(dash.clone(), Duration::from_secs(30));
        let mut synced = handle.subscribe();

        synced.changed().await.unwrap();
        assert!(synced.borrow().as_ref().unwrap().initial_load_done);
        assert_eq!(dash.api().call_count("balance").await, 1);
        assert_eq!(dash.api().call_count("grid_status").await, 1);

        tokio::time::sleep(Duration::from_secs(31)).await;
        settle().await;
        assert_eq!(dash.api().call_count("grid_status").await, 2);
        // Polls only touch the status endpoint
        assert_eq!(dash.api().call_count("balance").await, 1);

        tokio::time::sleep(Duration::from_secs(30)).await;
        settle().await;
        assert_eq!(dash.api().call_count("grid_status").await, 3);

        handle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_polls_after_stop() {
        let dash = dashboard();
        let mut handle = PollingScheduler::start(dash.clone(), Duration::from_secs(5));
        handle.subscribe().changed().await.unwrap();

        handle.stop().await;
        assert!(handle.is_stopped());
        let before = dash.api().call_count("grid_status").await;

        tokio::time::sleep(Duration::from_secs(60)).await;
        settle().await;
        assert_eq!(dash.api().call_count("grid_status").await, before);
    }

    fn running() -> StatusResponse {
        StatusResponse::running_with(GridStatus {
            symbol: "AIPG_USDT".into(),
            is_running: true,
            ..Default::default()
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_in_flight_at_stop_is_discarded() {
        let dash = dashboard();
        let mut handle = PollingScheduler::start(dash.clone(), Duration::from_secs(10));
        handle.subscribe().changed().await.unwrap();

        let gate = dash.api().gate_status().await;
        tokio::time::sleep(Duration::from_secs(11)).await;
        settle().await;
        // The tick's status call is now parked at the gate
        assert_eq!(dash.api().call_count("grid_status").await, 2);

        dash.api().set_status(Ok(running())).await;
        handle.stop().await;
        gate.notify_one();
        settle().await;

        let snap = dash.snapshot().await;
        assert!(!snap.is_running);
        assert!(snap.grid_status.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_during_initial_load_discards_it() {
        let dash = dashboard();
        dash.api().set_status(Ok(running())).await;
        let gate = dash.api().gate_status().await;

        let mut handle = PollingScheduler::start(dash.clone(), Duration::from_secs(10));
        settle().await;
        assert_eq!(dash.api().call_count("grid_status").await, 1);
        assert!(dash.snapshot().await.loading.any());

        handle.stop().await;
        gate.notify_one();
        settle().await;

        let snap = dash.snapshot().await;
        assert!(!snap.is_running);
        assert!(!snap.initial_load_done);
        assert!(!snap.loading.any());
        assert!(handle.subscribe().borrow().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_pick_up_remote_start() {
        let dash = dashboard();
        let mut handle = PollingScheduler::start(dash.clone(), Duration::from_secs(10));
        let mut synced = handle.subscribe();
        synced.changed().await.unwrap();
        assert!(!dash.snapshot().await.is_running);

        dash.api()
            .set_status(Ok(StatusResponse::running_with(GridStatus {
                symbol: "AIPG_USDT".into(),
                is_running: true,
                ..Default::default()
            })))
            .await;

        synced.changed().await.unwrap();
        assert!(synced.borrow().as_ref().unwrap().is_running);

        handle.stop().await;
    }
}
