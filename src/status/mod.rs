pub mod telemetry;

pub use self::telemetry::{ SimulatedTelemetry, TelemetrySource };

use log::{ error, info };
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use crate::gateway::PredictionGateway;
use crate::models::status::StatusReport;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Periodically sends fresh telemetry to `/predict` and republishes the result.
pub struct StatusPoller {
    handle: Option<JoinHandle<()>>,
    status: watch::Receiver<StatusReport>,
}

impl StatusPoller {
    pub fn start(
        gateway: Arc<dyn PredictionGateway>,
        source: Arc<dyn TelemetrySource>,
        interval: Duration
    ) -> Self {
        let (tx, status) = watch::channel(StatusReport::unavailable());
        // `tokio::time::interval` panics on a zero period.
        let interval = interval.max(MIN_POLL_INTERVAL);
        info!("Polling status every {:?}", interval);
        let handle = tokio::spawn(poll_loop(gateway, source, interval, tx));
        Self {
            handle: Some(handle),
            status,
        }
    }

    pub fn status(&self) -> StatusReport {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<StatusReport> {
        self.status.clone()
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            info!("Status polling stopped");
        }
    }
}

impl Drop for StatusPoller {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn poll_loop(
    gateway: Arc<dyn PredictionGateway>,
    source: Arc<dyn TelemetrySource>,
    interval: Duration,
    tx: watch::Sender<StatusReport>
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; the first poll happens one interval in.
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let report = poll_once(gateway.as_ref(), source.as_ref()).await;
        if tx.send(report).is_err() {
            break;
        }
    }
}

pub async fn poll_once(gateway: &dyn PredictionGateway, source: &dyn TelemetrySource) -> StatusReport {
    let telemetry = source.sample();
    match gateway.predict(&telemetry).await {
        Ok(report) => report,
        Err(e) => {
            error!("Failed to fetch prediction: {}", e);
            StatusReport::connection_error()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GatewayError;
    use crate::models::status::Telemetry;
    use async_trait::async_trait;
    use std::sync::atomic::{ AtomicUsize, Ordering };

    struct CountingGateway {
        calls: AtomicUsize,
        fail: bool,
    }

    impl CountingGateway {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self { calls: AtomicUsize::new(0), fail })
        }
    }

    #[async_trait]
    impl PredictionGateway for CountingGateway {
        async fn predict(&self, telemetry: &Telemetry) -> Result<StatusReport, GatewayError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail {
                return Err(GatewayError::Malformed("offline".into()));
            }
            let label = if telemetry.coolant_temp_c > 100.0 { "Overheating" } else { "Normal" };
            Ok(StatusReport::new(label, format!("0.9{}", n)))
        }
    }

    #[tokio::test]
    async fn failure_maps_to_connection_error() {
        let gateway = CountingGateway::new(true);
        let report = poll_once(gateway.as_ref(), &SimulatedTelemetry).await;
        assert_eq!(report, StatusReport::connection_error());
    }

    #[tokio::test(start_paused = true)]
    async fn publishes_on_each_interval() {
        let gateway = CountingGateway::new(false);
        let poller = StatusPoller::start(
            gateway.clone(),
            Arc::new(SimulatedTelemetry),
            DEFAULT_POLL_INTERVAL
        );
        let mut rx = poller.subscribe();
        assert_eq!(poller.status(), StatusReport::unavailable());

        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().clone(), StatusReport::new("Normal", "0.91"));

        rx.changed().await.unwrap();
        assert_eq!(poller.status(), StatusReport::new("Normal", "0.92"));
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cancels_the_interval() {
        let gateway = CountingGateway::new(false);
        let mut poller = StatusPoller::start(
            gateway.clone(),
            Arc::new(SimulatedTelemetry),
            DEFAULT_POLL_INTERVAL
        );
        let mut rx = poller.subscribe();
        rx.changed().await.unwrap();

        poller.stop();
        assert!(!poller.is_running());
        let calls = gateway.calls.load(Ordering::SeqCst);

        tokio::time::sleep(DEFAULT_POLL_INTERVAL * 5).await;
        assert_eq!(gateway.calls.load(Ordering::SeqCst), calls);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_interval_still_polls() {
        let gateway = CountingGateway::new(false);
        let poller = StatusPoller::start(gateway.clone(), Arc::new(SimulatedTelemetry), Duration::ZERO);
        let mut rx = poller.subscribe();

        rx.changed().await.unwrap();
        assert!(poller.is_running());
        assert!(gateway.calls.load(Ordering::SeqCst) >= 1);
    }
}
