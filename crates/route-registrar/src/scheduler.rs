//! Per-route health scheduler.

use crate::metrics::MetricsRegistry;
use crate::types::{HealthEvent, HealthOutcome, Route};
use healthcheck::{HealthChecker, HealthStatus};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Ticks at a route's registration interval and emits one classified
/// health event per tick
pub struct RouteScheduler {
    route: Arc<Route>,
    checker: Arc<dyn HealthChecker>,
    events: mpsc::Sender<HealthEvent>,
    stop: CancellationToken,
    metrics: Option<Arc<MetricsRegistry>>,
}

impl RouteScheduler {
    pub fn new(
        route: Arc<Route>,
        checker: Arc<dyn HealthChecker>,
        events: mpsc::Sender<HealthEvent>,
        stop: CancellationToken,
    ) -> Self {
        Self {
            route,
            checker,
            events,
            stop,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Option<Arc<MetricsRegistry>>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Run until the stop token is cancelled or the receiver goes away
    pub async fn run(self) {
        let mut ticker = interval(self.route.registration_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker.tick().await; // Skip first immediate tick

        debug!(route = %self.route.name, interval = ?self.route.registration_interval, "Scheduler started");

        loop {
            tokio::select! {
                biased;

                _ = self.stop.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let outcome = self.determine_health().await;
            if let Some(ref m) = self.metrics {
                m.record_health_outcome(outcome.as_str());
            }

            let event = HealthEvent {
                route: self.route.clone(),
                outcome,
            };

            tokio::select! {
                biased;

                _ = self.stop.cancelled() => break,
                sent = self.events.send(event) => {
                    if sent.is_err() {
                        debug!(route = %self.route.name, "Event receiver closed");
                        break;
                    }
                }
            }
        }

        debug!(route = %self.route.name, "Scheduler stopped");
    }

    /// Run the route's health check, if any, and classify the result
    pub async fn determine_health(&self) -> HealthOutcome {
        let Some(health_check) = &self.route.health_check else {
            return HealthOutcome::NoHealthCheck;
        };

        let result = self
            .checker
            .check(&health_check.script_path, health_check.timeout)
            .await;

        if let Some(ref m) = self.metrics {
            m.record_health_check_duration(result.duration);
        }

        match result.status {
            HealthStatus::Healthy => {
                debug!(route = %self.route.name, duration_ms = result.duration.as_millis(), "Health check passed");
            }
            HealthStatus::Unhealthy => {
                info!(
                    route = %self.route.name,
                    exit_code = ?result.exit_code,
                    message = result.message.as_deref().unwrap_or(""),
                    "Health check failed"
                );
            }
            HealthStatus::Timeout => {
                info!(route = %self.route.name, timeout = ?health_check.timeout, "Health check timed out");
            }
            HealthStatus::Error => {
                warn!(
                    route = %self.route.name,
                    script = %health_check.script_path.display(),
                    error = result.message.as_deref().unwrap_or("unknown"),
                    "Health check error"
                );
            }
        }

        HealthOutcome::from(&result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Endpoint, HealthCheck};
    use async_trait::async_trait;
    use healthcheck::HealthCheckResult;
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};
    use std::time::Duration;

    struct FixedChecker(HealthStatus);

    #[async_trait]
    impl HealthChecker for FixedChecker {
        async fn check(&self, _script_path: &Path, _timeout: Duration) -> HealthCheckResult {
            match self.0 {
                HealthStatus::Healthy => HealthCheckResult::healthy(Duration::from_millis(1)),
                HealthStatus::Unhealthy => {
                    HealthCheckResult::unhealthy(Duration::from_millis(1), "exit status 1")
                }
                HealthStatus::Timeout => HealthCheckResult::timeout(Duration::from_millis(1)),
                HealthStatus::Error => HealthCheckResult::error(Duration::from_millis(1), "no such file"),
            }
        }
    }

    fn route(with_check: bool) -> Arc<Route> {
        Arc::new(Route {
            name: "app".to_string(),
            host: "10.0.0.5".to_string(),
            endpoint: Endpoint::Http {
                uris: vec!["app.example.com".to_string()],
                port: Some(8080),
                tls_port: None,
                route_service_url: None,
            },
            tags: HashMap::new(),
            server_cert_domain_san: None,
            registration_interval: Duration::from_millis(50),
            health_check: with_check.then(|| HealthCheck {
                name: "check".to_string(),
                script_path: PathBuf::from("/bin/check"),
                timeout: Duration::from_millis(25),
            }),
        })
    }

    fn scheduler(with_check: bool, status: HealthStatus) -> RouteScheduler {
        let (tx, _rx) = mpsc::channel(1);
        RouteScheduler::new(
            route(with_check),
            Arc::new(FixedChecker(status)),
            tx,
            CancellationToken::new(),
        )
    }

    #[tokio::test]
    async fn test_classification() {
        assert_eq!(
            scheduler(false, HealthStatus::Unhealthy).determine_health().await,
            HealthOutcome::NoHealthCheck
        );
        assert_eq!(
            scheduler(true, HealthStatus::Healthy).determine_health().await,
            HealthOutcome::Healthy
        );
        assert_eq!(
            scheduler(true, HealthStatus::Unhealthy).determine_health().await,
            HealthOutcome::Unhealthy
        );
        assert_eq!(
            scheduler(true, HealthStatus::Timeout).determine_health().await,
            HealthOutcome::Unhealthy
        );
        assert_eq!(
            scheduler(true, HealthStatus::Error).determine_health().await,
            HealthOutcome::CheckError
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_event_after_one_interval() {
        let (tx, mut rx) = mpsc::channel(4);
        let stop = CancellationToken::new();
        let scheduler = RouteScheduler::new(
            route(false),
            Arc::new(FixedChecker(HealthStatus::Healthy)),
            tx,
            stop.clone(),
        );
        let handle = tokio::spawn(scheduler.run());

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(rx.try_recv().is_err());

        let event = rx.recv().await.unwrap();
        assert_eq!(event.outcome, HealthOutcome::NoHealthCheck);
        assert_eq!(event.route.name, "app");

        stop.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_abandons_pending_send() {
        let (tx, mut rx) = mpsc::channel(1);
        let stop = CancellationToken::new();
        let scheduler = RouteScheduler::new(
            route(true),
            Arc::new(FixedChecker(HealthStatus::Healthy)),
            tx,
            stop.clone(),
        );
        let handle = tokio::spawn(scheduler.run());

        // Fill the channel, then let the next tick block on send
        tokio::time::sleep(Duration::from_millis(120)).await;
        stop.cancel();
        handle.await.unwrap();

        assert_eq!(rx.recv().await.unwrap().outcome, HealthOutcome::Healthy);
        assert!(rx.recv().await.is_none());
    }
}
