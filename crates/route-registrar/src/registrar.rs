//! Registration coordinator.
//!
//! The registrar owns the configured routes and spawns one
//! [`RouteScheduler`] per route. Schedulers feed classified health events
//! into a single channel; the registrar consumes them one at a time and
//! registers or unregisters the route on its backend. On shutdown every
//! route is unregistered in configuration order.

use crate::messagebus::{MessageBus, MessageBusTls};
use crate::metrics::MetricsRegistry;
use crate::routing_api::RouteApi;
use crate::scheduler::RouteScheduler;
use crate::types::{
    HealthEvent, InstanceId, RegistrarConfig, Route, RouteAction, RouteType, REGISTER_SUBJECT,
    UNREGISTER_SUBJECT,
};
use common::{Error, Result};
use healthcheck::HealthChecker;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Capacity of the shared health event channel
const EVENT_CHANNEL_SIZE: usize = 64;

pub struct Registrar {
    config: RegistrarConfig,
    checker: Arc<dyn HealthChecker>,
    message_bus: Box<dyn MessageBus>,
    routing_api: Option<Box<dyn RouteApi>>,
    instance_id: InstanceId,
    metrics: Option<Arc<MetricsRegistry>>,
}

impl Registrar {
    pub fn new(
        config: RegistrarConfig,
        checker: Arc<dyn HealthChecker>,
        message_bus: Box<dyn MessageBus>,
        routing_api: Option<Box<dyn RouteApi>>,
        instance_id: InstanceId,
    ) -> Self {
        Self {
            config,
            checker,
            message_bus,
            routing_api,
            instance_id,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Run until `shutdown` resolves or a backend call fails.
    ///
    /// `ready` is signalled once the message bus is connected, before the
    /// first scheduler starts.
    pub async fn run<F>(mut self, shutdown: F, ready: Option<oneshot::Sender<()>>) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        // TLS material is validated even when no bus servers are configured
        let tls = self
            .config
            .message_bus_tls
            .as_ref()
            .map(MessageBusTls::from_files)
            .transpose()?;

        let connected = !self.config.message_bus_servers.is_empty();
        if connected {
            if let Err(e) = self
                .message_bus
                .connect(&self.config.message_bus_servers, tls)
                .await
            {
                self.record_error(RouteType::Http, "connect");
                return Err(e);
            }
            info!(servers = self.config.message_bus_servers.len(), "Connected to message bus");
        }

        if let Some(ready) = ready {
            let _ = ready.send(());
        }

        let result = self.run_loop(shutdown).await;

        if connected {
            self.message_bus.close().await;
        }
        result
    }

    async fn run_loop<F>(&mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        let stop = CancellationToken::new();
        // Schedulers are cancelled on every exit path
        let _stop_guard = stop.clone().drop_guard();

        let (event_tx, mut event_rx) = mpsc::channel::<HealthEvent>(EVENT_CHANNEL_SIZE);
        let routes: Vec<Arc<Route>> = self.config.routes.iter().cloned().map(Arc::new).collect();

        if let Some(ref m) = self.metrics {
            m.set_routes_configured(routes.len());
        }

        for route in &routes {
            let scheduler = RouteScheduler::new(
                route.clone(),
                self.checker.clone(),
                event_tx.clone(),
                stop.child_token(),
            )
            .with_metrics(self.metrics.clone());
            tokio::spawn(scheduler.run());
        }
        drop(event_tx);

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => {
                    stop.cancel();
                    return self.unregister_all(&routes).await;
                }
                Some(event) = event_rx.recv() => {
                    debug!(route = %event.route.name, outcome = event.outcome.as_str(), "Health event");
                    match event.outcome.action() {
                        RouteAction::Register => self.register(&event.route).await?,
                        RouteAction::Unregister => self.unregister(&event.route).await?,
                    }
                }
            }
        }
    }

    async fn unregister_all(&mut self, routes: &[Arc<Route>]) -> Result<()> {
        for route in routes {
            self.unregister(route).await?;
        }
        Ok(())
    }

    async fn register(&mut self, route: &Route) -> Result<()> {
        let route_type = route.route_type();
        info!(route = %route.name, route_type = %route_type, "Registering route");

        let result = match route_type {
            RouteType::Http => {
                self.message_bus
                    .send_message(REGISTER_SUBJECT, &route.host, route, &self.instance_id)
                    .await
            }
            RouteType::Tcp => match self.routing_api.as_mut() {
                Some(api) => api.register_route(route).await,
                None => Err(missing_routing_api(route)),
            },
        };

        self.record(route_type, "register", &result);
        result
    }

    async fn unregister(&mut self, route: &Route) -> Result<()> {
        let route_type = route.route_type();
        info!(route = %route.name, route_type = %route_type, "Unregistering route");

        let result = match route_type {
            RouteType::Http => {
                self.message_bus
                    .send_message(UNREGISTER_SUBJECT, &route.host, route, &self.instance_id)
                    .await
            }
            RouteType::Tcp => match self.routing_api.as_mut() {
                Some(api) => api.unregister_route(route).await,
                None => Err(missing_routing_api(route)),
            },
        };

        self.record(route_type, "unregister", &result);
        result
    }

    fn record(&self, route_type: RouteType, operation: &str, result: &Result<()>) {
        match result {
            Ok(()) => {
                if let Some(ref m) = self.metrics {
                    match operation {
                        "register" => m.record_registration(route_type.backend()),
                        _ => m.record_unregistration(route_type.backend()),
                    }
                }
            }
            Err(e) => {
                error!(backend = route_type.backend(), operation, error = %e, "Backend call failed");
                self.record_error(route_type, operation);
            }
        }
    }

    fn record_error(&self, route_type: RouteType, operation: &str) {
        if let Some(ref m) = self.metrics {
            m.record_backend_error(route_type.backend(), operation);
        }
    }
}

fn missing_routing_api(route: &Route) -> Error {
    Error::routing_api(format!(
        "route '{}' is a tcp route but no routing API is configured",
        route.name
    ))
}
