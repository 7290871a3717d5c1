//! Prometheus metrics for the route registrar.

use prometheus_client::encoding::text::encode;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::{exponential_buckets, Histogram};
use prometheus_client::registry::Registry;
use std::time::Duration;

/// Labels for registration metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct BackendLabels {
    /// Backend (message_bus, routing_api)
    pub backend: String,
}

/// Labels for health outcome metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct OutcomeLabels {
    /// Outcome (no_health_check, healthy, unhealthy, check_error)
    pub outcome: String,
}

/// Labels for backend error metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct BackendErrorLabels {
    pub backend: String,
    /// Operation (connect, register, unregister)
    pub operation: String,
}

/// Metrics registry with all route registrar metrics
pub struct MetricsRegistry {
    /// Prometheus registry
    pub registry: Registry,

    registrations: Family<BackendLabels, Counter>,
    unregistrations: Family<BackendLabels, Counter>,
    health_outcomes: Family<OutcomeLabels, Counter>,
    backend_errors: Family<BackendErrorLabels, Counter>,
    router_group_lookups: Counter,
    routes_configured: Gauge,
    health_check_duration_seconds: Histogram,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        let mut registry = Registry::with_prefix("route_registrar");

        // Counters get their _total suffix from the encoder
        let registrations = Family::<BackendLabels, Counter>::default();
        registry.register(
            "registrations",
            "Route registrations sent, by backend",
            registrations.clone(),
        );

        let unregistrations = Family::<BackendLabels, Counter>::default();
        registry.register(
            "unregistrations",
            "Route unregistrations sent, by backend",
            unregistrations.clone(),
        );

        let health_outcomes = Family::<OutcomeLabels, Counter>::default();
        registry.register(
            "health_outcomes",
            "Classified health outcomes",
            health_outcomes.clone(),
        );

        let backend_errors = Family::<BackendErrorLabels, Counter>::default();
        registry.register(
            "backend_errors",
            "Backend call failures",
            backend_errors.clone(),
        );

        let router_group_lookups = Counter::default();
        registry.register(
            "router_group_lookups",
            "Router group lookups against the routing API",
            router_group_lookups.clone(),
        );

        let routes_configured = Gauge::default();
        registry.register(
            "routes_configured",
            "Number of configured routes",
            routes_configured.clone(),
        );

        // 1ms to ~16s
        let health_check_duration_seconds = Histogram::new(exponential_buckets(0.001, 2.0, 15));
        registry.register(
            "health_check_duration_seconds",
            "Health check script duration in seconds",
            health_check_duration_seconds.clone(),
        );

        Self {
            registry,
            registrations,
            unregistrations,
            health_outcomes,
            backend_errors,
            router_group_lookups,
            routes_configured,
            health_check_duration_seconds,
        }
    }

    pub fn record_registration(&self, backend: &str) {
        self.registrations
            .get_or_create(&BackendLabels {
                backend: backend.to_string(),
            })
            .inc();
    }

    pub fn record_unregistration(&self, backend: &str) {
        self.unregistrations
            .get_or_create(&BackendLabels {
                backend: backend.to_string(),
            })
            .inc();
    }

    /// Record a classified health outcome
    pub fn record_health_outcome(&self, outcome: &str) {
        self.health_outcomes
            .get_or_create(&OutcomeLabels {
                outcome: outcome.to_string(),
            })
            .inc();
    }

    pub fn record_backend_error(&self, backend: &str, operation: &str) {
        self.backend_errors
            .get_or_create(&BackendErrorLabels {
                backend: backend.to_string(),
                operation: operation.to_string(),
            })
            .inc();
    }

    pub fn record_router_group_lookup(&self) {
        self.router_group_lookups.inc();
    }

    pub fn set_routes_configured(&self, count: usize) {
        self.routes_configured.set(count as i64);
    }

    pub fn record_health_check_duration(&self, duration: Duration) {
        self.health_check_duration_seconds
            .observe(duration.as_secs_f64());
    }

    /// Encode the registry in the Prometheus text format
    pub fn encode(&self) -> Result<String, std::fmt::Error> {
        let mut buffer = String::new();
        encode(&mut buffer, &self.registry)?;
        Ok(buffer)
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registrations_by_backend() {
        let metrics = MetricsRegistry::new();
        metrics.record_registration("message_bus");
        metrics.record_registration("message_bus");
        metrics.record_registration("routing_api");
        metrics.record_unregistration("routing_api");

        let text = metrics.encode().unwrap();
        assert!(text.contains("route_registrar_registrations_total{backend=\"message_bus\"} 2"));
        assert!(text.contains("route_registrar_registrations_total{backend=\"routing_api\"} 1"));
        assert!(text.contains("route_registrar_unregistrations_total{backend=\"routing_api\"} 1"));
    }

    #[test]
    fn test_health_outcomes() {
        let metrics = MetricsRegistry::new();
        metrics.record_health_outcome("healthy");
        metrics.record_health_outcome("check_error");

        let text = metrics.encode().unwrap();
        assert!(text.contains("route_registrar_health_outcomes_total{outcome=\"healthy\"} 1"));
        assert!(text.contains("route_registrar_health_outcomes_total{outcome=\"check_error\"} 1"));
    }

    #[test]
    fn test_backend_errors() {
        let metrics = MetricsRegistry::new();
        metrics.record_backend_error("routing_api", "unregister");

        let text = metrics.encode().unwrap();
        assert!(text.contains(
            "route_registrar_backend_errors_total{backend=\"routing_api\",operation=\"unregister\"} 1"
        ));
    }

    #[test]
    fn test_gauges_and_lookups() {
        let metrics = MetricsRegistry::new();
        metrics.set_routes_configured(3);
        metrics.record_router_group_lookup();
        metrics.record_health_check_duration(Duration::from_millis(20));

        let text = metrics.encode().unwrap();
        assert!(text.contains("route_registrar_routes_configured 3"));
        assert!(text.contains("route_registrar_router_group_lookups_total 1"));
        assert!(text.contains("route_registrar_health_check_duration_seconds_count 1"));
    }
}
