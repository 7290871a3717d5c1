//! Route registrar
//!
//! Keeps a set of configured routes advertised to their backend for as long
//! as their health checks pass, and withdraws them when a check fails or the
//! process shuts down.
//!
//! # Backends
//!
//! - **http** routes are announced on a NATS message bus
//!   (`router.register` / `router.unregister`)
//! - **tcp** routes are upserted into the routing API with a TTL derived
//!   from the registration interval
//!
//! # Components
//!
//! - **Scheduler**: one task per route, ticking at the registration interval
//! - **Registrar**: consumes health events and issues backend calls one at
//!   a time, then unregisters everything on shutdown

pub mod config;
pub mod http_server;
pub mod messagebus;
pub mod metrics;
pub mod registrar;
pub mod routing_api;
pub mod scheduler;
pub mod types;

pub use config::{Config, ConfigError, RouteError};
pub use http_server::MetricsServer;
pub use messagebus::{MessageBus, MessageBusTls, NatsMessageBus};
pub use metrics::MetricsRegistry;
pub use registrar::Registrar;
pub use routing_api::{RouteApi, RoutingApi};
pub use scheduler::RouteScheduler;
pub use types::{HealthEvent, HealthOutcome, InstanceId, RegistrarConfig, Route, RouteType};
