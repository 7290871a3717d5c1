//! Route registrar binary

use anyhow::Context;
use clap::Parser;
use common::logging::{self, LogFormat};
use healthcheck::ScriptChecker;
use route_registrar::routing_api::client::build_http_client;
use route_registrar::routing_api::{HttpRoutingApiClient, UaaTokenFetcher};
use route_registrar::{
    Config, InstanceId, MetricsRegistry, MetricsServer, NatsMessageBus, Registrar, RouteApi,
    RoutingApi,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::signal::unix::{signal, Signal, SignalKind};
use tokio::sync::oneshot;
use tracing::{error, info, warn};

/// Advertise configured routes while their health checks pass
#[derive(Parser, Debug)]
#[command(name = "route-registrar", version)]
struct Args {
    /// Path to the YAML configuration file
    #[arg(long = "config-path", alias = "configPath", env = "ROUTE_REGISTRAR_CONFIG")]
    config_path: PathBuf,

    /// Write the process id to this file after loading configuration
    #[arg(long)]
    pidfile: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %format!("{:#}", e), "Exiting with error");
            eprintln!("route-registrar: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = Config::load_from_file(&args.config_path)
        .with_context(|| format!("loading configuration from {}", args.config_path.display()))?;
    let registrar_config = config
        .to_registrar_config()
        .context("invalid configuration")?;

    logging::init_with(
        LogFormat::from_name(config.logging.format.as_deref()),
        config.logging.level.as_deref().unwrap_or("info"),
    );
    info!(routes = registrar_config.routes.len(), "Initializing");

    if let Some(pidfile) = &args.pidfile {
        info!(pidfile = %pidfile.display(), "Writing pid");
        std::fs::write(pidfile, std::process::id().to_string())
            .with_context(|| format!("writing pidfile {}", pidfile.display()))?;
    }

    // Registered before the registrar starts so an early signal is not lost
    let sigterm = signal(SignalKind::terminate()).context("installing SIGTERM handler")?;
    let sigint = signal(SignalKind::interrupt()).context("installing SIGINT handler")?;

    let metrics = Arc::new(MetricsRegistry::new());
    if let Some(listen_addr) = config.metrics.listen_addr.clone() {
        let server = MetricsServer::new(metrics.clone(), listen_addr);
        tokio::spawn(async move {
            if let Err(e) = server.run().await {
                warn!(error = %e, "Metrics server stopped");
            }
        });
    }

    let routing_api = match &config.routing_api {
        Some(settings) => {
            let http_client = build_http_client(&settings.tls_options())
                .context("building routing API HTTP client")?;
            let token_fetcher = UaaTokenFetcher::new(
                http_client.clone(),
                &settings.oauth_url,
                settings.client_id.clone(),
                settings.client_secret.clone(),
            );
            let api_client = HttpRoutingApiClient::new(http_client, settings.api_url.clone());
            let api = RoutingApi::new(Box::new(token_fetcher), Box::new(api_client), settings.max_ttl)
                .with_metrics(metrics.clone());
            Some(Box::new(api) as Box<dyn RouteApi>)
        }
        None => None,
    };

    let registrar = Registrar::new(
        registrar_config,
        Arc::new(ScriptChecker::new()),
        Box::new(NatsMessageBus::new()),
        routing_api,
        InstanceId::generate(),
    )
    .with_metrics(metrics);

    let (ready_tx, ready_rx) = oneshot::channel();
    tokio::spawn(async move {
        if ready_rx.await.is_ok() {
            info!("Running");
        }
    });

    registrar
        .run(wait_for_signal(sigterm, sigint), Some(ready_tx))
        .await
        .context("registrar stopped")?;

    info!("Exited");
    Ok(())
}

async fn wait_for_signal(mut sigterm: Signal, mut sigint: Signal) {
    tokio::select! {
        _ = sigterm.recv() => info!(signal = "SIGTERM", "Caught signal"),
        _ = sigint.recv() => info!(signal = "SIGINT", "Caught signal"),
    }
}
