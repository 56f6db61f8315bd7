use axum::Router;
use clap::Parser;
use prediction_gateway::auth::AdminToken;
use prediction_gateway::cache;
use prediction_gateway::config::AppConfig;
use prediction_gateway::metrics::handler::AdminState;
use prediction_gateway::metrics::PerformanceMonitor;
use prediction_gateway::prediction::handler::PredictionState;
use prediction_gateway::prediction::{HttpWorkflow, PredictionCache, PredictionService};
use prediction_gateway::routes;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Parser)]
#[command(
    name = "prediction-gateway",
    about = "Caching gateway for stock prediction workflows"
)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Init tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "prediction_gateway=info,tower_http=info".into()),
        )
        .json()
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load(Some(&cli.config))?;

    if let Err(msg) = config.validate() {
        eprintln!("Configuration error: {msg}");
        return Err(msg.into());
    }

    tracing::info!(
        host = %config.server.host,
        port = config.server.port,
        workflow = %config.workflow.base_url,
        cache_max_size = config.cache.max_size,
        "starting prediction gateway"
    );

    // Shared stores, owned here and injected into handler state
    let prediction_cache = Arc::new(PredictionCache::new(config.cache.max_size));
    let monitor = Arc::new(PerformanceMonitor::new(config.metrics.history_size));

    // Spawn cache sweep
    let sweep_cache = prediction_cache.clone();
    let sweep_period = Duration::from_secs(config.cache.sweep_interval_secs);
    tokio::spawn(async move {
        cache::sweep_loop(sweep_cache, sweep_period).await;
    });

    let workflow = Arc::new(HttpWorkflow::new(&config.workflow)?);
    let service = Arc::new(PredictionService::new(
        prediction_cache.clone(),
        workflow,
        monitor.clone(),
    ));

    let prediction_state = Arc::new(PredictionState { service });
    let admin_state = Arc::new(AdminState::new(prediction_cache, monitor));
    let admin_token = config
        .admin
        .token
        .as_deref()
        .map(|t| AdminToken(Arc::from(t)));
    if admin_token.is_none() {
        tracing::warn!("admin.token not set, admin routes are unauthenticated");
    }

    // Rate limiter for prediction routes (each miss hits paid upstream APIs)
    let governor_conf = GovernorConfigBuilder::default()
        .key_extractor(SmartIpKeyExtractor)
        .per_second(config.rate_limit.per_second)
        .burst_size(config.rate_limit.burst_size)
        .finish()
        .ok_or("failed to build rate limiter config")?;

    let cors = match config.server.allowed_origin.as_deref() {
        Some(origin) => CorsLayer::new().allow_origin(AllowOrigin::exact(origin.parse()?)),
        None => CorsLayer::new().allow_origin(AllowOrigin::any()),
    }
    .allow_methods([
        axum::http::Method::GET,
        axum::http::Method::POST,
        axum::http::Method::DELETE,
        axum::http::Method::OPTIONS,
    ])
    .allow_headers([
        axum::http::header::CONTENT_TYPE,
        axum::http::header::AUTHORIZATION,
    ]);

    let app = Router::new()
        .merge(
            routes::prediction_routes(prediction_state, config.server.max_body_bytes)
                .layer(GovernorLayer::new(governor_conf)),
        )
        .merge(routes::admin_routes(admin_state.clone(), admin_token))
        .merge(routes::health_routes(admin_state))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C"),
        _ = terminate => tracing::info!("received SIGTERM"),
    }

    tracing::info!("shutting down...");
}
