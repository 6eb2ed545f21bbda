use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;

const EXIT_CONFIG: u8 = 1;
const EXIT_PORT_IN_USE: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = cli::Cli::parse();

    let config = match lmgate_common::load_config(&cli.config) {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(path = %cli.config.display(), error = %err, "failed to load config");
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    let config_for_proxy = config.clone();
    let upstream = match lmgate_core::upstream::WreqUpstreamClient::with_proxy_resolver(
        lmgate_core::upstream::UpstreamClientConfig::default(),
        move || config_for_proxy.proxy_url.clone(),
    ) {
        Ok(client) => Arc::new(client),
        Err(err) => {
            tracing::error!(error = %err, "failed to build upstream client");
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    let bind = format!("{}:{}", config.host(), config.port());
    let gateway = match lmgate_core::Gateway::new(config, upstream).await {
        Ok(gateway) => Arc::new(gateway),
        Err(err) => {
            tracing::error!(error = %err, "failed to initialize gateway");
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    let app = lmgate_router::proxy_router(gateway);
    let listener = match tokio::net::TcpListener::bind(&bind).await {
        Ok(listener) => listener,
        Err(err) if err.kind() == std::io::ErrorKind::AddrInUse => {
            tracing::error!(bind = %bind, "address already in use");
            return ExitCode::from(EXIT_PORT_IN_USE);
        }
        Err(err) => {
            tracing::error!(bind = %bind, error = %err, "failed to bind listener");
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    tracing::info!(bind = %bind, "listening");
    let serve = axum::serve(listener, app).with_graceful_shutdown(async {
        let _ = tokio::signal::ctrl_c().await;
    });
    if let Err(err) = serve.await {
        tracing::error!(error = %err, "server error");
        return ExitCode::from(EXIT_CONFIG);
    }
    ExitCode::SUCCESS
}
