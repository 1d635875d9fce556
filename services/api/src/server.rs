use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};
use waitlist::config::AppConfig;
use waitlist::error::AppError;
use waitlist::storage::{ConnectionStatus, DocumentStore, MemoryStore, MongoStore};
use waitlist::telemetry;
use waitlist::waitlist::WaitlistService;

use crate::cli::ServeArgs;
use crate::infra::build_gateway;
use crate::routes::with_service_routes;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    if args.in_memory {
        warn!("using in-memory document store; submissions are lost on restart");
        serve(MemoryStore::new(), config).await
    } else {
        let store = MongoStore::new(&config.storage);
        serve(store, config).await
    }
}

async fn serve<S>(store: S, config: AppConfig) -> Result<(), AppError>
where
    S: DocumentStore + 'static,
{
    let gateway = build_gateway(store, &config.storage);
    info!("connecting to document store");
    if gateway.connect().await == ConnectionStatus::Degraded {
        warn!("starting in degraded mode; waitlist writes will retry the connection");
    }

    let service = Arc::new(WaitlistService::new(gateway));
    let app = with_service_routes(service, config.rate_limit);

    let addr = config.server.socket_addr()?;
    let listener = TcpListener::bind(addr).await?;
    info!(?config.environment, %addr, "waitlist service ready");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("waitlist service stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!(error = %err, "unable to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "unable to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C, shutting down"),
        _ = terminate => info!("received terminate signal, shutting down"),
    }
}
