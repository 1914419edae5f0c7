//! API server entry point.

use api::config::{Config, LogFormat};
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let registry = tracing_subscriber::registry().with(filter);

    match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

#[tokio::main]
async fn main() {
    // 1. Configuration and tracing
    let config = Config::from_env();
    init_tracing(&config);

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Stores, transport and consumer runtimes
    let services = api::Services::from_config(&config)
        .await
        .expect("failed to initialize services");

    // 4. Start consuming; the binary owns the only shutdown trigger
    let (trigger, shutdown) = consumer::shutdown::channel();
    let consumers = services.spawn_consumers(&shutdown);

    let serve = tokio::select! {
        () = services.wait_until_ready() => true,
        () = shutdown_signal() => false,
    };

    // 5. Serve queries until a signal arrives
    if serve {
        let app = api::create_app(services.state.clone(), metrics_handle);
        let addr = config.addr();
        tracing::info!(%addr, "starting API server");

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .expect("failed to bind address");
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .expect("server error");
    }

    // 6. Stop the consumers and wait for them to leave their groups
    trigger.trigger();
    for task in consumers {
        match task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!(error = %e, "consumer runtime stopped with error"),
            Err(e) => tracing::error!(error = %e, "consumer runtime task failed"),
        }
    }

    tracing::info!("server shut down gracefully");
}
