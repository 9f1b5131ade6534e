use clap::Parser;
use tapster_oauth2::KeySetCache;
use tapster_server::{app, config::Config, AppState};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    let authority = config.authority()?;

    if let Some(interval) = config.jwks_refresh_interval() {
        authority.keys().spawn_refresh(interval);
    }
    spawn_reload_on_hangup(authority.keys().clone());

    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    tracing::info!(
        addr = %listener.local_addr()?,
        jwks.url = %config.jwks_url(),
        "listening"
    );

    axum::serve(listener, app(AppState::new(authority)))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "unable to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "unable to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("shutdown requested");
}

/// Refetches the key set on `SIGHUP`, for use after a key rotation
#[cfg(unix)]
fn spawn_reload_on_hangup(keys: KeySetCache) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = match signal(SignalKind::hangup()) {
        Ok(hangup) => hangup,
        Err(err) => {
            let error: &dyn std::error::Error = &err;
            tracing::warn!(error, "unable to listen for SIGHUP; key set reload disabled");
            return;
        }
    };

    tokio::spawn(async move {
        while hangup.recv().await.is_some() {
            tracing::info!("SIGHUP received, refreshing key set");
            if let Ok(key_set) = keys.force_refresh().await {
                tracing::info!(generation = key_set.generation(), "key set reloaded");
            }
        }
    });
}

#[cfg(not(unix))]
fn spawn_reload_on_hangup(_keys: KeySetCache) {}
