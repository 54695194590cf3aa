use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use chrono::Utc;
use log::{debug, error, info};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use todoforge::auth::TokenService;
use todoforge::{routes, AppState, Config};

/// Drops revocation entries old enough that the tokens they cover have
/// expired anyway. Runs until `shutdown` fires.
async fn revocation_cleanup(
    tokens: Arc<TokenService>,
    every: Duration,
    shutdown: CancellationToken,
) {
    let mut interval = tokio::time::interval(every);
    // The first tick completes immediately.
    interval.tick().await;
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = interval.tick() => {
                if let Some(cutoff) = Utc::now().checked_sub_signed(tokens.max_token_lifetime()) {
                    let removed = tokens.cleanup_revoked_tokens(cutoff);
                    debug!("revocation cleanup removed {} entries", removed);
                }
            }
        }
    }
    info!("revocation cleanup stopped");
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("invalid configuration: {}", e);
            return Err(std::io::Error::new(std::io::ErrorKind::InvalidInput, e));
        }
    };

    let state = match AppState::from_config(&config).await {
        Ok(state) => state,
        Err(e) => {
            error!("failed to initialise storage: {}", e);
            return Err(std::io::Error::new(std::io::ErrorKind::Other, e));
        }
    };
    let shutdown = state.shutdown.clone();

    let cleanup = tokio::spawn(revocation_cleanup(
        state.tokens.clone(),
        Duration::from_secs(config.revocation_cleanup_interval_seconds),
        shutdown.clone(),
    ));

    info!("Starting {} server at {}", config.app_name, config.server_url());
    let data = web::Data::new(state);
    let result = HttpServer::new(move || {
        App::new()
            .app_data(data.clone())
            .wrap(Logger::default())
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allow_any_method()
                    .allow_any_header()
                    .expose_headers(vec![
                        "X-Total-Count",
                        "X-Total-Pages",
                        "X-Current-Page",
                        "X-Page-Size",
                    ])
                    .max_age(3600),
            )
            .configure(routes::config)
    })
    .bind((config.server_host.as_str(), config.server_port))?
    .shutdown_timeout(config.shutdown_timeout_seconds)
    .run()
    .await;

    shutdown.cancel();
    if let Err(e) = cleanup.await {
        error!("revocation cleanup task failed: {}", e);
    }
    info!("server stopped");
    result
}
