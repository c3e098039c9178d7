//! Leaderboard Service: tracks CodeChef solve counts and posts leaderboards.
//!
//! Hosts the RPC API used by chat bridges and runs the daily update worker.
//! Default: http://127.0.0.1:9103/

mod aggregator;
mod commands;
mod config;
mod db;
mod delivery;
mod error;
mod fetcher;
mod period;
mod registry;
mod reporter;
mod routes;
mod scheduler;
#[cfg(test)]
mod test_support;

use config::ServiceConfig;
use delivery::{Delivery, DiscordDelivery, LogDelivery};
use fetcher::CodeChefFetcher;
use routes::AppState;
use scheduler::{Scheduler, SchedulerSettings};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    env_logger::init();

    if let Err(e) = run().await {
        log::error!("[LEADERBOARD] {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), String> {
    let config = ServiceConfig::from_env()?;

    log::info!("Opening database at: {}", config.db_path);
    let database = Arc::new(
        db::Db::open(&config.db_path).map_err(|e| format!("Failed to open database: {}", e))?,
    );

    let fetcher = Arc::new(CodeChefFetcher::new(
        &config.codechef_base_url,
        config.fetch_timeout(),
    )?);

    let delivery: Arc<dyn Delivery> = match &config.discord {
        Some(target) => Arc::new(DiscordDelivery::new(&target.token, target.channel_id)),
        None => {
            log::warn!("Discord credentials not set, reports will only be logged");
            Arc::new(LogDelivery)
        }
    };

    let settings = SchedulerSettings {
        degraded_policy: config.degraded_policy,
        pace: config.fetch_delay(),
        summary_grace_days: config.summary_grace_days,
    };
    let scheduler = Arc::new(Scheduler::new(database, fetcher, delivery.clone(), settings)?);

    let shutdown = CancellationToken::new();
    let worker = {
        let scheduler = scheduler.clone();
        let interval = config.update_interval();
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            scheduler::run_worker(scheduler, interval, shutdown).await;
        })
    };
    log::info!(
        "Background worker started (interval: {}s, degraded policy: {}, delivery: {})",
        config.update_interval_secs,
        config.degraded_policy,
        delivery.name()
    );

    let state = Arc::new(AppState {
        scheduler,
        start_time: Instant::now(),
        update_interval_secs: config.update_interval_secs,
    });

    let cors = tower_http::cors::CorsLayer::permissive();

    let app = axum::Router::new()
        // Tracked users
        .route("/rpc/users/add", axum::routing::post(routes::users_add))
        .route("/rpc/users/remove", axum::routing::post(routes::users_remove))
        .route("/rpc/users/list", axum::routing::get(routes::users_list))
        // Reports
        .route("/rpc/leaderboard", axum::routing::get(routes::leaderboard))
        .route(
            "/rpc/leaderboard/period",
            axum::routing::post(routes::leaderboard_period),
        )
        .route("/rpc/periods", axum::routing::get(routes::periods))
        .route("/rpc/snapshots", axum::routing::post(routes::snapshots))
        // Cycle and chat commands
        .route("/rpc/cycle/run", axum::routing::post(routes::cycle_run))
        .route("/rpc/command", axum::routing::post(routes::command))
        // Service
        .route("/rpc/status", axum::routing::get(routes::status))
        .with_state(state)
        .layer(cors);

    let addr = format!("127.0.0.1:{}", config.port);
    log::info!("Leaderboard Service listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| format!("Failed to bind {}: {}", addr, e))?;

    let server_shutdown = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
            log::info!("Shutting down");
            server_shutdown.cancel();
        })
        .await
        .map_err(|e| format!("Server error: {}", e))?;

    shutdown.cancel();
    worker.await.ok();
    Ok(())
}
