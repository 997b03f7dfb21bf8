//! promet-push entrypoint: feed poller, dispatch worker and HTTP API in one process.

use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;

use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use promet_common::config::AppConfig;
use promet_common::db;
use promet_common::queue::{dispatch_queue, materialized_events};
use promet_common::stats::Statistics;
use promet_common::store::PgStore;
use promet_dispatch::dispatcher::{Dispatcher, DispatcherConfig};
use promet_dispatch::retry::RetryPolicy;
use promet_ingest::poller::{FeedPoller, http_client};
use promet_notifier::fcm::FcmSender;

use promet_api::routes::create_router;
use promet_api::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = AppConfig::from_env()?;

    // Initialize tracing
    let default_filter = if config.debug_mode {
        "promet_api=debug,promet_ingest=debug,promet_dispatch=debug,promet_notifier=debug,promet_common=debug,tower_http=debug"
    } else {
        "promet_api=info,promet_ingest=info,promet_dispatch=info,promet_notifier=info,promet_common=info,tower_http=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .json()
        .init();

    tracing::info!(debug_mode = config.debug_mode, "promet-push starting...");

    // Connect to database; the process cannot run without it
    let store = PgStore::new(db::connect(&config).await?);

    let stats = Arc::new(Statistics::new());
    let (dispatch_tx, dispatch_rx) = dispatch_queue();
    let (publisher, reader) = materialized_events();
    let http = http_client(Duration::from_secs(config.send_timeout_secs))?;

    // Dispatch worker
    let sender = FcmSender::new(
        http.clone(),
        config.fcm_endpoint.clone(),
        config.fcm_server_key.clone(),
    )
    .with_dry_run(config.debug_mode);
    let dispatcher = Dispatcher::new(
        store.clone(),
        sender,
        stats.clone(),
        DispatcherConfig {
            topic: config.fcm_topic.clone(),
            individual_push: config.individual_push,
            retry: RetryPolicy::default()
                .with_attempt_timeout(Duration::from_secs(config.send_timeout_secs)),
            ..Default::default()
        },
    );
    let worker = tokio::spawn(dispatcher.run(dispatch_rx));

    // Feed poller
    let poller = FeedPoller::new(
        http,
        config.feed_url.clone(),
        config.feed_secondary_locale.clone(),
        store.clone(),
        dispatch_tx,
        publisher,
    );

    // HTTP API
    let app = create_router(AppState::new(store, stats, reader)).layer(TraceLayer::new_for_http());
    let listener = tokio::net::TcpListener::bind(config.http_bind_addr).await?;
    tracing::info!(addr = %config.http_bind_addr, "API server listening");

    // Run until Ctrl+C or until a component gives up
    let poll_interval = Duration::from_secs(config.poll_interval_secs);
    let outcome = tokio::select! {
        result = poller.run(poll_interval) => {
            tracing::error!("Feed poller stopped");
            result
        }
        result = axum::serve(listener, app).into_future() => {
            tracing::error!("API server stopped");
            result.map_err(anyhow::Error::from)
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received shutdown signal, stopping gracefully...");
            Ok(())
        }
    };

    // Dropping the poller closes the dispatch queue so the worker can finish.
    drop(poller);
    let grace = Duration::from_secs(config.send_timeout_secs);
    if tokio::time::timeout(grace, worker).await.is_err() {
        tracing::warn!(grace_secs = grace.as_secs(), "Dispatch worker still busy, exiting anyway");
    }

    tracing::info!("promet-push stopped.");
    outcome
}
