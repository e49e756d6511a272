use std::sync::Arc;

use ai_client::OpenAi;
use anyhow::Result;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use launchpad_api::rate_limit::FixedWindowLimiter;
use launchpad_api::{router, AppState};
use launchpad_common::{Config, Shutdown};
use launchpad_social::SocialService;
use launchpad_store::{DocumentStore, MemoryStore, PgDocumentStore};
use launchpad_sync::{Enricher, Reconciler, RetryPolicy, SpaceDevsFeed, SyncScheduler};

async fn build_store(config: &Config) -> Result<Arc<dyn DocumentStore>> {
    match &config.database_url {
        Some(url) => {
            let store = PgDocumentStore::connect(url).await?;
            store.migrate().await?;
            Ok(Arc::new(store))
        }
        None => {
            warn!("DATABASE_URL not set, using in-memory store; data is lost on exit");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("launchpad=info".parse()?))
        .init();

    let config = Config::from_env()?;
    config.log_redacted();

    let store = build_store(&config).await?;

    let generator = OpenAi::new(&config.openai_api_key, &config.openai_model)
        .with_timeout(config.enrich_timeout);
    let enricher = Enricher::builder()
        .generator(Arc::new(generator))
        .max_keyword_attempts(config.keyword_max_attempts)
        .timeout(config.enrich_timeout)
        .build();
    let reconciler = Reconciler::builder()
        .store(store.clone())
        .feed(Arc::new(SpaceDevsFeed::new(&config.feed_base_url, config.fetch_timeout)?))
        .enricher(enricher)
        .retry(
            RetryPolicy::builder()
                .max_attempts(config.fetch_max_attempts)
                .base_delay(config.fetch_retry_base)
                .build(),
        )
        .build();
    let scheduler = SyncScheduler::new(Arc::new(reconciler), config.sync_interval);
    let social = SocialService::new(store.clone());

    let (shutdown_tx, shutdown) = Shutdown::channel();
    let sync_task = scheduler.clone().spawn(shutdown.clone());
    let repair_task = social.clone().spawn_repair(config.repair_interval, shutdown.clone());

    let state = Arc::new(AppState {
        store,
        social,
        scheduler,
        sync_limiter: Arc::new(FixedWindowLimiter::per_hour(config.sync_rate_limit_per_hour)),
        shutdown,
    });

    let addr = format!("{}:{}", config.web_host, config.web_port);
    info!("Launchpad API starting on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            info!("Shutdown signal received");
        })
        .await?;

    let _ = shutdown_tx.send(true);
    let _ = tokio::join!(sync_task, repair_task);
    info!("Launchpad API stopped");
    Ok(())
}
