use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use fightgrid_client::{ApiClient, FightSource, HttpFetcher, HttpFetcherConfig, RetryPolicy};
use fightgrid_core::NewOrganization;
use fightgrid_storage::{FightStore, PgStore};
use fightgrid_sync::{SchedulerHandle, SyncConfig, SyncEngine};
use fightgrid_web::AppState;

#[derive(Debug, Parser)]
#[command(name = "fightgrid")]
#[command(about = "Fightgrid data sync and API server")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Full historical backfill over the configured span.
    Sync,
    /// Incremental sync over the rolling window.
    Recent,
    /// Replace the active rankings from the rankings page.
    Rankings,
    /// Create the configured organization row.
    Seed,
    /// Run pending database migrations.
    Migrate,
    /// Serve the HTTP API (and the in-process scheduler when enabled).
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fightgrid=info,fightgrid_sync=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = SyncConfig::from_env();

    match cli.command.unwrap_or(Commands::Recent) {
        Commands::Sync => {
            let engine = build_engine(&config).await?;
            let stats = engine.run_full().await?;
            println!(
                "full sync complete: events={} fights={} fighters={} skipped={} errors={}",
                stats.events, stats.fights, stats.fighters, stats.fights_skipped, stats.errors
            );
        }
        Commands::Recent => {
            let engine = build_engine(&config).await?;
            let stats = engine.run_incremental().await?;
            println!(
                "incremental sync complete: events={} fights={} fighters={} skipped={} errors={}",
                stats.events, stats.fights, stats.fighters, stats.fights_skipped, stats.errors
            );
        }
        Commands::Rankings => {
            let engine = build_engine(&config).await?;
            let report = engine.run_rankings().await?;
            println!(
                "rankings sync complete: processed={} not_found={}",
                report.rankings_processed, report.not_found
            );
        }
        Commands::Seed => {
            let store = connect_store(&config).await?;
            let organization = store
                .upsert_organization(&NewOrganization {
                    name: config.organization_name.clone(),
                    short_name: config.organization_short_name.clone(),
                    website: config.organization_website.clone(),
                })
                .await?;
            println!(
                "organization ready: {} ({})",
                organization.name, organization.short_name
            );
        }
        Commands::Migrate => {
            let store = connect_store(&config).await?;
            store.migrate().await.context("running migrations")?;
            println!("migrations applied");
        }
        Commands::Serve => {
            let store = connect_store(&config).await?;
            let engine = Arc::new(SyncEngine::new(
                store.clone() as Arc<dyn FightStore>,
                Arc::new(build_source(&config)?) as Arc<dyn FightSource>,
                config.clone(),
            ));

            let mut scheduler = SchedulerHandle::new(
                engine.clone(),
                config.sync_cron.clone(),
                config.rankings_cron.clone(),
            );
            if config.scheduler_enabled {
                scheduler.start().await?;
            }

            let state = AppState {
                engine,
                store: store as Arc<dyn FightStore>,
                cron_secret: config.cron_secret.clone(),
            };
            println!("serving on port {}", config.web_port);
            fightgrid_web::serve(state, config.web_port).await?;
        }
    }

    Ok(())
}

async fn connect_store(config: &SyncConfig) -> Result<Arc<PgStore>> {
    let store = PgStore::connect(&config.database_url)
        .await
        .context("connecting to the database")?;
    Ok(Arc::new(store))
}

fn build_source(config: &SyncConfig) -> Result<ApiClient> {
    let fetcher = HttpFetcher::new(HttpFetcherConfig {
        timeout: Duration::from_secs(config.http_timeout_secs),
        user_agent: Some(config.user_agent.clone()),
        retry: RetryPolicy::default(),
    })
    .context("building the http client")?;
    Ok(ApiClient::new(fetcher, config.source_urls()))
}

async fn build_engine(config: &SyncConfig) -> Result<SyncEngine> {
    let store = connect_store(config).await?;
    let source = build_source(config)?;
    Ok(SyncEngine::new(
        store as Arc<dyn FightStore>,
        Arc::new(source) as Arc<dyn FightSource>,
        config.clone(),
    ))
}
