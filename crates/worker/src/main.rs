use anyhow::Context;
use clap::Parser;
use tracing::Instrument;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vulture_core::config::{ScanMode, Settings};
use vulture_core::publish::discord::DiscordPublisher;
use vulture_core::publish::{DiscordConfig, LogPublisher, Publisher};
use vulture_core::storage::sheets::PgSheetStore;

mod calendar;
mod community;
mod config;
mod evaluate;
mod forecast;
mod news;
mod report;

#[cfg(test)]
mod testing;

use config::ScanConfig;
use evaluate::Services;

#[derive(Debug, Parser)]
#[command(name = "vulture_worker")]
struct Args {
    /// Scan to run: community, news, calendar or user-forecast.
    #[arg(long, default_value = "community")]
    mode: ScanMode,

    /// Do everything except sheet writes, publishing and marker/ledger updates.
    #[arg(long)]
    dry_run: bool,

    /// UTC day (YYYY-MM-DD) used for the first-run-of-day marker. Defaults to today.
    #[arg(long)]
    today: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    if let Err(err) = settings.validate_for(args.mode) {
        tracing::error!(mode = %args.mode, error = %err, "configuration incomplete");
        return Err(err.into());
    }

    let today = resolve_today(args.today.as_deref())?;
    let run_id = uuid::Uuid::new_v4();
    let span = tracing::info_span!("scan", %run_id, mode = %args.mode, dry_run = args.dry_run);

    let result = run(&args, &settings, today).instrument(span).await;
    if let Err(err) = &result {
        sentry_anyhow::capture_anyhow(err);
        tracing::error!(%run_id, mode = %args.mode, error = %format!("{err:#}"), "scan failed");
    }
    result
}

async fn run(args: &Args, settings: &Settings, today: chrono::NaiveDate) -> anyhow::Result<()> {
    let config = ScanConfig::from_settings(settings, args.dry_run);
    let publisher: Box<dyn Publisher> = if args.dry_run {
        Box::new(LogPublisher)
    } else {
        Box::new(DiscordPublisher::new(DiscordConfig::from_settings(settings))?)
    };

    tracing::info!(%today, "scan starting");

    match args.mode {
        ScanMode::Community => {
            let source = vulture_core::ingest::reddit::RedditClient::from_settings(settings)?;
            let llm = vulture_core::llm::anthropic::AnthropicClient::from_settings(settings)?;
            let svc = Services {
                source: &source,
                llm: &llm,
                publisher: publisher.as_ref(),
            };

            let pool = connect(settings).await?;
            let Some(lock) =
                vulture_core::storage::lock::try_acquire_scan_lock(&pool, args.mode).await?
            else {
                tracing::warn!(mode = %args.mode, "scan lock not acquired; another run in progress");
                return Ok(());
            };

            let sheets = PgSheetStore::new(pool.clone());
            let result = community::run(svc, &sheets, &config, today).await;
            release(lock).await;
            result?;
        }
        ScanMode::News => {
            let source = vulture_core::ingest::reddit::RedditClient::from_settings(settings)?;
            let llm = vulture_core::llm::anthropic::AnthropicClient::from_settings(settings)?;
            let svc = Services {
                source: &source,
                llm: &llm,
                publisher: publisher.as_ref(),
            };
            news::run(svc, &config, chrono::Utc::now()).await?.log();
        }
        ScanMode::Calendar => {
            let provider =
                vulture_core::ingest::calendar::HttpJsonCalendarProvider::from_settings(settings)?;

            let pool = connect(settings).await?;
            let Some(lock) =
                vulture_core::storage::lock::try_acquire_scan_lock(&pool, args.mode).await?
            else {
                tracing::warn!(mode = %args.mode, "scan lock not acquired; another run in progress");
                return Ok(());
            };

            let sheets = PgSheetStore::new(pool.clone());
            let result = calendar::run(&provider, &sheets, publisher.as_ref(), &config, today).await;
            release(lock).await;
            result?.log();
        }
        ScanMode::UserForecast => {
            let source = vulture_core::ingest::reddit::RedditClient::from_settings(settings)?;
            let llm = vulture_core::llm::anthropic::AnthropicClient::from_settings(settings)?;
            let svc = Services {
                source: &source,
                llm: &llm,
                publisher: publisher.as_ref(),
            };
            forecast::run(svc, &config, chrono::Utc::now()).await?.log();
        }
    }

    tracing::info!("scan complete");
    Ok(())
}

async fn connect(settings: &Settings) -> anyhow::Result<sqlx::PgPool> {
    let db_url = settings.require_database_url()?;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(db_url)
        .await
        .context("connect DATABASE_URL failed")?;

    vulture_core::storage::migrate(&pool).await?;
    Ok(pool)
}

async fn release(lock: vulture_core::storage::lock::ScanLock) {
    if let Err(err) = lock.release().await {
        tracing::warn!(error = %format!("{err:#}"), "failed to release scan lock");
    }
}

fn init_sentry(settings: &Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}

fn resolve_today(today_arg: Option<&str>) -> anyhow::Result<chrono::NaiveDate> {
    if let Some(s) = today_arg {
        return chrono::NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .with_context(|| format!("--today must be YYYY-MM-DD (got {s:?})"));
    }
    Ok(chrono::Utc::now().date_naive())
}
