//! CLI command handlers.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tracing::{debug, info, warn};
use tracker_core::{
    Collection, DiscoveryEngine, FetchGuard, LinkPipeline, LogNotifier, PageMetadataEnricher,
    RegisterRequest, SeriesRecord, SqliteStore, SweepOutcome, SweepReport, TrackerScheduler,
    TrackingEntry, TrackingRequest, build_default_pipeline, library, read_records,
};

use crate::cli::Command;
use crate::config::TrackerSettings;

/// Open handles shared by the commands that touch the store.
struct TrackerContext {
    settings: TrackerSettings,
    store: Arc<SqliteStore>,
    fetch: FetchGuard,
}

impl TrackerContext {
    async fn open(settings: &TrackerSettings) -> Result<Self> {
        let store = SqliteStore::open(&settings.database_path)
            .await
            .with_context(|| {
                format!(
                    "Failed to open tracker database '{}'",
                    settings.database_path.display()
                )
            })?;
        debug!(path = %settings.database_path.display(), "Store opened");
        Ok(Self {
            settings: settings.clone(),
            store: Arc::new(store),
            fetch: open_fetch_guard(settings)?,
        })
    }

    fn engine(&self) -> Result<DiscoveryEngine> {
        let pipeline = pipeline_for(&self.fetch, &self.settings);
        Ok(DiscoveryEngine::new(
            self.store.clone(),
            Arc::new(pipeline),
            Arc::new(LogNotifier),
        )
        .with_policy(self.settings.discovery_policy())
        .with_url_pattern(self.settings.url_pattern()?))
    }
}

fn open_fetch_guard(settings: &TrackerSettings) -> Result<FetchGuard> {
    FetchGuard::new(&settings.fetch_config()).context("Failed to build HTTP client")
}

fn pipeline_for(fetch: &FetchGuard, settings: &TrackerSettings) -> LinkPipeline {
    build_default_pipeline(fetch, &settings.pipeline_options())
}

/// Runs `command` to completion.
pub(crate) async fn dispatch(command: Command, settings: &TrackerSettings) -> Result<()> {
    match command {
        Command::Resolve { url } => run_resolve_command(settings, &url).await,
        command => {
            let ctx = TrackerContext::open(settings).await?;
            let result = run_store_command(&ctx, command).await;
            ctx.store.close().await;
            result
        }
    }
}

async fn run_store_command(ctx: &TrackerContext, command: Command) -> Result<()> {
    match command {
        Command::Resolve { url } => run_resolve_command(&ctx.settings, &url).await,
        Command::Run => run_daemon_command(ctx).await,
        Command::Sweep => {
            print_sweep(sweep_until_interrupted(ctx).await?.as_ref());
            Ok(())
        }
        Command::Add {
            url,
            season,
            start,
            end,
            kind,
            no_sweep,
        } => {
            let request = RegisterRequest {
                series_url: url,
                kind,
                seasons: vec![TrackingRequest { season, start, end }],
            };
            run_add_command(ctx, &request, !no_sweep).await
        }
        Command::Remove { id } => run_remove_command(ctx, &id).await,
        Command::List => run_list_command(ctx).await,
        Command::Trending { ranks } => run_trending_command(ctx, &ranks).await,
    }
}

async fn run_resolve_command(settings: &TrackerSettings, url: &str) -> Result<()> {
    let fetch = open_fetch_guard(settings)?;
    let pipeline = pipeline_for(&fetch, settings);
    let link = pipeline
        .resolve_link(url)
        .await
        .with_context(|| format!("Could not resolve '{url}'"))?;

    if let Some(best) = link.best() {
        println!("{best}");
    }
    for (label, value) in [
        ("manifest", &link.stream_manifest_url),
        ("embed", &link.resolved_embed_url),
        ("raw", &link.raw_shortened_url),
    ] {
        if let Some(value) = value {
            debug!(label, value = %value, "Resolved link part");
        }
    }
    Ok(())
}

async fn run_daemon_command(ctx: &TrackerContext) -> Result<()> {
    let scheduler =
        TrackerScheduler::new(Arc::new(ctx.engine()?)).with_interval(ctx.settings.sweep_interval);
    let timer = scheduler.start();
    let first = scheduler.trigger_in_background();
    info!(
        interval_hours = ctx.settings.sweep_interval.as_secs() / 3600,
        "Tracker running, press Ctrl-C to stop"
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    info!("Shutting down");
    scheduler.shutdown();

    timer.await.context("Scheduler task panicked")?;
    match first.await.context("Initial sweep task panicked")? {
        Ok(SweepOutcome::Ran(report)) => debug!(?report, "Initial sweep finished"),
        Ok(SweepOutcome::Skipped) => {}
        Err(error) => warn!(error = %error, "Initial sweep failed"),
    }
    Ok(())
}

/// Runs one sweep through a scheduler so it cannot overlap a daemon's sweep
/// on the same database. Returns `None` when another sweep holds the lease.
async fn sweep_until_interrupted(ctx: &TrackerContext) -> Result<Option<SweepReport>> {
    let scheduler = TrackerScheduler::new(Arc::new(ctx.engine()?));
    let watcher = {
        let scheduler = scheduler.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupted, finishing current lookup");
                scheduler.shutdown();
            }
        })
    };
    let outcome = scheduler.run_sweep().await;
    watcher.abort();
    match outcome? {
        SweepOutcome::Ran(report) => Ok(Some(report)),
        SweepOutcome::Skipped => Ok(None),
    }
}

async fn run_add_command(ctx: &TrackerContext, request: &RegisterRequest, sweep: bool) -> Result<()> {
    let enricher = PageMetadataEnricher::new(ctx.fetch.clone());
    let registered = library::register_series(ctx.store.as_ref(), &enricher, request).await?;
    println!(
        "{} {} ({}): {} tracking entr{} added, {} reset",
        if registered.created { "Added" } else { "Updated" },
        registered.title,
        registered.series_id,
        registered.entries_added,
        if registered.entries_added == 1 { "y" } else { "ies" },
        registered.entries_reset,
    );

    if sweep {
        print_sweep(sweep_until_interrupted(ctx).await?.as_ref());
    }
    Ok(())
}

async fn run_remove_command(ctx: &TrackerContext, id: &str) -> Result<()> {
    let removed = library::remove_series(ctx.store.as_ref(), id).await?;
    if !removed.series_removed && removed.entries_removed == 0 {
        bail!("No series with id '{id}'");
    }
    println!(
        "Removed series {id} and {} tracking entr{}",
        removed.entries_removed,
        if removed.entries_removed == 1 { "y" } else { "ies" }
    );
    Ok(())
}

async fn run_list_command(ctx: &TrackerContext) -> Result<()> {
    let store = ctx.store.as_ref();
    let series: Vec<SeriesRecord> = read_records(store, Collection::Library).await?;
    let queue: Vec<TrackingEntry> = read_records(store, Collection::TrackerQueue).await?;
    let stats = library::library_stats(store).await?;

    println!("Library: {} series, {} episodes", stats.series, stats.episodes);
    for record in &series {
        println!(
            "  {}  {} [{}] {} episodes",
            record.id,
            record.title,
            record.kind.as_deref().unwrap_or("-"),
            record.episode_count()
        );
    }

    println!(
        "Tracking: {} entries, {} completed",
        stats.tracking, stats.completed
    );
    for entry in &queue {
        let target = entry
            .target()
            .map_or_else(|| "?".to_string(), |t| t.to_string());
        println!(
            "  {} S{} last {} / target {}{}",
            entry.title,
            entry.season,
            entry.last_episode,
            target,
            if entry.completed { " (completed)" } else { "" }
        );
    }
    Ok(())
}

async fn run_trending_command(ctx: &TrackerContext, ranks: &[(String, i64)]) -> Result<()> {
    let ids = if ranks.is_empty() {
        library::trending(ctx.store.as_ref()).await?
    } else {
        library::set_trending(ctx.store.as_ref(), ranks).await?
    };
    for (position, id) in ids.iter().enumerate() {
        println!("{}. {id}", position + 1);
    }
    Ok(())
}

fn print_sweep(report: Option<&SweepReport>) {
    let Some(report) = report else {
        println!("Another sweep is already running; nothing was looked up.");
        return;
    };
    println!(
        "Checked {} of {} entries ({} skipped), {} lookups, {} new episodes",
        report.entries_checked,
        report.entries_total,
        report.entries_skipped,
        report.lookups,
        report.episodes_found
    );
    for title in &report.completed_titles {
        println!("  completed: {title}");
    }
    if report.cancelled {
        println!("Sweep was interrupted; progress so far was saved.");
    }
}
