use std::{path::Path, process, sync::Arc};

use tokio::task::JoinHandle;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;
use yatube::{
    application::{
        error::AppError,
        feed::{FeedOptions, FeedService},
        posts::{FollowService, PostService},
    },
    cache::{CacheConfig, DisabledPageCache, MemoryPageCache, PageCache},
    config,
    infra::{
        error::InfraError,
        http::{self, HttpState},
        memory::MemoryRepositories,
        seed::{self, SeedFile, SeedSummary, SeedTargets},
        telemetry,
    },
};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::CheckSeed(_) => run_check_seed(settings).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repos = Arc::new(MemoryRepositories::new());
    if let Some(path) = settings.seed.file.as_ref() {
        load_seed(&repos, path).await?;
    }

    let cache_config = CacheConfig::from(&settings.cache);
    let (cache, purge_handle) = build_page_cache(&cache_config);

    let feed = FeedService::new(
        repos.clone(),
        repos.clone(),
        repos.clone(),
        repos.clone(),
        cache,
        FeedOptions {
            page_size: settings.feed.page_size,
            page_ttl: cache_config.page_ttl,
        },
    );

    let result = serve_http(&settings, HttpState {
        feed: Arc::new(feed),
    })
    .await;

    if let Some(handle) = purge_handle {
        handle.abort();
        let _ = handle.await;
    }

    result
}

async fn run_check_seed(settings: config::Settings) -> Result<(), AppError> {
    let path = settings.seed.file.as_ref().ok_or_else(|| {
        AppError::from(InfraError::configuration(
            "no seed file given; pass FILE or set `seed.file`",
        ))
    })?;

    let repos = Arc::new(MemoryRepositories::new());
    let summary = load_seed(&repos, path).await?;
    println!(
        "{}: {} users, {} groups, {} posts, {} follows",
        path.display(),
        summary.users,
        summary.groups,
        summary.posts,
        summary.follows
    );
    Ok(())
}

async fn load_seed(
    repos: &Arc<MemoryRepositories>,
    path: &Path,
) -> Result<SeedSummary, AppError> {
    let file = SeedFile::read(path).await.map_err(InfraError::from)?;
    let posts = PostService::new(repos.clone(), repos.clone(), repos.clone());
    let follows = FollowService::new(repos.clone(), repos.clone());

    let summary = seed::apply(
        file,
        SeedTargets {
            users: repos.as_ref(),
            groups: repos.as_ref(),
            posts: &posts,
            follows: &follows,
        },
    )
    .await
    .map_err(InfraError::from)?;

    info!(path = %path.display(), "Seed file loaded");
    Ok(summary)
}

fn build_page_cache(config: &CacheConfig) -> (Arc<dyn PageCache>, Option<JoinHandle<()>>) {
    if !config.enabled {
        info!("Page cache disabled");
        return (Arc::new(DisabledPageCache), None);
    }

    let store = Arc::new(MemoryPageCache::new(config));
    let purge_store = Arc::clone(&store);
    let purge_interval = config.purge_interval;
    let handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(purge_interval);
        interval.tick().await; // Skip the first immediate tick
        loop {
            interval.tick().await;
            let purged = purge_store.purge_expired();
            if purged > 0 {
                tracing::debug!(purged, "Expired cached pages purged");
            }
        }
    });

    info!(
        capacity = config.capacity,
        page_ttl_secs = config.page_ttl.as_secs(),
        "Page cache enabled"
    );
    let cache: Arc<dyn PageCache> = store;
    (cache, Some(handle))
}

async fn serve_http(settings: &config::Settings, http_state: HttpState) -> Result<(), AppError> {
    let router = http::build_router(http_state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(addr = %settings.server.addr, "Listening");

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(err) => {
            warn!(error = %err, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    }
}
