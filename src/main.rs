use dotenvy::dotenv;
use snafu::ResultExt;
use tokio::time::MissedTickBehavior;

use watchstate::catalog;
use watchstate::config;
use watchstate::error::{ConfigLoadSnafu, ConnectRemoteSnafu, InitError, LoadStoreSnafu};
use watchstate::logger;
use watchstate::remote;
use watchstate::service::WatchStateService;
use watchstate::store::FileStore;

#[tokio::main]
async fn main() -> Result<(), InitError> {
    dotenv().ok();

    let config = config::load().context(ConfigLoadSnafu)?;

    let _guard = logger::init(&config)?;

    let remote = remote::connect(&config.surreal, config.remote_timeout())
        .await
        .context(ConnectRemoteSnafu)?;
    let store = FileStore::load(&config.store_path)
        .await
        .context(LoadStoreSnafu)?;
    let service = WatchStateService::new(store, remote, config.retry_policy());

    register_courses(&service, &config).await;

    let mut ticker = tokio::time::interval(config.reconcile_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(
        interval = ?config.reconcile_interval(),
        store = %config.store_path.display(),
        "reconcile daemon started"
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let outcome = service.reconcile().await;
                tracing::debug!(?outcome, "reconcile tick");
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutting down");
                break;
            }
        }
    }

    Ok(())
}

/// Scans the course directory and registers every course folder that has
/// videos. Courses already known locally are left alone.
async fn register_courses(
    service: &WatchStateService<remote::SurrealRemote>,
    config: &config::Config,
) {
    let entries = match std::fs::read_dir(&config.course_dir) {
        Ok(entries) => entries,
        Err(error) => {
            tracing::debug!(
                dir = %config.course_dir.display(),
                error = %error,
                "no course directory to scan"
            );
            return;
        }
    };

    for entry in entries.flatten() {
        if !entry.path().is_dir() {
            continue;
        }
        let Some(course) = entry.file_name().to_str().map(str::to_owned) else {
            continue;
        };

        let ledger = catalog::scan_course(&config.course_dir, &course);
        if ledger.is_empty() {
            continue;
        }
        if let Err(error) = service.register_course(&course, ledger).await {
            tracing::warn!(course, error = %error, "failed to register course");
        }
    }
}
