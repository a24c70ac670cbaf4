use anyhow::{Context, Result};
use tracing::{error, info};

use workhours::api;
use workhours::config::Settings;
use workhours::db::{self, SharedStore, Store};
use workhours::telemetry::{get_subscriber, init_subscriber};

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = get_subscriber("workhours".into(), "info".into(), std::io::stdout);
    init_subscriber(subscriber);

    let settings = Settings::from_env().context("Failed to load settings")?;
    let store = db::store_for(&settings.database).context("Failed to set up storage")?;

    // Keep serving even if this fails; each request reports the storage error.
    match store.ensure_schema().await {
        Ok(()) => info!(
            backend = settings.database.backend(),
            target = %settings.database,
            "database ready"
        ),
        Err(e) => error!(
            backend = settings.database.backend(),
            target = %settings.database,
            error = %e,
            "database initialization failed"
        ),
    }

    run(store, settings).await;

    Ok(())
}

async fn run(store: SharedStore, settings: Settings) {
    let routes = api::routes(store, settings.index_file.clone());
    let address = settings.address();

    info!(%address, "listening");
    warp::serve(routes).run(address).await;
}
