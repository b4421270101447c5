//! Maintenance daemon: periodically rescans the donation population for
//! anomalies and retrains the recommender snapshot. The request-serving
//! surface lives elsewhere; this binary owns the scheduled work.

use std::time::Duration;

use dotenvy::dotenv;
use foodbridge::{
    config,
    core::{anomaly, recommender},
    errors::Result,
    ml::recommender::RecommenderHandle,
    notify::DbNotifier,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// How often the sweep and retrain cycle runs.
const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(15 * 60);

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    dotenv().ok();

    let app_config = config::load_app_configuration()?;

    let db = config::database::create_connection()
        .await
        .inspect(|_| info!("Database connected"))
        .inspect_err(|e| error!("Failed to connect to database: {e}"))?;
    config::database::create_tables(&db).await?;

    let notifier = DbNotifier::new(db.clone());
    let recommender_handle = RecommenderHandle::new();

    info!("Maintenance daemon running (interval {MAINTENANCE_INTERVAL:?})");
    let mut ticker = tokio::time::interval(MAINTENANCE_INTERVAL);
    loop {
        ticker.tick().await;

        match anomaly::sweep_and_flag(&db, &notifier, &app_config.tuning.anomaly).await {
            Ok(records) => info!("Anomaly sweep complete: {} flagged", records.len()),
            Err(e) => error!("Anomaly sweep failed: {e}"),
        }

        match recommender::retrain(&db, &app_config.tuning.recommender, &recommender_handle).await
        {
            Ok(()) => info!("Recommender snapshot retrained"),
            Err(e) => error!("Recommender retraining failed: {e}"),
        }
    }
}
