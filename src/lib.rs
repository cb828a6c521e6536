pub mod alerts;
pub mod config;
pub mod db;
pub mod error;
pub mod refresh;
pub mod scheduler;
pub mod services;
pub mod signals;
pub mod sources;
pub mod state;
pub mod store;
pub mod types;

#[cfg(test)]
pub(crate) mod test_utils;

use std::sync::Arc;

use config::Settings;
use error::ScoringError;
use scheduler::RefreshScheduler;
use state::AppState;

/// Start the engine: load settings, wire state, run the scheduler until
/// ctrl-c. Invalid settings are fatal and returned before anything runs.
pub async fn run() -> Result<(), ScoringError> {
    let settings = Settings::load()?;

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(settings.log_level.as_str()),
    )
    .init();

    settings.validate()?;
    log::info!(
        "LeadScore {} starting (demo mode: {}, hot >= {}, warm >= {})",
        env!("CARGO_PKG_VERSION"),
        settings.demo_mode,
        settings.hot_threshold,
        settings.warm_threshold
    );

    let state = Arc::new(AppState::from_settings(settings)?);
    let scheduler = tokio::spawn(RefreshScheduler::new(Arc::clone(&state)).run());

    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for shutdown signal: {}", e);
    }
    log::info!("Shutting down");
    scheduler.abort();
    Ok(())
}
