//! # Runtime Wiring
//!
//! Builds the sync engine from an [`AppConfig`]: token source, HTTP client,
//! page fetcher, store and orchestrator.

use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::config::AppConfig;
use crate::error::SyncError;
use crate::provider::{
    FileTokenSource, HttpCalendarClient, PageFetcher, RetryExecutor, RetryPolicy,
    StaticTokenSource, TokenSource,
};
use crate::scheduler::Scheduler;
use crate::store::SeaOrmEventStore;
use crate::sync::{CalendarTarget, SyncOrchestrator};

/// Pick the configured token source; a token file wins over an inline token.
pub fn token_source(config: &AppConfig) -> Result<Arc<dyn TokenSource>, SyncError> {
    if let Some(path) = &config.access_token_file {
        return Ok(Arc::new(FileTokenSource::new(path.clone())));
    }
    match config.access_token.as_deref().map(str::trim) {
        Some(token) if !token.is_empty() => Ok(Arc::new(StaticTokenSource::new(token))),
        _ => Err(SyncError::Configuration(
            "no access token configured (set CALSYNC_ACCESS_TOKEN or CALSYNC_ACCESS_TOKEN_FILE)"
                .to_string(),
        )),
    }
}

/// Calendars named in `CALSYNC_CALENDAR_IDS`, in configuration order.
pub fn calendar_targets(config: &AppConfig) -> Vec<CalendarTarget> {
    config
        .calendar_ids
        .iter()
        .filter_map(|entry| CalendarTarget::parse(entry))
        .collect()
}

/// Assemble an orchestrator talking to the configured API and database.
pub fn build_orchestrator(
    config: &AppConfig,
    db: DatabaseConnection,
) -> Result<SyncOrchestrator, SyncError> {
    let base_url = config
        .api_base_url()
        .map_err(|e| SyncError::Configuration(e.to_string()))?;
    let client = HttpCalendarClient::new(base_url, token_source(config)?, config.http_timeout())
        .map_err(|e| SyncError::Configuration(e.to_string()))?;

    let retry = RetryExecutor::new(RetryPolicy::from_config(&config.retry));
    let fetcher = PageFetcher::new(Arc::new(client), retry);
    let store = Arc::new(SeaOrmEventStore::new(Arc::new(db)));

    Ok(SyncOrchestrator::new(fetcher, store, config.sync.clone()))
}

/// Assemble the scheduler around a freshly built orchestrator.
pub fn build_scheduler(config: &AppConfig, db: DatabaseConnection) -> Result<Scheduler, SyncError> {
    let orchestrator = Arc::new(build_orchestrator(config, db)?);
    Ok(Scheduler::new(
        orchestrator,
        calendar_targets(config),
        config.scheduler.clone(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_token_is_a_configuration_error() {
        let config = AppConfig::default();
        let err = token_source(&config).err().unwrap();
        assert_eq!(err.code(), "configuration");
    }

    #[test]
    fn targets_skip_blank_entries() {
        let config = AppConfig {
            calendar_ids: vec![
                "primary".into(),
                " ".into(),
                "team@example.com=Team".into(),
            ],
            ..AppConfig::default()
        };
        let targets = calendar_targets(&config);
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[1].display_name.as_deref(), Some("Team"));
    }
}
