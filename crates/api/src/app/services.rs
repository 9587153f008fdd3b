//! Service wiring: store selection, lifecycle, and the optional overdue sweep.

use std::sync::Arc;

use gestao_infra::store::{InMemoryReceivableStore, PostgresReceivableStore, ReceivableStore, StoreError};
use gestao_infra::workers::{OverdueSweep, SweepHandle};
use gestao_infra::ReceivableLifecycle;
use gestao_receivables::DueDateClassifier;

use crate::config::ApiConfig;

pub type SharedStore = Arc<dyn ReceivableStore>;
pub type Lifecycle = ReceivableLifecycle<SharedStore>;

/// Everything the HTTP handlers need.
pub struct AppServices {
    pub lifecycle: Arc<Lifecycle>,
    sweep: Option<SweepHandle>,
}

impl AppServices {
    pub fn new(store: SharedStore, config: &ApiConfig) -> Self {
        let classifier = Arc::new(DueDateClassifier::with_grace_days(config.overdue_grace_days));
        let lifecycle = Arc::new(ReceivableLifecycle::with_classifier(store, classifier));

        let sweep = config.overdue_sweep_interval.map(|interval| {
            tracing::info!(interval_secs = interval.as_secs(), "starting overdue sweep");
            OverdueSweep::new(interval).spawn(Arc::clone(&lifecycle))
        });

        Self { lifecycle, sweep }
    }

    /// In-memory store, no sweep. Used by tests and local runs.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryReceivableStore::new()), &ApiConfig::default())
    }

    /// Stop the background sweep, if one is running.
    pub async fn shutdown(mut self) {
        if let Some(sweep) = self.sweep.take() {
            sweep.shutdown().await;
        }
    }
}

/// Pick the store from configuration and wire the services.
///
/// With `DATABASE_URL` set this connects to Postgres and runs migrations.
pub async fn build_services(config: &ApiConfig) -> Result<AppServices, StoreError> {
    let store: SharedStore = match config.database_url.as_deref() {
        Some(url) => {
            let store = PostgresReceivableStore::connect(url, config.database_max_connections).await?;
            store.migrate().await?;
            tracing::info!("using postgres receivable store");
            Arc::new(store)
        }
        None => {
            tracing::info!("using in-memory receivable store");
            Arc::new(InMemoryReceivableStore::new())
        }
    };

    Ok(AppServices::new(store, config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn sweep_starts_only_when_configured() {
        let services = AppServices::in_memory();
        assert!(services.sweep.is_none());

        let config = ApiConfig {
            overdue_sweep_interval: Some(Duration::from_secs(60)),
            ..ApiConfig::default()
        };
        let services = build_services(&config).await.unwrap();
        assert!(services.sweep.is_some());
        services.shutdown().await;
    }
}
