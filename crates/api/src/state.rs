//! Application state

use std::sync::Arc;

use optiverifi_billing::{GuardRegistry, PricingTable};
use optiverifi_shared::{BackendClient, BackendResult};

use crate::config::Config;

/// What a return marker reconciles
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ReconcileScope {
    /// Bulk sync after a credit top-up
    Billing,
    /// Pay-per-unlock or extra-credit checkout for one request
    Request(String),
    /// Service fee or savings fee of one managed service
    ManagedService(String),
}

/// Guards are per browser session, so two users returning at once never
/// share one
pub type ReconcileKey = (String, ReconcileScope);

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub backend: BackendClient,
    pub guards: Arc<GuardRegistry<ReconcileKey>>,
}

impl AppState {
    pub fn new(config: Config) -> BackendResult<Self> {
        let backend = BackendClient::new(&config.backend())?;
        let guards = Arc::new(GuardRegistry::new(config.reconcile_guard_ttl));

        tracing::info!(
            backend = %backend.base_url(),
            guard_ttl_secs = config.reconcile_guard_ttl.as_secs(),
            "Application state initialized"
        );

        Ok(Self {
            config,
            backend,
            guards,
        })
    }

    /// Pricing table from the public settings, or the compiled-in defaults
    /// when the settings call fails. Prices shown are previews either way.
    pub async fn pricing_table(&self) -> PricingTable {
        match self.backend.system_settings().await {
            Ok(settings) => PricingTable::from_settings(Some(&settings)),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load system settings, using default prices");
                PricingTable::from_settings(None)
            }
        }
    }
}
