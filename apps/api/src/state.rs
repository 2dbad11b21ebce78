use std::sync::Arc;

use crate::config::Config;
use crate::contacts::store::ContactStore;
use crate::crm::CrmGateway;

/// Shared application state injected into all route handlers via Axum
/// extractors. Store and CRM sit behind trait objects so the reconciler can
/// be exercised against doubles.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ContactStore>,
    pub crm: Arc<dyn CrmGateway>,
    pub config: Config,
}
