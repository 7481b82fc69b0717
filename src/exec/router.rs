use anyhow::Result;

use crate::model::RouterConfig;
use crate::store::Store;

/// Resolve the router to use for a network.
///
/// The built-in table is checked first; the owner's saved custom router is
/// the fallback. `None` means "need router info"; callers must prompt for
/// router details rather than guessing a default.
pub async fn resolve(store: &Store, owner: &str, network_id: &str) -> Result<Option<RouterConfig>> {
    if let Some(builtin) = RouterConfig::builtin(network_id) {
        return Ok(Some(builtin));
    }
    store.custom_router(owner, network_id).await
}

/// Save (or replace) the owner's custom router for a network.
pub async fn save_custom(store: &Store, owner: &str, router: &RouterConfig) -> Result<()> {
    store.upsert_custom_router(owner, router).await
}
