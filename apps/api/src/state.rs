use std::sync::Arc;

use crate::admin::AdminPanel;
use crate::auth::AuthContext;
use crate::backend::{BlobStore, TableStore};
use crate::config::Config;
use crate::notify::Notifier;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn TableStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub auth: Arc<AuthContext>,
    pub notifier: Notifier,
    /// Owns the per-row save guards; clones share them.
    pub admin: AdminPanel,
    pub config: Config,
}
