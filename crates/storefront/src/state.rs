//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::StorefrontConfig;
use crate::services::{QuerySequencer, SessionHub};
use crate::supabase::Gateway;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// the backend gateway, the session hub, and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    gateway: Arc<dyn Gateway>,
    session_hub: SessionHub,
    sequencer: QuerySequencer,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `config` - Storefront configuration
    /// * `gateway` - Backend used for auth and rows
    #[must_use]
    pub fn new(config: StorefrontConfig, gateway: Arc<dyn Gateway>) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                gateway,
                session_hub: SessionHub::new(),
                sequencer: QuerySequencer::new(),
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get the backend gateway.
    #[must_use]
    pub fn gateway(&self) -> &dyn Gateway {
        self.inner.gateway.as_ref()
    }

    /// Get the session change hub.
    #[must_use]
    pub fn session_hub(&self) -> &SessionHub {
        &self.inner.session_hub
    }

    /// Get the catalog request sequencer.
    #[must_use]
    pub fn sequencer(&self) -> &QuerySequencer {
        &self.inner.sequencer
    }
}
