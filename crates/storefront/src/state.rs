//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::StorefrontConfig;
use crate::services::auth::AuthService;
use crate::services::email::Mailer;
use crate::store::Storefront;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to the
/// store, configuration, and mailer.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    store: Arc<dyn Storefront>,
    mailer: Mailer,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `config` - Storefront configuration
    /// * `store` - Persistence backend (`PostgreSQL` or in-memory)
    /// * `mailer` - Outbound email channel
    #[must_use]
    pub fn new(config: StorefrontConfig, store: Arc<dyn Storefront>, mailer: Mailer) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                mailer,
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the store.
    #[must_use]
    pub fn store(&self) -> &dyn Storefront {
        self.inner.store.as_ref()
    }

    /// Get a reference to the mailer.
    #[must_use]
    pub fn mailer(&self) -> &Mailer {
        &self.inner.mailer
    }

    /// Authentication service bound to this state's store.
    #[must_use]
    pub fn auth(&self) -> AuthService<'_, dyn Storefront + '_> {
        AuthService::new(self.store(), self.inner.config.reset_token_ttl)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use cartwright_core::UserRole;

    use super::*;
    use crate::store::{MemoryStore, UserStore};

    fn state() -> AppState {
        let config = StorefrontConfig::in_memory("http://localhost:3000");
        let mailer = Mailer::from_config(&config).unwrap();
        AppState::new(config, Arc::new(MemoryStore::new()), mailer)
    }

    #[tokio::test]
    async fn test_auth_borrows_shared_store() {
        let state = state();
        let user = state
            .auth()
            .sign_up("Kim", "kim@shop.test", "hunter22", UserRole::Customer)
            .await
            .unwrap();

        let identity = state
            .auth()
            .sign_in("kim@shop.test", "hunter22", UserRole::Customer)
            .await
            .unwrap();
        assert_eq!(identity.user_id, user.id);

        let cloned = state.clone();
        assert!(cloned.store().get_user(user.id).await.unwrap().is_some());
    }
}
