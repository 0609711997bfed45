use std::sync::Arc;
use tracing::{debug, warn};

use crate::auth::cache::AuthCache;
use crate::db::{Token, TokenStore};

/// Resolves bearer token content to the stored token, through the auth cache
pub struct TokenAuthenticator {
    store: Arc<dyn TokenStore>,
    cache: AuthCache,
}

impl TokenAuthenticator {
    pub fn new(store: Arc<dyn TokenStore>, cache: AuthCache) -> Self {
        Self { store, cache }
    }

    pub async fn authenticate(&self, content: &str) -> Option<Token> {
        if content.is_empty() {
            return None;
        }

        let store = self.store.clone();
        let token = self
            .cache
            .get_or_compute(content, async move {
                match store.find_by_content(content).await {
                    Ok(token) => token,
                    Err(e) => {
                        warn!(error = ?e, "Token lookup failed during authentication");
                        None
                    }
                }
            })
            .await;

        if token.is_none() {
            debug!("Rejected unknown bearer token");
        }
        token
    }
}
