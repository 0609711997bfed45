use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::{AuthCache, TokenAuthenticator, TokenLifecycleManager};
use crate::db::{memory::MemoryStore, ContainerStore, TagStore, Token, TokenSource, TokenStore};
use crate::error::SyncError;
use crate::fetcher::{Credential, HttpFetcher, RemoteResourceFetcher};
use crate::registry::{providers::QuayRegistry, ImageRegistry};
use crate::settings::Settings;
use crate::source_control::{
    providers::BitbucketSourceCodeRepo, DescriptorParser, SourceCodeRepo, StoreDescriptorContent,
};
use crate::sync::ContainerSyncOrchestrator;

/// Shared collaborators of the sync core
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub fetcher: Arc<dyn RemoteResourceFetcher>,
    pub tokens: Arc<dyn TokenStore>,
    pub containers: Arc<dyn ContainerStore>,
    pub tags: Arc<dyn TagStore>,
    pub auth_cache: AuthCache,
    pub authenticator: Arc<TokenAuthenticator>,
    pub token_manager: Arc<TokenLifecycleManager>,
    pub descriptor_parser: Arc<dyn DescriptorParser>,
}

impl AppState {
    /// HTTP fetcher from settings and an in-memory store
    pub fn new(settings: Settings) -> Result<Self> {
        let fetcher = HttpFetcher::new(&settings.http).context("Failed to initialize HTTP fetcher")?;
        let store = Arc::new(MemoryStore::new());
        info!(
            registry = %settings.registry.api_url,
            bitbucket = %settings.bitbucket.api_url,
            "Initialized sync state"
        );
        Ok(Self::from_parts(
            settings,
            Arc::new(fetcher),
            store.clone(),
            store.clone(),
            store,
        ))
    }

    pub fn from_parts(
        settings: Settings,
        fetcher: Arc<dyn RemoteResourceFetcher>,
        tokens: Arc<dyn TokenStore>,
        containers: Arc<dyn ContainerStore>,
        tags: Arc<dyn TagStore>,
    ) -> Self {
        let auth_cache = AuthCache::from_settings(&settings.auth_cache);
        let authenticator = Arc::new(TokenAuthenticator::new(tokens.clone(), auth_cache.clone()));
        let token_manager = Arc::new(TokenLifecycleManager::new(
            fetcher.clone(),
            tokens.clone(),
            auth_cache.clone(),
            &settings,
        ));

        Self {
            settings: Arc::new(settings),
            fetcher,
            tokens,
            containers,
            tags,
            auth_cache,
            authenticator,
            token_manager,
            descriptor_parser: Arc::new(StoreDescriptorContent),
        }
    }

    /// Image registry provider authenticated with `token`
    pub fn registry_for(&self, token: &Token) -> Result<Arc<dyn ImageRegistry>, SyncError> {
        match token.source {
            TokenSource::QuayIo => Ok(Arc::new(QuayRegistry::new(
                self.fetcher.clone(),
                self.settings.registry.api_url.clone(),
                token.clone(),
            ))),
            other => Err(SyncError::BadRequest(format!(
                "{} tokens cannot access an image registry",
                other
            ))),
        }
    }

    /// Source-control provider authenticated with `token`
    pub fn source_repo_for(&self, token: &Token) -> Result<Arc<dyn SourceCodeRepo>, SyncError> {
        match token.source {
            TokenSource::BitbucketOrg => Ok(Arc::new(BitbucketSourceCodeRepo::new(
                self.fetcher.clone(),
                self.settings.bitbucket.api_url.clone(),
                Credential::bearer(token.content.as_str()),
                self.descriptor_parser.clone(),
            ))),
            other => Err(SyncError::BadRequest(format!(
                "{} tokens cannot access a source-control host",
                other
            ))),
        }
    }

    /// Orchestrator for the user's quay.io account.
    ///
    /// The user's bitbucket.org token, if any, is refreshed first; a failed
    /// refresh falls back to the stored content.
    pub async fn orchestrator_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<ContainerSyncOrchestrator, SyncError> {
        let quay_token = self
            .tokens
            .find_by_user_and_source(user_id, TokenSource::QuayIo)
            .await?
            .ok_or_else(|| SyncError::BadRequest("User's quay.io token not found".to_string()))?;
        let registry = self.registry_for(&quay_token)?;

        let bitbucket_token = match self
            .tokens
            .find_by_user_and_source(user_id, TokenSource::BitbucketOrg)
            .await?
        {
            Some(token) if token.refresh_content.is_some() => {
                match self.token_manager.refresh(&token).await {
                    Ok(refreshed) => Some(refreshed),
                    Err(e) => {
                        warn!(%user_id, error = %e, "Could not refresh bitbucket.org token");
                        Some(token)
                    }
                }
            }
            other => other,
        };

        let source_repo = bitbucket_token
            .map(|token| self.source_repo_for(&token))
            .transpose()?;

        Ok(ContainerSyncOrchestrator::new(
            registry,
            source_repo,
            self.containers.clone(),
            self.tags.clone(),
        ))
    }
}
