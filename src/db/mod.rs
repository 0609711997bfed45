pub mod memory;
pub mod models;

pub use models::*;

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

/// Storage for OAuth tokens.
///
/// At most one token per (user, source) pair is kept; callers check with
/// [`TokenStore::find_by_user_and_source`] before calling [`TokenStore::create`].
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Token>>;

    async fn find_by_user_and_source(
        &self,
        user_id: Uuid,
        source: TokenSource,
    ) -> Result<Option<Token>>;

    /// Look up a token by its access token content (used for request authentication)
    async fn find_by_content(&self, content: &str) -> Result<Option<Token>>;

    async fn create(&self, token: Token) -> Result<Token>;

    /// Replace an existing token row, keyed by `token.id`
    async fn update(&self, token: &Token) -> Result<Token>;

    /// Returns true if a row was removed
    async fn delete(&self, id: Uuid) -> Result<bool>;
}

/// Storage for registered containers
#[async_trait]
pub trait ContainerStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Container>>;

    async fn find_by_path(&self, path: &str) -> Result<Option<Container>>;

    async fn create(&self, container: Container) -> Result<Container>;

    async fn update(&self, container: &Container) -> Result<Container>;
}

/// Storage for the tag set of each container
#[async_trait]
pub trait TagStore: Send + Sync {
    async fn list_for_container(&self, container_id: Uuid) -> Result<Vec<Tag>>;

    /// Discard the container's current tags and insert `tags` in their place
    async fn replace_for_container(&self, container_id: Uuid, tags: Vec<Tag>) -> Result<()>;
}
