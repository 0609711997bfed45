use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Container, ContainerStore, Tag, TagStore, Token, TokenSource, TokenStore};

/// In-process store backing all three storage traits.
///
/// Used by the CLI and by tests; the web service plugs in its own database.
#[derive(Default)]
pub struct MemoryStore {
    tokens: RwLock<HashMap<Uuid, Token>>,
    containers: RwLock<HashMap<Uuid, Container>>,
    tags: RwLock<HashMap<Uuid, Vec<Tag>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Token>> {
        Ok(self.tokens.read().await.get(&id).cloned())
    }

    async fn find_by_user_and_source(
        &self,
        user_id: Uuid,
        source: TokenSource,
    ) -> Result<Option<Token>> {
        Ok(self
            .tokens
            .read()
            .await
            .values()
            .find(|t| t.user_id == user_id && t.source == source)
            .cloned())
    }

    async fn find_by_content(&self, content: &str) -> Result<Option<Token>> {
        Ok(self
            .tokens
            .read()
            .await
            .values()
            .find(|t| t.content == content)
            .cloned())
    }

    async fn create(&self, token: Token) -> Result<Token> {
        let mut tokens = self.tokens.write().await;
        if tokens.contains_key(&token.id) {
            return Err(anyhow!("Token {} already exists", token.id));
        }
        tokens.insert(token.id, token.clone());
        Ok(token)
    }

    async fn update(&self, token: &Token) -> Result<Token> {
        let mut tokens = self.tokens.write().await;
        match tokens.get_mut(&token.id) {
            Some(existing) => {
                *existing = token.clone();
                Ok(token.clone())
            }
            None => Err(anyhow!("Token {} not found", token.id)),
        }
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        Ok(self.tokens.write().await.remove(&id).is_some())
    }
}

#[async_trait]
impl ContainerStore for MemoryStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Container>> {
        Ok(self.containers.read().await.get(&id).cloned())
    }

    async fn find_by_path(&self, path: &str) -> Result<Option<Container>> {
        Ok(self
            .containers
            .read()
            .await
            .values()
            .find(|c| c.path == path)
            .cloned())
    }

    async fn create(&self, container: Container) -> Result<Container> {
        let mut containers = self.containers.write().await;
        if containers.values().any(|c| c.path == container.path) {
            return Err(anyhow!("Container {} already exists", container.path));
        }
        containers.insert(container.id, container.clone());
        Ok(container)
    }

    async fn update(&self, container: &Container) -> Result<Container> {
        let mut containers = self.containers.write().await;
        match containers.get_mut(&container.id) {
            Some(existing) => {
                *existing = container.clone();
                Ok(container.clone())
            }
            None => Err(anyhow!("Container {} not found", container.id)),
        }
    }
}

#[async_trait]
impl TagStore for MemoryStore {
    async fn list_for_container(&self, container_id: Uuid) -> Result<Vec<Tag>> {
        Ok(self
            .tags
            .read()
            .await
            .get(&container_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn replace_for_container(&self, container_id: Uuid, tags: Vec<Tag>) -> Result<()> {
        self.tags.write().await.insert(container_id, tags);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Registry;

    #[tokio::test]
    async fn test_token_lookup_by_user_and_source() {
        let store = MemoryStore::new();
        let user_id = Uuid::new_v4();
        let token = Token::new(TokenSource::QuayIo, user_id, "alice", "secret", None);
        TokenStore::create(&store, token.clone()).await.unwrap();

        let found = store
            .find_by_user_and_source(user_id, TokenSource::QuayIo)
            .await
            .unwrap();
        assert_eq!(found, Some(token));

        let missing = store
            .find_by_user_and_source(user_id, TokenSource::GithubCom)
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_token_update_requires_existing_row() {
        let store = MemoryStore::new();
        let token = Token::new(TokenSource::QuayIo, Uuid::new_v4(), "alice", "secret", None);
        assert!(TokenStore::update(&store, &token).await.is_err());
    }

    #[tokio::test]
    async fn test_token_delete() {
        let store = MemoryStore::new();
        let token = Token::new(TokenSource::QuayIo, Uuid::new_v4(), "alice", "secret", None);
        let id = token.id;
        TokenStore::create(&store, token).await.unwrap();
        assert!(store.delete(id).await.unwrap());
        assert!(!store.delete(id).await.unwrap());
        assert!(TokenStore::find_by_id(&store, id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_container_path_is_unique() {
        let store = MemoryStore::new();
        let first = Container::new(Registry::QuayIo, "acme", "flow");
        let second = Container::new(Registry::QuayIo, "acme", "flow");
        ContainerStore::create(&store, first).await.unwrap();
        assert!(ContainerStore::create(&store, second).await.is_err());
    }

    #[tokio::test]
    async fn test_tags_replaced_wholesale() {
        let store = MemoryStore::new();
        let container_id = Uuid::new_v4();
        let tag = |name: &str| Tag {
            name: name.to_string(),
            size: None,
            image_id: None,
        };

        store
            .replace_for_container(container_id, vec![tag("1.0"), tag("latest")])
            .await
            .unwrap();
        store
            .replace_for_container(container_id, vec![tag("2.0")])
            .await
            .unwrap();

        let tags = store.list_for_container(container_id).await.unwrap();
        assert_eq!(tags, vec![tag("2.0")]);
    }
}
