use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::db::{Container, ContainerMode, ContainerStore, TagStore};
use crate::error::Result;
use crate::registry::ImageRegistry;
use crate::source_control::{git_url::parse_ssh_url, SourceCodeRepo};

/// Brings the stored containers of one registry account up to date.
///
/// Units are processed one at a time; a failure for one container is logged
/// and the rest still complete.
pub struct ContainerSyncOrchestrator {
    registry: Arc<dyn ImageRegistry>,
    source_repo: Option<Arc<dyn SourceCodeRepo>>,
    containers: Arc<dyn ContainerStore>,
    tags: Arc<dyn TagStore>,
}

impl ContainerSyncOrchestrator {
    pub fn new(
        registry: Arc<dyn ImageRegistry>,
        source_repo: Option<Arc<dyn SourceCodeRepo>>,
        containers: Arc<dyn ContainerStore>,
        tags: Arc<dyn TagStore>,
    ) -> Self {
        Self {
            registry,
            source_repo,
            containers,
            tags,
        }
    }

    /// Sync every container in every namespace visible to the registry credential.
    ///
    /// Returns the containers that were stored successfully.
    pub async fn refresh_namespaces(&self) -> Vec<Container> {
        let namespaces = self.registry.list_namespaces().await;
        info!(registry = %self.registry.registry(), count = namespaces.len(), "Listed namespaces");

        let mut remote = self.registry.list_containers(&namespaces).await;
        let builds = self.registry.build_map(&mut remote).await;
        debug!(containers = remote.len(), with_builds = builds.len(), "Fetched build history");

        let mut synced = Vec::with_capacity(remote.len());
        for container in remote {
            let path = container.path.clone();
            match self.sync_container(container).await {
                Ok(container) => synced.push(container),
                Err(e) => warn!(path = %path, error = %e, "Failed to sync container"),
            }
        }

        info!(synced = synced.len(), "Namespace refresh finished");
        synced
    }

    /// Merge one freshly listed container into its stored counterpart, persist
    /// it and replace its tags
    pub async fn sync_container(&self, remote: Container) -> Result<Container> {
        let existing = self.containers.find_by_path(&remote.path).await?;
        let is_new = existing.is_none();

        let mut container = match existing {
            Some(stored) => stored.merge_registry_fields(remote),
            None => remote,
        };

        if container.mode != ContainerMode::ManualImagePath && container.git_url.is_none() {
            self.registry.check_triggers(&mut container).await;
        }

        let container = self.locate_descriptor(container).await;

        let container = if is_new {
            self.containers.create(container).await?
        } else {
            self.containers.update(&container).await?
        };

        match self.registry.list_tags(&container).await {
            Some(tags) => {
                debug!(path = %container.path, tags = tags.len(), "Replacing tags");
                self.tags.replace_for_container(container.id, tags).await?;
            }
            None => warn!(path = %container.path, "Tags unavailable, keeping stored tags"),
        }

        Ok(container)
    }

    async fn locate_descriptor(&self, container: Container) -> Container {
        if container.default_descriptor_path.is_none() {
            return container;
        }
        let Some(repository) = container.git_url.as_deref().and_then(parse_ssh_url) else {
            return container;
        };

        match &self.source_repo {
            Some(source_repo) if source_repo.serves(&repository) => {
                source_repo.locate_descriptor_file(container).await
            }
            _ => {
                debug!(
                    path = %container.path,
                    host = %repository.host,
                    "No source-control access for descriptor host"
                );
                container
            }
        }
    }
}
