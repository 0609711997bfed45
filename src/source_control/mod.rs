pub mod git_url;
pub mod models;
pub mod providers;

use async_trait::async_trait;

use crate::db::{Container, FileResponse};
pub use git_url::RepositoryRef;

/// Trait for source-control hosts holding descriptor files.
///
/// A missing branch or file is `None`, not an error.
#[async_trait]
pub trait SourceCodeRepo: Send + Sync {
    /// Whether `repository` lives on the host this provider talks to
    fn serves(&self, repository: &RepositoryRef) -> bool;

    async fn resolve_default_branch(&self, repository: &RepositoryRef) -> Option<String>;

    /// Read `path` at `reference`, resolving the default branch first when no
    /// reference is given
    async fn read_file(
        &self,
        repository: &RepositoryRef,
        path: &str,
        reference: Option<&str>,
    ) -> Option<FileResponse>;

    /// Fetch the container's descriptor from the default branch of its git
    /// repository and hand it to the descriptor parser
    async fn locate_descriptor_file(&self, container: Container) -> Container;
}

/// Annotates a container with the descriptor content found for it
pub trait DescriptorParser: Send + Sync {
    fn parse(&self, content: &str, container: Container) -> Container;
}

/// Keeps the raw descriptor text on the container without interpreting it
#[derive(Debug, Default, Clone, Copy)]
pub struct StoreDescriptorContent;

impl DescriptorParser for StoreDescriptorContent {
    fn parse(&self, content: &str, mut container: Container) -> Container {
        container.descriptor_content = Some(content.to_string());
        container
    }
}
