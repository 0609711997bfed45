pub mod models;
pub mod providers;

use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};

use crate::db::{Container, Registry, Tag};

/// Raw build records per container path, as returned by the registry
pub type BuildMap = HashMap<String, Vec<serde_json::Value>>;

/// Trait for container image registries.
///
/// Every method is best-effort: a failed remote call is logged and the
/// affected unit (namespace, tag, container) is skipped, never raised.
#[async_trait]
pub trait ImageRegistry: Send + Sync {
    /// The registry this provider talks to
    fn registry(&self) -> Registry;

    /// Organizations of the credential owner plus the owner's own namespace
    async fn list_namespaces(&self) -> BTreeSet<String>;

    /// Container stubs for every repository in the given namespaces
    async fn list_containers(&self, namespaces: &BTreeSet<String>) -> Vec<Container>;

    /// Published tags of a container; `None` when the registry gave no usable
    /// repository detail, as opposed to a repository without tags
    async fn list_tags(&self, container: &Container) -> Option<Vec<Tag>>;

    /// Fetch build history for each non-manual container of this registry.
    ///
    /// Updates registry, path, git URL and last build of `containers` in place
    /// without persisting them.
    async fn build_map(&self, containers: &mut [Container]) -> BuildMap;

    /// Inspect the container's build triggers and record whether exactly one
    /// supported source-control trigger is configured
    async fn check_triggers(&self, container: &mut Container);
}
