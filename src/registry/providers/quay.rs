use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::db::{Container, ContainerMode, Registry, Tag, Token};
use crate::fetcher::{join_url, Credential, RemoteResourceFetcher};
use crate::registry::{
    models::{
        BuildList, BuildRecord, RepositoryDetail, RepositoryList, RepositorySummary, TagDetail,
        TriggerList, UserView,
    },
    BuildMap, ImageRegistry,
};
use crate::source_control::git_url::https_to_ssh;

/// Format of the `started` field of a Quay build (`Tue, 20 Oct 2015 19:52:37 -0000`)
pub const BUILD_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S %z";

/// Trigger services whose repositories can be linked back to a descriptor
const SUPPORTED_TRIGGER_SERVICES: [&str; 2] = ["github", "bitbucket"];

/// Quay.io registry provider, authenticated with the user's quay token
pub struct QuayRegistry {
    fetcher: Arc<dyn RemoteResourceFetcher>,
    api_url: String,
    token: Token,
}

impl QuayRegistry {
    pub fn new(
        fetcher: Arc<dyn RemoteResourceFetcher>,
        api_url: impl Into<String>,
        token: Token,
    ) -> Self {
        Self {
            fetcher,
            api_url: api_url.into(),
            token,
        }
    }

    fn url(&self, path: &str) -> String {
        join_url(&self.api_url, path)
    }

    /// GET and decode a JSON body; absent or malformed bodies are logged and yield `None`
    async fn fetch_json<T: DeserializeOwned>(&self, url: &str, what: &str) -> Option<T> {
        let credential = Credential::bearer(self.token.content.as_str());
        let body = self.fetcher.get(url, &credential).await?;

        match serde_json::from_str(&body) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(url, error = %e, "Malformed {} response", what);
                None
            }
        }
    }

    fn container_from_summary(summary: RepositorySummary) -> Container {
        let mut container = Container::new(Registry::QuayIo, summary.namespace, summary.name);
        container.description = summary.description;
        container.is_public = summary.is_public;
        container.mode = ContainerMode::AutoDetectWithAutomatedBuilds;
        container
    }

    /// Copy git URL and start time of the newest build onto the container
    fn apply_latest_build(container: &mut Container, builds: &[serde_json::Value]) {
        container.registry = Registry::QuayIo;

        let Some(latest) = builds.first() else {
            debug!(path = %container.path, "No builds found");
            return;
        };

        let record: BuildRecord = match serde_json::from_value(latest.clone()) {
            Ok(record) => record,
            Err(e) => {
                warn!(path = %container.path, error = %e, "Skipping malformed build record");
                return;
            }
        };

        container.git_url = record.trigger_metadata.and_then(|m| m.git_url);

        if let Some(started) = record.started.as_deref() {
            info!(path = %container.path, last_build = started, "Latest build");
            match parse_build_date(started) {
                Some(date) => container.last_build = Some(date),
                None => warn!(
                    path = %container.path,
                    started,
                    "Build date did not match format '{}'",
                    BUILD_DATE_FORMAT
                ),
            }
        }
    }
}

/// Parse a Quay build timestamp, falling back to RFC 2822 for offsets like `-0000`
pub fn parse_build_date(started: &str) -> Option<DateTime<Utc>> {
    let started = started.trim();
    DateTime::parse_from_str(started, BUILD_DATE_FORMAT)
        .or_else(|_| DateTime::parse_from_rfc2822(started))
        .ok()
        .map(|date| date.with_timezone(&Utc))
}

#[async_trait]
impl ImageRegistry for QuayRegistry {
    fn registry(&self) -> Registry {
        Registry::QuayIo
    }

    async fn list_namespaces(&self) -> BTreeSet<String> {
        let mut namespaces = BTreeSet::new();

        match self.fetch_json::<UserView>(&self.url("user/"), "user").await {
            Some(user) => {
                namespaces.extend(user.organizations.into_iter().filter_map(|org| org.name));
            }
            None => warn!(
                username = %self.token.username,
                "Could not list organizations, using owner namespace only"
            ),
        }

        if !self.token.username.is_empty() {
            namespaces.insert(self.token.username.clone());
        }

        namespaces
    }

    async fn list_containers(&self, namespaces: &BTreeSet<String>) -> Vec<Container> {
        let mut containers = Vec::new();

        for namespace in namespaces {
            let url = self.url(&format!(
                "repository?namespace={}",
                urlencoding::encode(namespace)
            ));

            let Some(list) = self
                .fetch_json::<RepositoryList>(&url, "repository list")
                .await
            else {
                warn!(namespace = %namespace, "Skipping namespace, repository list unavailable");
                continue;
            };

            for entry in list.repositories {
                match serde_json::from_value::<RepositorySummary>(entry) {
                    Ok(summary) => containers.push(Self::container_from_summary(summary)),
                    Err(e) => warn!(
                        namespace = %namespace,
                        error = %e,
                        "Skipping malformed repository entry"
                    ),
                }
            }
        }

        containers
    }

    async fn list_tags(&self, container: &Container) -> Option<Vec<Tag>> {
        let repository = container.repository();
        info!(path = %container.path, "Getting tags");

        let url = self.url(&format!("repository/{}", repository));
        let detail = self
            .fetch_json::<RepositoryDetail>(&url, "repository detail")
            .await?;

        let mut tags = Vec::with_capacity(detail.tags.len());
        for (name, value) in detail.tags {
            match serde_json::from_value::<TagDetail>(value) {
                Ok(tag) => tags.push(Tag {
                    name: tag.name,
                    size: tag.size,
                    image_id: tag.image_id,
                }),
                Err(e) => warn!(
                    repository = %repository,
                    tag = %name,
                    error = %e,
                    "Skipping malformed tag detail"
                ),
            }
        }

        Some(tags)
    }

    async fn build_map(&self, containers: &mut [Container]) -> BuildMap {
        let mut builds = BuildMap::new();

        for container in containers.iter_mut() {
            if container.registry != Registry::QuayIo {
                continue;
            }

            container.update_path(self.token.source);
            info!(path = %container.path, "Configuring container");

            if container.mode == ContainerMode::ManualImagePath {
                continue;
            }

            let url = self.url(&format!("repository/{}/build/", container.repository()));
            let Some(list) = self.fetch_json::<BuildList>(&url, "build list").await else {
                continue;
            };

            Self::apply_latest_build(container, &list.builds);
            builds.insert(container.path.clone(), list.builds);
        }

        builds
    }

    async fn check_triggers(&self, container: &mut Container) {
        let url = self.url(&format!("repository/{}/trigger/", container.repository()));
        let Some(list) = self.fetch_json::<TriggerList>(&url, "trigger list").await else {
            return;
        };

        // Only a single trigger from a supported host is unambiguous
        let mut valid_trigger = false;
        if let [trigger] = list.triggers.as_slice() {
            let supported = trigger
                .service
                .as_deref()
                .is_some_and(|s| SUPPORTED_TRIGGER_SERVICES.contains(&s));
            if supported {
                if let Some(git_url) = trigger.repository_url.as_deref().and_then(https_to_ssh) {
                    container.registry = Registry::QuayIo;
                    container.git_url = Some(git_url);
                    valid_trigger = true;
                }
            }
        }

        container.valid_trigger = valid_trigger;
    }
}
