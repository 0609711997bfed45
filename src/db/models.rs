use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Image registry hosting a container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Registry {
    #[serde(rename = "quay.io")]
    QuayIo,
    #[serde(rename = "docker.io")]
    DockerHub,
}

impl std::fmt::Display for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Registry::QuayIo => write!(f, "quay.io"),
            Registry::DockerHub => write!(f, "docker.io"),
        }
    }
}

/// How a container's registry metadata is maintained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContainerMode {
    /// Tags and build triggers are discovered from the registry
    #[default]
    AutoDetectWithAutomatedBuilds,
    /// Path was entered by hand; registry build sync is skipped
    ManualImagePath,
}

/// Provider that issued a token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenSource {
    #[serde(rename = "quay.io")]
    QuayIo,
    #[serde(rename = "github.com")]
    GithubCom,
    #[serde(rename = "bitbucket.org")]
    BitbucketOrg,
    #[serde(rename = "dockhand")]
    FirstParty,
}

impl std::fmt::Display for TokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenSource::QuayIo => write!(f, "quay.io"),
            TokenSource::GithubCom => write!(f, "github.com"),
            TokenSource::BitbucketOrg => write!(f, "bitbucket.org"),
            TokenSource::FirstParty => write!(f, "dockhand"),
        }
    }
}

/// A registry-hosted image linked to a descriptor in source control
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Container {
    pub id: Uuid,
    pub namespace: String,
    pub name: String,
    /// `{token_source}/{namespace}/{name}`, see [`Container::update_path`]
    pub path: String,
    pub registry: Registry,
    pub mode: ContainerMode,
    pub description: Option<String>,
    pub is_public: bool,
    /// SSH-style git URL, e.g. `git@bitbucket.org:owner/repo.git`
    pub git_url: Option<String>,
    pub default_descriptor_path: Option<String>,
    pub last_build: Option<DateTime<Utc>>,
    pub valid_trigger: bool,
    /// Raw descriptor content as last fetched from source control
    pub descriptor_content: Option<String>,
}

impl Container {
    pub fn new(registry: Registry, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        let namespace = namespace.into();
        let name = name.into();
        Self {
            id: Uuid::new_v4(),
            path: format!("{}/{}/{}", registry, namespace, name),
            namespace,
            name,
            registry,
            mode: ContainerMode::default(),
            description: None,
            is_public: false,
            git_url: None,
            default_descriptor_path: None,
            last_build: None,
            valid_trigger: false,
            descriptor_content: None,
        }
    }

    /// `namespace/name` as used in registry API paths
    pub fn repository(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }

    pub fn update_path(&mut self, source: TokenSource) {
        self.path = format!("{}/{}/{}", source, self.namespace, self.name);
    }

    /// Overwrite the fields owned by the registry with those of a freshly synced copy.
    ///
    /// Identity, mode, trigger state and the configured descriptor path stay with `self`.
    pub fn merge_registry_fields(mut self, remote: Container) -> Self {
        self.namespace = remote.namespace;
        self.name = remote.name;
        self.path = remote.path;
        self.registry = remote.registry;
        self.description = remote.description;
        self.is_public = remote.is_public;
        // Absent remote values never erase what an earlier sync found
        if self.mode != ContainerMode::ManualImagePath {
            if remote.git_url.is_some() {
                self.git_url = remote.git_url;
            }
            if remote.last_build.is_some() {
                self.last_build = remote.last_build;
            }
        }
        self
    }
}

/// One published version of a container image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    pub size: Option<i64>,
    pub image_id: Option<String>,
}

/// OAuth credential owned by a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub id: Uuid,
    pub source: TokenSource,
    pub content: String,
    pub refresh_content: Option<String>,
    pub user_id: Uuid,
    /// Login of the token owner on the remote provider
    pub username: String,
}

impl Token {
    pub fn new(
        source: TokenSource,
        user_id: Uuid,
        username: impl Into<String>,
        content: impl Into<String>,
        refresh_content: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            source,
            content: content.into(),
            refresh_content,
            user_id,
            username: username.into(),
        }
    }
}

/// Descriptor file content fetched at a given revision (not persisted)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileResponse {
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_content: Option<String>,
}

impl FileResponse {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            fallback_content: None,
        }
    }
}
