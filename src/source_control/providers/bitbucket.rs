use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

use crate::db::{Container, FileResponse};
use crate::fetcher::{join_url, Credential, RemoteResourceFetcher};
use crate::source_control::{
    git_url::parse_ssh_url, models::MainBranch, DescriptorParser, RepositoryRef, SourceCodeRepo,
};

/// Bitbucket source-control provider (1.0 REST API)
pub struct BitbucketSourceCodeRepo {
    fetcher: Arc<dyn RemoteResourceFetcher>,
    api_url: String,
    /// Host part of `api_url`, matched against git URLs
    host: Option<String>,
    credential: Credential,
    parser: Arc<dyn DescriptorParser>,
}

impl BitbucketSourceCodeRepo {
    pub fn new(
        fetcher: Arc<dyn RemoteResourceFetcher>,
        api_url: impl Into<String>,
        credential: Credential,
        parser: Arc<dyn DescriptorParser>,
    ) -> Self {
        let api_url = api_url.into();
        let host = Url::parse(&api_url)
            .ok()
            .and_then(|url| url.host_str().map(str::to_string));
        Self {
            fetcher,
            api_url,
            host,
            credential,
            parser,
        }
    }

    fn repository_url(&self, repository: &RepositoryRef, suffix: &str) -> String {
        join_url(
            &self.api_url,
            &format!("repositories/{}/{}", repository.full_name(), suffix),
        )
    }

    async fn fetch_raw(&self, repository: &RepositoryRef, branch: &str, path: &str) -> Option<String> {
        let url = self.repository_url(repository, &format!("raw/{}/{}", branch, path));
        // An empty body counts as no file
        match self
            .fetcher
            .get(&url, &self.credential)
            .await
            .filter(|content| !content.is_empty())
        {
            Some(content) => {
                debug!(repository = %repository.full_name(), path, "Found file");
                Some(content)
            }
            None => {
                info!(repository = %repository.full_name(), branch, path, "Branch has no such file");
                None
            }
        }
    }
}

#[async_trait]
impl SourceCodeRepo for BitbucketSourceCodeRepo {
    fn serves(&self, repository: &RepositoryRef) -> bool {
        self.host.as_deref() == Some(repository.host.as_str())
    }

    async fn resolve_default_branch(&self, repository: &RepositoryRef) -> Option<String> {
        let url = self.repository_url(repository, "main-branch");
        let body = self.fetcher.get(&url, &self.credential).await?;

        let branch = match serde_json::from_str::<MainBranch>(&body) {
            Ok(main) => main.name.filter(|name| !name.is_empty()),
            Err(e) => {
                warn!(url, error = %e, "Malformed main-branch response");
                None
            }
        };

        match &branch {
            Some(name) => info!(repository = %repository.full_name(), branch = %name, "Default branch"),
            None => info!(repository = %repository.full_name(), "Could not find default branch"),
        }

        branch
    }

    async fn read_file(
        &self,
        repository: &RepositoryRef,
        path: &str,
        reference: Option<&str>,
    ) -> Option<FileResponse> {
        let path = path.trim_start_matches('/');

        let branch = match reference {
            Some(reference) => reference.to_string(),
            None => self.resolve_default_branch(repository).await?,
        };

        let content = self.fetch_raw(repository, &branch, path).await?;
        Some(FileResponse::new(content))
    }

    async fn locate_descriptor_file(&self, container: Container) -> Container {
        let Some(descriptor_path) = container.default_descriptor_path.clone() else {
            debug!(path = %container.path, "No descriptor path configured");
            return container;
        };
        let descriptor_path = descriptor_path.trim_start_matches('/');

        let Some(repository) = container.git_url.as_deref().and_then(parse_ssh_url) else {
            info!(
                path = %container.path,
                git_url = ?container.git_url,
                "Owner and repository could not be found in the git URL"
            );
            return container;
        };

        let Some(branch) = self.resolve_default_branch(&repository).await else {
            return container;
        };

        info!(repository = %repository.full_name(), branch = %branch, "Checking branch for descriptor");
        let content = self
            .fetch_raw(&repository, &branch, descriptor_path)
            .await
            .unwrap_or_default();

        self.parser.parse(&content, container)
    }
}
