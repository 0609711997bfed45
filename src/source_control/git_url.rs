use lazy_static::lazy_static;
use regex::Regex;
use url::Url;

lazy_static! {
    /// `git@host:owner/repo.git`
    static ref SSH_GIT_URL: Regex =
        Regex::new(r"^git@([^:\s]+):([^/\s]+)/([^/\s]+?)\.git$").expect("valid regex");
}

/// Owner and repository name on a source-control host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryRef {
    pub host: String,
    pub owner: String,
    pub repo: String,
}

impl RepositoryRef {
    pub fn new(host: impl Into<String>, owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            owner: owner.into(),
            repo: repo.into(),
        }
    }

    /// `owner/repo`
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

/// Parse an SSH-style git URL into its host, owner and repository
pub fn parse_ssh_url(git_url: &str) -> Option<RepositoryRef> {
    let caps = SSH_GIT_URL.captures(git_url.trim())?;
    Some(RepositoryRef::new(&caps[1], &caps[2], &caps[3]))
}

/// Rewrite `https://host/owner/repo[.git]` as `git@host:owner/repo.git`
pub fn https_to_ssh(repository_url: &str) -> Option<String> {
    let url = Url::parse(repository_url.trim()).ok()?;
    let host = url.host_str()?;
    let path = url.path().trim_matches('/');
    let path = path.strip_suffix(".git").unwrap_or(path);

    let mut segments = path.split('/');
    let owner = segments.next().filter(|s| !s.is_empty())?;
    let repo = segments.next().filter(|s| !s.is_empty())?;
    if segments.next().is_some() {
        return None;
    }

    Some(format!("git@{}:{}/{}.git", host, owner, repo))
}
