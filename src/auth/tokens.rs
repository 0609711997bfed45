use base64ct::{Base64UrlUnpadded, Encoding};
use rand::RngCore;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth::{
    cache::AuthCache,
    models::{BitbucketTokenResponse, BitbucketUser, GithubTokenResponse, GithubUser},
    retry::{with_retry, RetryPolicy},
};
use crate::db::{Token, TokenSource, TokenStore};
use crate::error::{Result, SyncError};
use crate::fetcher::{join_url, Credential, RemoteResourceFetcher};
use crate::registry::models::UserView;
use crate::settings::{BitbucketSettings, GithubSettings, Settings};

/// Error code GitHub answers with while a freshly issued code is not yet redeemable
const BAD_VERIFICATION_CODE: &str = "bad_verification_code";

/// Random bytes mixed into a first-party token
const FIRST_PARTY_ENTROPY_BYTES: usize = 1024;

/// Create the first-party API token for `username`: hex SHA-256 of the
/// username followed by 1024 random bytes in unpadded base64url
pub fn generate_first_party_token(username: &str) -> String {
    let mut random_bytes = vec![0u8; FIRST_PARTY_ENTROPY_BYTES];
    rand::thread_rng().fill_bytes(&mut random_bytes);
    let random = Base64UrlUnpadded::encode_string(&random_bytes);

    let mut hasher = Sha256::new();
    hasher.update(username.as_bytes());
    hasher.update(random.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Outcome of one GitHub code redemption attempt
#[derive(Debug)]
enum GithubAttemptError {
    BadVerificationCode,
    Failed(SyncError),
}

/// OAuth token lifecycle: code exchange, per-provider dedup, refresh and revocation.
///
/// At most one token per (user, source) is kept. Refresh and revocation
/// evict the old content from the [`AuthCache`] both before and after the
/// stored row changes.
pub struct TokenLifecycleManager {
    fetcher: Arc<dyn RemoteResourceFetcher>,
    store: Arc<dyn TokenStore>,
    cache: AuthCache,
    registry_api_url: String,
    github: GithubSettings,
    bitbucket: BitbucketSettings,
    retry: RetryPolicy,
}

impl TokenLifecycleManager {
    pub fn new(
        fetcher: Arc<dyn RemoteResourceFetcher>,
        store: Arc<dyn TokenStore>,
        cache: AuthCache,
        settings: &Settings,
    ) -> Self {
        Self {
            fetcher,
            store,
            cache,
            registry_api_url: settings.registry.api_url.clone(),
            github: settings.github.clone(),
            bitbucket: settings.bitbucket.clone(),
            retry: RetryPolicy::from(&settings.token_exchange),
        }
    }

    /// Redeem an OAuth authorization code with `source` and store the resulting token
    pub async fn exchange_code(&self, user_id: Uuid, source: TokenSource, code: &str) -> Result<Token> {
        if code.is_empty() {
            return Err(SyncError::BadRequest("Please provide an access code".to_string()));
        }

        let (content, refresh_content, username) = match source {
            TokenSource::GithubCom => self.exchange_github_code(code).await?,
            TokenSource::BitbucketOrg => self.exchange_bitbucket_code(code).await?,
            TokenSource::QuayIo | TokenSource::FirstParty => {
                return Err(SyncError::BadRequest(format!(
                    "{} does not issue tokens through a code exchange",
                    source
                )));
            }
        };

        let token = self
            .store_new_token(user_id, source, username, content, refresh_content)
            .await?;

        // Signing in with GitHub also provisions the user's API token
        if source == TokenSource::GithubCom {
            self.issue_first_party_token(user_id, &token.username).await?;
        }
        Ok(token)
    }

    /// Store a quay.io access token obtained through the implicit grant
    pub async fn register_access_token(&self, user_id: Uuid, access_token: &str) -> Result<Token> {
        if access_token.is_empty() {
            return Err(SyncError::BadRequest("Please provide an access token".to_string()));
        }

        let url = join_url(&self.registry_api_url, "user/");
        let user: Option<UserView> = self
            .fetch_identity(&url, &Credential::bearer(access_token))
            .await?;

        let Some(username) = user.and_then(|u| u.username).filter(|u| !u.is_empty()) else {
            info!(%user_id, "Quay.io username not found, token not created");
            return Err(SyncError::Conflict(format!(
                "Username not found from resource call {}",
                url
            )));
        };
        info!(%user_id, username = %username, "Resolved quay.io user");

        self.store_new_token(user_id, TokenSource::QuayIo, username, access_token.to_string(), None)
            .await
    }

    /// Return the user's first-party token, creating it on first use
    pub async fn issue_first_party_token(&self, user_id: Uuid, username: &str) -> Result<Token> {
        if let Some(existing) = self
            .store
            .find_by_user_and_source(user_id, TokenSource::FirstParty)
            .await?
        {
            return Ok(existing);
        }

        info!(%user_id, username, "Creating first-party token");
        let token = Token::new(
            TokenSource::FirstParty,
            user_id,
            username,
            generate_first_party_token(username),
            None,
        );
        Ok(self.store.create(token).await?)
    }

    /// Replace the content and refresh content of `token` with freshly issued ones.
    ///
    /// The token keeps its id and source.
    pub async fn refresh(&self, token: &Token) -> Result<Token> {
        if token.source != TokenSource::BitbucketOrg {
            return Err(SyncError::BadRequest(format!(
                "{} tokens cannot be refreshed",
                token.source
            )));
        }
        let Some(refresh_content) = token.refresh_content.as_deref() else {
            return Err(SyncError::BadRequest(format!(
                "{} token has no refresh token",
                token.source
            )));
        };

        let url = join_url(&self.bitbucket.site_url, "site/oauth2/access_token");
        let body = self
            .fetcher
            .post_form(
                &url,
                &self.bitbucket_client_credential(),
                &[
                    ("grant_type", "refresh_token"),
                    ("refresh_token", refresh_content),
                ],
            )
            .await
            .ok_or_else(|| {
                SyncError::TransientRemoteFailure(
                    "Could not refresh bitbucket.org token".to_string(),
                )
            })?;

        let response: BitbucketTokenResponse = serde_json::from_str(&body)
            .map_err(|e| SyncError::malformed("bitbucket.org refresh response", e))?;
        let Some(content) = response.access_token.filter(|t| !t.is_empty()) else {
            return Err(SyncError::MalformedRemoteData(
                "bitbucket.org refresh response has no access token".to_string(),
            ));
        };

        self.cache.invalidate(&token.content).await;

        let mut refreshed = token.clone();
        refreshed.content = content;
        if let Some(refresh_content) = response.refresh_token {
            refreshed.refresh_content = Some(refresh_content);
        }

        let refreshed = self.store.update(&refreshed).await?;
        self.cache.invalidate(&token.content).await;
        info!(token_id = %refreshed.id, source = %refreshed.source, "Refreshed token");
        Ok(refreshed)
    }

    /// Refresh the user's token for `source`
    pub async fn refresh_for_user(&self, user_id: Uuid, source: TokenSource) -> Result<Token> {
        let token = self
            .store
            .find_by_user_and_source(user_id, source)
            .await?
            .ok_or_else(|| SyncError::BadRequest(format!("User's {} token not found", source)))?;

        self.refresh(&token).await
    }

    /// Delete a token owned by `requesting_user` and evict it from the auth cache
    pub async fn revoke(&self, requesting_user: Uuid, token_id: Uuid) -> Result<()> {
        let token = self
            .store
            .find_by_id(token_id)
            .await?
            .ok_or_else(|| SyncError::NotFound(format!("Token {} not found", token_id)))?;

        if token.user_id != requesting_user {
            return Err(SyncError::Conflict(
                "Token does not belong to the requesting user".to_string(),
            ));
        }

        self.cache.invalidate(&token.content).await;
        self.store.delete(token_id).await?;
        self.cache.invalidate(&token.content).await;

        if self.store.find_by_id(token_id).await?.is_some() {
            return Err(SyncError::Internal(format!(
                "Token {} still present after delete",
                token_id
            )));
        }

        info!(%token_id, source = %token.source, "Revoked token");
        Ok(())
    }

    async fn store_new_token(
        &self,
        user_id: Uuid,
        source: TokenSource,
        username: String,
        content: String,
        refresh_content: Option<String>,
    ) -> Result<Token> {
        if self
            .store
            .find_by_user_and_source(user_id, source)
            .await?
            .is_some()
        {
            info!(%user_id, %source, "Token already exists");
            return Err(SyncError::Conflict(format!(
                "A {} token already exists for this user",
                source
            )));
        }

        let token = self
            .store
            .create(Token::new(source, user_id, username, content, refresh_content))
            .await?;
        info!(%user_id, %source, username = %token.username, "Token created");
        Ok(token)
    }

    /// GET an identity endpoint; `None` when the provider gave no body
    async fn fetch_identity<T: DeserializeOwned>(
        &self,
        url: &str,
        credential: &Credential,
    ) -> Result<Option<T>> {
        let Some(body) = self.fetcher.get(url, credential).await else {
            return Ok(None);
        };
        serde_json::from_str(&body)
            .map(Some)
            .map_err(|e| SyncError::malformed("identity response", e))
    }

    fn bitbucket_client_credential(&self) -> Credential {
        Credential::basic(&self.bitbucket.client_id, &self.bitbucket.client_secret)
    }

    async fn exchange_github_code(&self, code: &str) -> Result<(String, Option<String>, String)> {
        let content = with_retry(
            &self.retry,
            |e| matches!(e, GithubAttemptError::BadVerificationCode),
            |attempt| self.request_github_token(code, attempt),
        )
        .await
        .map_err(|e| match e {
            GithubAttemptError::BadVerificationCode => SyncError::BadRequest(
                "Could not retrieve github.com token based on code".to_string(),
            ),
            GithubAttemptError::Failed(e) => e,
        })?;

        let url = join_url(&self.github.api_url, "user");
        let user: Option<GithubUser> = self
            .fetch_identity(&url, &Credential::bearer(content.as_str()))
            .await
            .map_err(|e| SyncError::Unauthorized(format!("Token ignored: {}", e)))?;

        let login = user
            .and_then(|u| u.login)
            .filter(|l| !l.is_empty())
            .ok_or_else(|| {
                SyncError::Unauthorized("Token ignored, github.com login not found".to_string())
            })?;

        Ok((content, None, login))
    }

    async fn request_github_token(
        &self,
        code: &str,
        attempt: u32,
    ) -> std::result::Result<String, GithubAttemptError> {
        let url = join_url(&self.github.site_url, "login/oauth/access_token");
        let body = self
            .fetcher
            .post_form(
                &url,
                &Credential::None,
                &[
                    ("code", code),
                    ("client_id", self.github.client_id.as_str()),
                    ("client_secret", self.github.client_secret.as_str()),
                ],
            )
            .await
            .ok_or_else(|| {
                GithubAttemptError::Failed(SyncError::BadRequest(
                    "Could not retrieve github.com token based on code".to_string(),
                ))
            })?;

        let response: GithubTokenResponse = serde_urlencoded::from_str(body.trim())
            .map_err(|e| GithubAttemptError::Failed(SyncError::malformed("github.com token response", e)))?;

        if response.error.as_deref() == Some(BAD_VERIFICATION_CODE) {
            info!(attempt, "github.com reported {}", BAD_VERIFICATION_CODE);
            return Err(GithubAttemptError::BadVerificationCode);
        }

        match response.access_token.filter(|t| !t.is_empty()) {
            Some(token) => {
                debug!(attempt, "Received github.com access token");
                Ok(token)
            }
            None => {
                warn!(attempt, error = ?response.error, "Retrieving github.com access token was unsuccessful");
                Err(GithubAttemptError::Failed(SyncError::BadRequest(
                    "Could not retrieve github.com token based on code".to_string(),
                )))
            }
        }
    }

    async fn exchange_bitbucket_code(&self, code: &str) -> Result<(String, Option<String>, String)> {
        let url = join_url(&self.bitbucket.site_url, "site/oauth2/access_token");
        let body = self
            .fetcher
            .post_form(
                &url,
                &self.bitbucket_client_credential(),
                &[("grant_type", "authorization_code"), ("code", code)],
            )
            .await
            .ok_or_else(|| {
                SyncError::BadRequest("Could not retrieve bitbucket.org token based on code".to_string())
            })?;

        let response: BitbucketTokenResponse = serde_json::from_str(&body)
            .map_err(|e| SyncError::malformed("bitbucket.org token response", e))?;
        let content = response
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                SyncError::BadRequest("Could not retrieve bitbucket.org token based on code".to_string())
            })?;

        let user: Option<BitbucketUser> = self
            .fetch_identity(&self.bitbucket.identity_url, &Credential::bearer(content.as_str()))
            .await
            .map_err(|e| SyncError::Unauthorized(format!("Token ignored: {}", e)))?;

        let username = user
            .and_then(|u| u.username)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| {
                SyncError::Unauthorized("Token ignored, bitbucket.org username not found".to_string())
            })?;

        Ok((content, response.refresh_token, username))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryStore;
    use crate::testing::FakeFetcher;
    use std::time::Duration;

    struct Fixture {
        fetcher: Arc<FakeFetcher>,
        store: Arc<MemoryStore>,
        cache: AuthCache,
        manager: TokenLifecycleManager,
        settings: Settings,
    }

    fn fixture() -> Fixture {
        let mut settings = Settings::default();
        settings.github.client_id = "gh-client".to_string();
        settings.github.client_secret = "gh-secret".to_string();
        settings.bitbucket.client_id = "bb-client".to_string();
        settings.bitbucket.client_secret = "bb-secret".to_string();

        let fetcher = Arc::new(FakeFetcher::new());
        let store = Arc::new(MemoryStore::default());
        let cache = AuthCache::new(Duration::from_secs(60), 100);
        let manager =
            TokenLifecycleManager::new(fetcher.clone(), store.clone(), cache.clone(), &settings);

        Fixture {
            fetcher,
            store,
            cache,
            manager,
            settings,
        }
    }

    impl Fixture {
        fn github_token_url(&self) -> String {
            join_url(&self.settings.github.site_url, "login/oauth/access_token")
        }

        fn github_user_url(&self) -> String {
            join_url(&self.settings.github.api_url, "user")
        }

        fn bitbucket_token_url(&self) -> String {
            join_url(&self.settings.bitbucket.site_url, "site/oauth2/access_token")
        }

        fn bad_code_then_success(&self, failures: usize) {
            let mut bodies = vec![Some("error=bad_verification_code".to_string()); failures];
            bodies.push(Some("access_token=gh-token&scope=repo&token_type=bearer".to_string()));
            self.fetcher.respond_sequence(self.github_token_url(), bodies);
            self.fetcher.respond(self.github_user_url(), r#"{"login": "octo"}"#);
        }

        fn bitbucket_exchange(&self) {
            self.fetcher.respond(
                self.bitbucket_token_url(),
                r#"{"access_token": "bb-token", "refresh_token": "bb-refresh", "expires_in": 3600}"#,
            );
            self.fetcher
                .respond(&self.settings.bitbucket.identity_url, r#"{"username": "bucketeer"}"#);
        }
    }

    #[test]
    fn test_first_party_token_shape() {
        let a = generate_first_party_token("alice");
        let b = generate_first_party_token("alice");
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_github_exchange_succeeds_on_fifth_attempt() {
        let f = fixture();
        f.bad_code_then_success(4);
        let user_id = Uuid::new_v4();

        let token = f
            .manager
            .exchange_code(user_id, TokenSource::GithubCom, "code-1")
            .await
            .unwrap();

        assert_eq!(token.source, TokenSource::GithubCom);
        assert_eq!(token.content, "gh-token");
        assert_eq!(token.username, "octo");
        assert_eq!(f.fetcher.call_count(&f.github_token_url()), 5);

        let first_party = f
            .store
            .find_by_user_and_source(user_id, TokenSource::FirstParty)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first_party.username, "octo");
        assert_eq!(first_party.content.len(), 64);

        let form = &f.fetcher.calls()[0].form;
        assert!(form.contains(&("code".to_string(), "code-1".to_string())));
        assert!(form.contains(&("client_id".to_string(), "gh-client".to_string())));
    }

    #[tokio::test]
    async fn test_github_exchange_gives_up_after_five_bad_codes() {
        let f = fixture();
        f.bad_code_then_success(5);
        let user_id = Uuid::new_v4();

        let err = f
            .manager
            .exchange_code(user_id, TokenSource::GithubCom, "code-1")
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::BadRequest(_)));
        assert_eq!(f.fetcher.call_count(&f.github_token_url()), 5);
        assert_eq!(f.fetcher.call_count(&f.github_user_url()), 0);
        assert!(f
            .store
            .find_by_user_and_source(user_id, TokenSource::GithubCom)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_github_exchange_other_error_is_not_retried() {
        let f = fixture();
        f.fetcher
            .respond(f.github_token_url(), "error=incorrect_client_credentials");

        let err = f
            .manager
            .exchange_code(Uuid::new_v4(), TokenSource::GithubCom, "code-1")
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::BadRequest(_)));
        assert_eq!(f.fetcher.call_count(&f.github_token_url()), 1);
    }

    #[tokio::test]
    async fn test_github_exchange_without_login_is_unauthorized() {
        let f = fixture();
        f.fetcher
            .respond(f.github_token_url(), "access_token=gh-token&token_type=bearer");
        let user_id = Uuid::new_v4();

        let err = f
            .manager
            .exchange_code(user_id, TokenSource::GithubCom, "code-1")
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::Unauthorized(_)));
        assert!(f
            .store
            .find_by_user_and_source(user_id, TokenSource::GithubCom)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_second_exchange_conflicts_and_keeps_first_token() {
        let f = fixture();
        f.bitbucket_exchange();
        let user_id = Uuid::new_v4();

        let first = f
            .manager
            .exchange_code(user_id, TokenSource::BitbucketOrg, "code-1")
            .await
            .unwrap();
        assert_eq!(first.username, "bucketeer");
        assert_eq!(first.refresh_content.as_deref(), Some("bb-refresh"));

        let err = f
            .manager
            .exchange_code(user_id, TokenSource::BitbucketOrg, "code-1")
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Conflict(_)));

        let stored = f
            .store
            .find_by_user_and_source(user_id, TokenSource::BitbucketOrg)
            .await
            .unwrap();
        assert_eq!(stored, Some(first));
    }

    #[tokio::test]
    async fn test_bitbucket_exchange_uses_client_credentials() {
        let f = fixture();
        f.bitbucket_exchange();

        let user_id = Uuid::new_v4();
        f.manager
            .exchange_code(user_id, TokenSource::BitbucketOrg, "code-1")
            .await
            .unwrap();
        assert!(f
            .store
            .find_by_user_and_source(user_id, TokenSource::FirstParty)
            .await
            .unwrap()
            .is_none());

        let calls = f.fetcher.calls();
        assert_eq!(calls[0].method, "POST");
        assert_eq!(calls[0].credential, Credential::basic("bb-client", "bb-secret"));
        assert!(calls[0]
            .form
            .contains(&("grant_type".to_string(), "authorization_code".to_string())));
        assert_eq!(calls[1].url, f.settings.bitbucket.identity_url);
        assert_eq!(calls[1].credential, Credential::bearer("bb-token"));
    }

    #[tokio::test]
    async fn test_bitbucket_exchange_without_body_is_bad_request() {
        let f = fixture();
        let err = f
            .manager
            .exchange_code(Uuid::new_v4(), TokenSource::BitbucketOrg, "code-1")
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_exchange_rejects_empty_code_and_quay() {
        let f = fixture();
        let user_id = Uuid::new_v4();

        let err = f
            .manager
            .exchange_code(user_id, TokenSource::GithubCom, "")
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::BadRequest(_)));

        let err = f
            .manager
            .exchange_code(user_id, TokenSource::QuayIo, "code")
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::BadRequest(_)));
        assert!(f.fetcher.calls().is_empty());
    }

    #[tokio::test]
    async fn test_register_quay_access_token() {
        let f = fixture();
        let url = join_url(&f.settings.registry.api_url, "user/");
        f.fetcher.respond(&url, r#"{"username": "quayuser", "organizations": []}"#);
        let user_id = Uuid::new_v4();

        let token = f.manager.register_access_token(user_id, "quay-token").await.unwrap();
        assert_eq!(token.source, TokenSource::QuayIo);
        assert_eq!(token.username, "quayuser");
        assert_eq!(f.fetcher.calls()[0].credential, Credential::bearer("quay-token"));

        let err = f
            .manager
            .register_access_token(user_id, "quay-token-2")
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_register_quay_access_token_without_username() {
        let f = fixture();
        let err = f
            .manager
            .register_access_token(Uuid::new_v4(), "quay-token")
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_issue_first_party_token_once() {
        let f = fixture();
        let user_id = Uuid::new_v4();

        let first = f.manager.issue_first_party_token(user_id, "alice").await.unwrap();
        let second = f.manager.issue_first_party_token(user_id, "alice").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.source, TokenSource::FirstParty);
        assert_eq!(first.content.len(), 64);
    }

    #[tokio::test]
    async fn test_refresh_keeps_identity_and_invalidates_cache() {
        let f = fixture();
        let user_id = Uuid::new_v4();
        let token = TokenStore::create(
            f.store.as_ref(),
            Token::new(
                TokenSource::BitbucketOrg,
                user_id,
                "bucketeer",
                "old-token",
                Some("old-refresh".to_string()),
            ),
        )
        .await
        .unwrap();
        f.cache.get_or_compute("old-token", async { Some(token.clone()) }).await;

        f.fetcher.respond(
            f.bitbucket_token_url(),
            r#"{"access_token": "new-token", "refresh_token": "new-refresh"}"#,
        );

        let refreshed = f.manager.refresh(&token).await.unwrap();

        assert_eq!(refreshed.id, token.id);
        assert_eq!(refreshed.source, TokenSource::BitbucketOrg);
        assert_eq!(refreshed.content, "new-token");
        assert_eq!(refreshed.refresh_content.as_deref(), Some("new-refresh"));
        assert!(f.cache.get("old-token").await.is_none());
        assert_eq!(
            TokenStore::find_by_id(f.store.as_ref(), token.id).await.unwrap(),
            Some(refreshed)
        );

        let form = &f.fetcher.calls()[0].form;
        assert!(form.contains(&("refresh_token".to_string(), "old-refresh".to_string())));
    }

    #[tokio::test]
    async fn test_refresh_failure_leaves_token_untouched() {
        let f = fixture();
        let token = TokenStore::create(
            f.store.as_ref(),
            Token::new(
                TokenSource::BitbucketOrg,
                Uuid::new_v4(),
                "bucketeer",
                "old-token",
                Some("old-refresh".to_string()),
            ),
        )
        .await
        .unwrap();

        let err = f.manager.refresh(&token).await.unwrap_err();
        assert!(matches!(err, SyncError::TransientRemoteFailure(_)));

        f.fetcher.respond(f.bitbucket_token_url(), "not json");
        let err = f.manager.refresh(&token).await.unwrap_err();
        assert!(matches!(err, SyncError::MalformedRemoteData(_)));

        assert_eq!(TokenStore::find_by_id(f.store.as_ref(), token.id).await.unwrap(), Some(token));
    }

    #[tokio::test]
    async fn test_refresh_for_user_requires_refreshable_token() {
        let f = fixture();
        let user_id = Uuid::new_v4();

        let err = f
            .manager
            .refresh_for_user(user_id, TokenSource::BitbucketOrg)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::BadRequest(_)));

        TokenStore::create(
            f.store.as_ref(),
            Token::new(TokenSource::GithubCom, user_id, "octo", "gh-token", None),
        )
        .await
        .unwrap();
        let err = f
            .manager
            .refresh_for_user(user_id, TokenSource::GithubCom)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_revoke() {
        let f = fixture();
        let owner = Uuid::new_v4();
        let token = TokenStore::create(
            f.store.as_ref(),
            Token::new(TokenSource::GithubCom, owner, "octo", "gh-token", None),
        )
        .await
        .unwrap();
        f.cache.get_or_compute("gh-token", async { Some(token.clone()) }).await;

        let err = f.manager.revoke(Uuid::new_v4(), token.id).await.unwrap_err();
        assert!(matches!(err, SyncError::Conflict(_)));
        assert!(f.cache.get("gh-token").await.is_some());

        f.manager.revoke(owner, token.id).await.unwrap();
        assert!(TokenStore::find_by_id(f.store.as_ref(), token.id).await.unwrap().is_none());
        assert!(f.cache.get("gh-token").await.is_none());

        let err = f.manager.revoke(owner, token.id).await.unwrap_err();
        assert!(matches!(err, SyncError::NotFound(_)));
    }
}
