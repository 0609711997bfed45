//! Token endpoint and identity responses of the OAuth providers.

use serde::Deserialize;

/// Form-encoded body of GitHub's `login/oauth/access_token`
#[derive(Debug, Default, Deserialize)]
pub struct GithubTokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// `GET {api_url}user`
#[derive(Debug, Deserialize)]
pub struct GithubUser {
    #[serde(default)]
    pub login: Option<String>,
}

/// JSON body of Bitbucket's `site/oauth2/access_token`
#[derive(Debug, Default, Deserialize)]
pub struct BitbucketTokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Bitbucket's view of the authenticated caller
#[derive(Debug, Deserialize)]
pub struct BitbucketUser {
    #[serde(default)]
    pub username: Option<String>,
}
