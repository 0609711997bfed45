//! Response shapes of the Quay REST API.
//!
//! Every field the sync reads is optional or defaulted; entries are decoded
//! one at a time so a single odd record does not sink its siblings.

use serde::Deserialize;
use std::collections::BTreeMap;

/// `GET /user/`
#[derive(Debug, Default, Deserialize)]
pub struct UserView {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub organizations: Vec<Organization>,
}

#[derive(Debug, Deserialize)]
pub struct Organization {
    #[serde(default)]
    pub name: Option<String>,
}

/// `GET /repository?namespace=<ns>`
#[derive(Debug, Deserialize)]
pub struct RepositoryList {
    #[serde(default)]
    pub repositories: Vec<serde_json::Value>,
}

/// One entry of [`RepositoryList`]
#[derive(Debug, Deserialize)]
pub struct RepositorySummary {
    pub namespace: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_public: bool,
}

/// `GET /repository/<ns>/<name>`
#[derive(Debug, Deserialize)]
pub struct RepositoryDetail {
    #[serde(default)]
    pub tags: BTreeMap<String, serde_json::Value>,
}

/// One value of [`RepositoryDetail::tags`]
#[derive(Debug, Deserialize)]
pub struct TagDetail {
    pub name: String,
    #[serde(default)]
    pub size: Option<i64>,
    #[serde(default)]
    pub image_id: Option<String>,
}

/// `GET /repository/<ns>/<name>/build/`
#[derive(Debug, Deserialize)]
pub struct BuildList {
    #[serde(default)]
    pub builds: Vec<serde_json::Value>,
}

/// The fields read from the newest entry of [`BuildList`]
#[derive(Debug, Default, Deserialize)]
pub struct BuildRecord {
    #[serde(default)]
    pub trigger_metadata: Option<TriggerMetadata>,
    /// e.g. `Tue, 20 Oct 2015 19:52:37 -0000`
    #[serde(default)]
    pub started: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TriggerMetadata {
    #[serde(default)]
    pub git_url: Option<String>,
}

/// `GET /repository/<ns>/<name>/trigger/`
#[derive(Debug, Deserialize)]
pub struct TriggerList {
    #[serde(default)]
    pub triggers: Vec<TriggerSummary>,
}

#[derive(Debug, Deserialize)]
pub struct TriggerSummary {
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default)]
    pub repository_url: Option<String>,
}
