use serde::Deserialize;

/// `GET /repositories/<owner>/<repo>/main-branch`
#[derive(Debug, Default, Deserialize)]
pub struct MainBranch {
    #[serde(default)]
    pub name: Option<String>,
}
