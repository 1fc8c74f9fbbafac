use serde::{Deserialize, Serialize};

/// `owner/name` pair identifying a GitHub repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoId {
    pub owner: String,
    pub name: String,
}

impl RepoId {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

impl std::fmt::Display for RepoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repository {
    pub id: u64,
    pub name: String,
    pub full_name: String,
    pub description: Option<String>,
    pub language: Option<String>,
    #[serde(default)]
    pub topics: Vec<String>,
    pub stargazers_count: u32,
    pub open_issues_count: u32,
    pub html_url: String,
}

/// Repository facts handed to the estimator alongside each issue.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepoContext {
    pub full_name: String,
    pub description: Option<String>,
    pub primary_language: Option<String>,
    pub topics: Vec<String>,
    pub stars: u32,
}

impl From<&Repository> for RepoContext {
    fn from(repo: &Repository) -> Self {
        Self {
            full_name: repo.full_name.clone(),
            description: repo.description.clone(),
            primary_language: repo.language.clone(),
            topics: repo.topics.clone(),
            stars: repo.stargazers_count,
        }
    }
}
