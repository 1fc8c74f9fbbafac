use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};
use crate::models::RepoId;

static REPO_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:https?://)?(?:www\.)?github\.com/([A-Za-z0-9_.-]+)/([A-Za-z0-9_.-]+)(?:[/?#].*)?$")
        .expect("repo url pattern is valid")
});

static SHORT_REPO_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z0-9_.-]+)/([A-Za-z0-9_.-]+)$").expect("short repo pattern is valid"));

static ISSUE_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:https?://)?(?:www\.)?github\.com/([A-Za-z0-9_.-]+)/([A-Za-z0-9_.-]+)/issues/(\d+)(?:[/?#].*)?$")
        .expect("issue url pattern is valid")
});

fn repo_from_parts(owner: &str, name: &str) -> RepoId {
    RepoId::new(owner, name.trim_end_matches(".git"))
}

/// Accepts `https://github.com/owner/repo[/...]`, `github.com/owner/repo` or `owner/repo`.
pub fn parse_repo_link(link: &str) -> Result<RepoId> {
    let link = link.trim();
    if link.is_empty() {
        return Err(Error::InvalidInput("repoLink is required".to_string()));
    }

    let captures = REPO_URL_RE
        .captures(link)
        .or_else(|| SHORT_REPO_RE.captures(link))
        .ok_or_else(|| Error::InvalidInput(format!("Invalid GitHub repository link: {}", link)))?;

    Ok(repo_from_parts(&captures[1], &captures[2]))
}

pub fn parse_issue_link(link: &str) -> Result<(RepoId, u64)> {
    let link = link.trim();
    if link.is_empty() {
        return Err(Error::InvalidInput("issueLink is required".to_string()));
    }

    let captures = ISSUE_URL_RE
        .captures(link)
        .ok_or_else(|| Error::InvalidInput(format!("Invalid GitHub issue link: {}", link)))?;

    let number = captures[3]
        .parse()
        .map_err(|_| Error::InvalidInput(format!("Invalid issue number in link: {}", link)))?;

    Ok((repo_from_parts(&captures[1], &captures[2]), number))
}
