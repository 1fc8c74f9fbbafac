use std::future::Future;

use reqwest::Client;
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};

pub struct Paginator<'a> {
    client: &'a Client,
}

impl<'a> Paginator<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn fetch_page<T: DeserializeOwned>(
        &self,
        base_url: &str,
        per_page: u32,
        page: u32,
    ) -> Result<Vec<T>> {
        let separator = if base_url.contains('?') { "&" } else { "?" };
        let url = format!("{}{}per_page={}&page={}", base_url, separator, per_page, page);

        tracing::debug!("Fetching: {}", url);
        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::GitHubApi(format!(
                "Failed to fetch page {} of {}: {} - {}",
                page, base_url, status, body
            )));
        }

        Ok(response.json().await?)
    }
}

/// Walks pages starting at 1 until one comes back short of `per_page`.
///
/// Any page error aborts the walk and nothing collected so far is returned.
pub async fn collect_pages<T, F, Fut>(per_page: u32, mut fetch: F) -> Result<Vec<T>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Vec<T>>>,
{
    let mut all_items = Vec::new();
    let mut page = 1;

    loop {
        let items = fetch(page).await?;
        let items_count = items.len();
        all_items.extend(items);

        if items_count < per_page as usize {
            break;
        }

        page += 1;
    }

    Ok(all_items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_collect_pages_stops_on_short_page() {
        let calls = AtomicU32::new(0);
        let items = collect_pages(3, |page| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                Ok(match page {
                    1 => vec![1, 2, 3],
                    2 => vec![4, 5, 6],
                    _ => vec![7],
                })
            }
        })
        .await
        .unwrap();

        assert_eq!(items, vec![1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_collect_pages_empty_final_page() {
        let items = collect_pages(2, |page| async move {
            Ok(if page == 1 { vec!["a", "b"] } else { vec![] })
        })
        .await
        .unwrap();
        assert_eq!(items, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_collect_pages_error_discards_partial() {
        let result: Result<Vec<u32>> = collect_pages(2, |page| async move {
            if page == 2 {
                Err(Error::GitHubApi("boom".to_string()))
            } else {
                Ok(vec![1, 2])
            }
        })
        .await;
        assert!(matches!(result, Err(Error::GitHubApi(_))));
    }
}
