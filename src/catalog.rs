//! Repository catalog service client
//!
//! Fetches the fleet's repository list from a tako-compatible catalog
//! service, optionally narrowed to a GitHub topic.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

use crate::session::RepoRecord;

#[derive(Debug, Deserialize)]
struct CatalogResponse {
    repositories: Vec<CatalogRepo>,
}

#[derive(Debug, Deserialize)]
struct CatalogRepo {
    owner: String,
    name: String,
}

pub struct CatalogClient {
    http: reqwest::Client,
    host: Option<String>,
    token: Option<String>,
}

impl CatalogClient {
    pub fn new(host: Option<String>, token: Option<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("armada/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { http, host, token })
    }

    /// All repositories the catalog knows about, optionally filtered by
    /// topic.
    pub async fn list_repositories(&self, topic: Option<&str>) -> Result<Vec<RepoRecord>> {
        let host = self.host.as_deref().ok_or_else(|| {
            anyhow!("no catalog host configured; set ARMADA_CATALOG_HOST or add catalog_host to config.toml")
        })?;

        let mut request = self.http.get(format!("https://{host}/tako/repositories"));
        if let Some(topic) = topic.filter(|t| !t.is_empty()) {
            request = request.query(&[("topic", topic)]);
        }
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.context("catalog request failed")?;
        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("catalog responded {status}"));
        }

        let body: CatalogResponse = response
            .json()
            .await
            .context("unexpected catalog response body")?;

        Ok(body
            .repositories
            .into_iter()
            .map(|repo| RepoRecord::new(repo.owner, repo.name))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_host_is_an_actionable_error() {
        let client = CatalogClient::new(None, None).unwrap();
        let err = client.list_repositories(None).await.unwrap_err();
        assert!(err.to_string().contains("ARMADA_CATALOG_HOST"));
    }

    #[test]
    fn response_shape_parses() {
        let body: CatalogResponse = serde_json::from_str(
            r#"{"repositories": [{"owner": "acme", "name": "widgets", "topics": ["rust"]}]}"#,
        )
        .unwrap();
        assert_eq!(body.repositories[0].name, "widgets");
    }
}
