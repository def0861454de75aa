//! Thin GitHub REST client
//!
//! Only the endpoints the built-in operations call: pull requests, the
//! classic organisation project boards, their columns and cards. No retry
//! or rate-limit handling lives here.

use anyhow::{anyhow, Context, Result};
use reqwest::{Method, RequestBuilder};
use serde::Deserialize;
use serde_json::json;

/// Media type required by the classic projects API.
const PROJECTS_PREVIEW: &str = "application/vnd.github.inertia-preview+json";

#[derive(Debug, Clone, Deserialize)]
pub struct PullRequest {
    pub id: u64,
    pub number: u64,
    pub html_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Project {
    pub id: u64,
    pub number: u64,
    pub html_url: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProjectColumn {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProjectCard {
    pub id: u64,
}

#[derive(Debug, Deserialize)]
struct Repository {
    default_branch: String,
}

pub struct GithubClient {
    http: reqwest::Client,
    base: String,
    token: Option<String>,
}

impl GithubClient {
    pub fn new(api_url: &str, token: Option<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("armada/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            base: api_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut builder = self
            .http
            .request(method, format!("{}{path}", self.base))
            .header(reqwest::header::ACCEPT, PROJECTS_PREVIEW);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    async fn send<T: serde::de::DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        what: &str,
    ) -> Result<T> {
        let response = builder.send().await.with_context(|| format!("{what}: request failed"))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("{what}: GitHub responded {status}: {body}"));
        }
        response
            .json()
            .await
            .with_context(|| format!("{what}: unexpected response body"))
    }

    async fn send_no_body(&self, builder: RequestBuilder, what: &str) -> Result<()> {
        let response = builder.send().await.with_context(|| format!("{what}: request failed"))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("{what}: GitHub responded {status}: {body}"));
        }
        Ok(())
    }

    /// The repository's default branch, used as the base for new PRs.
    pub async fn default_branch(&self, owner: &str, name: &str) -> Result<String> {
        let repo: Repository = self
            .send(
                self.request(Method::GET, &format!("/repos/{owner}/{name}")),
                &format!("fetching {owner}/{name}"),
            )
            .await?;
        Ok(repo.default_branch)
    }

    /// Open pull requests whose head is `owner:branch`.
    pub async fn pulls_by_head(
        &self,
        owner: &str,
        name: &str,
        branch: &str,
    ) -> Result<Vec<PullRequest>> {
        let head = format!("{owner}:{branch}");
        self.send(
            self.request(Method::GET, &format!("/repos/{owner}/{name}/pulls"))
                .query(&[("state", "open"), ("head", head.as_str())]),
            &format!("listing PRs on {owner}/{name}"),
        )
        .await
    }

    pub async fn create_pull(
        &self,
        owner: &str,
        name: &str,
        head: &str,
        base: &str,
        title: &str,
        body: &str,
    ) -> Result<PullRequest> {
        self.send(
            self.request(Method::POST, &format!("/repos/{owner}/{name}/pulls"))
                .json(&json!({ "head": head, "base": base, "title": title, "body": body })),
            &format!("creating PR on {owner}/{name}"),
        )
        .await
    }

    pub async fn comment_on_issue(
        &self,
        owner: &str,
        name: &str,
        number: u64,
        body: &str,
    ) -> Result<()> {
        self.send_no_body(
            self.request(
                Method::POST,
                &format!("/repos/{owner}/{name}/issues/{number}/comments"),
            )
            .json(&json!({ "body": body })),
            &format!("commenting on {owner}/{name}#{number}"),
        )
        .await
    }

    pub async fn close_pull(&self, owner: &str, name: &str, number: u64) -> Result<()> {
        self.send_no_body(
            self.request(Method::PATCH, &format!("/repos/{owner}/{name}/pulls/{number}"))
                .json(&json!({ "state": "closed" })),
            &format!("closing {owner}/{name}#{number}"),
        )
        .await
    }

    pub async fn org_projects(&self, org: &str) -> Result<Vec<Project>> {
        self.send(
            self.request(Method::GET, &format!("/orgs/{org}/projects"))
                .query(&[("per_page", "100")]),
            &format!("listing projects in {org}"),
        )
        .await
    }

    pub async fn create_org_project(&self, org: &str, name: &str) -> Result<Project> {
        self.send(
            self.request(Method::POST, &format!("/orgs/{org}/projects"))
                .json(&json!({ "name": name })),
            &format!("creating project in {org}"),
        )
        .await
    }

    pub async fn close_project(&self, project_id: u64) -> Result<()> {
        self.send_no_body(
            self.request(Method::PATCH, &format!("/projects/{project_id}"))
                .json(&json!({ "state": "closed" })),
            &format!("closing project {project_id}"),
        )
        .await
    }

    pub async fn project_columns(&self, project_id: u64) -> Result<Vec<ProjectColumn>> {
        self.send(
            self.request(Method::GET, &format!("/projects/{project_id}/columns")),
            &format!("listing columns of project {project_id}"),
        )
        .await
    }

    pub async fn create_column(&self, project_id: u64, name: &str) -> Result<ProjectColumn> {
        self.send(
            self.request(Method::POST, &format!("/projects/{project_id}/columns"))
                .json(&json!({ "name": name })),
            &format!("creating column '{name}'"),
        )
        .await
    }

    pub async fn create_card(&self, column_id: u64, pull_request_id: u64) -> Result<ProjectCard> {
        self.send(
            self.request(Method::POST, &format!("/projects/columns/{column_id}/cards"))
                .json(&json!({ "content_id": pull_request_id, "content_type": "PullRequest" })),
            &format!("creating card in column {column_id}"),
        )
        .await
    }

    pub async fn delete_card(&self, card_id: u64) -> Result<()> {
        self.send_no_body(
            self.request(Method::DELETE, &format!("/projects/columns/cards/{card_id}")),
            &format!("deleting card {card_id}"),
        )
        .await
    }
}
