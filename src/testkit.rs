//! Shared fixtures for tests

use std::path::PathBuf;
use std::sync::Arc;

use crate::catalog::CatalogClient;
use crate::config::Config;
use crate::github::GithubClient;
use crate::ops::OpContext;
use crate::subprocess::{MockProcessRunner, SubprocessManager};

/// An [`OpContext`] over a scripted process runner and clients aimed at an
/// unroutable address, so a test that unexpectedly reaches the network
/// fails fast.
pub fn mock_context_in(workspace_dir: PathBuf) -> (OpContext, Arc<MockProcessRunner>) {
    let (processes, mock) = SubprocessManager::mock();
    let config = Config {
        github_api_url: "http://127.0.0.1:1".to_string(),
        github_token: Some("test-token".to_string()),
        catalog_host: None,
        catalog_token: None,
        workspace_dir,
    };
    let ctx = OpContext {
        github: GithubClient::new(&config.github_api_url, config.github_token.clone()).unwrap(),
        catalog: CatalogClient::new(None, None).unwrap(),
        git: processes.git(),
        processes,
        config,
    };
    (ctx, mock)
}

/// A mock context for tests that never touch the workspace.
pub fn bare_context() -> OpContext {
    mock_context_in(PathBuf::from("/nonexistent/armada-test")).0
}
