//! Discovery operations: populate the repo list

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use super::{OpContext, Operation, OperationAction, ParamRule, ParamSpec, TypeTag, UndoAction};
use crate::session::{RepoRecord, SessionData, StepArgs};

/// Parse one `owner/name` line, tolerating URL prefixes and a trailing
/// `.git`.
pub(crate) fn parse_repo_line(line: &str) -> Result<RepoRecord> {
    let trimmed = line.trim().trim_end_matches('/');
    let stripped = trimmed.strip_suffix(".git").unwrap_or(trimmed);

    let mut segments = stripped.rsplit('/').filter(|s| !s.is_empty());
    let name = segments.next();
    let owner = segments.next();

    match (owner, name) {
        (Some(owner), Some(name)) if !owner.contains(':') => {
            Ok(RepoRecord::new(owner, name))
        }
        _ => Err(anyhow!("'{line}' is not a valid repository")),
    }
}

/// Load repositories from a line-separated text file.
pub struct ReposFromFile;

impl ReposFromFile {
    pub fn operation() -> Operation {
        let action = Arc::new(ReposFromFile);
        Operation {
            name: "repo-file".to_string(),
            description: "get a list of repos from a file".to_string(),
            inputs: vec![],
            output: TypeTag::Repos,
            params: vec![ParamSpec::new(
                "file",
                "path to a text file of repositories",
                ParamRule::ReadableFile,
            )],
            action: action.clone(),
            undo: Some(action),
        }
    }
}

#[async_trait]
impl OperationAction for ReposFromFile {
    async fn execute(
        &self,
        args: &StepArgs,
        data: &mut SessionData,
        _ctx: &OpContext,
    ) -> Result<()> {
        let file = args.require("file")?;
        let contents = tokio::fs::read_to_string(file)
            .await
            .with_context(|| format!("reading {file}"))?;

        let repos: Vec<RepoRecord> = contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(parse_repo_line)
            .collect::<Result<_>>()?;

        info!(count = repos.len(), file, "loaded repositories");
        data.repos = Some(repos);
        Ok(())
    }
}

#[async_trait]
impl UndoAction for ReposFromFile {
    async fn undo(
        &self,
        _args: &StepArgs,
        data: &mut SessionData,
        _ctx: &OpContext,
    ) -> Result<()> {
        data.repos = None;
        Ok(())
    }
}

/// Fetch repositories from the catalog service.
pub struct ReposFromCatalog;

impl ReposFromCatalog {
    pub fn operation() -> Operation {
        let action = Arc::new(ReposFromCatalog);
        Operation {
            name: "catalog".to_string(),
            description: "get a list of repos from the catalog service".to_string(),
            inputs: vec![],
            output: TypeTag::Repos,
            params: vec![ParamSpec::new(
                "topic",
                "(optional) GitHub topic to filter by",
                ParamRule::Any,
            )],
            action: action.clone(),
            undo: Some(action),
        }
    }
}

#[async_trait]
impl OperationAction for ReposFromCatalog {
    async fn execute(
        &self,
        args: &StepArgs,
        data: &mut SessionData,
        ctx: &OpContext,
    ) -> Result<()> {
        let topic = args.get("topic").filter(|t| !t.is_empty());
        let repos = ctx.catalog.list_repositories(topic).await?;
        info!(count = repos.len(), "fetched repositories from catalog");
        data.repos = Some(repos);
        Ok(())
    }
}

#[async_trait]
impl UndoAction for ReposFromCatalog {
    async fn undo(
        &self,
        _args: &StepArgs,
        data: &mut SessionData,
        _ctx: &OpContext,
    ) -> Result<()> {
        data.repos = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_and_url_repo_lines() {
        let repo = parse_repo_line("acme/widgets").unwrap();
        assert_eq!((repo.owner.as_str(), repo.name.as_str()), ("acme", "widgets"));

        let repo = parse_repo_line("https://github.com/acme/widgets.git").unwrap();
        assert_eq!((repo.owner.as_str(), repo.name.as_str()), ("acme", "widgets"));

        assert!(parse_repo_line("not-a-repo").is_err());
        assert!(parse_repo_line("git@github.com:acme").is_err());
    }
}
