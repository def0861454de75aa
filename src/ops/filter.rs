//! Narrowing the repo list in place

use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use std::sync::Arc;
use tracing::info;

use super::{OpContext, Operation, OperationAction, ParamRule, ParamSpec, TypeTag};
use crate::session::{SessionData, StepArgs};

/// Keep only the repos whose name matches a pattern. A filter: it can run
/// repeatedly on its own output, and undo restores the previous narrowing
/// by replay rather than through an undo handler.
pub struct FilterRepoName;

impl FilterRepoName {
    pub fn operation() -> Operation {
        Operation {
            name: "filter-repo-name".to_string(),
            description: "filter repositories by name".to_string(),
            inputs: vec![TypeTag::Repos],
            output: TypeTag::Repos,
            params: vec![ParamSpec::new(
                "pattern",
                "pattern to match repository names against",
                ParamRule::Pattern,
            )],
            action: Arc::new(FilterRepoName),
            undo: None,
        }
    }
}

#[async_trait]
impl OperationAction for FilterRepoName {
    async fn execute(
        &self,
        args: &StepArgs,
        data: &mut SessionData,
        _ctx: &OpContext,
    ) -> Result<()> {
        let pattern = args.require("pattern")?;
        let regex = Regex::new(pattern).with_context(|| format!("pattern '{pattern}'"))?;

        let repos = data.repos_mut()?;
        let before = repos.len();
        repos.retain(|repo| regex.is_match(&repo.name));
        info!(pattern, kept = repos.len(), dropped = before - repos.len(), "filtered repositories");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::RepoRecord;
    use crate::testkit::bare_context;

    #[tokio::test]
    async fn retains_only_matching_names() {
        let ctx = bare_context();
        let mut data = SessionData {
            repos: Some(vec![
                RepoRecord::new("acme", "widgets"),
                RepoRecord::new("acme", "gadgets"),
                RepoRecord::new("acme", "widget-docs"),
            ]),
            project: None,
        };
        let args: StepArgs = [("pattern", "^widget")].into_iter().collect();

        FilterRepoName.execute(&args, &mut data, &ctx).await.unwrap();

        let names: Vec<&str> = data
            .repos()
            .unwrap()
            .iter()
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(names, ["widgets", "widget-docs"]);
    }

    #[tokio::test]
    async fn fails_without_a_repo_list() {
        let ctx = bare_context();
        let mut data = SessionData::default();
        let args: StepArgs = [("pattern", "x")].into_iter().collect();

        assert!(FilterRepoName.execute(&args, &mut data, &ctx).await.is_err());
    }
}
