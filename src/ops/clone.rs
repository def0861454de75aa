//! Cloning the repo list into the workspace

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use super::{join_all_errors, OpContext, Operation, OperationAction, TypeTag, UndoAction};
use crate::session::{SessionData, StepArgs};

/// Clone every repository into the workspace clones directory. An existing
/// clone is reused: it is switched back to its default branch instead of
/// being cloned again.
pub struct CloneRepos;

impl CloneRepos {
    pub fn operation() -> Operation {
        let action = Arc::new(CloneRepos);
        Operation {
            name: "clone".to_string(),
            description: "clone repositories".to_string(),
            inputs: vec![TypeTag::Repos],
            output: TypeTag::Clones,
            params: vec![],
            action: action.clone(),
            undo: Some(action),
        }
    }
}

#[async_trait]
impl OperationAction for CloneRepos {
    async fn execute(
        &self,
        _args: &StepArgs,
        data: &mut SessionData,
        ctx: &OpContext,
    ) -> Result<()> {
        let clones_dir = ctx.config.clones_dir();
        tokio::fs::create_dir_all(&clones_dir)
            .await
            .with_context(|| format!("creating {}", clones_dir.display()))?;

        let repos = data.repos()?.to_vec();
        let clones_dir = &clones_dir;
        let git = &ctx.git;

        let tasks = repos.iter().map(|repo| async move {
            let directory = clones_dir.join(&repo.name);
            let remote = format!("git@github.com:{}/{}.git", repo.owner, repo.name);

            if tokio::fs::try_exists(&directory).await.unwrap_or(false) {
                let default = git.default_branch(&directory).await;
                git.checkout(&directory, &default)
                    .await
                    .with_context(|| format!("reusing clone of {}", repo.full_name()))?;
            } else {
                git.clone_repo(&remote, &directory)
                    .await
                    .with_context(|| format!("cloning {}", repo.full_name()))?;
            }

            Ok((repo.full_name(), directory))
        });

        let cloned: HashMap<String, PathBuf> =
            join_all_errors(tasks).await?.into_iter().collect();
        info!(count = cloned.len(), "repositories cloned");

        for repo in data.repos_mut()? {
            repo.clone_path = cloned.get(&repo.full_name()).cloned();
        }
        Ok(())
    }
}

#[async_trait]
impl UndoAction for CloneRepos {
    async fn undo(
        &self,
        _args: &StepArgs,
        data: &mut SessionData,
        _ctx: &OpContext,
    ) -> Result<()> {
        let clones: Vec<PathBuf> = data
            .repos()?
            .iter()
            .filter_map(|repo| repo.clone_path.clone())
            .collect();

        let tasks = clones.iter().map(|directory| async move {
            match tokio::fs::remove_dir_all(directory).await {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e).with_context(|| format!("removing {}", directory.display())),
            }
        });
        join_all_errors(tasks).await?;

        for repo in data.repos_mut()? {
            repo.clone_path = None;
        }
        Ok(())
    }
}
