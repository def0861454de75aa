//! Pushing local branches to their remotes

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use tracing::info;

use super::{join_all_errors, OpContext, Operation, OperationAction, TypeTag, UndoAction};
use crate::session::{SessionData, StepArgs};

/// Push every clone's local branch to origin. Pushes run in parallel and
/// every failure is reported, not just the first.
pub struct PushBranches;

impl PushBranches {
    pub fn operation() -> Operation {
        let action = Arc::new(PushBranches);
        Operation {
            name: "push-branches".to_string(),
            description: "push local branches to their remotes".to_string(),
            inputs: vec![TypeTag::Clones, TypeTag::LocalBranches],
            output: TypeTag::RemoteBranches,
            params: vec![],
            action: action.clone(),
            undo: Some(action),
        }
    }
}

#[async_trait]
impl OperationAction for PushBranches {
    async fn execute(
        &self,
        _args: &StepArgs,
        data: &mut SessionData,
        ctx: &OpContext,
    ) -> Result<()> {
        let repos = data.repos()?.to_vec();
        let git = &ctx.git;

        let targets: Vec<_> = repos
            .iter()
            .filter_map(|repo| {
                let directory = repo.clone_path.as_deref()?;
                let branch = repo.local_branch.as_deref()?;
                Some((repo.full_name(), directory, branch))
            })
            .collect();
        if targets.is_empty() {
            return Err(anyhow!("no local branches to push"));
        }

        let tasks = targets.iter().map(|(full_name, directory, branch)| async move {
            git.push(directory, branch)
                .await
                .with_context(|| format!("pushing {branch} to {full_name}"))?;
            info!(repo = %full_name, branch, "branch pushed");
            Ok(())
        });
        join_all_errors(tasks).await?;

        for repo in data.repos_mut()? {
            repo.remote_branch = repo.local_branch.clone();
        }
        Ok(())
    }
}

#[async_trait]
impl UndoAction for PushBranches {
    async fn undo(
        &self,
        _args: &StepArgs,
        data: &mut SessionData,
        ctx: &OpContext,
    ) -> Result<()> {
        let repos = data.repos()?.to_vec();
        let git = &ctx.git;

        let targets: Vec<_> = repos
            .iter()
            .filter_map(|repo| {
                let directory = repo.clone_path.as_deref()?;
                let branch = repo.remote_branch.as_deref()?;
                Some((repo.full_name(), directory, branch))
            })
            .collect();

        let tasks = targets.iter().map(|(full_name, directory, branch)| async move {
            git.delete_remote_branch(directory, branch)
                .await
                .with_context(|| format!("deleting {branch} on {full_name}"))?;
            info!(repo = %full_name, branch, "remote branch deleted");
            Ok(())
        });
        join_all_errors(tasks).await?;

        for repo in data.repos_mut()? {
            repo.remote_branch = None;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::RepoRecord;
    use crate::testkit::bare_context;
    use std::path::PathBuf;

    fn branch_data() -> SessionData {
        let mut one = RepoRecord::new("acme", "widgets");
        one.clone_path = Some(PathBuf::from("/work/widgets"));
        one.local_branch = Some("update-ci".to_string());
        let mut two = RepoRecord::new("acme", "gadgets");
        two.clone_path = Some(PathBuf::from("/work/gadgets"));
        SessionData {
            repos: Some(vec![one, two]),
            project: None,
        }
    }

    #[tokio::test]
    async fn pushes_only_repos_with_a_local_branch() {
        let ctx = bare_context();
        let mut data = branch_data();

        PushBranches
            .execute(&StepArgs::new(), &mut data, &ctx)
            .await
            .unwrap();

        let repos = data.repos().unwrap();
        assert_eq!(repos[0].remote_branch.as_deref(), Some("update-ci"));
        assert!(repos[1].remote_branch.is_none());
    }

    #[tokio::test]
    async fn nothing_to_push_is_an_error() {
        let ctx = bare_context();
        let mut data = SessionData {
            repos: Some(vec![RepoRecord::new("acme", "widgets")]),
            project: None,
        };

        assert!(PushBranches
            .execute(&StepArgs::new(), &mut data, &ctx)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn undo_deletes_remote_branches() {
        let ctx = bare_context();
        let mut repo = RepoRecord::new("acme", "widgets");
        repo.clone_path = Some(PathBuf::from("/work/widgets"));
        repo.local_branch = Some("update-ci".to_string());
        repo.remote_branch = Some("update-ci".to_string());
        let mut data = SessionData {
            repos: Some(vec![repo]),
            project: None,
        };

        PushBranches
            .undo(&StepArgs::new(), &mut data, &ctx)
            .await
            .unwrap();

        assert!(data.repos().unwrap()[0].remote_branch.is_none());
    }
}
