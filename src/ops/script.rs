//! Running the transformation script on each clone

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use tracing::{info, warn};

use super::{OpContext, Operation, OperationAction, ParamRule, ParamSpec, TypeTag, UndoAction};
use crate::session::{SessionData, StepArgs};
use crate::subprocess::ProcessCommand;

/// Environment passed to the script so it can tell it is being driven by
/// the transformation runner, and against what.
const ENV_RUNNING: &str = "TRANSFORMATION_RUNNER_RUNNING";
const ENV_TARGET: &str = "TRANSFORMATION_RUNNER_TARGET";
const ENV_TARGET_NAME: &str = "TRANSFORMATION_RUNNER_TARGET_NAME";

/// Create a branch in every clone and run the user's script in it. Repos
/// are processed one at a time so the script's output stays readable and a
/// failure stops before touching the rest of the fleet.
pub struct RunScript;

impl RunScript {
    pub fn operation() -> Operation {
        let action = Arc::new(RunScript);
        Operation {
            name: "run-script".to_string(),
            description: "create a branch and run a script in each clone".to_string(),
            inputs: vec![TypeTag::Clones],
            output: TypeTag::LocalBranches,
            params: vec![
                ParamSpec::new("script", "path to a script", ParamRule::ExecutableFile),
                ParamSpec::new("branch", "branch to create", ParamRule::NonEmpty),
            ],
            action: action.clone(),
            undo: Some(action),
        }
    }
}

#[async_trait]
impl OperationAction for RunScript {
    async fn execute(
        &self,
        args: &StepArgs,
        data: &mut SessionData,
        ctx: &OpContext,
    ) -> Result<()> {
        let script = args.require("script")?;
        let branch = args.require("branch")?;
        let script_path: PathBuf = std::fs::canonicalize(script)
            .with_context(|| format!("resolving script path {script}"))?;

        let repos = data.repos()?.to_vec();
        let mut finished = Vec::new();

        for repo in &repos {
            let Some(directory) = repo.clone_path.as_deref() else {
                warn!(repo = %repo.full_name(), "skipping repo with no clone");
                continue;
            };

            info!(repo = %repo.full_name(), branch, "running script");
            ctx.git
                .create_and_checkout(directory, branch)
                .await
                .with_context(|| format!("creating branch on {}", repo.full_name()))?;

            run_script(&script_path, directory, repo, ctx)
                .await
                .with_context(|| format!("running script for '{}'", repo.full_name()))?;

            finished.push(repo.full_name());
        }

        if finished.is_empty() {
            return Err(anyhow!("no repos with clones to run the script against"));
        }

        for repo in data.repos_mut()? {
            if finished.contains(&repo.full_name()) {
                repo.local_branch = Some(branch.to_string());
            }
        }
        Ok(())
    }
}

async fn run_script(
    script_path: &Path,
    directory: &Path,
    repo: &crate::session::RepoRecord,
    ctx: &OpContext,
) -> Result<()> {
    let remote = format!("git@github.com:{}.git", repo.full_name());
    let command = ProcessCommand::new(script_path.display().to_string())
        .current_dir(directory)
        .env(ENV_RUNNING, "true")
        .env(ENV_TARGET, remote)
        .env(ENV_TARGET_NAME, repo.name.as_str());

    let output = ctx.processes.run(command).await?;
    if !output.stdout.is_empty() {
        info!(repo = %repo.full_name(), "script output:\n{}", output.stdout.trim_end());
    }
    Ok(())
}

#[async_trait]
impl UndoAction for RunScript {
    async fn undo(
        &self,
        args: &StepArgs,
        data: &mut SessionData,
        ctx: &OpContext,
    ) -> Result<()> {
        let branch = args.require("branch")?;
        let repos = data.repos()?.to_vec();

        for repo in &repos {
            let (Some(directory), Some(_)) = (repo.clone_path.as_deref(), &repo.local_branch)
            else {
                continue;
            };

            let default = ctx.git.default_branch(directory).await;
            ctx.git
                .checkout(directory, &default)
                .await
                .with_context(|| format!("leaving branch on {}", repo.full_name()))?;
            ctx.git
                .delete_branch(directory, branch)
                .await
                .with_context(|| format!("deleting branch on {}", repo.full_name()))?;
        }

        for repo in data.repos_mut()? {
            repo.local_branch = None;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::RepoRecord;
    use crate::testkit::mock_context_in;
    use tempfile::TempDir;

    fn executable_script(dir: &Path) -> PathBuf {
        let path = dir.join("transform.sh");
        std::fs::write(&path, "#!/bin/sh\nexit 0\n").unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        }
        path
    }

    fn cloned_repo(workspace: &Path) -> RepoRecord {
        let mut repo = RepoRecord::new("acme", "widgets");
        let clone = workspace.join("clones").join("widgets");
        std::fs::create_dir_all(&clone).unwrap();
        repo.clone_path = Some(clone);
        repo
    }

    #[tokio::test]
    async fn creates_branch_runs_script_and_records_it() {
        let workspace = TempDir::new().unwrap();
        let (ctx, mock) = mock_context_in(workspace.path().to_path_buf());
        let script = executable_script(workspace.path());

        let mut data = SessionData {
            repos: Some(vec![cloned_repo(workspace.path())]),
            project: None,
        };
        let args: StepArgs = [
            ("script", script.display().to_string()),
            ("branch", "update-ci".to_string()),
        ]
        .into_iter()
        .collect();

        RunScript.execute(&args, &mut data, &ctx).await.unwrap();

        let lines = mock.command_lines();
        assert!(lines.contains(&"git checkout -b update-ci".to_string()));

        let invocations = mock.invocations();
        let script_run = invocations
            .iter()
            .find(|c| c.program.ends_with("transform.sh"))
            .expect("script was run");
        assert_eq!(script_run.env.get(ENV_RUNNING).unwrap(), "true");
        assert_eq!(script_run.env.get(ENV_TARGET_NAME).unwrap(), "widgets");

        assert_eq!(
            data.repos().unwrap()[0].local_branch.as_deref(),
            Some("update-ci")
        );
    }

    #[tokio::test]
    async fn a_failing_script_fails_the_step() {
        let workspace = TempDir::new().unwrap();
        let (ctx, mock) = mock_context_in(workspace.path().to_path_buf());
        let script = executable_script(workspace.path());
        mock.fail_matching("transform.sh", "boom");

        let mut data = SessionData {
            repos: Some(vec![cloned_repo(workspace.path())]),
            project: None,
        };
        let args: StepArgs = [
            ("script", script.display().to_string()),
            ("branch", "update-ci".to_string()),
        ]
        .into_iter()
        .collect();

        let err = RunScript.execute(&args, &mut data, &ctx).await.unwrap_err();
        assert!(format!("{err:#}").contains("acme/widgets"));
    }

    #[tokio::test]
    async fn undo_returns_to_default_branch_and_deletes() {
        let workspace = TempDir::new().unwrap();
        let (ctx, mock) = mock_context_in(workspace.path().to_path_buf());

        let mut repo = cloned_repo(workspace.path());
        repo.local_branch = Some("update-ci".to_string());
        let mut data = SessionData {
            repos: Some(vec![repo]),
            project: None,
        };
        let args: StepArgs = [("branch", "update-ci")].into_iter().collect();

        RunScript.undo(&args, &mut data, &ctx).await.unwrap();

        let lines = mock.command_lines();
        assert!(lines.contains(&"git checkout main".to_string()));
        assert!(lines.contains(&"git branch -D update-ci".to_string()));
        assert!(data.repos().unwrap()[0].local_branch.is_none());
    }
}
