//! Git operations over the process runner

use std::path::Path;
use std::sync::Arc;

use super::{ProcessCommand, ProcessError, ProcessRunner};

/// The git commands the transformation pipeline needs, addressed at a
/// working directory per call so one instance serves every clone.
#[derive(Clone)]
pub struct GitCli {
    runner: Arc<dyn ProcessRunner>,
}

impl GitCli {
    pub fn new(runner: Arc<dyn ProcessRunner>) -> Self {
        Self { runner }
    }

    fn git(&self, dir: &Path) -> ProcessCommand {
        ProcessCommand::new("git").current_dir(dir)
    }

    pub async fn clone_repo(&self, remote_url: &str, directory: &Path) -> Result<(), ProcessError> {
        let command = ProcessCommand::new("git")
            .arg("clone")
            .arg(remote_url)
            .arg(directory.display().to_string());
        self.runner.run(command).await?;
        Ok(())
    }

    pub async fn checkout(&self, dir: &Path, branch: &str) -> Result<(), ProcessError> {
        self.runner
            .run(self.git(dir).args(["checkout", branch]))
            .await?;
        Ok(())
    }

    pub async fn create_and_checkout(&self, dir: &Path, branch: &str) -> Result<(), ProcessError> {
        self.runner
            .run(self.git(dir).args(["checkout", "-b", branch]))
            .await?;
        Ok(())
    }

    pub async fn delete_branch(&self, dir: &Path, branch: &str) -> Result<(), ProcessError> {
        self.runner
            .run(self.git(dir).args(["branch", "-D", branch]))
            .await?;
        Ok(())
    }

    pub async fn push(&self, dir: &Path, branch: &str) -> Result<(), ProcessError> {
        self.runner
            .run(self.git(dir).args(["push", "origin", branch]))
            .await?;
        Ok(())
    }

    /// Push the empty refspec `:branch`, which deletes the branch on the
    /// remote.
    pub async fn delete_remote_branch(&self, dir: &Path, branch: &str) -> Result<(), ProcessError> {
        let refspec = format!(":{branch}");
        self.runner
            .run(self.git(dir).args(["push", "origin", refspec.as_str()]))
            .await?;
        Ok(())
    }

    /// The branch origin/HEAD points at, falling back to `main` for clones
    /// where the symbolic ref was never set.
    pub async fn default_branch(&self, dir: &Path) -> String {
        let result = self
            .runner
            .run(
                self.git(dir)
                    .args(["symbolic-ref", "--short", "refs/remotes/origin/HEAD"]),
            )
            .await;

        match result {
            Ok(output) => output
                .stdout
                .trim()
                .strip_prefix("origin/")
                .map(str::to_string)
                .unwrap_or_else(|| "main".to_string()),
            Err(_) => "main".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::SubprocessManager;
    use std::path::Path;

    #[tokio::test]
    async fn issues_the_expected_git_commands() {
        let (processes, mock) = SubprocessManager::mock();
        let git = processes.git();
        let dir = Path::new("/work/widgets");

        git.clone_repo("git@github.com:acme/widgets.git", dir)
            .await
            .unwrap();
        git.create_and_checkout(dir, "update-ci").await.unwrap();
        git.push(dir, "update-ci").await.unwrap();
        git.delete_remote_branch(dir, "update-ci").await.unwrap();

        assert_eq!(
            mock.command_lines(),
            [
                "git clone git@github.com:acme/widgets.git /work/widgets",
                "git checkout -b update-ci",
                "git push origin update-ci",
                "git push origin :update-ci",
            ]
        );
    }

    #[tokio::test]
    async fn default_branch_falls_back_to_main() {
        let (processes, mock) = SubprocessManager::mock();
        mock.fail_matching("symbolic-ref", "no such ref");

        let git = processes.git();
        let branch = git.default_branch(Path::new("/work/widgets")).await;
        assert_eq!(branch, "main");
    }
}
