//! Opening pull requests for pushed branches

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use tracing::info;

use super::{join_all_errors, OpContext, Operation, OperationAction, ParamRule, ParamSpec, TypeTag, UndoAction};
use crate::session::{PrRecord, RepoRecord, SessionData, StepArgs};

/// Pause between PR creations, to stay on the right side of abuse limits.
const PR_CREATION_DELAY: Duration = Duration::from_secs(2);

/// `{owner}` and `{repo}` in the title/body expand per repository.
fn expand_template(template: &str, repo: &RepoRecord) -> String {
    template
        .replace("{owner}", &repo.owner)
        .replace("{repo}", &repo.name)
}

/// Open a pull request for every pushed branch. An open PR for the same
/// head is reused rather than duplicated.
pub struct OpenPrs;

impl OpenPrs {
    pub fn operation() -> Operation {
        let action = Arc::new(OpenPrs);
        Operation {
            name: "open-prs".to_string(),
            description: "create GitHub pull requests for pushed branches".to_string(),
            inputs: vec![TypeTag::Repos, TypeTag::RemoteBranches],
            output: TypeTag::Prs,
            params: vec![
                ParamSpec::new("title", "pull request title", ParamRule::NonEmpty),
                ParamSpec::new("body", "pull request body", ParamRule::NonEmpty),
            ],
            action: action.clone(),
            undo: Some(action),
        }
    }
}

#[async_trait]
impl OperationAction for OpenPrs {
    async fn execute(
        &self,
        args: &StepArgs,
        data: &mut SessionData,
        ctx: &OpContext,
    ) -> Result<()> {
        let title = args.require("title")?;
        let body = args.require("body")?;
        ctx.config.require_github_token()?;

        let repos = data.repos()?.to_vec();
        let mut opened: Vec<(String, PrRecord)> = Vec::new();

        for repo in &repos {
            let Some(branch) = repo.remote_branch.as_deref() else {
                continue;
            };

            let existing = ctx
                .github
                .pulls_by_head(&repo.owner, &repo.name, branch)
                .await?;

            let pr = match existing.into_iter().next() {
                Some(pr) => {
                    info!(repo = %repo.full_name(), url = %pr.html_url, "using existing PR");
                    pr
                }
                None => {
                    let base = ctx.github.default_branch(&repo.owner, &repo.name).await?;
                    let pr = ctx
                        .github
                        .create_pull(
                            &repo.owner,
                            &repo.name,
                            branch,
                            &base,
                            &expand_template(title, repo),
                            &expand_template(body, repo),
                        )
                        .await
                        .with_context(|| format!("opening PR on {}", repo.full_name()))?;
                    info!(repo = %repo.full_name(), url = %pr.html_url, "PR created");
                    tokio::time::sleep(PR_CREATION_DELAY).await;
                    pr
                }
            };

            opened.push((
                repo.full_name(),
                PrRecord {
                    id: pr.id,
                    number: pr.number,
                    html_url: pr.html_url,
                },
            ));
        }

        if opened.is_empty() {
            return Err(anyhow!("no pushed branches to open PRs for"));
        }

        for repo in data.repos_mut()? {
            if let Some((_, pr)) = opened.iter().find(|(name, _)| *name == repo.full_name()) {
                repo.pr = Some(pr.clone());
            }
        }
        Ok(())
    }
}

#[async_trait]
impl UndoAction for OpenPrs {
    async fn undo(
        &self,
        _args: &StepArgs,
        data: &mut SessionData,
        ctx: &OpContext,
    ) -> Result<()> {
        let repos = data.repos()?.to_vec();
        let github = &ctx.github;

        let targets: Vec<_> = repos
            .iter()
            .filter_map(|repo| repo.pr.as_ref().map(|pr| (repo, pr)))
            .collect();

        let tasks = targets.iter().map(|(repo, pr)| async move {
            github
                .comment_on_issue(&repo.owner, &repo.name, pr.number, "automatically closed 🤖")
                .await?;
            github.close_pull(&repo.owner, &repo.name, pr.number).await?;
            info!(url = %pr.html_url, "PR closed");
            Ok(())
        });
        join_all_errors(tasks).await?;

        for repo in data.repos_mut()? {
            repo.pr = None;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn templates_expand_per_repo() {
        let repo = RepoRecord::new("acme", "widgets");
        assert_eq!(
            expand_template("chore: update CI in {owner}/{repo}", &repo),
            "chore: update CI in acme/widgets"
        );
        assert_eq!(expand_template("no placeholders", &repo), "no placeholders");
    }
}
