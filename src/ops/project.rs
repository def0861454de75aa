//! GitHub project board operations

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use regex::Regex;
use tracing::info;

use super::{join_all_errors, OpContext, Operation, OperationAction, ParamRule, ParamSpec, TypeTag, UndoAction};
use crate::session::{ColumnRecord, ProjectRecord, SessionData, StepArgs};

/// Columns created on a fresh board, in display order.
const DEFAULT_COLUMNS: [&str; 3] = ["To do", "In progress", "Done"];

/// `https://github.com/orgs/{org}/projects/{number}` → `(org, number)`.
pub(crate) fn parse_project_url(url: &str) -> Option<(String, u64)> {
    let pattern = Regex::new(r"^https://github\.com/orgs/([^/]+)/projects/(\d+)$").ok()?;
    let captures = pattern.captures(url.trim())?;
    let org = captures.get(1)?.as_str().to_string();
    let number = captures.get(2)?.as_str().parse().ok()?;
    Some((org, number))
}

/// Attach an existing organisation project board to the session.
pub struct GetProject;

impl GetProject {
    pub fn operation() -> Operation {
        let action = Arc::new(GetProject);
        Operation {
            name: "get-project".to_string(),
            description: "get a GitHub project board".to_string(),
            inputs: vec![],
            output: TypeTag::Project,
            params: vec![ParamSpec::new(
                "url",
                "GitHub organisation project URL",
                ParamRule::ProjectUrl,
            )],
            action: action.clone(),
            undo: Some(action),
        }
    }
}

#[async_trait]
impl OperationAction for GetProject {
    async fn execute(
        &self,
        args: &StepArgs,
        data: &mut SessionData,
        ctx: &OpContext,
    ) -> Result<()> {
        let url = args.require("url")?;
        let (org, number) = parse_project_url(url)
            .ok_or_else(|| anyhow!("'{url}' is not a GitHub organisation project URL"))?;

        let projects = ctx.github.org_projects(&org).await?;
        let project = projects
            .into_iter()
            .find(|p| p.number == number)
            .ok_or_else(|| anyhow!("there's no project #{number} in {org}; check {url}"))?;

        let columns = ctx.github.project_columns(project.id).await?;
        info!(project = %project.html_url, columns = columns.len(), "project attached");

        data.project = Some(ProjectRecord {
            id: project.id,
            number: project.number,
            html_url: project.html_url,
            columns: columns
                .into_iter()
                .map(|c| ColumnRecord {
                    id: c.id,
                    name: c.name,
                })
                .collect(),
        });
        Ok(())
    }
}

#[async_trait]
impl UndoAction for GetProject {
    async fn undo(
        &self,
        _args: &StepArgs,
        data: &mut SessionData,
        _ctx: &OpContext,
    ) -> Result<()> {
        // Attaching a board had no external effect; just detach it.
        data.project = None;
        Ok(())
    }
}

/// Create a fresh organisation project board with the default columns.
pub struct CreateProject;

impl CreateProject {
    pub fn operation() -> Operation {
        let action = Arc::new(CreateProject);
        Operation {
            name: "create-project".to_string(),
            description: "create a GitHub project board".to_string(),
            inputs: vec![],
            output: TypeTag::Project,
            params: vec![
                ParamSpec::new("name", "project name", ParamRule::NonEmpty),
                ParamSpec::new("org", "GitHub organisation", ParamRule::NonEmpty),
            ],
            action: action.clone(),
            undo: Some(action),
        }
    }
}

#[async_trait]
impl OperationAction for CreateProject {
    async fn execute(
        &self,
        args: &StepArgs,
        data: &mut SessionData,
        ctx: &OpContext,
    ) -> Result<()> {
        let name = args.require("name")?;
        let org = args.require("org")?;
        ctx.config.require_github_token()?;

        let project = ctx
            .github
            .create_org_project(org, name)
            .await
            .with_context(|| format!("creating project '{name}' in {org}"))?;

        // Created one at a time so the board shows them in this order.
        let mut columns = Vec::with_capacity(DEFAULT_COLUMNS.len());
        for column_name in DEFAULT_COLUMNS {
            let column = ctx.github.create_column(project.id, column_name).await?;
            columns.push(ColumnRecord {
                id: column.id,
                name: column.name,
            });
        }

        info!(project = %project.html_url, "project created");
        data.project = Some(ProjectRecord {
            id: project.id,
            number: project.number,
            html_url: project.html_url,
            columns,
        });
        Ok(())
    }
}

#[async_trait]
impl UndoAction for CreateProject {
    async fn undo(
        &self,
        _args: &StepArgs,
        data: &mut SessionData,
        ctx: &OpContext,
    ) -> Result<()> {
        if let Some(project) = &data.project {
            ctx.github.close_project(project.id).await?;
            info!(project = %project.html_url, "project closed");
        }
        data.project = None;
        Ok(())
    }
}

/// Add every pull request in the session to a column of the board.
pub struct AddToProject;

impl AddToProject {
    pub fn operation() -> Operation {
        let action = Arc::new(AddToProject);
        Operation {
            name: "add-to-project".to_string(),
            description: "add pull requests to the project board".to_string(),
            inputs: vec![TypeTag::Prs, TypeTag::Project],
            output: TypeTag::ProjectCards,
            params: vec![ParamSpec::new(
                "column",
                "column to add cards to",
                ParamRule::NonEmpty,
            )],
            action: action.clone(),
            undo: Some(action),
        }
    }
}

#[async_trait]
impl OperationAction for AddToProject {
    async fn execute(
        &self,
        args: &StepArgs,
        data: &mut SessionData,
        ctx: &OpContext,
    ) -> Result<()> {
        let wanted = args.require("column")?;
        let project = data.project()?;

        let column = project
            .columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                let names: Vec<&str> = project.columns.iter().map(|c| c.name.as_str()).collect();
                anyhow!(
                    "no column '{wanted}' on {}; available: {}",
                    project.html_url,
                    names.join(", ")
                )
            })?;
        let column_id = column.id;

        let repos = data.repos()?.to_vec();
        let github = &ctx.github;

        let targets: Vec<_> = repos
            .iter()
            .filter_map(|repo| repo.pr.as_ref().map(|pr| (repo.full_name(), pr.id)))
            .collect();

        let tasks = targets.iter().map(|(full_name, pr_id)| async move {
            let card = github.create_card(column_id, *pr_id).await?;
            Ok((full_name.clone(), card.id))
        });
        let cards: Vec<(String, u64)> = join_all_errors(tasks).await?;
        info!(count = cards.len(), column = %column.name, "cards added");

        for repo in data.repos_mut()? {
            if let Some((_, card_id)) = cards.iter().find(|(name, _)| *name == repo.full_name()) {
                repo.card_id = Some(*card_id);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl UndoAction for AddToProject {
    async fn undo(
        &self,
        _args: &StepArgs,
        data: &mut SessionData,
        ctx: &OpContext,
    ) -> Result<()> {
        let repos = data.repos()?.to_vec();
        let github = &ctx.github;

        let tasks = repos
            .iter()
            .filter_map(|repo| repo.card_id)
            .map(|card_id| async move {
                github.delete_card(card_id).await?;
                Ok(())
            });
        join_all_errors(tasks).await?;

        for repo in data.repos_mut()? {
            repo.card_id = None;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_urls_parse_org_and_number() {
        assert_eq!(
            parse_project_url("https://github.com/orgs/acme/projects/7"),
            Some(("acme".to_string(), 7))
        );
        assert_eq!(parse_project_url("https://github.com/acme/widgets"), None);
        assert_eq!(
            parse_project_url("https://github.com/orgs/acme/projects/"),
            None
        );
    }

    #[tokio::test]
    async fn add_to_project_rejects_an_unknown_column() {
        use crate::session::{PrRecord, RepoRecord};
        use crate::testkit::bare_context;

        let ctx = bare_context();
        let mut repo = RepoRecord::new("acme", "widgets");
        repo.pr = Some(PrRecord {
            id: 1,
            number: 1,
            html_url: "https://github.com/acme/widgets/pull/1".to_string(),
        });
        let mut data = SessionData {
            repos: Some(vec![repo]),
            project: Some(ProjectRecord {
                id: 1,
                number: 7,
                html_url: "https://github.com/orgs/acme/projects/7".to_string(),
                columns: vec![ColumnRecord {
                    id: 11,
                    name: "To do".to_string(),
                }],
            }),
        };
        let args: StepArgs = [("column", "Shipped")].into_iter().collect();

        let err = AddToProject.execute(&args, &mut data, &ctx).await.unwrap_err();
        let message = format!("{err}");
        assert!(message.contains("Shipped") && message.contains("To do"));
    }
}
