//! Display descriptors for each kind of session data
//!
//! Pure functions from [`SessionData`] to display text. Absent values render
//! as empty strings or `None`; nothing here panics on a partially populated
//! session.

use crate::ops::TypeTag;
use crate::session::{RepoRecord, SessionData};

/// A typed view of one tag's current data, extracted from the session.
#[derive(Debug)]
pub enum TypedView<'a> {
    Repos(&'a [RepoRecord]),
    Clones(Vec<&'a RepoRecord>),
    LocalBranches(Vec<&'a RepoRecord>),
    RemoteBranches(Vec<&'a RepoRecord>),
    Prs(Vec<&'a RepoRecord>),
    Project(&'a crate::session::ProjectRecord),
    ProjectCards(Vec<&'a RepoRecord>),
}

/// The current value of `tag` in `data`, when populated.
pub fn extract(tag: TypeTag, data: &SessionData) -> Option<TypedView<'_>> {
    let repos = data.repos.as_deref();
    match tag {
        TypeTag::Repos => repos.map(TypedView::Repos),
        TypeTag::Clones => non_empty(repos, |r| r.clone_path.is_some()).map(TypedView::Clones),
        TypeTag::LocalBranches => {
            non_empty(repos, |r| r.local_branch.is_some()).map(TypedView::LocalBranches)
        }
        TypeTag::RemoteBranches => {
            non_empty(repos, |r| r.remote_branch.is_some()).map(TypedView::RemoteBranches)
        }
        TypeTag::Prs => non_empty(repos, |r| r.pr.is_some()).map(TypedView::Prs),
        TypeTag::Project => data.project.as_ref().map(TypedView::Project),
        TypeTag::ProjectCards => {
            non_empty(repos, |r| r.card_id.is_some()).map(TypedView::ProjectCards)
        }
    }
}

fn non_empty<'a>(
    repos: Option<&'a [RepoRecord]>,
    keep: impl Fn(&RepoRecord) -> bool,
) -> Option<Vec<&'a RepoRecord>> {
    let matched: Vec<&RepoRecord> = repos?.iter().filter(|r| keep(r)).collect();
    if matched.is_empty() {
        None
    } else {
        Some(matched)
    }
}

/// Whether `tag` currently has data.
pub fn exists(tag: TypeTag, data: &SessionData) -> bool {
    extract(tag, data).is_some()
}

/// Multi-line rendering of `tag`'s current value, for the preview command.
pub fn format(tag: TypeTag, data: &SessionData) -> String {
    match extract(tag, data) {
        None => String::new(),
        Some(TypedView::Repos(repos)) => join_lines(repos.iter().map(|r| r.html_url())),
        Some(TypedView::Clones(repos)) => join_lines(
            repos
                .iter()
                .filter_map(|r| r.clone_path.as_ref())
                .map(|p| p.display().to_string()),
        ),
        Some(TypedView::LocalBranches(repos)) => join_lines(repos.iter().filter_map(|r| {
            r.local_branch
                .as_ref()
                .map(|b| format!("{}#{b}", r.full_name()))
        })),
        Some(TypedView::RemoteBranches(repos)) => join_lines(repos.iter().filter_map(|r| {
            r.remote_branch
                .as_ref()
                .map(|b| format!("{}#{b}", r.full_name()))
        })),
        Some(TypedView::Prs(repos)) => join_lines(
            repos
                .iter()
                .filter_map(|r| r.pr.as_ref())
                .map(|pr| pr.html_url.clone()),
        ),
        Some(TypedView::Project(project)) => project.html_url.clone(),
        Some(TypedView::ProjectCards(repos)) => join_lines(
            repos
                .iter()
                .filter_map(|r| r.pr.as_ref())
                .map(|pr| format!("{} on board", pr.html_url)),
        ),
    }
}

/// Short human summary of `tag`'s current value, e.g. `3 repositories`.
pub fn summarize(tag: TypeTag, data: &SessionData) -> Option<String> {
    match extract(tag, data)? {
        TypedView::Repos(repos) => Some(count(repos.len(), "repository", "repositories")),
        TypedView::Clones(repos) => Some(count(repos.len(), "clone", "clones")),
        TypedView::LocalBranches(repos) => {
            Some(count(repos.len(), "local branch", "local branches"))
        }
        TypedView::RemoteBranches(repos) => {
            Some(count(repos.len(), "remote branch", "remote branches"))
        }
        TypedView::Prs(repos) => Some(count(repos.len(), "pull request", "pull requests")),
        TypedView::Project(project) => Some(project.html_url.clone()),
        TypedView::ProjectCards(repos) => {
            Some(count(repos.len(), "project card", "project cards"))
        }
    }
}

/// The session header: every produced tag's summary, joined with `·`.
pub fn session_summary(outputs: &[TypeTag], data: &SessionData) -> String {
    outputs
        .iter()
        .filter_map(|tag| summarize(*tag, data))
        .collect::<Vec<_>>()
        .join(" · ")
}

fn count(n: usize, singular: &str, plural: &str) -> String {
    if n == 1 {
        format!("1 {singular}")
    } else {
        format!("{n} {plural}")
    }
}

fn join_lines(lines: impl Iterator<Item = String>) -> String {
    lines.collect::<Vec<_>>().join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{PrRecord, ProjectRecord};
    use std::path::PathBuf;

    fn sample_data() -> SessionData {
        let mut one = RepoRecord::new("acme", "widgets");
        one.clone_path = Some(PathBuf::from("/work/widgets"));
        one.local_branch = Some("update-ci".to_string());
        one.remote_branch = Some("update-ci".to_string());
        one.pr = Some(PrRecord {
            id: 10,
            number: 42,
            html_url: "https://github.com/acme/widgets/pull/42".to_string(),
        });
        let two = RepoRecord::new("acme", "gadgets");
        SessionData {
            repos: Some(vec![one, two]),
            project: None,
        }
    }

    #[test]
    fn absent_data_renders_empty_and_never_panics() {
        let data = SessionData::default();
        for tag in [
            TypeTag::Repos,
            TypeTag::Clones,
            TypeTag::LocalBranches,
            TypeTag::RemoteBranches,
            TypeTag::Prs,
            TypeTag::Project,
            TypeTag::ProjectCards,
        ] {
            assert!(!exists(tag, &data));
            assert_eq!(format(tag, &data), "");
            assert_eq!(summarize(tag, &data), None);
        }
    }

    #[test]
    fn views_only_include_repos_with_the_field() {
        let data = sample_data();
        assert!(exists(TypeTag::Repos, &data));
        assert!(exists(TypeTag::Prs, &data));
        assert_eq!(summarize(TypeTag::Repos, &data).unwrap(), "2 repositories");
        assert_eq!(summarize(TypeTag::Prs, &data).unwrap(), "1 pull request");
        assert_eq!(
            format(TypeTag::Prs, &data),
            "https://github.com/acme/widgets/pull/42"
        );
    }

    #[test]
    fn repos_format_as_github_urls() {
        let data = sample_data();
        assert_eq!(
            format(TypeTag::Repos, &data),
            "https://github.com/acme/widgets\nhttps://github.com/acme/gadgets"
        );
    }

    #[test]
    fn project_summary_is_its_url() {
        let data = SessionData {
            repos: None,
            project: Some(ProjectRecord {
                id: 1,
                number: 7,
                html_url: "https://github.com/orgs/acme/projects/7".to_string(),
                columns: vec![],
            }),
        };
        assert_eq!(
            summarize(TypeTag::Project, &data).unwrap(),
            "https://github.com/orgs/acme/projects/7"
        );
    }

    #[test]
    fn session_summary_joins_non_empty_summaries() {
        let data = sample_data();
        let header = session_summary(&[TypeTag::Repos, TypeTag::Prs, TypeTag::Project], &data);
        assert_eq!(header, "2 repositories · 1 pull request");
    }
}
