//! The data a session accumulates and the steps that produced it

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// One repository being transformed. Later operations annotate the record
/// in place: clone path, branches, the pull request, the project card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepoRecord {
    pub owner: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clone_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pr: Option<PrRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_id: Option<u64>,
}

impl RepoRecord {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            clone_path: None,
            local_branch: None,
            remote_branch: None,
            pr: None,
            card_id: None,
        }
    }

    /// `owner/name`
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }

    pub fn html_url(&self) -> String {
        format!("https://github.com/{}/{}", self.owner, self.name)
    }
}

/// A pull request opened for one repository's pushed branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrRecord {
    pub id: u64,
    pub number: u64,
    pub html_url: String,
}

/// A GitHub organisation project board and its columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub id: u64,
    pub number: u64,
    pub html_url: String,
    pub columns: Vec<ColumnRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnRecord {
    pub id: u64,
    pub name: String,
}

/// Everything the steps of a session have produced so far. Values are only
/// written by operation execute/undo handlers; the rest of the program reads
/// them through borrows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repos: Option<Vec<RepoRecord>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<ProjectRecord>,
}

impl SessionData {
    /// The repo list, or an error when no discovery step has populated it.
    /// Operations whose inputs include `repos` can rely on this.
    pub fn repos(&self) -> Result<&[RepoRecord]> {
        self.repos
            .as_deref()
            .ok_or_else(|| anyhow!("no repositories in session data"))
    }

    pub fn repos_mut(&mut self) -> Result<&mut Vec<RepoRecord>> {
        self.repos
            .as_mut()
            .ok_or_else(|| anyhow!("no repositories in session data"))
    }

    pub fn project(&self) -> Result<&ProjectRecord> {
        self.project
            .as_ref()
            .ok_or_else(|| anyhow!("no project in session data"))
    }
}

/// One recorded invocation of an operation: the minimal information needed
/// to replay it against prior session data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub name: String,
    pub args: StepArgs,
}

/// User-supplied parameters for a step. Keys are the parameter names from
/// the operation's schema; values are the raw answers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepArgs(BTreeMap<String, String>);

impl StepArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// The named argument, or an error for handlers that require it.
    pub fn require(&self, name: &str) -> Result<&str> {
        self.get(name)
            .ok_or_else(|| anyhow!("missing argument '{name}'"))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// This step's recorded args overlaid with `extra`; `extra` wins. Used
    /// on undo to re-supply arguments like freshly prompted credentials.
    pub fn merged(&self, extra: &StepArgs) -> StepArgs {
        let mut merged = self.0.clone();
        for (k, v) in &extra.0 {
            merged.insert(k.clone(), v.clone());
        }
        StepArgs(merged)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for StepArgs {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        StepArgs(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merged_prefers_extra_args() {
        let recorded: StepArgs = [("branch", "update-deps"), ("token", "old")]
            .into_iter()
            .collect();
        let extra: StepArgs = [("token", "fresh")].into_iter().collect();

        let merged = recorded.merged(&extra);
        assert_eq!(merged.get("branch"), Some("update-deps"));
        assert_eq!(merged.get("token"), Some("fresh"));
    }

    #[test]
    fn session_data_accessors_report_absence() {
        let data = SessionData::default();
        assert!(data.repos().is_err());
        assert!(data.project().is_err());

        let data = SessionData {
            repos: Some(vec![RepoRecord::new("acme", "widgets")]),
            project: None,
        };
        assert_eq!(data.repos().unwrap()[0].full_name(), "acme/widgets");
    }

    #[test]
    fn repo_records_skip_empty_fields_in_json() {
        let repo = RepoRecord::new("acme", "widgets");
        let json = serde_json::to_string(&repo).unwrap();
        assert_eq!(json, r#"{"owner":"acme","name":"widgets"}"#);
    }
}
