//! Operation registry and the built-in operation set
//!
//! Every unit of work the guided loop can run is an [`Operation`]: a named
//! entry with declared input/output type-tags, a declarative argument
//! schema, an execute action, and an optional undo action. The registry is
//! built once at startup and validated there; malformed definitions never
//! reach the loop.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::catalog::CatalogClient;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::github::GithubClient;
use crate::session::{SessionData, StepArgs};
use crate::subprocess::{GitCli, SubprocessManager};

mod clone;
mod discover;
mod filter;
mod pr;
mod project;
mod push;
mod script;

pub use clone::CloneRepos;
pub use discover::{ReposFromCatalog, ReposFromFile};
pub use filter::FilterRepoName;
pub use pr::OpenPrs;
pub use project::{AddToProject, CreateProject, GetProject};
pub use push::PushBranches;
pub use script::RunScript;

/// A label identifying one kind of data operations produce and consume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TypeTag {
    Repos,
    Clones,
    LocalBranches,
    RemoteBranches,
    Prs,
    Project,
    ProjectCards,
}

impl TypeTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeTag::Repos => "repos",
            TypeTag::Clones => "clones",
            TypeTag::LocalBranches => "local-branches",
            TypeTag::RemoteBranches => "remote-branches",
            TypeTag::Prs => "prs",
            TypeTag::Project => "project",
            TypeTag::ProjectCards => "project-cards",
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validation applied to a parameter answer before a step may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamRule {
    /// Anything, including empty.
    Any,
    NonEmpty,
    /// Must compile as a regular expression.
    Pattern,
    /// Must be a path to a readable file.
    ReadableFile,
    /// Must be a path to an executable file.
    ExecutableFile,
    /// Must be a GitHub organisation project URL.
    ProjectUrl,
}

impl ParamRule {
    pub fn check(&self, value: &str) -> std::result::Result<(), String> {
        match self {
            ParamRule::Any => Ok(()),
            ParamRule::NonEmpty => {
                if value.trim().is_empty() {
                    Err("please enter a value".to_string())
                } else {
                    Ok(())
                }
            }
            ParamRule::Pattern => regex::Regex::new(value)
                .map(|_| ())
                .map_err(|e| format!("not a valid pattern: {e}")),
            ParamRule::ReadableFile => {
                let meta = std::fs::metadata(value)
                    .map_err(|_| format!("'{value}' is not a readable file"))?;
                if meta.is_file() {
                    Ok(())
                } else {
                    Err(format!("'{value}' is not a file"))
                }
            }
            ParamRule::ExecutableFile => {
                let meta = std::fs::metadata(value)
                    .map_err(|_| format!("'{value}' is not a readable file"))?;
                if !meta.is_file() {
                    return Err(format!("'{value}' is not a file"));
                }
                #[cfg(unix)]
                {
                    use std::os::unix::fs::PermissionsExt;
                    if meta.permissions().mode() & 0o111 == 0 {
                        return Err(format!("'{value}' is not executable (try `chmod +x`)"));
                    }
                }
                Ok(())
            }
            ParamRule::ProjectUrl => {
                if project::parse_project_url(value).is_some() {
                    Ok(())
                } else {
                    Err("please enter a GitHub organisation project URL".to_string())
                }
            }
        }
    }
}

/// One user-supplied parameter in an operation's argument schema.
#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: &'static str,
    pub prompt: &'static str,
    pub rule: ParamRule,
}

impl ParamSpec {
    pub fn new(name: &'static str, prompt: &'static str, rule: ParamRule) -> Self {
        Self { name, prompt, rule }
    }
}

/// Collaborators injected into operation handlers. Constructed once at the
/// entry point; handlers never reach for global state.
pub struct OpContext {
    pub config: Config,
    pub github: GithubClient,
    pub catalog: CatalogClient,
    pub git: GitCli,
    pub processes: SubprocessManager,
}

/// The side-effecting part of an operation. `data` is a working copy; the
/// engine commits it only if this returns `Ok`.
#[async_trait]
pub trait OperationAction: Send + Sync {
    async fn execute(
        &self,
        args: &StepArgs,
        data: &mut SessionData,
        ctx: &OpContext,
    ) -> anyhow::Result<()>;
}

/// Reverses an operation's externally visible effects and clears the data
/// it produced. Operations without one are unwound from history only.
#[async_trait]
pub trait UndoAction: Send + Sync {
    async fn undo(
        &self,
        args: &StepArgs,
        data: &mut SessionData,
        ctx: &OpContext,
    ) -> anyhow::Result<()>;
}

/// A registered, named unit of work.
pub struct Operation {
    pub name: String,
    pub description: String,
    pub inputs: Vec<TypeTag>,
    pub output: TypeTag,
    pub params: Vec<ParamSpec>,
    pub action: Arc<dyn OperationAction>,
    pub undo: Option<Arc<dyn UndoAction>>,
}

impl Operation {
    /// A filter narrows its own output and may run repeatedly in place.
    pub fn is_filter(&self) -> bool {
        self.inputs.contains(&self.output)
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("name", &self.name)
            .field("inputs", &self.inputs)
            .field("output", &self.output)
            .field("undo", &self.undo.is_some())
            .finish()
    }
}

/// Lookup table of operations, fixed after startup. Registration order is
/// preserved for menu display.
#[derive(Default)]
pub struct OperationRegistry {
    ops: Vec<Arc<Operation>>,
    index: HashMap<String, usize>,
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The full built-in operation set, in pipeline order.
    pub fn builtin() -> Result<Self> {
        let mut registry = Self::new();
        registry.register(ReposFromFile::operation())?;
        registry.register(ReposFromCatalog::operation())?;
        registry.register(FilterRepoName::operation())?;
        registry.register(CloneRepos::operation())?;
        registry.register(RunScript::operation())?;
        registry.register(PushBranches::operation())?;
        registry.register(OpenPrs::operation())?;
        registry.register(GetProject::operation())?;
        registry.register(CreateProject::operation())?;
        registry.register(AddToProject::operation())?;
        Ok(registry)
    }

    /// Add an operation, rejecting malformed definitions. Failures here are
    /// a startup error, never a runtime one.
    pub fn register(&mut self, op: Operation) -> Result<()> {
        if op.name.trim().is_empty() {
            return Err(Error::InvalidDefinition(
                "operation name must not be empty".to_string(),
            ));
        }
        if self.index.contains_key(&op.name) {
            return Err(Error::InvalidDefinition(format!(
                "operation '{}' registered twice",
                op.name
            )));
        }
        let mut seen = std::collections::HashSet::new();
        for param in &op.params {
            if param.name.trim().is_empty() {
                return Err(Error::InvalidDefinition(format!(
                    "operation '{}' has a parameter with an empty name",
                    op.name
                )));
            }
            if !seen.insert(param.name) {
                return Err(Error::InvalidDefinition(format!(
                    "operation '{}' declares parameter '{}' twice",
                    op.name, param.name
                )));
            }
        }

        self.index.insert(op.name.clone(), self.ops.len());
        self.ops.push(Arc::new(op));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Operation>> {
        self.index.get(name).map(|&i| &self.ops[i])
    }

    pub fn lookup(&self, name: &str) -> Result<&Arc<Operation>> {
        self.get(name)
            .ok_or_else(|| Error::UnknownOperation(name.to_string()))
    }

    pub fn all(&self) -> impl Iterator<Item = &Arc<Operation>> {
        self.ops.iter()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Run all futures to completion and fail with every error, not just the
/// first. Per-repo work inside an operation uses this so one bad repository
/// doesn't hide the others' failures.
pub async fn join_all_errors<T>(
    tasks: impl IntoIterator<Item = impl std::future::Future<Output = anyhow::Result<T>>>,
) -> anyhow::Result<Vec<T>> {
    let results = futures::future::join_all(tasks).await;
    let mut values = Vec::with_capacity(results.len());
    let mut errors = Vec::new();
    for result in results {
        match result {
            Ok(value) => values.push(value),
            Err(e) => errors.push(format!("{e:#}")),
        }
    }
    if errors.is_empty() {
        Ok(values)
    } else {
        Err(anyhow!(errors.join("; ")))
    }
}
