use std::path::PathBuf;

use thiserror::Error;

use crate::ops::TypeTag;

#[derive(Error, Debug)]
pub enum Error {
    /// The operation's preconditions are not met by the step history.
    #[error("operation '{operation}' is not available: {}", describe_invalid(.missing, .existing))]
    InvalidOperation {
        operation: String,
        missing: Vec<TypeTag>,
        existing: Option<TypeTag>,
    },

    /// An operation's execute or undo handler failed. The session is
    /// guaranteed unchanged.
    #[error("operation '{operation}' failed: {source:#}")]
    OperationFailed {
        operation: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("nothing to undo")]
    NothingToUndo,

    #[error("session file {path} couldn't be parsed: {source}")]
    CorruptSession {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("session file {path}: {source}")]
    SessionIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("a session named '{0}' already exists")]
    SessionExists(String),

    #[error("unknown operation: {0}")]
    UnknownOperation(String),

    #[error("invalid operation definition: {0}")]
    InvalidDefinition(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

fn describe_invalid(missing: &[TypeTag], existing: &Option<TypeTag>) -> String {
    let mut parts = Vec::new();
    if !missing.is_empty() {
        let tags: Vec<String> = missing.iter().map(|t| t.to_string()).collect();
        parts.push(format!("missing {}", tags.join(", ")));
    }
    if let Some(tag) = existing {
        parts.push(format!("{tag} already produced"));
    }
    parts.join("; ")
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_operation_message_names_the_gaps() {
        let err = Error::InvalidOperation {
            operation: "push-branches".to_string(),
            missing: vec![TypeTag::Clones, TypeTag::LocalBranches],
            existing: None,
        };
        assert_eq!(
            err.to_string(),
            "operation 'push-branches' is not available: missing clones, local-branches"
        );

        let err = Error::InvalidOperation {
            operation: "clone".to_string(),
            missing: vec![],
            existing: Some(TypeTag::Clones),
        };
        assert_eq!(
            err.to_string(),
            "operation 'clone' is not available: clones already produced"
        );
    }
}
