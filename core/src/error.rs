use std::path::PathBuf;

use thiserror::Error;

pub type TaskResult<T> = Result<T, TaskError>;

/// Failures surfaced by operations, pipelines and the target registry.
///
/// Composing layers wrap the error they received instead of replacing it, so
/// the deepest failure stays reachable through [`TaskError::root_cause`] and
/// `std::error::Error::source`.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("command `{command}` failed: {reason}")]
    Execution {
        command: String,
        code: Option<i32>,
        reason: String,
    },

    #[error("executable not found: {program}")]
    NotFound { program: String },

    #[error("required tool `{tool}` is not installed ({hint})")]
    MissingDependency { tool: String, hint: String },

    #[error("unknown target `{name}`: no match for `{token}`")]
    Resolution { name: String, token: String },

    #[error("namespace `{0}` is already registered")]
    DuplicateNamespace(String),

    #[error("operation `{namespace}:{operation}` is already registered")]
    DuplicateOperation { namespace: String, operation: String },

    #[error("alias `{alias}` clashes with {existing}")]
    DuplicateAlias { alias: String, existing: String },

    #[error("refusing to run `{command}`: {reason}")]
    Rejected { command: String, reason: String },

    #[error("{stage} failed: {source}")]
    Composition {
        stage: String,
        source: Box<TaskError>,
    },

    #[error("{operation}: {} of {total} targets failed:{}", .failures.len(), list_failures(.failures))]
    Aggregate {
        operation: String,
        total: usize,
        failures: Vec<TaskError>,
    },

    #[error("files need formatting: {}", .0.join(", "))]
    Unformatted(Vec<String>),

    #[error("{context}: {}: {source}", .path.display())]
    Io {
        context: String,
        path: PathBuf,
        source: std::io::Error,
    },
}

fn list_failures(failures: &[TaskError]) -> String {
    failures
        .iter()
        .map(|failure| format!("\n  - {failure}"))
        .collect()
}

impl TaskError {
    pub fn composition(stage: impl Into<String>, source: TaskError) -> Self {
        TaskError::Composition {
            stage: stage.into(),
            source: Box::new(source),
        }
    }

    pub fn io(context: impl Into<String>, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TaskError::Io {
            context: context.into(),
            path: path.into(),
            source,
        }
    }

    /// Follows composition layers down to the failure that started it all.
    /// Aggregates stop the descent at their first failure.
    pub fn root_cause(&self) -> &TaskError {
        match self {
            TaskError::Composition { source, .. } => source.root_cause(),
            TaskError::Aggregate { failures, .. } => failures
                .first()
                .map(TaskError::root_cause)
                .unwrap_or(self),
            other => other,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self.root_cause(),
            TaskError::NotFound { .. } | TaskError::MissingDependency { .. }
        )
    }

    /// Process exit status to report for this failure.
    pub fn exit_code(&self) -> i32 {
        match self.root_cause() {
            TaskError::Execution {
                code: Some(code), ..
            } if *code != 0 => *code,
            _ => 1,
        }
    }
}
