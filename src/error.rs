use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum ScantabError {
    #[error("Flywheel credentials missing or rejected: {0}")]
    Authentication(String),

    #[error("project {0} not found")]
    ProjectNotFound(String),

    #[error("no acquisitions matched the query: {0}")]
    NoResults(String),

    #[error("Flywheel request failed: {0}")]
    Http(String),

    #[error("Flywheel returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
