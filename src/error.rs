use super::document::Status;
use super::field::FieldPath;
use super::hierarchy::Step;
use super::machine::SignatureKind;
use super::validation::Issue;

fn join_paths(paths: &[FieldPath]) -> String {
    paths
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn join_issues(issues: &[Issue]) -> String {
    issues
        .iter()
        .map(|i| format!("{}: {}", i.path, i.message))
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(thiserror::Error, Debug)]
pub enum WorkflowError {
    #[error("these fields are sealed by a recorded signature: {}", join_paths(.0))]
    SealedFields(Vec<FieldPath>),
    #[error("missing required fields: {}", join_issues(.0))]
    Validation(Vec<Issue>),
    #[error("the {0} signature has already been recorded")]
    AlreadySigned(Step),
    #[error("cannot record a {kind:?} signature while the document is {status:?}")]
    InvalidTransition { status: Status, kind: SignatureKind },
    #[error("actor {author} is not authorized to record a {kind:?} signature")]
    Unauthorized { kind: SignatureKind, author: String },
    #[error("document changed concurrently, reload it and retry")]
    Conflict,
    #[error("document {0} not found")]
    NotFound(String),
    #[error(transparent)]
    Storage(#[from] sled::Error),
    #[error("codec failure: {0}")]
    Codec(String),
}
