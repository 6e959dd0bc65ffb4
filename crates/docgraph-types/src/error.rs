use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentError {
    #[error("invalid document hash `{0}`: expected 64 hex characters")]
    InvalidHash(String),
    #[error("unknown content value type `{0}`")]
    UnknownContentType(String),
    #[error("content value of type `{kind}` is malformed: {detail}")]
    InvalidContentValue { kind: String, detail: String },
    #[error("document {hash} has no `type` content")]
    MissingType { hash: String },
    #[error("document {hash} has a `type` content of kind `{kind}`")]
    InvalidType { hash: String, kind: &'static str },
}
