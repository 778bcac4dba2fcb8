use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MetadataError {
    #[error("documentation comment opened on line {line} is never closed")]
    Unterminated { line: usize },

    #[error("malformed @{tag} tag on line {line}: {reason}")]
    MalformedTag {
        tag: String,
        line: usize,
        reason: String,
    },
}
