use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("malformed update {line:?}: {reason}")]
    MalformedInput { line: String, reason: String },

    #[error("input ended after {read} of {expected} updates")]
    InputExhausted { read: usize, expected: usize },

    #[error("failed to read update: {0}")]
    Io(#[from] std::io::Error),
}
