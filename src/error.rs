use thiserror::Error;

/// Reasons a framed request cannot be turned into a `Request`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("empty request")]
    Empty,

    #[error("invalid request line: {0}")]
    InvalidRequestLine(String),
}

/// Faults raised by a recording controller while executing a command.
///
/// These are not state rejections (those are checked before a command is
/// issued); they mean the pipeline itself refused or broke.
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("recording pipeline failed: {0}")]
    Pipeline(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
