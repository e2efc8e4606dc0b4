use crate::compiler::{CompilerVersion, FetchError};
use std::time::Duration;
use thiserror::Error;

/// Errors returned by a recompilation.
///
/// Messages are safe to show to untrusted callers: compiler diagnostics and
/// error-stream output are logged, never formatted into the message.
#[derive(Error, Debug)]
pub enum Error {
    #[error("solc not found: {0}")]
    CompilerNotFound(CompilerVersion),
    #[error("error while fetching compiler: {0:#}")]
    Fetch(FetchError),
    #[error("compiler produced no output")]
    Invocation { stderr: Option<String> },
    #[error("compiler did not finish in {0:?}")]
    Timeout(Duration),
    #[error("recompilation failed, probably caused by invalid metadata")]
    InvalidMetadata,
    #[error("invalid input: {0:#}")]
    Input(anyhow::Error),
    #[error("internal error: {0:#}")]
    Internal(anyhow::Error),
}

impl From<FetchError> for Error {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::NotFound(version) => Error::CompilerNotFound(version),
            err => Error::Fetch(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::str::FromStr;

    #[test]
    fn not_found_fetch_error_becomes_compiler_not_found() {
        let version = CompilerVersion::from_str("0.8.9+commit.e5eed63a").unwrap();
        let err = Error::from(FetchError::NotFound(version.clone()));
        assert!(matches!(err, Error::CompilerNotFound(ref v) if v == &version));
        assert_eq!(err.to_string(), "solc not found: v0.8.9+commit.e5eed63a");
    }

    #[test]
    fn invocation_error_hides_stderr() {
        let err = Error::Invocation {
            stderr: Some("Segmentation fault at 0xdeadbeef".to_string()),
        };
        assert_eq!(err.to_string(), "compiler produced no output");
    }
}
