use crate::consts::{MODULE_FILE_EXTENSION, MODULE_FILE_PREFIX, NATIVE_FILE_PREFIX};
use std::{
    fmt::{Display, Formatter},
    str::FromStr,
};
use thiserror::Error;

const LATEST: &str = "latest";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("compiler version is empty")]
    Empty,
    #[error("compiler version contains path components: {0}")]
    PathComponents(String),
}

/// Canonical compiler version token.
///
/// Either `latest` or a value starting with `v`, e.g. `v0.8.9+commit.e5eed63a`.
/// The commit hash is not validated; a malformed token surfaces as a missing
/// compiler later on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CompilerVersion(String);

impl CompilerVersion {
    pub fn is_latest(&self) -> bool {
        self.0 == LATEST
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `major.minor.patch` of a structured token.
    pub fn release(&self) -> Option<semver::Version> {
        if self.is_latest() {
            return None;
        }
        let release = self.0.trim_start_matches('v');
        let end = release.find(['-', '+']).unwrap_or(release.len());
        semver::Version::parse(&release[..end]).ok()
    }

    pub fn native_file_name(&self) -> String {
        format!("{NATIVE_FILE_PREFIX}{}", self.0)
    }

    pub fn module_file_name(&self) -> String {
        format!("{MODULE_FILE_PREFIX}{}{MODULE_FILE_EXTENSION}", self.0)
    }
}

impl Display for CompilerVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CompilerVersion {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ParseError::Empty);
        }
        // the token ends up in file system paths
        if s.contains(['/', '\\']) || s.contains("..") {
            return Err(ParseError::PathComponents(s.to_string()));
        }
        if s == LATEST || s.starts_with('v') {
            Ok(Self(s.to_string()))
        } else {
            Ok(Self(format!("v{s}")))
        }
    }
}
