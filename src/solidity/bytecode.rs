use bytes::{Buf, Bytes};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum BytecodeError {
    #[error("metadata length is not valid hex: {0}")]
    InvalidLength(#[from] hex::FromHexError),
    #[error("bytecode is too short to contain the metadata length")]
    NoLength,
    #[error("metadata of {metadata} hex characters does not fit into {available} available")]
    TooShort { metadata: usize, available: usize },
}

/// Removes the trailing metadata section.
///
/// The last two bytes hold the big-endian length in bytes of the metadata
/// preceding them, so `2 * length + 4` hex characters are cut off.
pub fn strip_metadata(bytecode: &str) -> Result<&str, BytecodeError> {
    let prefix = if bytecode.starts_with("0x") { 2 } else { 0 };
    let length_field = bytecode
        .len()
        .checked_sub(4)
        .filter(|start| *start >= prefix)
        .and_then(|start| bytecode.get(start..))
        .ok_or(BytecodeError::NoLength)?;

    let mut raw = Bytes::from(hex::decode(length_field)?);
    let metadata_length = raw.get_u16() as usize;
    let tail = 2 * metadata_length + 4;

    let available = bytecode.len() - prefix;
    if tail > available {
        return Err(BytecodeError::TooShort {
            metadata: tail,
            available,
        });
    }
    bytecode
        .get(..bytecode.len() - tail)
        .ok_or(BytecodeError::TooShort {
            metadata: tail,
            available,
        })
}

/// Equal-length bytecodes that still differ are typical for contracts with
/// immutable variables, whose values are inlined at fixed offsets.
/// Any other equal-length divergence is a false positive.
pub fn probably_immutables(left: &str, right: &str) -> bool {
    !left.is_empty() && !right.is_empty() && left.len() == right.len() && left != right
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    /// Identical bytecode.
    Full,
    /// Identical once metadata is stripped from both sides.
    Partial,
    ProbablyImmutables,
    Mismatch,
}

fn normalize(bytecode: &str) -> String {
    let bytecode = bytecode.trim().to_lowercase();
    match bytecode.strip_prefix("0x") {
        Some(_) => bytecode,
        None => format!("0x{bytecode}"),
    }
}

/// Classifies recompiled bytecode against the reference one.
///
/// Empty code on either side never matches.
pub fn compare(recompiled: &str, reference: &str) -> MatchType {
    let recompiled = normalize(recompiled);
    let reference = normalize(reference);
    if recompiled == "0x" || reference == "0x" {
        return MatchType::Mismatch;
    }
    if recompiled == reference {
        return MatchType::Full;
    }

    match (strip_metadata(&recompiled), strip_metadata(&reference)) {
        (Ok(left), Ok(right)) if left == right => return MatchType::Partial,
        (Err(err), _) | (_, Err(err)) => {
            tracing::debug!(target: "recompiler", "metadata was not stripped: {}", err)
        }
        _ => {}
    }

    if probably_immutables(&recompiled, &reference) {
        MatchType::ProbablyImmutables
    } else {
        MatchType::Mismatch
    }
}
