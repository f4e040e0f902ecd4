//! Error types shared by the level loader and the solver.
//!
//! Loading problems surface as [`LevelError`]. Solving never returns `Err`:
//! a failed solve is reported inside [`crate::solver::SolveResult`] with a
//! [`FailureReason`], whose `Display` text is the human readable failure reason.

use serde::{Serialize, Serializer};
use std::path::PathBuf;

/// Errors raised while reading or building a level definition.
#[derive(Debug, thiserror::Error)]
pub enum LevelError {
    #[error("failed to read level file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid level JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("level definition has no containers")]
    Empty,
    #[error("bad container notation in container {container}: {message}")]
    Notation { container: usize, message: String },
}

/// Why a solve attempt ended without clearing the board.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum FailureReason {
    #[error("Failed to initialize state")]
    InitializationFailed,
    #[error("No valid moves. {items_remaining} items remaining.")]
    Stuck { items_remaining: usize },
    #[error("Max moves exceeded ({cap})")]
    MoveCapExceeded { cap: u32 },
    #[error("Cancelled with {items_remaining} items remaining")]
    Cancelled { items_remaining: usize },
}

impl Serialize for FailureReason {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_reason_messages() {
        assert_eq!(
            FailureReason::Stuck { items_remaining: 4 }.to_string(),
            "No valid moves. 4 items remaining."
        );
        assert_eq!(
            FailureReason::MoveCapExceeded { cap: 500 }.to_string(),
            "Max moves exceeded (500)"
        );
    }

    #[test]
    fn test_failure_reason_serializes_as_message() {
        let json = serde_json::to_string(&FailureReason::InitializationFailed).unwrap();
        assert_eq!(json, "\"Failed to initialize state\"");
    }
}
