// src/errors.rs

use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the tweak engine and its stores.
///
/// Only `NotFound` ever reaches a caller of `TweakEngine::apply`/`probe`; the
/// other variants are folded into report text or `LiveState::Unknown` before
/// they leave the engine.
#[derive(Error, Debug)]
pub enum TweakError {
    #[error("Unknown tweak key: '{0}'")]
    NotFound(String),

    #[error(transparent)]
    OsOperationFailed(#[from] anyhow::Error),

    #[error("Managed state store '{}' is unreadable: {source}", path.display())]
    StoreCorrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize state: {0}")]
    Json(#[from] serde_json::Error),
}

pub type TweakResult<T> = Result<T, TweakError>;

impl TweakError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TweakError::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message_names_key() {
        let err = TweakError::NotFound("nope".to_string());
        assert_eq!(err.to_string(), "Unknown tweak key: 'nope'");
    }

    #[test]
    fn test_os_failure_is_transparent() {
        let err = TweakError::from(anyhow::anyhow!("access denied"));
        assert_eq!(err.to_string(), "access denied");
    }
}
