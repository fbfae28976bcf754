//! Where simulated users get their bearer credentials.
//!
//! Minting tokens belongs to the deployment; the engine only asks a
//! [`TokenSource`] for one opaque string per user.

use crate::error::{MonkeyError, Result};
use std::path::Path;

pub trait TokenSource: Send + Sync {
    fn token_for(&self, username: &str, uidnumber: u64) -> Result<String>;
}

/// Hands every user the same token.
pub struct StaticTokenSource {
    token: String,
}

impl StaticTokenSource {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    /// Reads the token from a file once, trimming surrounding whitespace.
    pub fn from_file(path: &Path) -> Result<Self> {
        let token = std::fs::read_to_string(path).map_err(|e| {
            MonkeyError::Credential(format!("cannot read token file {}: {}", path.display(), e))
        })?;
        let token = token.trim();
        if token.is_empty() {
            return Err(MonkeyError::Credential(format!(
                "token file {} is empty",
                path.display()
            )));
        }
        Ok(Self::new(token))
    }
}

impl TokenSource for StaticTokenSource {
    fn token_for(&self, _username: &str, _uidnumber: u64) -> Result<String> {
        Ok(self.token.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn static_source_ignores_identity() {
        let source = StaticTokenSource::new("abc");
        assert_eq!(source.token_for("a", 1).unwrap(), "abc");
        assert_eq!(source.token_for("b", 2).unwrap(), "abc");
    }

    #[test]
    fn file_source_trims_newline() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("token");
        fs::write(&path, "gt-secret\n").unwrap();

        let source = StaticTokenSource::from_file(&path).unwrap();
        assert_eq!(source.token_for("u", 1).unwrap(), "gt-secret");
    }

    #[test]
    fn file_source_rejects_missing_and_empty() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing");
        assert!(matches!(
            StaticTokenSource::from_file(&missing),
            Err(MonkeyError::Credential(_))
        ));

        let empty = dir.path().join("empty");
        fs::write(&empty, "  \n").unwrap();
        assert!(matches!(
            StaticTokenSource::from_file(&empty),
            Err(MonkeyError::Credential(_))
        ));
    }
}
