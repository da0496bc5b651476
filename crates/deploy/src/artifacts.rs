//! Init-bytecode artifacts.
//!
//! Contract compilation is someone else's job: the orchestrator only reads
//! pre-built init bytecode from an artifacts directory, one hex file per
//! component (`<stem>.hex`, with or without a `0x` prefix).

use std::path::{Path, PathBuf};

use alloy_core::primitives::Bytes;

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("failed to read artifact {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("artifact {path} is not valid hex")]
    Malformed {
        path: PathBuf,
        #[source]
        source: hex::FromHexError,
    },

    #[error("artifact {path} is empty")]
    Empty { path: PathBuf },
}

/// Read-only view over a directory of init-bytecode files.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Load the init bytecode for an artifact stem.
    pub fn load(&self, stem: &str) -> Result<Bytes, ArtifactError> {
        let path = self.dir.join(format!("{stem}.hex"));
        let raw = std::fs::read_to_string(&path).map_err(|source| ArtifactError::Read {
            path: path.clone(),
            source,
        })?;
        let cleaned = raw.trim().trim_start_matches("0x");
        if cleaned.is_empty() {
            return Err(ArtifactError::Empty { path });
        }
        let bytecode = hex::decode(cleaned).map_err(|source| ArtifactError::Malformed {
            path: path.clone(),
            source,
        })?;
        Ok(Bytes::from(bytecode))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_load_with_and_without_prefix() {
        let dir = TempDir::new("tangelo-artifacts").expect("Failed to create temp dir");
        std::fs::write(dir.path().join("cbtc.hex"), "0x6080604052\n").unwrap();
        std::fs::write(dir.path().join("cgov.hex"), "60806040").unwrap();

        let store = ArtifactStore::new(dir.path());
        assert_eq!(
            store.load("cbtc").unwrap().to_vec(),
            vec![0x60, 0x80, 0x60, 0x40, 0x52]
        );
        assert_eq!(
            store.load("cgov").unwrap().to_vec(),
            vec![0x60, 0x80, 0x60, 0x40]
        );
    }

    #[test]
    fn test_missing_artifact() {
        let dir = TempDir::new("tangelo-artifacts").expect("Failed to create temp dir");
        let store = ArtifactStore::new(dir.path());
        assert!(matches!(
            store.load("ghost").unwrap_err(),
            ArtifactError::Read { .. }
        ));
    }

    #[test]
    fn test_malformed_and_empty_artifacts() {
        let dir = TempDir::new("tangelo-artifacts").expect("Failed to create temp dir");
        std::fs::write(dir.path().join("bad.hex"), "not hex at all").unwrap();
        std::fs::write(dir.path().join("blank.hex"), "0x\n").unwrap();

        let store = ArtifactStore::new(dir.path());
        assert!(matches!(
            store.load("bad").unwrap_err(),
            ArtifactError::Malformed { .. }
        ));
        assert!(matches!(
            store.load("blank").unwrap_err(),
            ArtifactError::Empty { .. }
        ));
    }
}
