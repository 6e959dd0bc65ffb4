//! Single-file persistence of the whole document cache.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, info};

use docgraph_types::{Document, DocumentHash, Edge};

/// Bumped whenever the on-disk layout changes; older files are rebuilt.
pub const SNAPSHOT_VERSION: u32 = 1;

/// `document type → hashes`, in the order documents were loaded.
pub type TypeIndex = BTreeMap<String, Vec<DocumentHash>>;

/// A cached value with its absolute expiry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expiring<T> {
    pub value: T,
    #[serde(with = "time::serde::timestamp")]
    pub expires_at: OffsetDateTime,
}

impl<T> Expiring<T> {
    pub fn new(value: T, expires_at: OffsetDateTime) -> Self {
        Self { value, expires_at }
    }

    pub fn is_live(&self, now: OffsetDateTime) -> bool {
        self.expires_at > now
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSnapshot {
    pub version: u32,
    pub short_hash_len: usize,
    pub documents: Vec<Expiring<Document>>,
    pub aliases: BTreeMap<String, Expiring<DocumentHash>>,
    pub edges: Vec<Expiring<Edge>>,
    pub type_index: Option<Expiring<TypeIndex>>,
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot `{path}` is unavailable: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("snapshot `{path}` is corrupt: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("snapshot `{path}` could not be encoded: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("snapshot version {found} is not supported")]
    Version { found: u32 },
}

impl SnapshotError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Io { source, .. } if source.kind() == io::ErrorKind::NotFound)
    }
}

#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the snapshot next to its destination, then renames it into place.
    pub fn write(&self, snapshot: &CacheSnapshot) -> Result<(), SnapshotError> {
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent).map_err(|err| SnapshotError::io(&parent, err))?;

        let mut file =
            NamedTempFile::new_in(&parent).map_err(|err| SnapshotError::io(&parent, err))?;
        {
            let mut writer = BufWriter::new(file.as_file_mut());
            serde_json::to_writer(&mut writer, snapshot).map_err(|source| {
                SnapshotError::Encode {
                    path: self.path.clone(),
                    source,
                }
            })?;
            writer
                .flush()
                .map_err(|err| SnapshotError::io(&self.path, err))?;
        }
        file.persist(&self.path)
            .map_err(|err| SnapshotError::io(&self.path, err.error))?;

        info!(
            target = "daoctl::cache::snapshot",
            path = %self.path.display(),
            documents = snapshot.documents.len(),
            edges = snapshot.edges.len(),
            "snapshot written"
        );
        Ok(())
    }

    pub fn read(&self) -> Result<CacheSnapshot, SnapshotError> {
        let file = fs::File::open(&self.path).map_err(|err| SnapshotError::io(&self.path, err))?;
        let snapshot: CacheSnapshot = serde_json::from_reader(BufReader::new(file)).map_err(
            |source| SnapshotError::Decode {
                path: self.path.clone(),
                source,
            },
        )?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::Version {
                found: snapshot.version,
            });
        }

        debug!(
            target = "daoctl::cache::snapshot",
            path = %self.path.display(),
            documents = snapshot.documents.len(),
            "snapshot read"
        );
        Ok(snapshot)
    }
}
