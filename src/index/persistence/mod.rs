//! On-disk storage for the vector index and its metadata
//!
//! The pair is stored as two linked artifacts:
//!
//! * `vectors-<generation>.bin`: a binary header (magic, format version,
//!   dimension, count, generation id) followed by the packed little-endian
//!   `f32` vectors.
//! * `metadata.json`: the manifest. It records the same format version,
//!   generation id, dimension and count, plus every chunk record in id order.
//!
//! The manifest is replaced by rename only after its vector file is fully
//! written, so the rename is the commit point. A manifest always names a
//! complete vector file of its own generation; any disagreement between the
//! two is reported as corruption rather than silently loaded.


use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use super::{Chunk, FlatIndex, MetadataStore};

/// Newest on-disk format this build reads and the one it writes
pub const FORMAT_VERSION: u32 = 1;

const MANIFEST_FILE: &str = "metadata.json";
const MANIFEST_TEMP_FILE: &str = "metadata.json.tmp";
const VECTOR_FILE_PREFIX: &str = "vectors-";
const VECTOR_FILE_SUFFIX: &str = ".bin";
const VECTOR_MAGIC: &[u8; 4] = b"SDVX";

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("No persisted index found in {}", .0.display())]
    NotFound(PathBuf),

    #[error("Persisted index artifact {} is corrupt: {reason}", .path.display())]
    Corrupt { path: PathBuf, reason: String },

    #[error(
        "Persisted index at {} uses format version {found}, newer than supported version {supported}",
        .path.display()
    )]
    UnsupportedVersion {
        path: PathBuf,
        found: u32,
        supported: u32,
    },

    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("Refusing to save {vectors} vectors with {records} metadata records")]
    Misaligned { vectors: usize, records: usize },

    #[error("Failed to write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to serialize metadata: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// A successfully loaded index/metadata pair
#[derive(Debug, Clone)]
pub struct PersistedIndex {
    pub index: FlatIndex,
    pub metadata: MetadataStore,
    pub generation: Uuid,
    pub saved_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Manifest {
    format_version: u32,
    generation: Uuid,
    dimension: usize,
    count: usize,
    saved_at: DateTime<Utc>,
    records: Vec<Chunk>,
}

#[derive(Debug, Deserialize)]
struct VersionProbe {
    format_version: u32,
}

/// Reads and writes the index pair under one directory
#[derive(Debug, Clone)]
pub struct IndexStore {
    dir: PathBuf,
}

impl IndexStore {
    #[inline]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[inline]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[inline]
    pub fn manifest_path(&self) -> PathBuf {
        self.dir.join(MANIFEST_FILE)
    }

    #[inline]
    pub fn vectors_path(&self, generation: &Uuid) -> PathBuf {
        self.dir.join(format!(
            "{}{}{}",
            VECTOR_FILE_PREFIX, generation, VECTOR_FILE_SUFFIX
        ))
    }

    /// Durably write `index` and `metadata` as a new generation
    #[inline]
    pub fn save(&self, index: &FlatIndex, metadata: &MetadataStore) -> Result<Uuid, SaveError> {
        if index.count() != metadata.len() {
            return Err(SaveError::Misaligned {
                vectors: index.count(),
                records: metadata.len(),
            });
        }

        fs::create_dir_all(&self.dir).map_err(|source| SaveError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let generation = Uuid::new_v4();
        let vectors_path = self.vectors_path(&generation);
        write_vectors(&vectors_path, &generation, index).map_err(|source| SaveError::Io {
            path: vectors_path.clone(),
            source,
        })?;

        let manifest = Manifest {
            format_version: FORMAT_VERSION,
            generation,
            dimension: index.dimension(),
            count: index.count(),
            saved_at: Utc::now(),
            records: metadata.records().to_vec(),
        };

        if let Err(error) = self.commit_manifest(&manifest) {
            // The new vector file is unreferenced; the previous pair is intact
            if let Err(cleanup) = fs::remove_file(&vectors_path) {
                debug!(
                    "Failed to remove orphaned vector file {}: {}",
                    vectors_path.display(),
                    cleanup
                );
            }
            return Err(error);
        }

        self.remove_stale_generations(&generation);

        info!(
            "Saved index generation {} ({} vectors, dimension {}) to {}",
            generation,
            index.count(),
            index.dimension(),
            self.dir.display()
        );
        Ok(generation)
    }

    fn commit_manifest(&self, manifest: &Manifest) -> Result<(), SaveError> {
        let temp_path = self.dir.join(MANIFEST_TEMP_FILE);
        let manifest_path = self.manifest_path();
        let content = serde_json::to_vec(manifest)?;

        write_synced(&temp_path, &content).map_err(|source| SaveError::Io {
            path: temp_path.clone(),
            source,
        })?;

        fs::rename(&temp_path, &manifest_path).map_err(|source| SaveError::Io {
            path: manifest_path,
            source,
        })
    }

    fn remove_stale_generations(&self, current: &Uuid) {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!("Skipping stale vector cleanup: {}", e);
                return;
            }
        };

        let current_name = format!("{}{}{}", VECTOR_FILE_PREFIX, current, VECTOR_FILE_SUFFIX);
        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if name.starts_with(VECTOR_FILE_PREFIX)
                && name.ends_with(VECTOR_FILE_SUFFIX)
                && name != current_name
            {
                if let Err(e) = fs::remove_file(entry.path()) {
                    debug!("Failed to remove stale vector file {}: {}", name, e);
                }
            }
        }
    }

    /// Load the committed pair
    #[inline]
    pub fn load(&self) -> Result<PersistedIndex, LoadError> {
        let manifest_path = self.manifest_path();

        let content = match fs::read(&manifest_path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(LoadError::NotFound(self.dir.clone()));
            }
            Err(source) => {
                return Err(LoadError::Io {
                    path: manifest_path,
                    source,
                });
            }
        };

        let corrupt_manifest = |reason: String| LoadError::Corrupt {
            path: manifest_path.clone(),
            reason,
        };

        let probe: VersionProbe = serde_json::from_slice(&content)
            .map_err(|e| corrupt_manifest(format!("unreadable manifest: {}", e)))?;
        if probe.format_version > FORMAT_VERSION {
            return Err(LoadError::UnsupportedVersion {
                path: manifest_path.clone(),
                found: probe.format_version,
                supported: FORMAT_VERSION,
            });
        }
        if probe.format_version == 0 {
            return Err(corrupt_manifest("format version 0".to_string()));
        }

        let manifest: Manifest = serde_json::from_slice(&content)
            .map_err(|e| corrupt_manifest(format!("unreadable manifest: {}", e)))?;
        if manifest.dimension == 0 {
            return Err(corrupt_manifest("dimension 0".to_string()));
        }
        if manifest.records.len() != manifest.count {
            return Err(corrupt_manifest(format!(
                "manifest declares {} records but holds {}",
                manifest.count,
                manifest.records.len()
            )));
        }

        let vectors_path = self.vectors_path(&manifest.generation);
        let bytes = match fs::read(&vectors_path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(LoadError::Corrupt {
                    path: vectors_path,
                    reason: "vector artifact referenced by manifest is missing".to_string(),
                });
            }
            Err(source) => {
                return Err(LoadError::Io {
                    path: vectors_path,
                    source,
                });
            }
        };

        let index = decode_vectors(&bytes, &manifest).map_err(|reason| LoadError::Corrupt {
            path: vectors_path.clone(),
            reason,
        })?;

        info!(
            "Loaded index generation {} with {} vectors from {}",
            manifest.generation,
            index.count(),
            self.dir.display()
        );

        Ok(PersistedIndex {
            index,
            metadata: MetadataStore::from_records(manifest.records),
            generation: manifest.generation,
            saved_at: manifest.saved_at,
        })
    }
}

fn write_vectors(path: &Path, generation: &Uuid, index: &FlatIndex) -> io::Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    writer.write_all(VECTOR_MAGIC)?;
    writer.write_all(&FORMAT_VERSION.to_le_bytes())?;
    writer.write_all(&dimension_to_u32(index.dimension())?.to_le_bytes())?;
    writer.write_all(&(index.count() as u64).to_le_bytes())?;
    writer.write_all(generation.as_bytes())?;
    for value in index.packed() {
        writer.write_all(&value.to_le_bytes())?;
    }

    let file = writer.into_inner().map_err(io::IntoInnerError::into_error)?;
    file.sync_all()
}

fn write_synced(path: &Path, content: &[u8]) -> io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content)?;
    file.sync_all()
}

fn dimension_to_u32(dimension: usize) -> io::Result<u32> {
    u32::try_from(dimension).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("dimension {} does not fit the vector file header", dimension),
        )
    })
}

fn take<'a>(bytes: &mut &'a [u8], len: usize) -> Option<&'a [u8]> {
    if bytes.len() < len {
        return None;
    }
    let (head, tail) = bytes.split_at(len);
    *bytes = tail;
    Some(head)
}

fn take_u32(bytes: &mut &[u8]) -> Option<u32> {
    take(bytes, 4)?.try_into().ok().map(u32::from_le_bytes)
}

fn take_u64(bytes: &mut &[u8]) -> Option<u64> {
    take(bytes, 8)?.try_into().ok().map(u64::from_le_bytes)
}

fn decode_vectors(bytes: &[u8], manifest: &Manifest) -> Result<FlatIndex, String> {
    let mut rest = bytes;
    let truncated = || "vector artifact header is truncated".to_string();

    if take(&mut rest, VECTOR_MAGIC.len()).ok_or_else(truncated)? != VECTOR_MAGIC {
        return Err("not a vector artifact (bad magic)".to_string());
    }

    let version = take_u32(&mut rest).ok_or_else(truncated)?;
    if version != manifest.format_version {
        return Err(format!(
            "format version {} does not match manifest version {}",
            version, manifest.format_version
        ));
    }

    let dimension = take_u32(&mut rest).ok_or_else(truncated)? as usize;
    let count = take_u64(&mut rest).ok_or_else(truncated)?;
    let generation = take(&mut rest, 16)
        .and_then(|raw| Uuid::from_slice(raw).ok())
        .ok_or_else(truncated)?;

    if generation != manifest.generation {
        return Err(format!(
            "generation {} does not match manifest generation {}",
            generation, manifest.generation
        ));
    }
    if dimension != manifest.dimension {
        return Err(format!(
            "dimension {} does not match manifest dimension {}",
            dimension, manifest.dimension
        ));
    }
    if usize::try_from(count).ok() != Some(manifest.count) {
        return Err(format!(
            "{} vectors do not match {} metadata records",
            count, manifest.count
        ));
    }

    let expected_len = manifest.count * manifest.dimension * 4;
    if rest.len() != expected_len {
        return Err(format!(
            "expected {} bytes of vector data, found {}",
            expected_len,
            rest.len()
        ));
    }

    let data: Vec<f32> = rest
        .chunks_exact(4)
        .map(|raw| {
            let mut buf = [0_u8; 4];
            buf.copy_from_slice(raw);
            f32::from_le_bytes(buf)
        })
        .collect();

    FlatIndex::from_packed(dimension, data).map_err(|e| e.to_string())
}
