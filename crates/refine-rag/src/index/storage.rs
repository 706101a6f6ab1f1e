//! Storage context persistence
//!
//! A storage context is written as three JSON files sharing one snapshot ID.
//! Files are staged in a sibling temp directory and renamed into place, so a
//! reader sees either the old index or the new one.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::error::{Error, Result};

use super::docstore::DocumentStore;
use super::index_store::IndexStore;
use super::vector_store::VectorStoreData;

pub const DOCSTORE_FILE: &str = "docstore.json";
pub const INDEX_STORE_FILE: &str = "index_store.json";
pub const VECTOR_STORE_FILE: &str = "vector_store.json";

/// Bumped whenever the on-disk layout changes
pub const FORMAT_VERSION: u32 = 1;

/// Header wrapped around each persisted store
#[derive(Debug, Serialize, Deserialize)]
struct Envelope<T> {
    format_version: u32,
    snapshot_id: String,
    data: T,
}

/// The three stores that make up a persisted index
#[derive(Debug, Clone, PartialEq)]
pub struct StorageContext {
    pub docstore: DocumentStore,
    pub index_store: IndexStore,
    pub vector_store: VectorStoreData,
}

impl StorageContext {
    pub fn new(docstore: DocumentStore, index_store: IndexStore, vector_store: VectorStoreData) -> Self {
        Self {
            docstore,
            index_store,
            vector_store,
        }
    }

    /// Write the context to `dest`
    ///
    /// Fails with `DestinationExists` when `dest` exists and `overwrite` is
    /// false. With `overwrite`, the previous contents are fully replaced.
    /// When any write fails the previous destination is left as it was.
    pub fn persist(&self, dest: &Path, overwrite: bool) -> Result<()> {
        self.persist_with(dest, overwrite, |dir, snapshot_id| {
            self.write_stores(dir, snapshot_id)
        })
    }

    fn write_stores(&self, dir: &Path, snapshot_id: &str) -> Result<()> {
        write_store(dir, DOCSTORE_FILE, snapshot_id, &self.docstore)?;
        write_store(dir, INDEX_STORE_FILE, snapshot_id, &self.index_store)?;
        write_store(dir, VECTOR_STORE_FILE, snapshot_id, &self.vector_store)
    }

    /// Stage with `write`, then move the staged directory to `dest`
    fn persist_with<F>(&self, dest: &Path, overwrite: bool, write: F) -> Result<()>
    where
        F: FnOnce(&Path, &str) -> Result<()>,
    {
        if dest.exists() && !overwrite {
            return Err(Error::DestinationExists(dest.to_path_buf()));
        }

        let parent = parent_dir(dest);
        fs::create_dir_all(&parent)?;

        let snapshot_id = Uuid::new_v4().to_string();
        let staging = tempfile::Builder::new()
            .prefix(".refine-rag-staging-")
            .tempdir_in(&parent)?;

        write(staging.path(), &snapshot_id)?;
        swap_into_place(staging.path(), dest, &parent, &snapshot_id)?;

        tracing::info!(
            "Persisted {} nodes from {} documents to {} (snapshot {})",
            self.index_store.len(),
            self.docstore.document_count(),
            dest.display(),
            snapshot_id
        );
        Ok(())
    }

    /// Read a context previously written by `persist`
    pub fn load(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            return Err(Error::corrupt_store(dir, "index directory not found"));
        }

        let docstore: Envelope<DocumentStore> = read_store(dir, DOCSTORE_FILE)?;
        let index_store: Envelope<IndexStore> = read_store(dir, INDEX_STORE_FILE)?;
        let vector_store: Envelope<VectorStoreData> = read_store(dir, VECTOR_STORE_FILE)?;

        for (file, snapshot_id) in [
            (INDEX_STORE_FILE, &index_store.snapshot_id),
            (VECTOR_STORE_FILE, &vector_store.snapshot_id),
        ] {
            if *snapshot_id != docstore.snapshot_id {
                return Err(Error::corrupt_store(
                    dir.join(file),
                    format!(
                        "snapshot {} does not match {} snapshot {}",
                        snapshot_id, DOCSTORE_FILE, docstore.snapshot_id
                    ),
                ));
            }
        }

        let context = Self::new(docstore.data, index_store.data, vector_store.data);
        context
            .check_consistency()
            .map_err(|message| Error::corrupt_store(dir, message))?;

        tracing::info!(
            "Loaded index from {} ({} nodes, snapshot {})",
            dir.display(),
            context.index_store.len(),
            docstore.snapshot_id
        );
        Ok(context)
    }

    /// Cross-store checks; returns a description of the first problem
    fn check_consistency(&self) -> std::result::Result<(), String> {
        let dimension = self.vector_store.dimension;

        for node_id in &self.index_store.node_ids {
            if self.docstore.get_node(node_id).is_none() {
                return Err(format!("node {} missing from {}", node_id, DOCSTORE_FILE));
            }
            match self.vector_store.embeddings.get(node_id) {
                None => {
                    return Err(format!("node {} missing from {}", node_id, VECTOR_STORE_FILE));
                }
                Some(e) if e.len() != dimension => {
                    return Err(format!(
                        "node {} has dimension {}, store declares {}",
                        node_id,
                        e.len(),
                        dimension
                    ));
                }
                Some(_) => {}
            }
        }

        if self.vector_store.embeddings.len() != self.index_store.len() {
            return Err(format!(
                "{} holds {} embeddings but the index lists {} nodes",
                VECTOR_STORE_FILE,
                self.vector_store.embeddings.len(),
                self.index_store.len()
            ));
        }

        if let Some(node) = self.docstore.orphan_node() {
            return Err(format!(
                "node {} references unknown document {}",
                node.id, node.document_id
            ));
        }

        Ok(())
    }
}

fn parent_dir(dest: &Path) -> PathBuf {
    match dest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Rename `staging` to `dest`, moving any previous `dest` aside first
///
/// The previous destination is put back when the final rename fails.
fn swap_into_place(staging: &Path, dest: &Path, parent: &Path, snapshot_id: &str) -> Result<()> {
    if !dest.exists() {
        fs::rename(staging, dest)?;
        return Ok(());
    }

    let backup = parent.join(format!(".refine-rag-old-{}", snapshot_id));
    fs::rename(dest, &backup)?;

    if let Err(e) = fs::rename(staging, dest) {
        if let Err(restore) = fs::rename(&backup, dest) {
            tracing::error!(
                "Failed to restore previous index from {}: {}",
                backup.display(),
                restore
            );
        }
        return Err(e.into());
    }

    let removed = if backup.is_dir() {
        fs::remove_dir_all(&backup)
    } else {
        fs::remove_file(&backup)
    };
    if let Err(e) = removed {
        tracing::warn!("Could not remove old index at {}: {}", backup.display(), e);
    }
    Ok(())
}

fn write_store<T: Serialize>(dir: &Path, file: &str, snapshot_id: &str, data: &T) -> Result<()> {
    let envelope = Envelope {
        format_version: FORMAT_VERSION,
        snapshot_id: snapshot_id.to_string(),
        data,
    };
    let json = serde_json::to_string(&envelope)?;
    fs::write(dir.join(file), json)?;
    Ok(())
}

fn read_store<T: DeserializeOwned>(dir: &Path, file: &str) -> Result<Envelope<T>> {
    let path = dir.join(file);
    let raw = fs::read_to_string(&path)
        .map_err(|e| Error::corrupt_store(&path, format!("cannot read: {}", e)))?;
    let envelope: Envelope<T> = serde_json::from_str(&raw)
        .map_err(|e| Error::corrupt_store(&path, format!("cannot parse: {}", e)))?;

    if envelope.format_version != FORMAT_VERSION {
        return Err(Error::corrupt_store(
            &path,
            format!(
                "format version {} is not supported (expected {})",
                envelope.format_version, FORMAT_VERSION
            ),
        ));
    }
    Ok(envelope)
}
