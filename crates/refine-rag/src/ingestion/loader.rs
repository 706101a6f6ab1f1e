//! Directory loader producing `Document`s

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

use crate::config::LoaderConfig;
use crate::error::{Error, Result};
use crate::types::{Document, Metadata};

use super::pdf;

/// Reads every text or PDF file under a directory into a document
pub struct DirectoryLoader {
    config: LoaderConfig,
}

impl DirectoryLoader {
    /// Create a new loader
    pub fn new(config: LoaderConfig) -> Self {
        Self { config }
    }

    /// Load all documents under `input_dir`
    ///
    /// Files are visited in path order. PDFs (by extension or header) go
    /// through text extraction, everything else must be UTF-8. Files that
    /// cannot be read or yield no text are skipped with a warning. Finding
    /// no document at all is an error.
    pub fn load_data(&self, input_dir: &Path) -> Result<Vec<Document>> {
        if !input_dir.is_dir() {
            return Err(Error::loader(input_dir, "not a directory"));
        }

        let files = self.list_files(input_dir)?;
        let mut documents = Vec::with_capacity(files.len());

        for path in &files {
            match self.load_file(input_dir, path) {
                Ok(Some(doc)) => documents.push(doc),
                Ok(None) => tracing::warn!("Skipping blank file {}", path.display()),
                Err(e) => tracing::warn!("Skipping {}", e),
            }
        }

        if documents.is_empty() {
            return Err(Error::loader(input_dir, "no readable documents found"));
        }

        tracing::info!(
            "Loaded {} documents from {} ({} files seen)",
            documents.len(),
            input_dir.display(),
            files.len()
        );
        Ok(documents)
    }

    fn list_files(&self, root: &Path) -> Result<Vec<PathBuf>> {
        let max_depth = if self.config.recursive { usize::MAX } else { 1 };
        let exclude_hidden = self.config.exclude_hidden;

        let mut files = Vec::new();
        let walker = WalkDir::new(root)
            .follow_links(true)
            .max_depth(max_depth)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !(exclude_hidden && e.depth() > 0 && is_hidden(e)));

        for entry in walker {
            let entry = entry.map_err(|e| Error::loader(root, e.to_string()))?;
            if entry.file_type().is_file() && self.extension_allowed(entry.path()) {
                files.push(entry.into_path());
            }
        }

        Ok(files)
    }

    fn extension_allowed(&self, path: &Path) -> bool {
        if self.config.required_exts.is_empty() {
            return true;
        }
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();
        self.config
            .required_exts
            .iter()
            .any(|allowed| allowed.trim_start_matches('.').eq_ignore_ascii_case(&ext))
    }

    fn load_file(&self, root: &Path, path: &Path) -> Result<Option<Document>> {
        let bytes = std::fs::read(path).map_err(|e| Error::loader(path, e.to_string()))?;
        let mut metadata = file_metadata(path);

        let text = if pdf::is_pdf(path, &bytes) {
            let extracted = pdf::extract(path, &bytes)?;
            if let Some(pages) = extracted.pages {
                metadata.insert("total_pages".to_string(), serde_json::json!(pages));
            }
            extracted.text
        } else {
            String::from_utf8(bytes).map_err(|_| Error::loader(path, "not valid UTF-8 text"))?
        };

        if text.trim().is_empty() {
            return Ok(None);
        }

        let relative = path.strip_prefix(root).unwrap_or(path);
        let id = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        Ok(Some(Document::new(id, text, metadata)))
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

fn file_metadata(path: &Path) -> Metadata {
    let mut meta = Metadata::new();
    meta.insert(
        "file_path".to_string(),
        serde_json::json!(path.to_string_lossy()),
    );
    if let Some(name) = path.file_name() {
        meta.insert("file_name".to_string(), serde_json::json!(name.to_string_lossy()));
    }
    if let Some(mime) = mime_guess::from_path(path).first_raw() {
        meta.insert("file_type".to_string(), serde_json::json!(mime));
    }

    if let Ok(fs_meta) = std::fs::metadata(path) {
        meta.insert("file_size".to_string(), serde_json::json!(fs_meta.len()));
        if let Ok(created) = fs_meta.created() {
            let created: DateTime<Utc> = created.into();
            meta.insert(
                "creation_date".to_string(),
                serde_json::json!(created.format("%Y-%m-%d").to_string()),
            );
        }
        if let Ok(modified) = fs_meta.modified() {
            let modified: DateTime<Utc> = modified.into();
            meta.insert(
                "last_modified_date".to_string(),
                serde_json::json!(modified.format("%Y-%m-%d").to_string()),
            );
        }
    }

    meta
}
