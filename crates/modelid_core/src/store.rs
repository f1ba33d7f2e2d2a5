//! Model file lifecycle.
//!
//! A [`ModelFile`] owns the open handle of the model JSON file for the whole
//! run and holds an exclusive advisory lock on it:
//!
//! ```text
//! load_or_create ──> reconcile (in memory) ──> write ──> close
//! ```
//!
//! A second run against the same file fails at `load_or_create` with
//! `ModelLocked` instead of interleaving writes. The lock is released when
//! the `ModelFile` is closed or dropped, on error paths included.
//!
//! Read-only callers use [`ModelFile::load_document`], which takes a shared
//! lock and never creates or writes the file.
//!
//! Writes truncate the file and rewrite it in place. This is not atomic: a
//! crash between truncation and the completed write leaves an empty or
//! partial file. Renaming a temp file over the model would swap the inode
//! that the lock is held on.

use crate::binding::Binding;
use crate::config::Config;
use crate::error::{ModelError, ModelResult};
use crate::model::ModelDocument;
use crate::reconcile::{ReconcileReport, Reconciler};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// An open, locked model file and its document.
///
/// # Example
///
/// ```rust,ignore
/// use modelid_core::{Config, ModelFile, Reconciler};
///
/// let mut file = ModelFile::load_or_create(Path::new("model.json"), &Config::default())?;
/// Reconciler::new(file.document_mut()).reconcile(&mut binding)?;
/// file.write()?;
/// file.close()?;
/// ```
#[derive(Debug)]
pub struct ModelFile {
    /// Path of the model file.
    path: PathBuf,
    /// Open handle; holds the exclusive lock.
    file: File,
    /// The loaded document.
    document: ModelDocument,
    /// Whether to fsync after writing.
    sync_on_write: bool,
    /// Whether a write completed since loading.
    written: bool,
}

impl ModelFile {
    /// Opens and locks the model file at `path`, creating it if missing.
    ///
    /// A missing or empty file yields an empty model that is written to disk
    /// right away, so the next run finds a valid file.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file doesn't exist and `create_if_missing` is false
    /// - Another process holds the lock (returns `ModelLocked`)
    /// - The file cannot be parsed or fails validation
    /// - The model was written by a newer version
    /// - I/O errors occur
    pub fn load_or_create(path: &Path, config: &Config) -> ModelResult<Self> {
        if !config.create_if_missing && !path.exists() {
            return Err(ModelError::invalid_operation(format!(
                "model file does not exist: {}",
                path.display()
            )));
        }

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        if file.try_lock_exclusive().is_err() {
            return Err(ModelError::ModelLocked {
                path: path.display().to_string(),
            });
        }

        let mut data = Vec::new();
        file.read_to_end(&mut data)?;

        let mut model = Self {
            path: path.to_path_buf(),
            file,
            document: ModelDocument::new(),
            sync_on_write: config.sync_on_write,
            written: false,
        };

        match parse_document(path, &data)? {
            Some(document) => model.document = document,
            None => {
                info!(path = %path.display(), "creating new model file");
                model.write()?;
            }
        }
        Ok(model)
    }

    /// Loads the model at `path` read-only. The file is never created or
    /// written.
    ///
    /// A missing or empty file yields an empty model in memory. The file is
    /// read under a shared lock, so a concurrent writer holding the exclusive
    /// lock is reported as `ModelLocked`.
    ///
    /// # Errors
    ///
    /// Same as [`ModelFile::load_or_create`], except that nothing is written.
    pub fn load_document(path: &Path, config: &Config) -> ModelResult<ModelDocument> {
        if !path.exists() {
            if !config.create_if_missing {
                return Err(ModelError::invalid_operation(format!(
                    "model file does not exist: {}",
                    path.display()
                )));
            }
            debug!(path = %path.display(), "model file missing, using an empty model");
            return Ok(ModelDocument::new());
        }

        let mut file = File::open(path)?;
        if file.try_lock_shared().is_err() {
            return Err(ModelError::ModelLocked {
                path: path.display().to_string(),
            });
        }

        let mut data = Vec::new();
        let read = file.read_to_end(&mut data);
        FileExt::unlock(&file)?;
        read?;

        Ok(parse_document(path, &data)?.unwrap_or_else(ModelDocument::new))
    }

    /// Returns the path to the model file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the loaded document.
    #[must_use]
    pub fn document(&self) -> &ModelDocument {
        &self.document
    }

    /// Returns the loaded document for reconciliation.
    pub fn document_mut(&mut self) -> &mut ModelDocument {
        &mut self.document
    }

    /// Returns true if a write completed since loading.
    #[must_use]
    pub fn is_written(&self) -> bool {
        self.written
    }

    /// Rewrites the file with the current document.
    ///
    /// Validates the document first, then truncates the file, writes the
    /// indented JSON at offset zero and syncs.
    pub fn write(&mut self) -> ModelResult<()> {
        self.document.validate()?;
        let data = serde_json::to_vec_pretty(&self.document)?;

        self.file.set_len(0)?;
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&data)?;
        self.file.flush()?;
        if self.sync_on_write {
            self.file.sync_all()?;
        }

        self.written = true;
        debug!(path = %self.path.display(), bytes = data.len(), "wrote model file");
        Ok(())
    }

    /// Releases the lock and closes the file.
    ///
    /// Refused unless a write completed since loading; dropping the
    /// `ModelFile` discards the in-memory changes instead.
    pub fn close(self) -> ModelResult<()> {
        if !self.written {
            return Err(ModelError::invalid_operation(format!(
                "model file {} closed before a successful write",
                self.path.display()
            )));
        }
        FileExt::unlock(&self.file)?;
        Ok(())
    }
}

/// Parses and checks model file contents. Blank contents yield `None`.
fn parse_document(path: &Path, data: &[u8]) -> ModelResult<Option<ModelDocument>> {
    if data.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }

    let mut document: ModelDocument =
        serde_json::from_slice(data).map_err(|source| ModelError::Unreadable {
            path: path.display().to_string(),
            source,
        })?;
    document.backfill_legacy_version();
    document.fill_missing();
    document.check_version()?;
    document.validate()?;

    debug!(
        path = %path.display(),
        entities = document.entities.len(),
        version = document.model_version,
        "loaded model file"
    );
    Ok(Some(document))
}

/// Runs one full generator cycle against the model file at `path`.
///
/// Loads and locks the file, reconciles `binding` into it, and only if that
/// succeeds writes and closes the file. Resolved identities are written back
/// into `binding`.
pub fn reconcile_file(
    path: &Path,
    binding: &mut Binding,
    config: &Config,
) -> ModelResult<ReconcileReport> {
    let mut file = ModelFile::load_or_create(path, config)?;

    let report = Reconciler::new(file.document_mut())
        .with_config(config)
        .reconcile(binding)?;

    file.write()?;
    file.close()?;

    info!(path = %path.display(), ?report, "model updated");
    Ok(report)
}
