//! Image attachments
//!
//! An edit session for one record's image. A picked file is validated and
//! staged in memory; nothing touches storage until the record form commits.
//!
//! Stored names are derived from the local time the file was picked:
//!
//! - `Flat`: `YYYYMMDDHHMMSS.<ext>`
//! - `Folder`: `YYYYMMDDHHMMSS/<original file name>`
//!
//! A name already present in storage gets a `-1`, `-2`, ... suffix on the
//! timestamp part.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::Config;

/// Default size ceiling for attached images (3 MiB)
pub const DEFAULT_MAX_IMAGE_BYTES: u64 = 3 * 1024 * 1024;

/// File extensions accepted for attachment (compared case-insensitively)
pub const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "tiff", "bmp", "svg", "webp"];

/// Shown when no image is attached
pub const NO_IMAGE_PLACEHOLDER: &str = "No image selected";

const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// How stored image files are named
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageNaming {
    /// `YYYYMMDDHHMMSS.<ext>`
    #[default]
    Flat,
    /// `YYYYMMDDHHMMSS/<original file name>`
    Folder,
}

/// Errors raised while attaching or storing images
#[derive(Error, Debug)]
pub enum ImageError {
    #[error("'{file_name}' is {size} bytes, larger than the {max} byte limit")]
    TooLarge {
        file_name: String,
        size: u64,
        max: u64,
    },

    #[error("'{file_name}' is not a supported image type (allowed: {})", ALLOWED_EXTENSIONS.join(", "))]
    UnsupportedExtension { file_name: String },

    #[error("Failed to read image '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to save image '{path}': {source}")]
    Write {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to delete image '{path}': {source}")]
    Delete {
        path: String,
        #[source]
        source: io::Error,
    },
}

impl ImageError {
    /// Whether the user can fix this by picking another file
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ImageError::TooLarge { .. } | ImageError::UnsupportedExtension { .. }
        )
    }
}

/// Acceptance rules and naming for attached images
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImagePolicy {
    pub max_bytes: u64,
    pub naming: ImageNaming,
}

impl Default for ImagePolicy {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_IMAGE_BYTES,
            naming: ImageNaming::Flat,
        }
    }
}

impl ImagePolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_bytes: config.max_image_bytes,
            naming: config.image_naming,
        }
    }

    /// Check size and extension of a candidate
    pub fn validate(&self, candidate: &ImageCandidate) -> Result<(), ImageError> {
        let size = candidate.bytes.len() as u64;
        if size > self.max_bytes {
            return Err(ImageError::TooLarge {
                file_name: candidate.file_name.clone(),
                size,
                max: self.max_bytes,
            });
        }
        if candidate.extension().is_none() {
            return Err(ImageError::UnsupportedExtension {
                file_name: candidate.file_name.clone(),
            });
        }
        Ok(())
    }

    /// Stored name for a candidate picked at `at`, before collision handling
    fn base_name(&self, candidate: &ImageCandidate, at: NaiveDateTime, suffix: u32) -> String {
        let mut stamp = at.format(TIMESTAMP_FORMAT).to_string();
        if suffix > 0 {
            stamp = format!("{}-{}", stamp, suffix);
        }
        match self.naming {
            ImageNaming::Flat => {
                let ext = candidate.extension().unwrap_or("img");
                format!("{}.{}", stamp, ext)
            }
            ImageNaming::Folder => format!("{}/{}", stamp, candidate.file_name),
        }
    }

    /// Unused stored name for a candidate picked at `at`
    pub fn stored_name<S: ImageStorage + ?Sized>(
        &self,
        storage: &S,
        candidate: &ImageCandidate,
        at: NaiveDateTime,
    ) -> String {
        let mut suffix = 0;
        loop {
            let name = self.base_name(candidate, at, suffix);
            if !storage.exists(&name) {
                return name;
            }
            suffix += 1;
        }
    }
}

/// A file picked by the user, held in memory until commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageCandidate {
    /// Bare file name as picked, without directories
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl ImageCandidate {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let file_name = Path::new(&file_name)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or(file_name);
        Self { file_name, bytes }
    }

    /// Read a candidate from disk
    ///
    /// The size ceiling is checked against file metadata first, so an
    /// oversized file is never loaded.
    pub fn from_path(path: &Path, policy: &ImagePolicy) -> Result<Self, ImageError> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let metadata = fs::metadata(path).map_err(|source| ImageError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        if metadata.len() > policy.max_bytes {
            return Err(ImageError::TooLarge {
                file_name,
                size: metadata.len(),
                max: policy.max_bytes,
            });
        }

        let bytes = fs::read(path).map_err(|source| ImageError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self { file_name, bytes })
    }

    /// Lowercased extension, if it is an accepted one
    pub fn extension(&self) -> Option<&'static str> {
        let ext = Path::new(&self.file_name).extension()?.to_str()?;
        ALLOWED_EXTENSIONS
            .iter()
            .copied()
            .find(|allowed| allowed.eq_ignore_ascii_case(ext))
    }
}

/// Result of writing an image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    /// Storage-relative path, as saved on the record
    pub path: String,
    /// Location a renderer can load the image from
    pub uri: String,
}

/// Durable image storage addressed by relative path
pub trait ImageStorage {
    fn write(&mut self, path: &str, bytes: &[u8]) -> Result<StoredImage, ImageError>;

    /// Remove an image; removing an absent image is not an error.
    /// In the folder scheme the whole per-upload folder goes.
    fn delete(&mut self, path: &str) -> Result<(), ImageError>;

    fn exists(&self, path: &str) -> bool;

    fn uri(&self, path: &str) -> String;
}

/// Image storage under a directory on disk (`<data_dir>/images`)
#[derive(Debug, Clone)]
pub struct FsImageStorage {
    root: PathBuf,
}

impl FsImageStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.images_dir())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn full_path(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }
}

/// Top-level folder of a folder-scheme path
fn upload_folder(path: &str) -> Option<&str> {
    path.split_once('/').map(|(folder, _)| folder)
}

impl ImageStorage for FsImageStorage {
    fn write(&mut self, path: &str, bytes: &[u8]) -> Result<StoredImage, ImageError> {
        let full = self.full_path(path);
        let write_err = |source| ImageError::Write {
            path: path.to_string(),
            source,
        };

        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        let mut file = File::create(&full).map_err(write_err)?;
        file.write_all(bytes).map_err(write_err)?;
        file.sync_all().map_err(write_err)?;

        Ok(StoredImage {
            path: path.to_string(),
            uri: self.uri(path),
        })
    }

    fn delete(&mut self, path: &str) -> Result<(), ImageError> {
        let result = match upload_folder(path) {
            Some(folder) => fs::remove_dir_all(self.root.join(folder)),
            None => fs::remove_file(self.full_path(path)),
        };
        match result {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(ImageError::Delete {
                path: path.to_string(),
                source,
            }),
        }
    }

    fn exists(&self, path: &str) -> bool {
        self.full_path(path).exists()
    }

    fn uri(&self, path: &str) -> String {
        format!("file://{}", self.full_path(path).display())
    }
}

/// Image storage kept in memory
#[derive(Debug, Default, Clone)]
pub struct MemoryImageStorage {
    files: HashMap<String, Vec<u8>>,
    fail_writes: bool,
    fail_deletes: bool,
}

impl MemoryImageStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail
    pub fn set_fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    /// Make every subsequent delete fail
    pub fn set_fail_deletes(&mut self, fail: bool) {
        self.fail_deletes = fail;
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn bytes(&self, path: &str) -> Option<&[u8]> {
        self.files.get(path).map(Vec::as_slice)
    }
}

impl ImageStorage for MemoryImageStorage {
    fn write(&mut self, path: &str, bytes: &[u8]) -> Result<StoredImage, ImageError> {
        if self.fail_writes {
            return Err(ImageError::Write {
                path: path.to_string(),
                source: io::Error::new(io::ErrorKind::Other, "storage is read-only"),
            });
        }
        self.files.insert(path.to_string(), bytes.to_vec());
        Ok(StoredImage {
            path: path.to_string(),
            uri: self.uri(path),
        })
    }

    fn delete(&mut self, path: &str) -> Result<(), ImageError> {
        if self.fail_deletes {
            return Err(ImageError::Delete {
                path: path.to_string(),
                source: io::Error::new(io::ErrorKind::Other, "storage is read-only"),
            });
        }
        match upload_folder(path) {
            Some(folder) => {
                let prefix = format!("{}/", folder);
                self.files.retain(|name, _| !name.starts_with(&prefix));
            }
            None => {
                self.files.remove(path);
            }
        }
        Ok(())
    }

    fn exists(&self, path: &str) -> bool {
        self.files.contains_key(path)
            || self
                .files
                .keys()
                .any(|name| upload_folder(name) == Some(path))
    }

    fn uri(&self, path: &str) -> String {
        format!("memory://{}", path)
    }
}

/// A validated candidate waiting for commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedImage {
    pub candidate: ImageCandidate,
    /// Name it will be stored under
    pub stored_name: String,
}

/// Outcome of committing an attachment session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommittedImage {
    /// Image path to save on the record
    pub path: Option<String>,
    /// Picked file name, only set when a new image was written
    pub original_name: Option<String>,
    /// Previous image, still on disk until the record is saved
    pub replaced: Option<String>,
}

impl CommittedImage {
    /// Whether this commit wrote a new file
    pub fn is_new(&self) -> bool {
        self.original_name.is_some()
    }
}

/// Image state of one record edit session
#[derive(Debug, Clone)]
pub struct ImageAttachment {
    policy: ImagePolicy,
    initial_path: Option<String>,
    saved_path: Option<String>,
    staged: Option<StagedImage>,
}

impl ImageAttachment {
    /// Start a session for a record currently pointing at `initial_path`
    ///
    /// A path that no longer exists in storage is treated as no image.
    pub fn open<S: ImageStorage + ?Sized>(
        storage: &S,
        policy: ImagePolicy,
        initial_path: Option<&str>,
    ) -> Self {
        let initial_path = match initial_path.filter(|p| !p.is_empty()) {
            Some(path) if storage.exists(path) => Some(path.to_string()),
            Some(path) => {
                warn!(path, "attached image is missing from storage");
                None
            }
            None => None,
        };
        Self {
            policy,
            saved_path: initial_path.clone(),
            initial_path,
            staged: None,
        }
    }

    pub fn policy(&self) -> &ImagePolicy {
        &self.policy
    }

    /// Path currently saved for the record (ignores a staged candidate)
    pub fn saved_path(&self) -> Option<&str> {
        self.saved_path.as_deref()
    }

    pub fn staged(&self) -> Option<&StagedImage> {
        self.staged.as_ref()
    }

    /// Stage a picked file, stamping its name with the current local time
    pub fn select<S: ImageStorage + ?Sized>(
        &mut self,
        storage: &S,
        candidate: ImageCandidate,
    ) -> Result<&StagedImage, ImageError> {
        self.select_at(storage, candidate, Local::now().naive_local())
    }

    /// Stage a picked file as if picked at `at`
    ///
    /// A rejected candidate leaves any previously staged one in place.
    pub fn select_at<S: ImageStorage + ?Sized>(
        &mut self,
        storage: &S,
        candidate: ImageCandidate,
        at: NaiveDateTime,
    ) -> Result<&StagedImage, ImageError> {
        self.policy.validate(&candidate)?;
        let stored_name = self.policy.stored_name(storage, &candidate, at);
        debug!(file = %candidate.file_name, %stored_name, "image staged");

        Ok(self.staged.insert(StagedImage {
            candidate,
            stored_name,
        }))
    }

    /// Whether the session differs from the record's image
    pub fn is_changed(&self) -> bool {
        self.staged.is_some() || self.saved_path != self.initial_path
    }

    /// Drop the staged file and delete the saved one right away
    pub fn clear<S: ImageStorage + ?Sized>(&mut self, storage: &mut S) {
        self.staged = None;
        if let Some(path) = self.saved_path.take() {
            delete_best_effort(storage, &path);
        }
    }

    /// Write the staged file in place of the saved one
    ///
    /// Without a staged file the saved path is returned unchanged. The
    /// replaced image stays in storage: [`finish`](Self::finish) deletes it
    /// once the record points at the new file, [`discard`](Self::discard)
    /// puts it back.
    pub fn commit<S: ImageStorage + ?Sized>(
        &mut self,
        storage: &mut S,
    ) -> Result<CommittedImage, ImageError> {
        let Some(staged) = self.staged.as_ref() else {
            return Ok(CommittedImage {
                path: self.saved_path.clone(),
                original_name: None,
                replaced: None,
            });
        };

        let stored = storage.write(&staged.stored_name, &staged.candidate.bytes)?;

        let replaced = self.saved_path.take().filter(|old| *old != stored.path);

        debug!(path = %stored.path, "image committed");
        self.saved_path = Some(stored.path.clone());

        Ok(CommittedImage {
            path: Some(stored.path),
            original_name: Some(staged.candidate.file_name.clone()),
            replaced,
        })
    }

    /// Settle a commit whose record was saved
    ///
    /// Drops the stage and deletes the replaced image, best effort.
    pub fn finish<S: ImageStorage + ?Sized>(
        &mut self,
        storage: &mut S,
        committed: &CommittedImage,
    ) {
        self.staged = None;
        if let Some(old) = &committed.replaced {
            delete_best_effort(storage, old);
        }
        self.initial_path = self.saved_path.clone();
    }

    /// Roll back a commit whose record could not be saved
    ///
    /// The new file is deleted and the replaced one becomes the saved
    /// image again. The stage is kept so the next commit can retry.
    pub fn discard<S: ImageStorage + ?Sized>(
        &mut self,
        storage: &mut S,
        committed: &CommittedImage,
    ) {
        if !committed.is_new() {
            return;
        }
        if let Some(path) = &committed.path {
            delete_best_effort(storage, path);
            if self.saved_path.as_ref() == Some(path) {
                self.saved_path = committed.replaced.clone();
            }
        }
    }

    /// Name to show next to the picker
    pub fn display_name(&self) -> &str {
        if let Some(staged) = &self.staged {
            return &staged.candidate.file_name;
        }
        match &self.saved_path {
            Some(path) => path.rsplit('/').next().unwrap_or(path),
            None => NO_IMAGE_PLACEHOLDER,
        }
    }
}

/// Delete an image, logging instead of failing
pub fn delete_best_effort<S: ImageStorage + ?Sized>(storage: &mut S, path: &str) {
    if let Err(e) = storage.delete(path) {
        warn!(path, error = %e, "failed to delete image");
    }
}
