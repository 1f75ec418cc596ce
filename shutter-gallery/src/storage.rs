use std::{
    collections::HashMap,
    io::{Cursor, ErrorKind},
    path::PathBuf,
};

use async_trait::async_trait;
use image::{io::Reader as ImageReader, ImageFormat};
use lazy_static::lazy_static;
use parking_lot::Mutex;
use regex::Regex;
use thiserror::Error;
use tokio::{
    fs::{self, OpenOptions},
    io::AsyncWriteExt,
};

use crate::util::{with_random_suffix, SUFFIX_LENGTH};

/// Longest storage name, the directory included. Matches the width of the image columns.
pub const MAX_NAME_LENGTH: usize = 255;

/// Extensions longer than this are cut along with the rest of the name
const MAX_EXTENSION_LENGTH: usize = 16;

lazy_static! {
    static ref UNSAFE_CHARACTERS: Regex = Regex::new(r"[^A-Za-z0-9._-]+").expect("regex is valid");
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error(
        "Upload a valid image. The file you uploaded was either not an image or a corrupted image."
    )]
    InvalidImage,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A file received from a client
#[derive(Debug, Clone)]
pub struct Upload {
    /// The name the client gave the file
    pub file_name: String,
    pub content_type: Option<String>,
    pub contents: Vec<u8>,
}

/// Checks that the contents are an image in a known format with a readable header
pub fn validate_image(contents: &[u8]) -> Result<ImageFormat, StorageError> {
    if contents.is_empty() {
        return Err(StorageError::InvalidImage);
    }

    let reader = ImageReader::new(Cursor::new(contents))
        .with_guessed_format()
        .map_err(|_| StorageError::InvalidImage)?;

    let format = reader.format().ok_or(StorageError::InvalidImage)?;

    reader
        .into_dimensions()
        .map_err(|_| StorageError::InvalidImage)?;

    Ok(format)
}

/// Strips directories and anything that isn't safe in a path or URL
pub fn sanitize_file_name(file_name: &str) -> String {
    let base = file_name
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or_default();

    let cleaned = UNSAFE_CHARACTERS.replace_all(base, "_");
    let cleaned = cleaned.trim_matches(|c: char| c == '.' || c == '_');

    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Shortens the stem of a sanitized name to at most `max_length` bytes, keeping the extension
fn truncate_file_name(file_name: &str, max_length: usize) -> String {
    if file_name.len() <= max_length {
        return file_name.to_string();
    }

    match file_name.rsplit_once('.') {
        Some((stem, extension))
            if !stem.is_empty()
                && extension.len() <= MAX_EXTENSION_LENGTH
                && extension.len() + 1 < max_length =>
        {
            let stem_length = max_length - extension.len() - 1;
            format!("{}.{}", &stem[..stem_length], extension)
        }
        _ => file_name[..max_length].to_string(),
    }
}

/// A sanitized name that still fits [MAX_NAME_LENGTH] once placed in `directory` and suffixed
fn prepare_file_name(directory: Option<&str>, file_name: &str) -> String {
    let prefix_length = directory.map_or(0, |d| d.len() + 1);
    let budget = MAX_NAME_LENGTH
        .saturating_sub(prefix_length + SUFFIX_LENGTH)
        .max(1);

    truncate_file_name(&sanitize_file_name(file_name), budget)
}

fn storage_name(directory: Option<&str>, file_name: &str) -> String {
    match directory {
        Some(directory) => format!("{directory}/{file_name}"),
        None => file_name.to_string(),
    }
}

fn normalize_base_url(base_url: &str) -> String {
    if base_url.ends_with('/') {
        base_url.to_string()
    } else {
        format!("{base_url}/")
    }
}

/// Somewhere uploaded files are kept and served from
#[async_trait]
pub trait MediaStorage: Send + Sync {
    /// Stores the contents under a free name derived from `file_name`, returning the storage name
    async fn save(
        &self,
        directory: Option<&str>,
        file_name: &str,
        contents: &[u8],
    ) -> Result<String, StorageError>;
    /// Removes a stored file. Missing files are not an error.
    async fn delete(&self, name: &str) -> Result<(), StorageError>;
    /// The public URL of a stored file
    fn url(&self, name: &str) -> String;
}

/// Stores files in a directory on disk
pub struct FileStorage {
    root: PathBuf,
    base_url: String,
}

impl FileStorage {
    pub fn new(root: impl Into<PathBuf>, base_url: &str) -> Self {
        Self {
            root: root.into(),
            base_url: normalize_base_url(base_url),
        }
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }
}

#[async_trait]
impl MediaStorage for FileStorage {
    async fn save(
        &self,
        directory: Option<&str>,
        file_name: &str,
        contents: &[u8],
    ) -> Result<String, StorageError> {
        let file_name = prepare_file_name(directory, file_name);
        let target_dir = match directory {
            Some(directory) => self.root.join(directory),
            None => self.root.clone(),
        };

        fs::create_dir_all(&target_dir).await?;

        let mut candidate = file_name.clone();

        loop {
            let opened = OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(target_dir.join(&candidate))
                .await;

            match opened {
                Ok(mut file) => {
                    file.write_all(contents).await?;
                    file.flush().await?;

                    return Ok(storage_name(directory, &candidate));
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    candidate = with_random_suffix(&file_name);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn delete(&self, name: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.root.join(name)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn url(&self, name: &str) -> String {
        format!("{}{}", self.base_url, name)
    }
}

/// Keeps files in memory, for tests
pub struct MemoryStorage {
    files: Mutex<HashMap<String, Vec<u8>>>,
    base_url: String,
}

impl MemoryStorage {
    pub fn new(base_url: &str) -> Self {
        Self {
            files: Default::default(),
            base_url: normalize_base_url(base_url),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.files.lock().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.files.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.lock().is_empty()
    }
}

#[async_trait]
impl MediaStorage for MemoryStorage {
    async fn save(
        &self,
        directory: Option<&str>,
        file_name: &str,
        contents: &[u8],
    ) -> Result<String, StorageError> {
        let file_name = prepare_file_name(directory, file_name);
        let mut files = self.files.lock();

        let mut name = storage_name(directory, &file_name);
        while files.contains_key(&name) {
            name = storage_name(directory, &with_random_suffix(&file_name));
        }

        files.insert(name.clone(), contents.to_vec());
        Ok(name)
    }

    async fn delete(&self, name: &str) -> Result<(), StorageError> {
        self.files.lock().remove(name);
        Ok(())
    }

    fn url(&self, name: &str) -> String {
        format!("{}{}", self.base_url, name)
    }
}
