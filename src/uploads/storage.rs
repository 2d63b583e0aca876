use axum::body::Body;
use once_cell::sync::Lazy;
use regex::Regex;
use std::{
    collections::HashMap,
    fmt,
    io::ErrorKind,
    path::PathBuf,
};
use tokio::fs as tokio_fs;
use tokio_util::io::ReaderStream;
use tracing::{info, warn};

use crate::middleware::logging::ApiError;
use crate::uploads::form::PendingFile;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum FileExtension {
    Jpg,
    Png,
    Webp,
    Gif,
}

impl FileExtension {
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        allowed_content_types().get(content_type).copied()
    }
}

impl fmt::Display for FileExtension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            FileExtension::Jpg => "jpg",
            FileExtension::Png => "png",
            FileExtension::Webp => "webp",
            FileExtension::Gif => "gif",
        };
        write!(f, "{value}")
    }
}

fn allowed_content_types() -> HashMap<&'static str, FileExtension> {
    HashMap::from([
        ("image/jpeg", FileExtension::Jpg),
        ("image/jpg", FileExtension::Jpg),
        ("image/png", FileExtension::Png),
        ("image/webp", FileExtension::Webp),
        ("image/gif", FileExtension::Gif),
    ])
}

static FILE_NAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]{0,127}$").unwrap());

/// A name we are willing to resolve inside the upload directory.
pub fn is_safe_file_name(name: &str) -> bool {
    FILE_NAME_REGEX.is_match(name) && !name.contains("..")
}

/// Files on disk, keyed by their stored name.
#[derive(Clone, Debug)]
pub struct UploadStore {
    root: PathBuf,
}

impl UploadStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub async fn ensure_dir(&self) -> std::io::Result<()> {
        tokio_fs::create_dir_all(&self.root).await
    }

    pub fn path_for(&self, name: &str) -> Option<PathBuf> {
        is_safe_file_name(name).then(|| self.root.join(name))
    }

    /// Writes the files in order. On failure the ones already written are
    /// removed again.
    pub async fn save_all<'a, I>(&self, files: I) -> Result<Vec<String>, ApiError>
    where
        I: IntoIterator<Item = &'a PendingFile>,
    {
        let mut written: Vec<String> = Vec::new();
        for file in files {
            if let Err(err) = self.save(file).await {
                self.remove_all(&written).await;
                return Err(err);
            }
            written.push(file.file_name.clone());
        }
        Ok(written)
    }

    pub async fn save(&self, file: &PendingFile) -> Result<(), ApiError> {
        let path = self
            .path_for(&file.file_name)
            .ok_or_else(|| ApiError::BadRequest("Invalid file name.".to_string()))?;
        tokio_fs::write(&path, &file.data).await?;
        info!(file = %file.file_name, bytes = file.data.len(), "Stored upload");
        Ok(())
    }

    /// Best-effort: a missing file is fine, other failures are only logged.
    pub async fn remove(&self, name: &str) {
        let Some(path) = self.path_for(name) else {
            warn!(file = name, "Refusing to remove file with unsafe name");
            return;
        };
        match tokio_fs::remove_file(&path).await {
            Ok(_) => info!(file = name, "Deleted image"),
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => warn!(file = name, error = %err, "Error deleting image"),
        }
    }

    pub async fn remove_all<'a, I>(&self, names: I)
    where
        I: IntoIterator<Item = &'a String>,
    {
        for name in names {
            self.remove(name).await;
        }
    }

    /// Opens a stored file as a streaming body with its guessed content type.
    pub async fn open(&self, name: &str) -> Option<(Body, String)> {
        let path = self.path_for(name)?;
        let file = tokio_fs::File::open(&path).await.ok()?;

        let content_type = mime_guess::from_path(&path)
            .first_raw()
            .unwrap_or("application/octet-stream")
            .to_string();

        let stream = ReaderStream::new(file);
        Some((Body::from_stream(stream), content_type))
    }
}
