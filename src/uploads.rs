use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Mutex,
};

use anyhow::Context;
use async_trait::async_trait;
use axum::extract::Multipart;
use bytes::Bytes;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{config::UploadConfig, error::AppError, validation::FieldError};

/// Request body cap for routes that accept file uploads.
pub const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// A file field received in a multipart form.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub body: Bytes,
}

/// Writes uploaded files somewhere public and hands back the path to store on
/// the entity.
#[async_trait]
pub trait UploadStore: Send + Sync {
    async fn save(&self, prefix: &str, file: UploadedFile) -> anyhow::Result<String>;
    async fn remove(&self, public_path: &str) -> anyhow::Result<()>;
}

/// Local filesystem writer.
#[derive(Clone)]
pub struct LocalUploads {
    dir: PathBuf,
    public_prefix: String,
}

impl LocalUploads {
    pub fn new(cfg: &UploadConfig) -> Self {
        Self {
            dir: PathBuf::from(&cfg.dir),
            public_prefix: cfg.public_prefix.trim_end_matches('/').to_string(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl UploadStore for LocalUploads {
    async fn save(&self, prefix: &str, file: UploadedFile) -> anyhow::Result<String> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("create upload dir {}", self.dir.display()))?;
        let name = stored_name(prefix, &file);
        let path = self.dir.join(&name);
        tokio::fs::write(&path, &file.body)
            .await
            .with_context(|| format!("write upload {}", path.display()))?;
        debug!(path = %path.display(), bytes = file.body.len(), "upload stored");
        Ok(format!("{}/{}", self.public_prefix, name))
    }

    async fn remove(&self, public_path: &str) -> anyhow::Result<()> {
        let Some(name) = public_path
            .strip_prefix(&self.public_prefix)
            .and_then(|rest| Path::new(rest).file_name())
        else {
            warn!(public_path, "refusing to remove path outside upload prefix");
            return Ok(());
        };
        match tokio::fs::remove_file(self.dir.join(name)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("remove upload {public_path}")),
        }
    }
}

/// Keeps uploads in memory; used with the in-memory store.
#[derive(Default)]
pub struct MemoryUploads {
    files: Mutex<HashMap<String, Bytes>>,
}

impl MemoryUploads {
    pub fn contains(&self, public_path: &str) -> bool {
        self.files
            .lock()
            .map(|f| f.contains_key(public_path))
            .unwrap_or(false)
    }
}

#[async_trait]
impl UploadStore for MemoryUploads {
    async fn save(&self, prefix: &str, file: UploadedFile) -> anyhow::Result<String> {
        let path = format!("/uploads/{}", stored_name(prefix, &file));
        self.files
            .lock()
            .map_err(|_| anyhow::anyhow!("upload map poisoned"))?
            .insert(path.clone(), file.body);
        Ok(path)
    }

    async fn remove(&self, public_path: &str) -> anyhow::Result<()> {
        self.files
            .lock()
            .map_err(|_| anyhow::anyhow!("upload map poisoned"))?
            .remove(public_path);
        Ok(())
    }
}

fn stored_name(prefix: &str, file: &UploadedFile) -> String {
    let ext = ext_from_name(&file.file_name)
        .or_else(|| file.content_type.as_deref().and_then(ext_from_mime))
        .unwrap_or_else(|| "bin".into());
    format!("{}-{}.{}", prefix, Uuid::new_v4(), ext)
}

fn ext_from_name(name: &str) -> Option<String> {
    let ext = Path::new(name).extension()?.to_str()?.to_ascii_lowercase();
    let ok = !ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric());
    ok.then_some(ext)
}

fn ext_from_mime(ct: &str) -> Option<String> {
    let ext = match ct {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        "image/gif" => "gif",
        "video/mp4" => "mp4",
        "video/webm" => "webm",
        _ => return None,
    };
    Some(ext.to_string())
}

/// Text fields and files of a multipart form.
#[derive(Debug, Default)]
pub struct FormData {
    fields: HashMap<String, String>,
    files: HashMap<String, UploadedFile>,
}

impl FormData {
    pub async fn read(mut mp: Multipart) -> Result<Self, AppError> {
        let mut form = FormData::default();
        loop {
            let field = match mp.next_field().await {
                Ok(Some(field)) => field,
                Ok(None) => break,
                Err(e) => return Err(body_error(e.body_text())),
            };
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let content_type = field.content_type().map(str::to_string);
                    let body = field.bytes().await.map_err(|e| body_error(e.body_text()))?;
                    if !body.is_empty() {
                        form.files.insert(
                            name,
                            UploadedFile {
                                file_name,
                                content_type,
                                body,
                            },
                        );
                    }
                }
                None => {
                    let value = field.text().await.map_err(|e| body_error(e.body_text()))?;
                    form.fields.insert(name, value);
                }
            }
        }
        Ok(form)
    }

    /// Trimmed text value; blank counts as absent.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn text_or_empty(&self, name: &str) -> String {
        self.text(name).unwrap_or_default().to_string()
    }

    pub fn take_file(&mut self, name: &str) -> Option<UploadedFile> {
        self.files.remove(name)
    }
}

fn body_error(constraint: String) -> AppError {
    AppError::Validation(vec![FieldError {
        field: "body",
        constraint,
    }])
}
