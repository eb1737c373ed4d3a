//! Ingestion root file access: index directories, uploads, assets and the
//! processing plan.

use std::path::{Component, Path, PathBuf};

use bytes::Bytes;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::DocQueryService;
use crate::error::{ServiceError, ServiceResult};

const DOWNLOADS_DIR: &str = "downloads";
const OUTPUT_DIR: &str = "outputs";

/// A file stored in an index directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexDocument {
    /// Path relative to the index directory, `/` separated
    pub name: String,
    pub size_bytes: u64,
}

fn storage_error(path: &Path) -> impl FnOnce(std::io::Error) -> ServiceError + '_ {
    move |source| ServiceError::Storage {
        path: path.to_path_buf(),
        source,
    }
}

impl DocQueryService {
    /// Names of the subdirectories of the ingestion root
    pub fn list_indexes(&self) -> ServiceResult<Vec<String>> {
        let root = &self.config.storage.ingestion_root;
        if !root.is_dir() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in std::fs::read_dir(root).map_err(storage_error(root))? {
            let entry = entry.map_err(storage_error(root))?;
            if entry.path().is_dir()
                && let Some(name) = entry.file_name().to_str()
            {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    /// `<root>/<index>/downloads`, created if missing
    pub fn ensure_download_directory(&self, index_name: &str) -> ServiceResult<PathBuf> {
        let dir = self.index_directory(index_name)?.join(DOWNLOADS_DIR);
        std::fs::create_dir_all(&dir).map_err(storage_error(&dir))?;
        Ok(dir)
    }

    /// File names already uploaded for an index
    pub fn list_download_files(&self, index_name: &str) -> ServiceResult<Vec<String>> {
        let dir = self.ensure_download_directory(index_name)?;

        let mut names = Vec::new();
        for entry in std::fs::read_dir(&dir).map_err(storage_error(&dir))? {
            let entry = entry.map_err(storage_error(&dir))?;
            if entry.path().is_file()
                && let Some(name) = entry.file_name().to_str()
            {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Store uploaded files and record the resulting file list in the
    /// index's ingestion status. Returns the stored names.
    pub fn save_uploads(
        &self,
        index_name: &str,
        files: Vec<(String, Bytes)>,
    ) -> ServiceResult<Vec<String>> {
        let dir = self.ensure_download_directory(index_name)?;

        let mut saved = Vec::with_capacity(files.len());
        for (filename, content) in files {
            let name = upload_name(&filename).ok_or_else(|| ServiceError::InvalidRequest {
                message: format!("Invalid upload file name: {filename:?}"),
            })?;
            let path = dir.join(&name);
            std::fs::write(&path, &content).map_err(storage_error(&path))?;
            debug!(index = %index_name, file = %name, bytes = content.len(), "Stored upload");
            saved.push(name);
        }

        let download_files = self.list_download_files(index_name)?;
        self.db.update_ingestion_status(index_name, |status| {
            status.download_files = download_files;
        })?;

        info!(index = %index_name, count = saved.len(), "Uploaded files");
        Ok(saved)
    }

    /// Every file in an index directory except search outputs, or `None` if
    /// the index does not exist
    pub fn index_documents(&self, index_name: &str) -> ServiceResult<Option<Vec<IndexDocument>>> {
        let dir = self.index_directory(index_name)?;
        if !dir.is_dir() {
            return Ok(None);
        }

        let mut documents = Vec::new();
        collect_documents(&dir, &dir, &mut documents)?;
        documents.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(Some(documents))
    }

    /// Map a client-supplied asset path onto the ingestion root.
    ///
    /// A leading `../` stands for the ingestion root. Backslashes are treated
    /// as separators. The result never leaves the root.
    pub fn resolve_asset_path(&self, asset_path: &str) -> ServiceResult<PathBuf> {
        let root = &self.config.storage.ingestion_root;
        let normalized = asset_path.trim().replace('\\', "/");
        let rejected = || ServiceError::InvalidRequest {
            message: format!("Asset path outside the ingestion root: {asset_path:?}"),
        };

        let relative = match normalized.strip_prefix("../") {
            Some(rest) => PathBuf::from(rest),
            None => {
                let path = PathBuf::from(&normalized);
                if path.is_absolute() {
                    path.strip_prefix(root).map_err(|_| rejected())?.to_path_buf()
                } else {
                    path
                }
            }
        };

        if relative.as_os_str().is_empty()
            || relative
                .components()
                .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(rejected());
        }

        Ok(root.join(relative))
    }

    pub fn read_asset_text(&self, asset_path: &str) -> ServiceResult<String> {
        let path = self.resolve_asset_path(asset_path)?;
        std::fs::read_to_string(&path).map_err(|e| missing_or_storage(&path, e))
    }

    pub fn read_asset_bytes(&self, asset_path: &str) -> ServiceResult<Vec<u8>> {
        let path = self.resolve_asset_path(asset_path)?;
        std::fs::read(&path).map_err(|e| missing_or_storage(&path, e))
    }

    pub fn asset_exists(&self, asset_path: &str) -> ServiceResult<bool> {
        let path = self.resolve_asset_path(asset_path)?;
        Ok(path.exists())
    }

    /// Text of the configured processing plan
    pub fn read_processing_plan(&self) -> ServiceResult<String> {
        let path = &self.config.storage.processing_plan;
        std::fs::read_to_string(path).map_err(|e| missing_or_storage(path, e))
    }

    /// Copy the processing plan to `<root>/<index>/<index>.processing_plan.txt`
    pub fn copy_processing_plan(&self, index_name: &str) -> ServiceResult<PathBuf> {
        let plan = self.read_processing_plan()?;
        let dir = self.index_directory(index_name)?;
        std::fs::create_dir_all(&dir).map_err(storage_error(&dir))?;

        let target = dir.join(format!("{index_name}.processing_plan.txt"));
        std::fs::write(&target, plan).map_err(storage_error(&target))?;
        info!(index = %index_name, path = %target.display(), "Copied processing plan");
        Ok(target)
    }
}

/// Stored name for an uploaded file: its base name with spaces replaced
fn upload_name(filename: &str) -> Option<String> {
    let base = filename.rsplit(['/', '\\']).next()?.trim();
    if base.is_empty() || base == "." || base == ".." {
        return None;
    }
    Some(base.replace(' ', "_"))
}

fn missing_or_storage(path: &Path, source: std::io::Error) -> ServiceError {
    if source.kind() == std::io::ErrorKind::NotFound {
        ServiceError::FileNotFound {
            path: path.to_path_buf(),
        }
    } else {
        ServiceError::Storage {
            path: path.to_path_buf(),
            source,
        }
    }
}

fn collect_documents(
    root: &Path,
    dir: &Path,
    documents: &mut Vec<IndexDocument>,
) -> ServiceResult<()> {
    for entry in std::fs::read_dir(dir).map_err(storage_error(dir))? {
        let entry = entry.map_err(storage_error(dir))?;
        let path = entry.path();
        let metadata = match entry.metadata() {
            Ok(m) => m,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping unreadable entry");
                continue;
            }
        };

        if metadata.is_dir() {
            if dir == root && entry.file_name() == OUTPUT_DIR {
                continue;
            }
            collect_documents(root, &path, documents)?;
        } else if metadata.is_file()
            && let Ok(relative) = path.strip_prefix(root)
        {
            let name = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            documents.push(IndexDocument {
                name,
                size_bytes: metadata.len(),
            });
        }
    }
    Ok(())
}
