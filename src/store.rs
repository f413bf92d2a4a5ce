// The `store` module files processed attachments into per-category folders.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tokio::fs;
use tracing::info;

use crate::pipeline::classifier::Category;

/// An opaque identifier for a destination folder, as issued by the storage
/// backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderId(pub String);

/// The `StoreError` enum defines the possible errors of the storage backend.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Upload rejected: {0}")]
    Rejected(String),
    #[error("Uploaded file has no name: {}", .0.display())]
    Nameless(PathBuf),
}

/// A document store with named folders.
///
/// `ensure_folder` is idempotent: it returns the existing folder's id or
/// creates the folder first. It is called once per category at startup;
/// failures there are fatal configuration errors, not pipeline failures.
#[async_trait]
pub trait DriveStore: Send + Sync {
    async fn ensure_folder(&self, name: &str) -> Result<FolderId, StoreError>;

    /// Uploads the file at `local_path` into `folder`, returning the name
    /// it was stored under. The local file is left in place; the pipeline
    /// removes it once the upload is confirmed.
    async fn upload(&self, local_path: &Path, folder: &FolderId) -> Result<String, StoreError>;
}

/// Files documents into directories under a local root.
///
/// Stands in for the hosted drive of the original deployment; anything
/// implementing [`DriveStore`] can replace it.
pub struct LocalDriveStore {
    root: PathBuf,
}

impl LocalDriveStore {
    /// Creates a new `LocalDriveStore` rooted at `root`.
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[async_trait]
impl DriveStore for LocalDriveStore {
    async fn ensure_folder(&self, name: &str) -> Result<FolderId, StoreError> {
        let path = self.root.join(name);
        fs::create_dir_all(&path).await?;
        Ok(FolderId(path.to_string_lossy().into_owned()))
    }

    async fn upload(&self, local_path: &Path, folder: &FolderId) -> Result<String, StoreError> {
        let name = local_path
            .file_name()
            .ok_or_else(|| StoreError::Nameless(local_path.to_path_buf()))?
            .to_string_lossy()
            .into_owned();

        let target = Path::new(&folder.0).join(&name);
        fs::copy(local_path, &target).await?;

        info!(target = %target.display(), "Filed document");
        Ok(name)
    }
}

/// The category-to-folder mapping, provisioned once at startup and
/// read-only afterwards.
#[derive(Debug)]
pub struct FolderMap {
    folders: HashMap<Category, FolderId>,
}

impl FolderMap {
    /// Resolves or creates one folder per category.
    ///
    /// Any provisioning failure aborts startup; there is no partial-agent
    /// mode with missing destination folders.
    pub async fn provision(store: &dyn DriveStore) -> Result<Self, StoreError> {
        let mut folders = HashMap::new();
        for category in Category::ALL {
            let id = store.ensure_folder(category.folder_name()).await?;
            info!(category = %category, folder = %id.0, "Provisioned folder");
            folders.insert(category, id);
        }
        Ok(Self { folders })
    }

    /// Looks up the folder for a category. `None` is a configuration error
    /// the caller reports; it never panics.
    pub fn get(&self, category: Category) -> Option<&FolderId> {
        self.folders.get(&category)
    }

    #[cfg(test)]
    pub(crate) fn from_entries(entries: impl IntoIterator<Item = (Category, FolderId)>) -> Self {
        Self {
            folders: entries.into_iter().collect(),
        }
    }
}
