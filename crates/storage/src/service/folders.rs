//! Folder lookup and listing.

use tracing::{debug, warn};

use super::{FOLDERS_COLLECTION, StorageService, decode};
use crate::error::StorageResult;
use crate::models::{Folder, FolderKey, FolderNode, build_folder_tree};

/// Identifies a folder by id or by name. An id takes precedence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FolderLookup {
    pub folder_id: Option<FolderKey>,
    pub folder_name: Option<String>,
}

impl FolderLookup {
    pub fn id(folder_id: impl Into<FolderKey>) -> Self {
        Self {
            folder_id: Some(folder_id.into()),
            folder_name: None,
        }
    }

    pub fn name(folder_name: impl Into<String>) -> Self {
        Self {
            folder_id: None,
            folder_name: Some(folder_name.into()),
        }
    }

    /// Whether either field can select a folder.
    pub fn is_set(&self) -> bool {
        self.folder_id.as_ref().is_some_and(|id| !id.is_empty())
            || self.folder_name.as_deref().is_some_and(|n| !n.is_empty())
    }
}

impl StorageService {
    /// Resolve a folder id.
    ///
    /// An explicit id is returned as-is without checking that it exists. A
    /// name is looked up in the folder collection and the first match wins.
    /// Absence is `None`, never an error.
    pub async fn resolve_folder_id(
        &self,
        lookup: &FolderLookup,
    ) -> StorageResult<Option<FolderKey>> {
        if let Some(id) = lookup.folder_id.as_ref().filter(|id| !id.is_empty()) {
            return Ok(Some(id.clone()));
        }
        let Some(name) = lookup.folder_name.as_deref().filter(|n| !n.is_empty()) else {
            return Ok(None);
        };

        let found = self
            .get_folders()
            .await?
            .into_iter()
            .find(|folder| folder.name == name)
            .map(|folder| folder.id);

        debug!(folder_name = %name, found = found.is_some(), "folder name resolved");
        Ok(found)
    }

    /// Every folder, in store order. Malformed records are skipped.
    pub async fn get_folders(&self) -> StorageResult<Vec<Folder>> {
        let docs = self.documents.list(FOLDERS_COLLECTION).await?;
        Ok(docs
            .into_iter()
            .filter_map(
                |doc| match decode::<Folder>(FOLDERS_COLLECTION, &doc.id, doc.data) {
                    Ok(folder) => Some(folder),
                    Err(e) => {
                        warn!(error = %e, "skipping malformed folder");
                        None
                    }
                },
            )
            .collect())
    }

    /// Folders nested by `parentId`.
    pub async fn get_folder_tree(&self) -> StorageResult<Vec<FolderNode>> {
        Ok(build_folder_tree(self.get_folders().await?))
    }
}
