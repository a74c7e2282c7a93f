//! Media folders.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A folder identifier.
///
/// Current records use strings; legacy records may carry numeric ids, so
/// both are accepted and compared strictly (`"5"` is not `5`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FolderKey {
    Text(String),
    Number(i64),
}

impl FolderKey {
    /// Coerce to the string form used in storage paths and new records.
    pub fn into_text(self) -> Self {
        match self {
            Self::Number(n) => Self::Text(n.to_string()),
            text => text,
        }
    }

    /// Whether this is an empty string id.
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Text(s) if s.is_empty())
    }
}

impl fmt::Display for FolderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Number(n) => write!(f, "{n}"),
        }
    }
}

impl From<&str> for FolderKey {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for FolderKey {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for FolderKey {
    fn from(n: i64) -> Self {
        Self::Number(n)
    }
}

/// A folder record from `fl_folders`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Folder {
    pub id: FolderKey,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<FolderKey>,
}

/// A folder with its nested children.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FolderNode {
    #[serde(flatten)]
    pub folder: Folder,
    pub children: Vec<FolderNode>,
}

/// Nest folders under their `parentId`.
///
/// Folders without a parent, or whose parent is not in the list, become
/// roots. Input order is preserved among siblings.
pub fn build_folder_tree(folders: Vec<Folder>) -> Vec<FolderNode> {
    let known: std::collections::HashSet<FolderKey> =
        folders.iter().map(|f| f.id.clone()).collect();

    let mut roots = Vec::new();
    let mut by_parent: HashMap<FolderKey, Vec<Folder>> = HashMap::new();
    for folder in folders {
        match folder.parent_id.clone() {
            Some(parent) if !parent.is_empty() && parent != folder.id && known.contains(&parent) => {
                by_parent.entry(parent).or_default().push(folder);
            }
            _ => roots.push(folder),
        }
    }

    let mut tree: Vec<FolderNode> = roots
        .into_iter()
        .map(|folder| attach_children(folder, &mut by_parent))
        .collect();

    // Parent cycles never reach a root; surface them at the top level.
    while let Some(parent) = by_parent.keys().next().cloned() {
        for folder in by_parent.remove(&parent).unwrap_or_default() {
            tree.push(attach_children(folder, &mut by_parent));
        }
    }

    tree
}

fn attach_children(folder: Folder, by_parent: &mut HashMap<FolderKey, Vec<Folder>>) -> FolderNode {
    let children = by_parent
        .remove(&folder.id)
        .unwrap_or_default()
        .into_iter()
        .map(|child| attach_children(child, by_parent))
        .collect();
    FolderNode { folder, children }
}
