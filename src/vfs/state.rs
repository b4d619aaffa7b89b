//! Immutable project state: files, folders, and editor tabs.
//!
//! Every operation borrows the current state and returns a new one. Unknown
//! paths are silent no-ops; the only signalled failure is creating a file on
//! a path that is already taken.

use crate::config::types::VfsError;
use crate::vfs::language::Language;
use crate::vfs::mission::MissionFile;
use indexmap::IndexMap;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One file of the project
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VirtualFile {
    pub id: String,
    pub name: String,
    /// Full path, unique key of the file
    pub path: String,
    pub content: String,
    pub language: Language,
    #[serde(default)]
    pub is_entry: bool,
    /// Content changed since the file was loaded
    #[serde(default)]
    pub is_modified: bool,
}

/// Folder metadata; folders carry no content
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VirtualFolder {
    pub id: String,
    pub name: String,
    pub path: String,
}

/// Project files plus editor state
///
/// Invariants: `active_file`, when set, is one of `open_files`; every open
/// path is a key of `files`; `open_files` holds no duplicates.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FileSystemState {
    files: IndexMap<String, VirtualFile>,
    folders: IndexMap<String, VirtualFolder>,
    open_files: Vec<String>,
    active_file: Option<String>,
}

/// Join a parent path and a file name into a full path
pub fn join_path(parent: &str, name: &str) -> String {
    let parent = parent.trim_end_matches('/');
    if parent.is_empty() {
        format!("/{}", name)
    } else {
        format!("{}/{}", parent, name)
    }
}

/// Parent directory of a full path, `/` for top-level files
pub fn parent_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(idx) => &path[..idx],
    }
}

impl FileSystemState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the initial state for a mission: each file lands at `/<name>`
    /// and the first one becomes the sole open, active tab.
    pub fn from_mission(files: &[MissionFile]) -> Self {
        let mut map = IndexMap::with_capacity(files.len());
        for (index, file) in files.iter().enumerate() {
            let path = join_path("/", &file.name);
            map.insert(
                path.clone(),
                VirtualFile {
                    id: format!("file-{}", index),
                    name: file.name.clone(),
                    path,
                    content: file.content.clone(),
                    language: Language::infer(&file.name),
                    is_entry: file.is_entry,
                    is_modified: false,
                },
            );
        }

        let first = files.first().map(|f| join_path("/", &f.name));
        Self {
            files: map,
            folders: IndexMap::new(),
            open_files: first.iter().cloned().collect(),
            active_file: first,
        }
    }

    pub fn files(&self) -> impl Iterator<Item = &VirtualFile> {
        self.files.values()
    }

    pub fn file(&self, path: &str) -> Option<&VirtualFile> {
        self.files.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn folders(&self) -> impl Iterator<Item = &VirtualFolder> {
        self.folders.values()
    }

    pub fn open_files(&self) -> &[String] {
        &self.open_files
    }

    pub fn active_file(&self) -> Option<&str> {
        self.active_file.as_deref()
    }

    /// File to run: the flagged entry, else the first file of `language`
    pub fn entry_file(&self, language: Language) -> Option<&VirtualFile> {
        self.files
            .values()
            .find(|f| f.is_entry)
            .or_else(|| self.files.values().find(|f| f.language == language))
    }

    /// Create an empty file under `parent` and make it the active tab
    pub fn create_file(&self, name: &str, parent: &str) -> Result<Self, VfsError> {
        let path = join_path(parent, name);
        if self.files.contains_key(&path) {
            return Err(VfsError::DuplicatePath(path));
        }

        let mut next = self.clone();
        next.files.insert(
            path.clone(),
            VirtualFile {
                id: format!("file-{}", Uuid::new_v4()),
                name: name.to_string(),
                path: path.clone(),
                content: String::new(),
                language: Language::infer(name),
                is_entry: false,
                is_modified: false,
            },
        );
        next.open_files.push(path.clone());
        next.active_file = Some(path);
        Ok(next)
    }

    /// Remove a file and its tab; a deleted active tab hands over to the first open tab
    pub fn delete_file(&self, path: &str) -> Self {
        let mut next = self.clone();
        next.files.shift_remove(path);
        next.open_files.retain(|p| p != path);
        if next.active_file.as_deref() == Some(path) {
            next.active_file = next.open_files.first().cloned();
        }
        next
    }

    pub fn update_file(&self, path: &str, content: &str) -> Self {
        let mut next = self.clone();
        if let Some(file) = next.files.get_mut(path) {
            file.content = content.to_string();
            file.is_modified = true;
        }
        next
    }

    /// Rename a file in place within its parent directory.
    ///
    /// The file is re-keyed (it moves to the end of the file order) and its
    /// language is inferred again. Renaming onto another file's path leaves
    /// the state unchanged.
    pub fn rename_file(&self, path: &str, new_name: &str) -> Self {
        let Some(file) = self.files.get(path) else {
            return self.clone();
        };

        let new_path = join_path(parent_of(path), new_name);
        if new_path == path {
            return self.clone();
        }
        if self.files.contains_key(&new_path) {
            warn!("rename {} -> {} refused: target exists", path, new_path);
            return self.clone();
        }

        let renamed = VirtualFile {
            name: new_name.to_string(),
            path: new_path.clone(),
            language: Language::infer(new_name),
            ..file.clone()
        };

        let mut next = self.clone();
        next.files.shift_remove(path);
        next.files.insert(new_path.clone(), renamed);
        for open in next.open_files.iter_mut() {
            if open == path {
                *open = new_path.clone();
            }
        }
        if next.active_file.as_deref() == Some(path) {
            next.active_file = Some(new_path.clone());
        }
        debug!("renamed {} -> {}", path, new_path);
        next
    }

    pub fn open_file(&self, path: &str) -> Self {
        if !self.files.contains_key(path) {
            return self.clone();
        }
        let mut next = self.clone();
        if !next.open_files.iter().any(|p| p == path) {
            next.open_files.push(path.to_string());
        }
        next.active_file = Some(path.to_string());
        next
    }

    /// Close a tab; a closed active tab hands over to its neighbour
    pub fn close_file(&self, path: &str) -> Self {
        let mut next = self.clone();
        let closed_at = self.open_files.iter().position(|p| p == path);
        next.open_files.retain(|p| p != path);

        if self.active_file.as_deref() == Some(path) {
            next.active_file = match (closed_at, next.open_files.len()) {
                (_, 0) => None,
                (Some(idx), len) => next.open_files.get(idx.min(len - 1)).cloned(),
                (None, len) => next.open_files.get(len - 1).cloned(),
            };
        }
        next
    }

    pub fn set_active_file(&self, path: &str) -> Self {
        if !self.files.contains_key(path) || !self.open_files.iter().any(|p| p == path) {
            return self.clone();
        }
        let mut next = self.clone();
        next.active_file = Some(path.to_string());
        next
    }

    pub(crate) fn insert_unopened(&mut self, file: VirtualFile) {
        self.files.insert(file.path.clone(), file);
    }

    pub(crate) fn file_mut(&mut self, path: &str) -> Option<&mut VirtualFile> {
        self.files.get_mut(path)
    }

    pub fn check_invariants(&self) -> Result<(), VfsError> {
        if let Some(active) = &self.active_file {
            if !self.open_files.contains(active) {
                return Err(VfsError::InvariantViolated(format!(
                    "active file {} is not open",
                    active
                )));
            }
        }

        for (idx, open) in self.open_files.iter().enumerate() {
            if !self.files.contains_key(open) {
                return Err(VfsError::InvariantViolated(format!(
                    "open tab {} has no file",
                    open
                )));
            }
            if self.open_files[..idx].contains(open) {
                return Err(VfsError::InvariantViolated(format!(
                    "tab {} is open twice",
                    open
                )));
            }
        }

        for (key, file) in &self.files {
            if key != &file.path {
                return Err(VfsError::InvariantViolated(format!(
                    "file keyed {} reports path {}",
                    key, file.path
                )));
            }
        }

        Ok(())
    }
}
