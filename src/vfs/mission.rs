//! Mission descriptors and persisted project snapshots.

use crate::config::types::{Result, SandboxError};
use crate::vfs::language::Language;
use crate::vfs::state::{FileSystemState, VirtualFile};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Starter file shipped with a mission
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MissionFile {
    pub name: String,
    pub content: String,
    #[serde(default)]
    pub is_entry: bool,
}

impl MissionFile {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
            is_entry: false,
        }
    }

    pub fn entry(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            is_entry: true,
            ..Self::new(name, content)
        }
    }
}

/// Mission as loaded from disk: starter files and, optionally, the hidden tests
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MissionDescriptor {
    #[serde(default)]
    pub title: Option<String>,
    pub files: Vec<MissionFile>,
    /// Test module source defining `test_*` functions
    #[serde(default)]
    pub tests: Option<String>,
}

impl MissionDescriptor {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            SandboxError::Config(format!(
                "Failed to read mission file {}: {}",
                path.display(),
                e
            ))
        })?;
        serde_json::from_str(&content)
            .map_err(|e| SandboxError::Config(format!("Failed to parse mission JSON: {}", e)))
    }

    pub fn initial_state(&self) -> FileSystemState {
        FileSystemState::from_mission(&self.files)
    }
}

/// Path to content map saved by the persistence layer
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProjectSnapshot {
    pub files: IndexMap<String, String>,
}

impl FileSystemState {
    pub fn snapshot(&self) -> ProjectSnapshot {
        ProjectSnapshot {
            files: self
                .files()
                .map(|f| (f.path.clone(), f.content.clone()))
                .collect(),
        }
    }

    /// Re-apply saved content on top of this state.
    ///
    /// Files whose content differs are marked modified. Paths this state does
    /// not know are added without opening a tab. Tabs are left alone.
    pub fn restore(&self, snapshot: &ProjectSnapshot) -> Self {
        let mut next = self.clone();
        for (path, content) in &snapshot.files {
            if let Some(file) = next.file_mut(path) {
                if &file.content != content {
                    file.content = content.clone();
                    file.is_modified = true;
                }
                continue;
            }

            let name = path.rsplit('/').next().unwrap_or(path).to_string();
            next.insert_unopened(VirtualFile {
                id: format!("file-{}", uuid::Uuid::new_v4()),
                language: Language::infer(&name),
                name,
                path: path.clone(),
                content: content.clone(),
                is_entry: false,
                is_modified: true,
            });
        }
        next
    }
}
