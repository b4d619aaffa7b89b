/// Project mounting: copy a VFS snapshot into the runtime's project root
use crate::config::config::SandboxConfig;
use crate::config::types::{MountPolicy, Result, SandboxError};
use crate::observability::metrics::get_metrics;
use crate::runtime::handle::{RuntimeHandle, SessionLease};
use crate::vfs::FileSystemState;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fs;

/// A file the mounter could not write
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MountFailure {
    pub name: String,
    pub reason: String,
}

/// What a mount did
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MountReport {
    /// Bare names written into the project root
    pub written: Vec<String>,
    /// Stale names deleted under [`MountPolicy::Reconcile`]
    pub removed: Vec<String>,
    pub failed: Vec<MountFailure>,
    /// SHA-256 over the mounted names and contents
    pub digest: String,
}

impl MountReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Writes project files flat under the runtime's project root
#[derive(Debug, Clone, Copy)]
pub struct ProjectMounter {
    policy: MountPolicy,
}

impl ProjectMounter {
    pub fn new(policy: MountPolicy) -> Self {
        Self { policy }
    }

    pub fn from_config(config: &SandboxConfig) -> Self {
        Self::new(config.mount_policy)
    }

    pub fn policy(&self) -> MountPolicy {
        self.policy
    }

    /// Mount `state` into `runtime`, waiting for any session in progress
    pub fn mount(&self, runtime: &RuntimeHandle, state: &FileSystemState) -> Result<MountReport> {
        let mut lease = runtime.lease()?;
        self.mount_with(&mut lease, state)
    }

    /// Mount while already holding the session lease.
    ///
    /// Each file is written under its bare name. Per-file failures are
    /// collected in the report; only a missing root or an unusable runtime
    /// abort the mount.
    pub fn mount_with(
        &self,
        lease: &mut SessionLease<'_>,
        state: &FileSystemState,
    ) -> Result<MountReport> {
        let handle = lease.handle();
        let root = handle.project_root();
        fs::create_dir_all(root).map_err(|e| {
            SandboxError::Mount(format!(
                "Failed to create project root {}: {}",
                root.display(),
                e
            ))
        })?;

        let mut report = MountReport::default();
        let mut present = BTreeSet::new();

        for file in state.files() {
            if let Err(reason) = check_mount_name(&file.name) {
                warn!("skipping {}: {}", file.path, reason);
                report.failed.push(MountFailure {
                    name: file.name.clone(),
                    reason,
                });
                continue;
            }
            if present.contains(&file.name) {
                warn!("{} shadows an earlier file with the same name", file.path);
            }

            match fs::write(root.join(&file.name), &file.content) {
                Ok(()) => {
                    present.insert(file.name.clone());
                    report.written.push(file.name.clone());
                }
                Err(e) => {
                    warn!("Failed to write {}: {}", file.name, e);
                    report.failed.push(MountFailure {
                        name: file.name.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        if self.policy == MountPolicy::Reconcile {
            let stale: Vec<String> = lease
                .state()
                .mounted
                .difference(&present)
                .cloned()
                .collect();
            for name in stale {
                match fs::remove_file(root.join(&name)) {
                    Ok(()) => {
                        lease.state_mut().mounted.remove(&name);
                        report.removed.push(name);
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                        lease.state_mut().mounted.remove(&name);
                    }
                    Err(e) => warn!("Failed to remove stale {}: {}", name, e),
                }
            }
        }
        lease.state_mut().mounted.extend(present);

        if !lease.state().path_registered {
            handle
                .call(None, |engine| engine.register_project_path())?
                .map_err(|e| {
                    SandboxError::Mount(format!("Failed to register project root: {}", e))
                })?;
            lease.state_mut().path_registered = true;
            debug!("registered {} on sys.path", root.display());
        }

        report.digest = snapshot_digest(state);

        let metrics = get_metrics();
        metrics.mount_files_written.add(report.written.len() as u64);
        metrics.mount_files_failed.add(report.failed.len() as u64);
        metrics.mount_files_removed.add(report.removed.len() as u64);

        info!(
            "mounted {} files into runtime {} ({} failed, {} removed, digest {})",
            report.written.len(),
            handle.id(),
            report.failed.len(),
            report.removed.len(),
            &report.digest[..12]
        );
        Ok(report)
    }
}

/// Names are written directly under the root, so anything that could
/// address another directory is refused.
fn check_mount_name(name: &str) -> std::result::Result<(), String> {
    if name.is_empty() {
        return Err("empty file name".to_string());
    }
    if name == "." || name == ".." {
        return Err(format!("{:?} is not a file name", name));
    }
    if name.contains('/') || name.contains('\\') || name.contains('\0') {
        return Err(format!("{:?} contains a path separator", name));
    }
    Ok(())
}

/// Fingerprint of the snapshot: SHA-256 over name-sorted (name, content) pairs
pub fn snapshot_digest(state: &FileSystemState) -> String {
    let mut entries: Vec<(&str, &str)> = state
        .files()
        .map(|f| (f.name.as_str(), f.content.as_str()))
        .collect();
    entries.sort();

    let mut hasher = Sha256::new();
    for (name, content) in entries {
        hasher.update(name.as_bytes());
        hasher.update([0u8]);
        hasher.update(content.as_bytes());
        hasher.update([0u8]);
    }
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::MissionFile;

    #[test]
    fn test_mount_name_rules() {
        assert!(check_mount_name("main.py").is_ok());
        assert!(check_mount_name("..hidden.py").is_ok());
        assert!(check_mount_name("").is_err());
        assert!(check_mount_name("..").is_err());
        assert!(check_mount_name("../escape.py").is_err());
        assert!(check_mount_name("dir\\file.py").is_err());
    }

    #[test]
    fn test_digest_ignores_file_order_but_not_content() {
        let a = FileSystemState::from_mission(&[
            MissionFile::new("a.py", "A = 1"),
            MissionFile::new("b.py", "B = 2"),
        ]);
        let b = FileSystemState::from_mission(&[
            MissionFile::new("b.py", "B = 2"),
            MissionFile::new("a.py", "A = 1"),
        ]);
        assert_eq!(snapshot_digest(&a), snapshot_digest(&b));
        assert_eq!(snapshot_digest(&a).len(), 64);

        let changed = a.update_file("/a.py", "A = 3");
        assert_ne!(snapshot_digest(&a), snapshot_digest(&changed));
    }

    #[test]
    fn test_default_policy_from_config_is_accumulate() {
        let mounter = ProjectMounter::from_config(&SandboxConfig::default());
        assert_eq!(mounter.policy(), MountPolicy::Accumulate);
    }
}
