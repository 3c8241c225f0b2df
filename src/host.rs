// ~/vscode-background/src/host.rs

use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::{info, patch::PatchError, paths::candidate_app_roots, warn};

/// Workbench bundle, relative to `<app root>/out`; also its key in `product.json`.
pub const SCRIPT_KEY: &str = "vs/workbench/workbench.desktop.main.js";
pub const MANIFEST_NAME: &str = "product.json";

/// Locations of the two host files every patch touches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostFiles {
    pub app_root: PathBuf,
    pub script: PathBuf,
    pub manifest: PathBuf,
    pub checksum_key: String,
}

impl HostFiles {
    /// Host files under a `resources/app` directory; both must exist.
    pub fn at(app_root: &Path) -> Result<Self, PatchError> {
        let script = SCRIPT_KEY
            .split('/')
            .fold(app_root.join("out"), |path, part| path.join(part));
        let manifest = app_root.join(MANIFEST_NAME);

        for path in [&script, &manifest] {
            if !path.is_file() {
                return Err(PatchError::HostNotFound(path.clone()));
            }
        }

        Ok(Self {
            app_root: app_root.to_path_buf(),
            script,
            manifest,
            checksum_key: SCRIPT_KEY.to_string(),
        })
    }

    /// Uses the explicit root when given, otherwise the first well-known install.
    pub fn locate(explicit: Option<&Path>) -> Result<Self, PatchError> {
        if let Some(root) = explicit {
            return Self::at(root);
        }

        let candidates = candidate_app_roots();
        for root in &candidates {
            if let Ok(host) = Self::at(root) {
                info!("[HOST] Found install at {}", root.display());
                return Ok(host);
            }
        }

        warn!("[HOST] No install found among {} candidate(s)", candidates.len());
        Err(PatchError::HostNotFound(
            candidates.into_iter().next().unwrap_or_else(|| PathBuf::from(SCRIPT_KEY)),
        ))
    }

    pub fn script_backup(&self) -> PathBuf {
        backup_path(&self.script)
    }

    pub fn manifest_backup(&self) -> PathBuf {
        backup_path(&self.manifest)
    }

    /// Copies each host file to `<stem>-backup.<ext>` once; existing backups are kept.
    pub fn ensure_backups(&self) -> Vec<PathBuf> {
        let mut created = Vec::new();

        for (file, backup) in [
            (&self.script, self.script_backup()),
            (&self.manifest, self.manifest_backup()),
        ] {
            if backup.exists() {
                continue;
            }
            match fs::copy(file, &backup) {
                Ok(_) => {
                    info!("[HOST] Created backup {}", backup.display());
                    created.push(backup);
                }
                Err(e) => warn!("[HOST] Failed to back up {}: {e}", file.display()),
            }
        }

        created
    }
}

fn backup_path(file: &Path) -> PathBuf {
    let stem = file.file_stem().and_then(|s| s.to_str()).unwrap_or("file");
    let name = match file.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{stem}-backup.{ext}"),
        None => format!("{stem}-backup"),
    };
    file.with_file_name(name)
}
