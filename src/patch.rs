// ~/vscode-background/src/patch.rs
//
// Install and uninstall share one pipeline:
//   script   = strip(read(script)) [+ "\n" + payload]
//   manifest = read(manifest) with the script checksum replaced
// Re-running install is idempotent because the old block is always stripped
// before the new one is appended.

use std::{
    fmt, fs, io,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicUsize, Ordering},
        LazyLock,
    },
};

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};
use md5::{Digest, Md5};
use regex::{Captures, Regex};
use thiserror::Error;

use crate::{
    elevate::{ElevationError, Elevator},
    generator::IDENTIFIER,
    host::HostFiles,
    info,
    utility::file_name_lossy,
    warn,
};

/// Sentinel block plus the newline joining it to the original content.
/// `[\s\S]*?` is non-greedy so the match ends at the first end marker.
static INJECTED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    let id = regex::escape(IDENTIFIER);
    Regex::new(&format!(
        r"(?mi)\n?^/\* {id}-start \*/\r?$[\s\S]*?^/\* {id}-end \*/\r?$"
    ))
    .expect("static regex")
});

#[derive(Debug, Error)]
pub enum PatchError {
    #[error("host file not found: {0}")]
    HostNotFound(PathBuf),
    #[error("failed to {action} {path}: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("checksum field '{0}' not found in manifest")]
    ChecksumField(String),
    #[error("manifest is no longer valid JSON after rewrite: {0}")]
    Manifest(#[from] serde_json::Error),
    #[error("elevated write failed: {0}")]
    Elevation(#[from] ElevationError),
}

fn io_error<'a>(action: &'static str, path: &'a Path) -> impl FnOnce(io::Error) -> PatchError + 'a {
    move |source| PatchError::Io {
        action,
        path: path.to_path_buf(),
        source,
    }
}

/* =========================
   TEXT TRANSFORMS
   ========================= */

/// Removes the injected block; a no-op when none is present.
pub fn strip(content: &str) -> String {
    INJECTED_BLOCK.replace_all(content, "").into_owned()
}

pub fn contains_block(content: &str) -> bool {
    INJECTED_BLOCK.is_match(content)
}

/// The injected block currently in `content`, without the joining newline.
pub fn current_block(content: &str) -> Option<&str> {
    INJECTED_BLOCK
        .find(content)
        .map(|m| m.as_str().trim_start_matches('\n'))
}

pub fn apply_payload(content: &str, payload: &str) -> String {
    format!("{content}\n{payload}")
}

/// Base64 MD5 without padding, as stored in `product.json`.
pub fn checksum(content: &[u8]) -> String {
    STANDARD_NO_PAD.encode(Md5::digest(content))
}

/// Replaces the value of `"<key>": "<value>"`, keeping everything around it.
pub fn rewrite_checksum(manifest: &str, key: &str, checksum: &str) -> Result<String, PatchError> {
    let field = Regex::new(&format!(r#"(?m)^(\s*"{}"\s*:\s*")[^"\r\n]*(")"#, regex::escape(key)))
        .map_err(|_| PatchError::ChecksumField(key.to_string()))?;

    if !field.is_match(manifest) {
        return Err(PatchError::ChecksumField(key.to_string()));
    }

    let rewritten = field
        .replacen(manifest, 1, |caps: &Captures| format!("{}{}{}", &caps[1], checksum, &caps[2]))
        .into_owned();

    let json: serde_json::Value = serde_json::from_str(&rewritten)?;
    if recorded_checksum(&json, key) != Some(checksum) {
        return Err(PatchError::ChecksumField(key.to_string()));
    }
    Ok(rewritten)
}

fn recorded_checksum<'a>(manifest: &'a serde_json::Value, key: &str) -> Option<&'a str> {
    manifest.get("checksums")?.get(key)?.as_str()
}

/* =========================
   STATE MACHINE
   ========================= */

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchState {
    Unpatched,
    PatchPending,
    Patched,
    RestorePending,
}

impl PatchState {
    pub fn detect(content: &str) -> Self {
        if contains_block(content) {
            Self::Patched
        } else {
            Self::Unpatched
        }
    }
}

impl fmt::Display for PatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Unpatched => "not installed",
            Self::PatchPending => "install pending",
            Self::Patched => "installed",
            Self::RestorePending => "uninstall pending",
        };
        f.write_str(label)
    }
}

/// What is on disk right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inspection {
    pub state: PatchState,
    pub block: Option<String>,
    pub checksum: String,
    pub recorded: Option<String>,
}

impl Inspection {
    pub fn checksum_matches(&self) -> bool {
        self.recorded.as_deref() == Some(self.checksum.as_str())
    }
}

pub fn inspect(host: &HostFiles) -> Result<Inspection, PatchError> {
    let script = fs::read_to_string(&host.script).map_err(io_error("read", &host.script))?;
    let manifest = fs::read_to_string(&host.manifest).map_err(io_error("read", &host.manifest))?;
    let json: serde_json::Value = serde_json::from_str(&manifest)?;

    Ok(Inspection {
        state: PatchState::detect(&script),
        block: current_block(&script).map(str::to_string),
        checksum: checksum(script.as_bytes()),
        recorded: recorded_checksum(&json, &host.checksum_key).map(str::to_string),
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Install(String),
    Uninstall,
}

/// Final contents of both host files, computed before anything is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchPlan {
    pub script: String,
    pub manifest: String,
    pub checksum: String,
    pub from: PatchState,
    pub pending: PatchState,
    pub target: PatchState,
}

impl PatchPlan {
    pub fn build(host: &HostFiles, operation: &Operation) -> Result<Self, PatchError> {
        let original = fs::read_to_string(&host.script).map_err(io_error("read", &host.script))?;
        let manifest = fs::read_to_string(&host.manifest).map_err(io_error("read", &host.manifest))?;

        let from = PatchState::detect(&original);
        let stripped = strip(&original);

        let (script, pending, target) = match operation {
            Operation::Install(payload) => (
                apply_payload(&stripped, payload),
                PatchState::PatchPending,
                PatchState::Patched,
            ),
            Operation::Uninstall => (stripped, PatchState::RestorePending, PatchState::Unpatched),
        };

        let checksum = checksum(script.as_bytes());
        let manifest = rewrite_checksum(&manifest, &host.checksum_key, &checksum)?;

        Ok(Self {
            script,
            manifest,
            checksum,
            from,
            pending,
            target,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Both files written directly.
    Written,
    /// Both files moved into place by the elevation helper.
    Elevated,
    /// Elevation was needed and the user said no; nothing changed.
    Declined,
}

pub fn can_write(path: &Path) -> bool {
    fs::OpenOptions::new().append(true).open(path).is_ok()
}

/// How a plan reaches disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Direct,
    Elevated,
}

impl Access {
    pub fn detect(host: &HostFiles) -> Self {
        if can_write(&host.script) && can_write(&host.manifest) {
            Self::Direct
        } else {
            Self::Elevated
        }
    }
}

/// Writes a plan. With [`Access::Elevated`], `approve` decides whether the
/// elevation helper runs at all.
pub fn commit(
    host: &HostFiles,
    plan: &PatchPlan,
    access: Access,
    approve: impl FnOnce() -> bool,
    elevator: &dyn Elevator,
) -> Result<Outcome, PatchError> {
    info!("[PATCH] {} -> {}", plan.from, plan.pending);

    if access == Access::Direct {
        fs::write(&host.script, &plan.script).map_err(io_error("write", &host.script))?;
        // no rollback: a failure here leaves the script and manifest out of sync
        fs::write(&host.manifest, &plan.manifest).map_err(io_error("write", &host.manifest))?;
        info!("[PATCH] {} -> {} (checksum {})", plan.pending, plan.target, plan.checksum);
        return Ok(Outcome::Written);
    }

    warn!("[PATCH] Host files are not writable, elevation required");
    if !approve() {
        info!("[PATCH] Elevation declined, staying {}", plan.from);
        return Ok(Outcome::Declined);
    }

    let moves = stage(host, plan)?;
    elevator.move_files(&moves)?;
    info!("[PATCH] {} -> {} via elevation (checksum {})", plan.pending, plan.target, plan.checksum);
    Ok(Outcome::Elevated)
}

static STAGE_SEQ: AtomicUsize = AtomicUsize::new(0);

/// Writes both contents into the temp directory; returns (staged, target) pairs.
fn stage(host: &HostFiles, plan: &PatchPlan) -> Result<Vec<(PathBuf, PathBuf)>, PatchError> {
    let tmp = std::env::temp_dir();
    let tag = format!("{}-{}", std::process::id(), STAGE_SEQ.fetch_add(1, Ordering::Relaxed));
    let mut moves = Vec::new();

    for (target, content) in [(&host.script, &plan.script), (&host.manifest, &plan.manifest)] {
        let staged = tmp.join(format!("{IDENTIFIER}-{tag}-{}", file_name_lossy(target)));
        fs::write(&staged, content).map_err(io_error("stage", &staged))?;
        moves.push((staged, target.clone()));
    }

    Ok(moves)
}

pub fn install(
    host: &HostFiles,
    payload: &str,
    approve: impl FnOnce() -> bool,
    elevator: &dyn Elevator,
) -> Result<Outcome, PatchError> {
    let plan = PatchPlan::build(host, &Operation::Install(payload.to_string()))?;
    commit(host, &plan, Access::detect(host), approve, elevator)
}

pub fn uninstall(
    host: &HostFiles,
    approve: impl FnOnce() -> bool,
    elevator: &dyn Elevator,
) -> Result<Outcome, PatchError> {
    let plan = PatchPlan::build(host, &Operation::Uninstall)?;
    commit(host, &plan, Access::detect(host), approve, elevator)
}
