// ~/vscode-background/src/app.rs
//
// One session: the settings store, where the host lives, and how elevated
// writes happen. The menu and every CLI command go through this.

use std::path::PathBuf;

use serde::Serialize;

use crate::{
    data_loaders::config::{ConfigStore, Setting, UiRegion},
    elevate::Elevator,
    generator::{generate, resolve_images},
    glob_resolver,
    host::HostFiles,
    info,
    patch::{self, Inspection, Outcome, PatchError, PatchState},
    paths::expand_home,
};

/// Result of a reload request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reload {
    NotInstalled,
    /// The installed block already matches the settings; a restart reshuffles.
    Unchanged,
    Applied(Outcome),
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceReport {
    pub source: String,
    pub matches: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegionReport {
    pub region: String,
    pub sources: Vec<SourceReport>,
}

/// Everything `status` shows, in one serializable value.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub settings: PathBuf,
    pub app_root: Option<PathBuf>,
    pub host_error: Option<String>,
    pub state: Option<String>,
    pub checksum_ok: Option<bool>,
    /// Installed block differs from what the current settings generate.
    pub stale: bool,
    pub regions: Vec<RegionReport>,
}

pub struct App {
    pub store: ConfigStore,
    app_root: Option<PathBuf>,
    assume_yes: bool,
    elevator: Box<dyn Elevator>,
}

impl App {
    pub fn new(store: ConfigStore, elevator: Box<dyn Elevator>) -> Self {
        Self {
            store,
            app_root: None,
            assume_yes: false,
            elevator,
        }
    }

    /// Overrides the `appRoot` setting and install discovery.
    pub fn with_app_root(mut self, root: Option<PathBuf>) -> Self {
        self.app_root = root;
        self
    }

    /// Pre-approves elevation prompts.
    pub fn with_assume_yes(mut self, yes: bool) -> Self {
        self.assume_yes = yes;
        self
    }

    pub fn host(&self) -> Result<HostFiles, PatchError> {
        let configured = self.store.get_str(Setting::AppRoot, None);
        let root = self.app_root.clone().or_else(|| {
            let configured = configured.trim();
            (!configured.is_empty()).then(|| PathBuf::from(expand_home(configured)))
        });
        HostFiles::locate(root.as_deref())
    }

    /// Sentinel-wrapped script for the current settings.
    pub fn payload(&self) -> String {
        let config = self.store.snapshot();
        let images = resolve_images(&config);
        generate(&config, &images)
    }

    pub fn inspect(&self) -> Result<(HostFiles, Inspection), PatchError> {
        let host = self.host()?;
        let inspection = patch::inspect(&host)?;
        Ok((host, inspection))
    }

    pub fn status(&self) -> StatusReport {
        let mut report = StatusReport {
            settings: self.store.path().to_path_buf(),
            app_root: None,
            host_error: None,
            state: None,
            checksum_ok: None,
            stale: false,
            regions: Vec::new(),
        };

        match self.inspect() {
            Ok((host, inspection)) => {
                report.app_root = Some(host.app_root);
                report.state = Some(inspection.state.to_string());
                report.checksum_ok = Some(inspection.checksum_matches());
                report.stale = inspection
                    .block
                    .as_deref()
                    .is_some_and(|block| block != self.payload());
            }
            Err(e) => report.host_error = Some(e.to_string()),
        }

        report.regions = UiRegion::ALL
            .into_iter()
            .map(|region| RegionReport {
                region: region.key().to_string(),
                sources: self
                    .store
                    .sources(region)
                    .into_iter()
                    .map(|source| SourceReport {
                        matches: glob_resolver::count(&source),
                        source,
                    })
                    .collect(),
            })
            .collect();

        report
    }

    pub fn is_installed(&self) -> bool {
        self.inspect()
            .map(|(_, i)| i.state == PatchState::Patched)
            .unwrap_or(false)
    }

    pub fn install(&self, approve: impl FnOnce() -> bool) -> Result<Outcome, PatchError> {
        let host = self.host()?;
        host.ensure_backups();
        let payload = self.payload();
        info!("[APP] Installing {} byte payload into {}", payload.len(), host.script.display());
        patch::install(&host, &payload, || self.assume_yes || approve(), self.elevator.as_ref())
    }

    pub fn uninstall(&self, approve: impl FnOnce() -> bool) -> Result<Outcome, PatchError> {
        let host = self.host()?;
        host.ensure_backups();
        info!("[APP] Uninstalling from {}", host.script.display());
        patch::uninstall(&host, || self.assume_yes || approve(), self.elevator.as_ref())
    }

    /// Reinstalls only when something is installed and the settings moved on.
    pub fn reload(&self, approve: impl FnOnce() -> bool) -> Result<Reload, PatchError> {
        let (_, inspection) = self.inspect()?;
        let Some(current) = inspection.block else {
            return Ok(Reload::NotInstalled);
        };

        if current == self.payload() {
            info!("[APP] Installed block is current");
            return Ok(Reload::Unchanged);
        }

        self.install(approve).map(Reload::Applied)
    }
}

#[cfg(test)]
mod tests {
    use std::{fs, path::Path};

    use super::*;
    use crate::elevate::ElevationError;

    struct NoElevation;

    impl Elevator for NoElevation {
        fn move_files(&self, _: &[(PathBuf, PathBuf)]) -> Result<(), ElevationError> {
            Err(ElevationError::Unavailable)
        }
    }

    fn fake_install(dir: &Path) -> PathBuf {
        let root = dir.join("app");
        let workbench = root.join("out").join("vs").join("workbench");
        fs::create_dir_all(&workbench).unwrap();
        fs::write(workbench.join("workbench.desktop.main.js"), "var a;").unwrap();
        fs::write(
            root.join("product.json"),
            "{\n  \"checksums\": {\n    \"vs/workbench/workbench.desktop.main.js\": \"x\"\n  }\n}",
        )
        .unwrap();
        root
    }

    fn app(dir: &Path) -> App {
        let store = ConfigStore::open(&dir.join("settings.yaml")).unwrap();
        App::new(store, Box::new(NoElevation))
    }

    #[test]
    fn app_root_setting_is_used() {
        let dir = tempfile::tempdir().unwrap();
        let root = fake_install(dir.path());
        let mut app = app(dir.path());
        app.store
            .update(Setting::AppRoot, root.to_string_lossy().to_string(), None, true)
            .unwrap();
        assert_eq!(app.host().unwrap().app_root, root);
    }

    #[test]
    fn reload_requires_an_install() {
        let dir = tempfile::tempdir().unwrap();
        let root = fake_install(dir.path());
        let app = app(dir.path()).with_app_root(Some(root));
        assert_eq!(app.reload(|| false).unwrap(), Reload::NotInstalled);
    }

    #[test]
    fn reload_skips_identical_payloads() {
        let dir = tempfile::tempdir().unwrap();
        let root = fake_install(dir.path());
        fs::write(dir.path().join("a.png"), b"a").unwrap();

        let mut app = app(dir.path()).with_app_root(Some(root));
        assert_eq!(app.install(|| false).unwrap(), Outcome::Written);
        assert_eq!(app.reload(|| false).unwrap(), Reload::Unchanged);

        let source = format!("{}/*.png", dir.path().to_string_lossy().replace('\\', "/"));
        app.store.add_sources(UiRegion::Editor, &[source]).unwrap();
        assert_eq!(app.reload(|| false).unwrap(), Reload::Applied(Outcome::Written));
        assert!(app.is_installed());
    }

    #[test]
    fn status_reports_host_errors_and_staleness() {
        let dir = tempfile::tempdir().unwrap();
        let report = app(dir.path()).with_app_root(Some(dir.path().join("missing"))).status();
        assert!(report.host_error.is_some());
        assert_eq!(report.regions.len(), 4);

        let root = fake_install(dir.path());
        let mut app = app(dir.path()).with_app_root(Some(root));
        app.install(|| false).unwrap();
        assert!(!app.status().stale);

        app.store
            .add_sources(UiRegion::Window, &["https://example.com/a.png".to_string()])
            .unwrap();
        let report = app.status();
        assert!(report.stale);
        assert_eq!(report.checksum_ok, Some(true));
        assert_eq!(report.regions[0].sources[0].matches, 1);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["state"], "installed");
    }

    #[test]
    fn install_creates_backups() {
        let dir = tempfile::tempdir().unwrap();
        let root = fake_install(dir.path());
        let app = app(dir.path()).with_app_root(Some(root.clone()));
        app.install(|| false).unwrap();
        assert!(root.join("product-backup.json").is_file());
        let host = app.host().unwrap();
        assert_eq!(fs::read_to_string(host.script_backup()).unwrap(), "var a;");
    }
}
