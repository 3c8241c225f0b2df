// ~/vscode-background/src/paths.rs

use std::path::{Path, PathBuf};

pub const APP_DIR_NAME: &str = "vscode-background";

pub fn user_home_dir() -> Option<PathBuf> {
    if let Some(home) = dirs::home_dir() {
        return Some(home);
    }

    // Fallback for stripped-down Windows environments
    let drive = std::env::var("HOMEDRIVE").ok();
    let path = std::env::var("HOMEPATH").ok();

    match (drive, path) {
        (Some(d), Some(p)) => Some(PathBuf::from(format!("{}{}", d, p))),
        _ => None,
    }
}

/// Directory holding `settings.yaml` and the log file.
pub fn settings_dir() -> PathBuf {
    if let Some(config) = dirs::config_dir() {
        return config.join(APP_DIR_NAME);
    }

    match user_home_dir() {
        Some(home) => home.join(format!(".{APP_DIR_NAME}")),
        None => std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(format!(".{APP_DIR_NAME}")),
    }
}

pub fn default_settings_path() -> PathBuf {
    settings_dir().join("settings.yaml")
}

/// Expands a leading `~/` against the user's home directory.
pub fn expand_home(input: &str) -> String {
    let rest = input
        .strip_prefix("~/")
        .or_else(|| input.strip_prefix("~\\"));

    match (rest, user_home_dir()) {
        (Some(rest), Some(home)) => home.join(rest).to_string_lossy().replace('\\', "/"),
        _ => input.to_string(),
    }
}

/// Well-known `resources/app` directories of a VS Code install.
pub fn candidate_app_roots() -> Vec<PathBuf> {
    let mut roots = Vec::<PathBuf>::new();

    if cfg!(target_os = "windows") {
        if let Ok(local) = std::env::var("LOCALAPPDATA") {
            roots.push(Path::new(&local).join("Programs").join("Microsoft VS Code").join("resources").join("app"));
        }
        for var in ["ProgramFiles", "ProgramFiles(x86)"] {
            if let Ok(base) = std::env::var(var) {
                roots.push(Path::new(&base).join("Microsoft VS Code").join("resources").join("app"));
            }
        }
    } else if cfg!(target_os = "macos") {
        roots.push(PathBuf::from("/Applications/Visual Studio Code.app/Contents/Resources/app"));
        if let Some(home) = user_home_dir() {
            roots.push(home.join("Applications/Visual Studio Code.app/Contents/Resources/app"));
        }
    } else {
        for root in [
            "/usr/share/code/resources/app",
            "/usr/lib/code/resources/app",
            "/opt/visual-studio-code/resources/app",
            "/opt/vscode/resources/app",
            "/snap/code/current/usr/share/code/resources/app",
            "/var/lib/flatpak/app/com.visualstudio.code/current/active/files/extra/vscode/resources/app",
        ] {
            roots.push(PathBuf::from(root));
        }
    }

    roots
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_home_leaves_absolute_paths_alone() {
        assert_eq!(expand_home("/tmp/a.png"), "/tmp/a.png");
        assert_eq!(expand_home("C:/images/*.png"), "C:/images/*.png");
    }

    #[test]
    fn expand_home_replaces_tilde_prefix() {
        let Some(home) = user_home_dir() else {
            return;
        };
        let expanded = expand_home("~/pictures/a.png");
        assert!(expanded.starts_with(&home.to_string_lossy().replace('\\', "/")));
        assert!(expanded.ends_with("pictures/a.png"));
    }

    #[test]
    fn settings_live_under_the_app_dir() {
        assert!(default_settings_path().ends_with(Path::new(APP_DIR_NAME).join("settings.yaml")));
    }
}
