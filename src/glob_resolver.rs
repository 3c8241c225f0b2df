// ~/vscode-background/src/glob_resolver.rs

use std::{
    borrow::Cow,
    fs,
    path::{Path, PathBuf},
};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::ImageFormat;

use crate::{
    debug,
    paths::expand_home,
    sources::{is_https, is_url},
    warn,
};

pub const EXTENSIONS: [&str; 7] = ["png", "jpg", "jpeg", "webp", "gif", "bmp", "svg"];

/// Scheme the workbench serves local files through.
const APP_FILE_SCHEME: &str = "vscode-file://vscode-app/";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Reference {
    #[default]
    FileUrl,
    DataUri,
}

pub fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| EXTENSIONS.iter().any(|e| e.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

/// Image files matched by one non-URL source, sorted.
pub fn matches(source: &str) -> Vec<PathBuf> {
    let pattern = file_pattern(&expand_home(source.trim()));
    let entries = match glob::glob(&pattern) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("[GLOB] Invalid pattern {}: {}", pattern, e);
            return Vec::new();
        }
    };

    let mut files: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .filter(|p| p.is_file() && is_image(p))
        .collect();
    files.sort();
    files.dedup();
    files
}

/// `glob` only yields directories for a trailing `**`; folder sources mean every file below.
fn file_pattern(pattern: &str) -> String {
    if pattern == "**" || pattern.ends_with("/**") {
        format!("{pattern}/*")
    } else {
        pattern.to_string()
    }
}

/// Number of images a source stands for; an HTTPS URL counts as one.
pub fn count(source: &str) -> usize {
    if is_url(source) {
        usize::from(is_https(source))
    } else {
        matches(source).len()
    }
}

/// Expands sources into quoted JS string literals, in source order.
pub fn resolve(sources: &[String], reference: Reference) -> Vec<String> {
    let mut resolved = Vec::<String>::new();

    for source in sources {
        if is_url(source) {
            if is_https(source) {
                resolved.push(js_string(source.trim()));
            } else {
                warn!("[GLOB] Skipping {}, images must be served over HTTPS", source.trim());
            }
            continue;
        }

        let files = matches(source);
        debug!("[GLOB] {} -> {} file(s)", source, files.len());
        for file in files {
            let literal = match reference {
                Reference::FileUrl => Some(file_url(&file)),
                Reference::DataUri => data_uri(&file),
            };
            if let Some(literal) = literal {
                resolved.push(js_string(&literal));
            }
        }
    }

    resolved
}

pub fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

pub fn mime_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    if ext == "svg" {
        return "image/svg+xml";
    }

    ImageFormat::from_extension(&ext)
        .map(|format| format.to_mime_type())
        .unwrap_or("application/octet-stream")
}

pub fn file_url(path: &Path) -> String {
    let normalized = path.to_string_lossy().replace('\\', "/");
    let encoded = normalized
        .trim_start_matches('/')
        .split('/')
        .enumerate()
        .map(|(i, segment)| {
            if i == 0 && is_drive(segment) {
                Cow::Borrowed(segment)
            } else {
                urlencoding::encode(segment)
            }
        })
        .collect::<Vec<_>>()
        .join("/");
    format!("{APP_FILE_SCHEME}{encoded}")
}

fn is_drive(segment: &str) -> bool {
    let bytes = segment.as_bytes();
    bytes.len() == 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

fn data_uri(path: &Path) -> Option<String> {
    match fs::read(path) {
        Ok(bytes) => Some(format!("data:{};base64,{}", mime_type(path), STANDARD.encode(bytes))),
        Err(e) => {
            warn!("[GLOB] Failed to read {}: {}", path.display(), e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.png"), b"b").unwrap();
        fs::write(dir.path().join("a.JPG"), b"a").unwrap();
        fs::write(dir.path().join("readme.txt"), b"text").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested").join("c.svg"), b"<svg/>").unwrap();
        dir
    }

    fn pattern(dir: &Path, tail: &str) -> String {
        format!("{}/{}", dir.to_string_lossy().replace('\\', "/"), tail)
    }

    #[test]
    fn glob_keeps_only_images() {
        let dir = fixture();
        let found = matches(&pattern(dir.path(), "**"));
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names.len(), 3);
        assert!(!names.contains(&"readme.txt".to_string()));
        assert_eq!(count(&pattern(dir.path(), "*.png")), 1);
    }

    #[test]
    fn urls_pass_through_quoted() {
        let sources = vec!["https://example.com/a.png".to_string()];
        assert_eq!(resolve(&sources, Reference::FileUrl), vec!["\"https://example.com/a.png\""]);
        assert_eq!(count("https://example.com/a.png"), 1);
    }

    #[test]
    fn files_become_app_urls() {
        let dir = fixture();
        let resolved = resolve(&[pattern(dir.path(), "*.png")], Reference::FileUrl);
        assert_eq!(resolved.len(), 1);
        assert!(resolved[0].starts_with("\"vscode-file://vscode-app/"));
        assert!(resolved[0].ends_with("b.png\""));
    }

    #[test]
    fn files_can_be_embedded() {
        let dir = fixture();
        let resolved = resolve(&[pattern(dir.path(), "nested/*")], Reference::DataUri);
        assert_eq!(resolved, vec![format!("\"data:image/svg+xml;base64,{}\"", STANDARD.encode(b"<svg/>"))]);
    }

    #[test]
    fn mime_types() {
        assert_eq!(mime_type(Path::new("a.png")), "image/png");
        assert_eq!(mime_type(Path::new("a.JPEG")), "image/jpeg");
        assert_eq!(mime_type(Path::new("a.svg")), "image/svg+xml");
    }

    #[test]
    fn file_urls_escape_spaces() {
        assert_eq!(
            file_url(Path::new("/home/me/My Pictures/a.png")),
            "vscode-file://vscode-app/home/me/My%20Pictures/a.png"
        );
    }

    #[test]
    fn folder_sources_reach_nested_images() {
        let dir = fixture();
        let folder = crate::sources::folder_glob(&dir.path().to_string_lossy().replace('\\', "/"));
        assert!(folder.ends_with("/**"));
        assert_eq!(count(&folder), 3);

        let resolved = resolve(&[folder], Reference::FileUrl);
        assert_eq!(resolved.len(), 3);
        assert!(resolved.iter().any(|r| r.ends_with("a.JPG\"")));
        assert!(resolved.iter().any(|r| r.ends_with("b.png\"")));
        assert!(resolved.iter().any(|r| r.ends_with("nested/c.svg\"")));
    }

    #[test]
    fn plain_http_sources_are_dropped() {
        let sources = vec![
            "http://example.com/a.png".to_string(),
            "https://example.com/b.png".to_string(),
        ];
        assert_eq!(resolve(&sources, Reference::FileUrl), vec!["\"https://example.com/b.png\""]);
        assert_eq!(count("http://example.com/a.png"), 0);
    }

    #[test]
    fn drive_letters_are_kept() {
        assert_eq!(
            file_url(Path::new("C:/Users/me/a #1.png")),
            "vscode-file://vscode-app/C:/Users/me/a%20%231.png"
        );
    }

    #[test]
    fn missing_directory_matches_nothing() {
        assert!(matches("/definitely/not/here/*.png").is_empty());
    }
}
