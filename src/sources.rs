// ~/vscode-background/src/sources.rs

use std::{collections::HashSet, path::Path, sync::LazyLock};

use regex::Regex;

/// Characters allowed in a blur value such as `4px` or `0.5rem`.
static INVALID_CSS_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w.%+-]").expect("static regex"));

pub const HTTPS: &str = "https://";
pub const HTTP: &str = "http://";
pub const FILE: &str = "file://";

/// Ordered set semantics: keeps the first occurrence of every entry.
pub fn unique(list: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::<String>::new();
    list.into_iter().filter(|s| seen.insert(s.clone())).collect()
}

pub fn is_url(source: &str) -> bool {
    let lower = source.trim_start().to_ascii_lowercase();
    lower.starts_with(HTTPS) || lower.starts_with(HTTP)
}

/// Only HTTPS sources end up in the payload.
pub fn is_https(source: &str) -> bool {
    starts_with_ci(source.trim_start(), HTTPS)
}

fn starts_with_ci(value: &str, prefix: &str) -> bool {
    value
        .get(..prefix.len())
        .map(|head| head.eq_ignore_ascii_case(prefix))
        .unwrap_or(false)
}

/// Validation for the "Add a URL" prompt.
pub fn validate_url(value: &str) -> Result<(), String> {
    let value = value.trim();
    if starts_with_ci(value, FILE) {
        Err("File URLs are not accepted, use the Add a File option".to_string())
    } else if starts_with_ci(value, HTTP) {
        Err("Images must be served over HTTPS".to_string())
    } else if starts_with_ci(value, HTTPS) && value.len() > HTTPS.len() {
        Ok(())
    } else {
        Err("Invalid URL".to_string())
    }
}

/// Validation for the "Add a Glob" prompt.
pub fn validate_glob(value: &str) -> Result<(), String> {
    let value = value.trim();
    if starts_with_ci(value, FILE) {
        Err("Do not include 'file://' as part of the file path".to_string())
    } else if is_url(value) {
        Err("Image URLs do not support glob, use the Add a URL option".to_string())
    } else if value.is_empty() {
        Err("Enter a file path or glob".to_string())
    } else if value.contains('\\') {
        Err("Use only '/' for directories, '\\' is reserved for escape characters".to_string())
    } else {
        Ok(())
    }
}

/// Validation for "Add a File": an existing image file.
pub fn validate_file(value: &str) -> Result<(), String> {
    validate_glob(value)?;
    let expanded = crate::paths::expand_home(value.trim());
    let path = Path::new(&expanded);
    if !path.is_file() {
        return Err(format!("No file at {}", path.display()));
    }
    if !crate::glob_resolver::is_image(path) {
        return Err(format!(
            "Unsupported image type, expected one of: {}",
            crate::glob_resolver::EXTENSIONS.join(", ")
        ));
    }
    Ok(())
}

/// Validation for "Add a Folder".
pub fn validate_folder(value: &str) -> Result<(), String> {
    validate_glob(value)?;
    let expanded = crate::paths::expand_home(value.trim());
    if !Path::new(&expanded).is_dir() {
        return Err(format!("No folder at {expanded}"));
    }
    Ok(())
}

/// Glob matching every file below a folder.
pub fn folder_glob(folder: &str) -> String {
    format!("{}/**", folder.trim().trim_end_matches('/'))
}

/// Validation when editing an existing entry; blank means remove.
pub fn validate_edit(value: &str) -> Result<(), String> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(());
    }
    if starts_with_ci(value, FILE) {
        Err("Do not include 'file://' as part of the file path".to_string())
    } else if starts_with_ci(value, HTTP) {
        Err("Images must be served over HTTPS".to_string())
    } else if starts_with_ci(value, HTTPS) {
        validate_url(value)
    } else {
        validate_glob(value)
    }
}

/// Validation for any source supplied on the command line.
pub fn validate_source(value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err("Empty source".to_string());
    }
    validate_edit(value)
}

pub fn validate_blur(value: &str) -> Result<(), String> {
    if INVALID_CSS_TOKEN.is_match(value) {
        Err("Invalid CSS".to_string())
    } else {
        Ok(())
    }
}

pub fn validate_opacity(value: &str) -> Result<(), String> {
    match value.trim().parse::<f64>() {
        Ok(v) if (0.0..=1.0).contains(&v) => Ok(()),
        Ok(_) => Err("Opacity must be between 0 and 1".to_string()),
        Err(_) => Err("Not a number".to_string()),
    }
}

pub fn validate_change_time(value: &str) -> Result<(), String> {
    match value.trim().parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 => Ok(()),
        Ok(_) => Err("Time must be 0 or a positive number of seconds".to_string()),
        Err(_) => Err("Not a number".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owned(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn unique_keeps_first_seen_order() {
        let list = owned(&["b", "a", "b", "c", "a"]);
        assert_eq!(unique(list), owned(&["b", "a", "c"]));
    }

    #[test]
    fn unique_is_idempotent() {
        let once = unique(owned(&["x", "y", "x", "z", "y"]));
        assert_eq!(unique(once.clone()), once);
    }

    #[test]
    fn url_scheme_rules() {
        assert_eq!(validate_url("http://example.com/a.png"), Err("Images must be served over HTTPS".to_string()));
        assert!(validate_url("https://example.com/a.png").is_ok());
        assert!(validate_url("file:///tmp/a.png").is_err());
        assert!(validate_url("example.com/a.png").is_err());
        assert!(validate_url("HTTP://EXAMPLE.COM/A.PNG").is_err());
    }

    #[test]
    fn glob_rules() {
        assert!(validate_glob("/home/me/pictures/*.png").is_ok());
        assert!(validate_glob("file:///tmp/*.png").is_err());
        assert!(validate_glob("https://example.com/*.png").is_err());
        assert!(validate_glob("C:\\images\\*.png").is_err());
        assert!(validate_glob("   ").is_err());
    }

    #[test]
    fn edit_allows_blank_and_https() {
        assert!(validate_edit("").is_ok());
        assert!(validate_edit("https://example.com/a.png").is_ok());
        assert!(validate_edit("http://example.com/a.png").is_err());
        assert!(validate_edit("file:///tmp/a.png").is_err());
        assert!(validate_edit("/tmp/*.jpg").is_ok());
        assert!(validate_source("").is_err());
    }

    #[test]
    fn file_and_folder_checks_hit_the_filesystem() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("a.png");
        let text = dir.path().join("notes.txt");
        std::fs::write(&image, b"png").unwrap();
        std::fs::write(&text, b"txt").unwrap();

        let image = image.to_string_lossy().replace('\\', "/");
        let text = text.to_string_lossy().replace('\\', "/");
        let folder = dir.path().to_string_lossy().replace('\\', "/");

        assert!(validate_file(&image).is_ok());
        assert!(validate_file(&text).is_err());
        assert!(validate_file(&folder).is_err());
        assert!(validate_folder(&folder).is_ok());
        assert!(validate_folder(&image).is_err());
        assert_eq!(folder_glob("/pics/"), "/pics/**");
    }

    #[test]
    fn blur_token_rules() {
        assert!(validate_blur("4px").is_ok());
        assert!(validate_blur("0.5rem").is_ok());
        assert!(validate_blur("10%").is_ok());
        assert!(validate_blur("4px; color: red").is_err());
        assert!(validate_blur("calc(1px)").is_err());
    }

    #[test]
    fn numeric_rules() {
        assert!(validate_opacity("0.25").is_ok());
        assert!(validate_opacity("1.5").is_err());
        assert!(validate_opacity("half").is_err());
        assert!(validate_change_time("0").is_ok());
        assert!(validate_change_time("12.5").is_ok());
        assert!(validate_change_time("-1").is_err());
    }
}
