// ~/vscode-background/src/utility.rs

#[cfg(windows)]
use std::{ffi::OsStr, os::windows::ffi::OsStrExt};
use std::path::Path;

/// NUL-terminated UTF-16 for Win32 string parameters.
#[cfg(windows)]
pub fn to_wstring(s: &str) -> Vec<u16> {
    OsStr::new(s)
        .encode_wide()
        .chain(std::iter::once(0))
        .collect()
}

pub fn file_name_lossy(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// `1 Background`, `3 Backgrounds`.
pub fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("{count} {noun}")
    } else {
        format!("{count} {noun}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plural_forms() {
        assert_eq!(plural(0, "Background"), "0 Backgrounds");
        assert_eq!(plural(1, "Background"), "1 Background");
        assert_eq!(plural(2, "matching file"), "2 matching files");
    }

    #[test]
    fn file_names() {
        assert_eq!(file_name_lossy(Path::new("/a/b/product.json")), "product.json");
    }

    #[cfg(windows)]
    #[test]
    fn wide_strings_are_nul_terminated() {
        assert_eq!(to_wstring("ab"), vec![97, 98, 0]);
    }
}
