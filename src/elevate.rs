// ~/vscode-background/src/elevate.rs

#[cfg(all(unix, not(target_os = "macos")))]
use std::path::Path;
use std::{
    io,
    path::PathBuf,
    process::{Command, Stdio},
};

use thiserror::Error;

use crate::{info, warn};

#[cfg(target_os = "linux")]
pub(crate) const PKEXEC_BINARIES: &[&str] = &["/usr/bin/pkexec", "/bin/pkexec"];
#[cfg(all(unix, not(target_os = "macos")))]
pub(crate) const SUDO_BINARIES: &[&str] = &["/usr/bin/sudo", "/bin/sudo", "/usr/local/bin/sudo"];

#[derive(Debug, Error)]
pub enum ElevationError {
    #[error("no privilege-elevation helper is available")]
    Unavailable,
    #[error("failed to launch {helper}: {source}")]
    Launch {
        helper: String,
        #[source]
        source: io::Error,
    },
    #[error("{helper} failed ({status}): {stderr}")]
    Failed {
        helper: String,
        status: String,
        stderr: String,
    },
}

/// Moves staged files over their targets with elevated rights.
pub trait Elevator {
    fn move_files(&self, moves: &[(PathBuf, PathBuf)]) -> Result<(), ElevationError>;
}

/// Platform helper: pkexec/sudo, osascript, or the `runas` verb.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemElevator;

impl Elevator for SystemElevator {
    fn move_files(&self, moves: &[(PathBuf, PathBuf)]) -> Result<(), ElevationError> {
        info!("[ELEVATE] Moving {} file(s) with elevated rights", moves.len());
        let result = platform_move(moves);
        if let Err(e) = &result {
            warn!("[ELEVATE] {e}");
        }
        result
    }
}

/// `mv -f "$1" "$2" && mv -f "$3" "$4" ...` for use with positional arguments.
pub fn positional_move_script(count: usize) -> String {
    (0..count)
        .map(|i| format!("mv -f \"${}\" \"${}\"", i * 2 + 1, i * 2 + 2))
        .collect::<Vec<_>>()
        .join(" && ")
}

/// Single-quotes a value for POSIX shells.
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r#"'\''"#))
}

#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
fn quoted_move_command(moves: &[(PathBuf, PathBuf)]) -> String {
    moves
        .iter()
        .map(|(src, dst)| {
            format!(
                "mv -f {} {}",
                shell_quote(&src.to_string_lossy()),
                shell_quote(&dst.to_string_lossy())
            )
        })
        .collect::<Vec<_>>()
        .join(" && ")
}

#[cfg_attr(windows, allow(dead_code))]
fn run(mut command: Command, helper: &str) -> Result<(), ElevationError> {
    let output = command
        .stdin(Stdio::inherit())
        .output()
        .map_err(|source| ElevationError::Launch {
            helper: helper.to_string(),
            source,
        })?;

    if output.status.success() {
        return Ok(());
    }

    Err(ElevationError::Failed {
        helper: helper.to_string(),
        status: output.status.to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    })
}

#[cfg(all(unix, not(target_os = "macos")))]
fn platform_move(moves: &[(PathBuf, PathBuf)]) -> Result<(), ElevationError> {
    let mut positional: Vec<&Path> = Vec::new();
    for (src, dst) in moves {
        positional.push(src);
        positional.push(dst);
    }
    let script = positional_move_script(moves.len());

    if running_as_root() {
        let mut command = Command::new("/bin/sh");
        command.arg("-c").arg(&script).arg("sh").args(&positional);
        return run(command, "sh");
    }

    let helper = find_helper().ok_or(ElevationError::Unavailable)?;
    let mut command = Command::new(helper);
    command.arg("/bin/sh").arg("-c").arg(&script).arg("sh").args(&positional);
    run(command, helper)
}

#[cfg(all(unix, not(target_os = "macos")))]
fn find_helper() -> Option<&'static str> {
    #[cfg(target_os = "linux")]
    let candidates = PKEXEC_BINARIES.iter().chain(SUDO_BINARIES.iter());
    #[cfg(not(target_os = "linux"))]
    let candidates = SUDO_BINARIES.iter();

    candidates.copied().find(|path| Path::new(path).exists())
}

#[cfg(target_os = "macos")]
fn platform_move(moves: &[(PathBuf, PathBuf)]) -> Result<(), ElevationError> {
    let shell = quoted_move_command(moves);
    let apple = format!(
        "do shell script \"{}\" with administrator privileges",
        shell.replace('\\', "\\\\").replace('"', "\\\"")
    );

    let mut command = Command::new("/usr/bin/osascript");
    command.arg("-e").arg(apple);
    run(command, "osascript")
}

#[cfg(windows)]
fn platform_move(moves: &[(PathBuf, PathBuf)]) -> Result<(), ElevationError> {
    use windows::core::{w, PCWSTR};
    use windows::Win32::Foundation::CloseHandle;
    use windows::Win32::System::Threading::{GetExitCodeProcess, WaitForSingleObject, INFINITE};
    use windows::Win32::UI::Shell::{ShellExecuteExW, SEE_MASK_NOCLOSEPROCESS, SHELLEXECUTEINFOW};
    use windows::Win32::UI::WindowsAndMessaging::SW_HIDE;

    use crate::utility::to_wstring;

    let command = moves
        .iter()
        .map(|(src, dst)| format!("move /Y \"{}\" \"{}\"", src.display(), dst.display()))
        .collect::<Vec<_>>()
        .join(" && ");
    let params = to_wstring(&format!("/c {command}"));

    let mut info = SHELLEXECUTEINFOW {
        cbSize: std::mem::size_of::<SHELLEXECUTEINFOW>() as u32,
        fMask: SEE_MASK_NOCLOSEPROCESS,
        lpVerb: w!("runas"),
        lpFile: w!("cmd.exe"),
        lpParameters: PCWSTR(params.as_ptr()),
        nShow: SW_HIDE.0,
        ..Default::default()
    };

    unsafe { ShellExecuteExW(&mut info) }.map_err(|e| ElevationError::Launch {
        helper: "runas".to_string(),
        source: io::Error::other(e.to_string()),
    })?;

    let mut code = 0u32;
    unsafe {
        WaitForSingleObject(info.hProcess, INFINITE);
        let status = GetExitCodeProcess(info.hProcess, &mut code);
        let _ = CloseHandle(info.hProcess);
        status.map_err(|e| ElevationError::Launch {
            helper: "runas".to_string(),
            source: io::Error::other(e.to_string()),
        })?;
    }

    if code == 0 {
        Ok(())
    } else {
        Err(ElevationError::Failed {
            helper: "runas".to_string(),
            status: format!("exit code {code}"),
            stderr: String::new(),
        })
    }
}

#[cfg(all(unix, not(target_os = "macos")))]
fn running_as_root() -> bool {
    unsafe { libc::geteuid() == 0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn move_script_uses_positional_pairs() {
        assert_eq!(positional_move_script(1), r#"mv -f "$1" "$2""#);
        assert_eq!(
            positional_move_script(2),
            r#"mv -f "$1" "$2" && mv -f "$3" "$4""#
        );
    }

    #[test]
    fn shell_quote_escapes_single_quotes() {
        assert_eq!(shell_quote("/tmp/a b"), "'/tmp/a b'");
        assert_eq!(shell_quote("it's"), r#"'it'\''s'"#);
    }

    #[test]
    fn quoted_move_command_joins_pairs() {
        let moves = vec![
            (PathBuf::from("/tmp/a.js"), PathBuf::from("/opt/code/a.js")),
            (PathBuf::from("/tmp/p.json"), PathBuf::from("/opt/code/p.json")),
        ];
        assert_eq!(
            quoted_move_command(&moves),
            "mv -f '/tmp/a.js' '/opt/code/a.js' && mv -f '/tmp/p.json' '/opt/code/p.json'"
        );
    }
}
