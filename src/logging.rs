// ~/vscode-background/src/logging.rs

use std::{
    fmt,
    fs::{self, OpenOptions},
    io::Write,
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{self, Sender},
        OnceLock,
    },
    thread,
};

use crate::paths::settings_dir;

/* =========================
   GLOBAL STATE
   ========================= */

static VERBOSE: AtomicBool = AtomicBool::new(false);
static LOG_PATH: OnceLock<PathBuf> = OnceLock::new();
static LOG_TX: OnceLock<Sender<String>> = OnceLock::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

impl Level {
    pub fn tag(self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }
}

/* =========================
   PUBLIC API
   ========================= */

/// Starts the writer thread. Later calls only toggle verbose output.
pub fn init(verbose: bool) {
    set_verbose(verbose);
    if LOG_TX.get().is_some() {
        return;
    }

    let path = log_path().clone();
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }

    let (tx, rx) = mpsc::channel::<String>();
    if LOG_TX.set(tx).is_err() {
        return;
    }

    thread::spawn(move || {
        let Ok(mut file) = OpenOptions::new().create(true).append(true).open(&path) else {
            return;
        };

        while let Ok(line) = rx.recv() {
            let _ = writeln!(file, "{line}");
            let _ = file.flush();
        }
    });
}

pub fn set_verbose(verbose: bool) {
    VERBOSE.store(verbose, Ordering::Relaxed);
}

/// WARN and ERROR always pass; DEBUG and INFO only with `--debug`.
#[inline]
pub fn should_log(level: Level) -> bool {
    level >= Level::Warn || VERBOSE.load(Ordering::Relaxed)
}

pub fn log_path() -> &'static PathBuf {
    LOG_PATH.get_or_init(|| settings_dir().join("background.log"))
}

#[inline]
pub fn log(level: Level, args: fmt::Arguments<'_>) {
    if !should_log(level) {
        return;
    }
    if let Some(tx) = LOG_TX.get() {
        let _ = tx.send(line(level, &timestamp(), args));
    }
}

/* =========================
   INTERNAL
   ========================= */

fn line(level: Level, ts: &str, args: fmt::Arguments<'_>) -> String {
    format!("{ts} [{}] {args}", level.tag())
}

fn timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f").to_string()
}

/* =========================
   MACROS
   ========================= */

#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {
        $crate::logging::log($crate::logging::Level::Debug, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {
        $crate::logging::log($crate::logging::Level::Info, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        $crate::logging::log($crate::logging::Level::Warn, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        $crate::logging::log($crate::logging::Level::Error, format_args!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warnings_always_pass_the_level_filter() {
        set_verbose(false);
        assert!(should_log(Level::Warn));
        assert!(should_log(Level::Error));
        assert!(!should_log(Level::Info));
        assert!(!should_log(Level::Debug));

        set_verbose(true);
        assert!(should_log(Level::Info));
        set_verbose(false);
    }

    #[test]
    fn lines_carry_timestamp_and_tag() {
        assert_eq!(
            line(Level::Warn, "2024-01-01 00:00:00.000", format_args!("[PATCH] {}", 3)),
            "2024-01-01 00:00:00.000 [WARN] [PATCH] 3"
        );
    }

    #[test]
    fn logging_without_init_is_a_no_op() {
        log(Level::Error, format_args!("nothing listening"));
    }
}
