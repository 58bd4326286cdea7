//! Small filesystem and process helpers shared across the engine.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

/// External package-manager probes are hints, never required inputs; a
/// command that hangs is killed once this deadline passes.
const COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

static ANSI_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"[\u{1B}\u{9B}][\[\]()#;?]*(?:(?:(?:[a-zA-Z\d]*(?:;[-a-zA-Z\d/#&.:=?%@~_]*)*)?\x07)|(?:(?:\d{1,4}(?:;\d{0,4})*)?[\dA-PR-TZcf-ntqry=><~]))",
    )
    .expect("ANSI escape pattern is valid")
});

/// Remove ANSI escape sequences from a string.
pub fn clean_ansi(s: &str) -> String {
    ANSI_PATTERN.replace_all(s, "").into_owned()
}

/// Run an external command and return its trimmed stdout, or `None` on any
/// failure: missing binary, non-zero exit, empty output, or timeout.
pub fn command_output(cmd: &str, args: &[&str]) -> Option<String> {
    let mut child = Command::new(cmd)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .ok()?;

    let deadline = Instant::now() + COMMAND_TIMEOUT;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                if !status.success() {
                    return None;
                }
                let mut stdout = String::new();
                child.stdout.take()?.read_to_string(&mut stdout).ok()?;
                let cleaned = clean_ansi(&stdout);
                let cleaned = cleaned.trim();
                return (!cleaned.is_empty()).then(|| cleaned.to_string());
            }
            Ok(None) => {
                if Instant::now() >= deadline {
                    let _ = child.kill();
                    let _ = child.wait();
                    return None;
                }
                std::thread::sleep(Duration::from_millis(10));
            }
            Err(_) => {
                let _ = child.kill();
                return None;
            }
        }
    }
}

/// Lexically normalize a path: drop `.` components and resolve `..` against
/// preceding components, without touching the filesystem.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            component => out.push(component.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        out
    }
}

/// Expand a leading `~` to the user's home directory.
pub fn untildify(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix('~') {
        if let Some(home) = dirs::home_dir() {
            if rest.is_empty() {
                return home;
            }
            if let Some(stripped) = rest.strip_prefix(['/', '\\']) {
                return home.join(stripped);
            }
        }
    }
    PathBuf::from(path)
}

/// Remove duplicate paths, keeping the first occurrence of each.
pub(crate) fn dedup_preserving(paths: &mut Vec<PathBuf>) {
    let mut seen = HashSet::new();
    paths.retain(|path| seen.insert(path.clone()));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_resolves_dots() {
        assert_eq!(
            normalize_path(Path::new("a/./b/../c")),
            PathBuf::from("a/c")
        );
        assert_eq!(normalize_path(Path::new("/a/../..")), PathBuf::from("/"));
        assert_eq!(normalize_path(Path::new("../a")), PathBuf::from("../a"));
        assert_eq!(normalize_path(Path::new("")), PathBuf::from("."));
    }

    #[test]
    fn untildify_expands_home() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(untildify("~"), home);
            assert_eq!(untildify("~/x"), home.join("x"));
        }
        assert_eq!(untildify("/plain/path"), PathBuf::from("/plain/path"));
    }

    #[test]
    fn clean_ansi_strips_color_codes() {
        assert_eq!(clean_ansi("\u{1B}[32mgreen\u{1B}[0m"), "green");
        assert_eq!(clean_ansi("plain"), "plain");
    }

    #[test]
    fn dedup_keeps_first_occurrence() {
        let mut paths = vec![
            PathBuf::from("/a"),
            PathBuf::from("/b"),
            PathBuf::from("/a"),
        ];
        dedup_preserving(&mut paths);
        assert_eq!(paths, vec![PathBuf::from("/a"), PathBuf::from("/b")]);
    }

    #[cfg(unix)]
    #[test]
    fn command_output_is_best_effort() {
        assert_eq!(
            command_output("sh", &["-c", "echo hello"]).as_deref(),
            Some("hello")
        );
        assert_eq!(command_output("definitely-not-a-command", &[]), None);
        assert_eq!(command_output("sh", &["-c", "exit 3"]), None);
    }
}
