use std::path::Path;
use std::process::{Command, Stdio};

/// Full hash of `HEAD` in the repository containing `root`.
pub fn commit(root: &Path) -> Option<String> {
    capture(root, &["rev-parse", "HEAD"])
}

pub fn short_commit(root: &Path) -> Option<String> {
    capture(root, &["rev-parse", "--short", "HEAD"])
}

pub fn branch(root: &Path) -> Option<String> {
    capture(root, &["rev-parse", "--abbrev-ref", "HEAD"])
}

fn capture(root: &Path, args: &[&str]) -> Option<String> {
    Command::new("git")
        .args(args)
        .current_dir(root)
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .ok()
        .filter(|output| output.status.success())
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
