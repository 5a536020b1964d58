use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

/// Reports which external tools exist before operations try to run them.
#[async_trait]
pub trait Toolchain: Send + Sync {
    fn is_available(&self, tool: &str) -> bool;

    async fn version(&self, tool: &str) -> Option<String>;
}

/// Looks tools up on `PATH`.
#[derive(Debug, Clone, Default)]
pub struct SystemToolchain {
    search_path: Option<Vec<PathBuf>>,
}

impl SystemToolchain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Searches `dirs` instead of the process `PATH`.
    pub fn with_search_path(dirs: Vec<PathBuf>) -> Self {
        Self {
            search_path: Some(dirs),
        }
    }

    pub fn locate(&self, tool: &str) -> Option<PathBuf> {
        let candidate = Path::new(tool);
        if candidate.components().count() > 1 {
            return is_executable(candidate).then(|| candidate.to_path_buf());
        }

        let dirs = match &self.search_path {
            Some(dirs) => dirs.clone(),
            None => std::env::var_os("PATH")
                .map(|path| std::env::split_paths(&path).collect())
                .unwrap_or_default(),
        };

        dirs.into_iter()
            .flat_map(|dir| executable_names(tool).map(move |name| dir.join(name)))
            .find(|path| is_executable(path))
    }
}

#[async_trait]
impl Toolchain for SystemToolchain {
    fn is_available(&self, tool: &str) -> bool {
        self.locate(tool).is_some()
    }

    async fn version(&self, tool: &str) -> Option<String> {
        let path = self.locate(tool)?;

        // `go` answers to `version`, nearly everything else to `--version`.
        for flag in ["--version", "version"] {
            let output = match Command::new(&path)
                .arg(flag)
                .stdin(Stdio::null())
                .stderr(Stdio::null())
                .output()
                .await
            {
                Ok(output) => output,
                Err(_) => continue,
            };

            if output.status.success() {
                let text = String::from_utf8_lossy(&output.stdout);
                if let Some(line) = text.lines().map(str::trim).find(|l| !l.is_empty()) {
                    return Some(line.to_string());
                }
            }
        }

        None
    }
}

fn executable_names(tool: &str) -> impl Iterator<Item = String> {
    let mut names = vec![tool.to_string()];
    if cfg!(windows) && Path::new(tool).extension().is_none() {
        names.push(format!("{}.exe", tool));
    }
    names.into_iter()
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// A fixed tool set, for tests and previews.
#[derive(Debug, Clone, Default)]
pub struct StaticToolchain {
    tools: BTreeMap<String, Option<String>>,
}

impl StaticToolchain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tool(mut self, tool: &str) -> Self {
        self.tools.insert(tool.to_string(), None);
        self
    }

    pub fn with_version(mut self, tool: &str, version: &str) -> Self {
        self.tools.insert(tool.to_string(), Some(version.to_string()));
        self
    }

    pub fn with_tools<'a>(mut self, tools: impl IntoIterator<Item = &'a str>) -> Self {
        for tool in tools {
            self.tools.insert(tool.to_string(), None);
        }
        self
    }
}

#[async_trait]
impl Toolchain for StaticToolchain {
    fn is_available(&self, tool: &str) -> bool {
        self.tools.contains_key(tool)
    }

    async fn version(&self, tool: &str) -> Option<String> {
        self.tools.get(tool).cloned().flatten()
    }
}
