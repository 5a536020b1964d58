use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::git;
use crate::pipeline::FanOutPolicy;
use crate::platform::Platform;

pub const CONFIG_FILE_NAME: &str = "taskmill.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Target run when the command line names none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_target: Option<String>,
    #[serde(default)]
    pub project: ProjectConfig,
    #[serde(default)]
    pub build: BuildConfig,
    #[serde(default)]
    pub test: TestConfig,
    #[serde(default)]
    pub lint: LintConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub history: HistoryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub binary: String,
    #[serde(default = "default_main")]
    pub main: String,
    #[serde(default = "default_version")]
    pub version: String,
    /// Stamped into `{{.Commit}}`. Filled from `GIT_COMMIT` or the work tree
    /// at load time when not set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
    /// Overlaid on the inherited environment of every command.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    #[serde(default = "default_output")]
    pub output: String,
    #[serde(default = "default_platforms")]
    pub platforms: Vec<Platform>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub ldflags: Vec<String>,
    #[serde(default)]
    pub go_flags: Vec<String>,
    #[serde(default = "default_true")]
    pub trimpath: bool,
    /// Adds `-s -w` to the generated ldflags.
    #[serde(default = "default_true")]
    pub strip: bool,
    #[serde(default)]
    pub verbose: bool,
    #[serde(default)]
    pub fan_out: FanOutPolicy,
    #[serde(default)]
    pub clean_cache: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestConfig {
    #[serde(default = "default_test_timeout")]
    pub timeout: String,
    #[serde(default = "default_integration_timeout")]
    pub integration_timeout: String,
    #[serde(default = "default_integration_tag")]
    pub integration_tag: String,
    #[serde(default = "default_cover_mode")]
    pub cover_mode: String,
    #[serde(default = "default_coverage_file")]
    pub coverage_file: String,
    #[serde(default)]
    pub race: bool,
    #[serde(default)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LintConfig {
    #[serde(default = "default_lint_timeout")]
    pub timeout: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_file: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Tool binary name to the `module@version` passed to `go install`.
    #[serde(default = "default_tools")]
    pub install: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    #[serde(default = "default_storage_path")]
    pub storage_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_target: None,
            project: ProjectConfig::default(),
            build: BuildConfig::default(),
            test: TestConfig::default(),
            lint: LintConfig::default(),
            tools: ToolsConfig::default(),
            history: HistoryConfig::default(),
        }
    }
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            binary: String::new(),
            main: default_main(),
            version: default_version(),
            commit: None,
            env: BTreeMap::new(),
        }
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            platforms: default_platforms(),
            tags: Vec::new(),
            ldflags: Vec::new(),
            go_flags: Vec::new(),
            trimpath: true,
            strip: true,
            verbose: false,
            fan_out: FanOutPolicy::default(),
            clean_cache: false,
        }
    }
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            timeout: default_test_timeout(),
            integration_timeout: default_integration_timeout(),
            integration_tag: default_integration_tag(),
            cover_mode: default_cover_mode(),
            coverage_file: default_coverage_file(),
            race: false,
            verbose: false,
        }
    }
}

impl Default for LintConfig {
    fn default() -> Self {
        Self {
            timeout: default_lint_timeout(),
            config_file: None,
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            install: default_tools(),
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: default_max_entries(),
            storage_path: default_storage_path(),
        }
    }
}

fn default_main() -> String {
    ".".to_string()
}

fn default_version() -> String {
    "dev".to_string()
}

fn default_output() -> String {
    "bin".to_string()
}

fn default_platforms() -> Vec<Platform> {
    vec![
        Platform::new("linux", "amd64"),
        Platform::new("darwin", "amd64"),
        Platform::new("darwin", "arm64"),
        Platform::new("windows", "amd64"),
    ]
}

fn default_true() -> bool {
    true
}

fn default_test_timeout() -> String {
    "10m".to_string()
}

fn default_integration_timeout() -> String {
    "30m".to_string()
}

fn default_integration_tag() -> String {
    "integration".to_string()
}

fn default_cover_mode() -> String {
    "atomic".to_string()
}

fn default_coverage_file() -> String {
    "coverage.txt".to_string()
}

fn default_lint_timeout() -> String {
    "5m".to_string()
}

fn default_tools() -> BTreeMap<String, String> {
    [
        (
            "golangci-lint",
            "github.com/golangci/golangci-lint/cmd/golangci-lint@latest",
        ),
        ("goimports", "golang.org/x/tools/cmd/goimports@latest"),
        ("govulncheck", "golang.org/x/vuln/cmd/govulncheck@latest"),
    ]
    .into_iter()
    .map(|(name, module)| (name.to_string(), module.to_string()))
    .collect()
}

fn default_max_entries() -> usize {
    50
}

fn default_storage_path() -> String {
    "~/.cache/taskmill/history.json".to_string()
}

impl Config {
    /// Loads `taskmill.toml` from `root` (or `explicit`), merges the global
    /// config underneath it, applies `TASKMILL_*` environment overrides and
    /// fills a missing binary name and commit from the project directory.
    pub fn load(root: &Path, explicit: Option<&Path>) -> anyhow::Result<Self> {
        let path = explicit
            .map(Path::to_path_buf)
            .unwrap_or_else(|| root.join(CONFIG_FILE_NAME));

        let global = Config::load_from_file(Config::global_path())
            .context("Failed to load global configuration")?;

        let mut config = Config::load_from_file(&path)?.merge_with(global);
        config.apply_env_overrides(|key| std::env::var(key).ok())?;

        if config.project.binary.trim().is_empty() {
            config.project.binary = root
                .file_name()
                .map(|name| name.to_string_lossy().to_string())
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| "app".to_string());
        }

        if config.project.commit.is_none() {
            config.project.commit = config
                .project
                .env
                .get("GIT_COMMIT")
                .map(|commit| commit.trim().to_string())
                .filter(|commit| !commit.is_empty())
                .or_else(|| git::short_commit(root));
        }

        Ok(config)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = Self::expand_path(&path.as_ref().to_string_lossy());

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        if config.build.platforms.is_empty() {
            anyhow::bail!("No build platforms configured in {}", path.display());
        }

        Ok(config)
    }

    /// Entries of `other` fill gaps in the tool and environment maps; values
    /// already present in `self` win.
    pub fn merge_with(mut self, other: Config) -> Self {
        for (name, module) in other.tools.install {
            self.tools.install.entry(name).or_insert(module);
        }
        for (key, value) in other.project.env {
            self.project.env.entry(key).or_insert(value);
        }
        self
    }

    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(binary) = get("TASKMILL_BINARY_NAME") {
            self.project.binary = binary;
        }

        if let Some(output) = get("TASKMILL_OUTPUT_DIR") {
            self.build.output = output;
        }

        if let Some(platforms) = get("TASKMILL_PLATFORMS") {
            self.build.platforms = split_list(&platforms)
                .iter()
                .map(|p| p.parse::<Platform>())
                .collect::<Result<_, _>>()
                .context("Invalid TASKMILL_PLATFORMS")?;
            if self.build.platforms.is_empty() {
                anyhow::bail!("TASKMILL_PLATFORMS lists no platforms: {:?}", platforms);
            }
        }

        if let Some(tags) = get("TASKMILL_BUILD_TAGS") {
            self.build.tags = split_list(&tags);
        }

        if get("TASKMILL_VERBOSE").is_some_and(|v| is_truthy(&v)) {
            self.build.verbose = true;
            self.test.verbose = true;
        }

        if let Some(policy) = get("TASKMILL_FAN_OUT") {
            self.build.fan_out = policy
                .parse()
                .with_context(|| format!("Invalid TASKMILL_FAN_OUT: {}", policy))?;
        }

        if let Some(timeout) = get("TASKMILL_TEST_TIMEOUT") {
            self.test.timeout = timeout;
        }

        if get("TASKMILL_TEST_RACE").is_some_and(|v| is_truthy(&v)) {
            self.test.race = true;
        }

        Ok(())
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        std::fs::write(path.as_ref(), content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }

    pub fn global_path() -> PathBuf {
        Self::expand_path("~/.config/taskmill/taskmill.toml")
    }

    pub fn expand_path(path: &str) -> PathBuf {
        let expanded = shellexpand::tilde(path);
        PathBuf::from(expanded.as_ref())
    }

    pub fn storage_path(&self) -> PathBuf {
        Self::expand_path(&self.history.storage_path)
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn is_truthy(value: &str) -> bool {
    matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes")
}
