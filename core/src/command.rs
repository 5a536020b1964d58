use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::config::Config;
use crate::platform::Platform;

/// One external process invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    /// Merged over the inherited environment; these values win.
    pub env: BTreeMap<String, String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            env: BTreeMap::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn envs(mut self, vars: &BTreeMap<String, String>) -> Self {
        for (key, value) in vars {
            self.env.entry(key.clone()).or_insert_with(|| value.clone());
        }
        self
    }

    pub fn env_value(&self, key: &str) -> Option<&str> {
        self.env.get(key).map(String::as_str)
    }

    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in &self.env {
            write!(f, "{}={} ", key, value)?;
        }
        write!(f, "{}", self.command_line())
    }
}

/// Builds the Go toolchain command lines used by the standard namespaces.
/// All values come from configuration captured at construction.
#[derive(Debug, Clone)]
pub struct GoCommands {
    binary: String,
    main: String,
    output: PathBuf,
    build_flags: Vec<String>,
    test_timeout: String,
    integration_timeout: String,
    integration_tag: String,
    cover_mode: String,
    coverage_file: String,
    test_verbose: bool,
    race_by_default: bool,
    lint_timeout: String,
    lint_config: Option<String>,
}

impl GoCommands {
    pub fn new(config: &Config) -> Self {
        Self {
            binary: config.project.binary.clone(),
            main: config.project.main.clone(),
            output: PathBuf::from(&config.build.output),
            build_flags: build_flags(config),
            test_timeout: config.test.timeout.clone(),
            integration_timeout: config.test.integration_timeout.clone(),
            integration_tag: config.test.integration_tag.clone(),
            cover_mode: config.test.cover_mode.clone(),
            coverage_file: config.test.coverage_file.clone(),
            test_verbose: config.test.verbose,
            race_by_default: config.test.race,
            lint_timeout: config.lint.timeout.clone(),
            lint_config: config.lint.config_file.clone(),
        }
    }

    pub fn output_dir(&self) -> &PathBuf {
        &self.output
    }

    /// `go build` for the host platform into `<output>/<binary>`.
    pub fn build(&self) -> CommandSpec {
        let out = self
            .output
            .join(format!("{}{}", self.binary, Platform::host().exe_suffix()));
        self.build_to(out)
    }

    /// Cross build with `GOOS`/`GOARCH` set through the env overlay.
    pub fn build_platform(&self, platform: &Platform) -> CommandSpec {
        let out = self.output.join(platform.artifact_name(&self.binary));
        self.build_to(out)
            .env("GOOS", &platform.os)
            .env("GOARCH", &platform.arch)
    }

    fn build_to(&self, out: PathBuf) -> CommandSpec {
        CommandSpec::new("go")
            .arg("build")
            .args(self.build_flags.iter().cloned())
            .arg("-o")
            .arg(out.display().to_string())
            .arg(&self.main)
    }

    pub fn install(&self) -> CommandSpec {
        CommandSpec::new("go")
            .arg("install")
            .args(self.build_flags.iter().cloned())
            .arg(&self.main)
    }

    pub fn generate(&self) -> CommandSpec {
        CommandSpec::new("go").args(["generate", "./..."])
    }

    pub fn clean_test_cache(&self) -> CommandSpec {
        CommandSpec::new("go").args(["clean", "-testcache"])
    }

    pub fn clean_build_cache(&self) -> CommandSpec {
        CommandSpec::new("go").args(["clean", "-cache"])
    }

    fn test_base(&self, timeout: &str) -> CommandSpec {
        let mut cmd = CommandSpec::new("go").arg("test");
        if self.test_verbose {
            cmd = cmd.arg("-v");
        }
        cmd.arg("-timeout").arg(timeout)
    }

    pub fn test(&self) -> CommandSpec {
        let mut cmd = self.test_base(&self.test_timeout);
        if self.race_by_default {
            cmd = cmd.arg("-race");
        }
        cmd.arg("./...")
    }

    pub fn test_short(&self) -> CommandSpec {
        self.test_base(&self.test_timeout).args(["-short", "./..."])
    }

    pub fn test_race(&self) -> CommandSpec {
        self.test_base(&self.test_timeout).args(["-race", "./..."])
    }

    pub fn test_cover(&self) -> CommandSpec {
        self.test_base(&self.test_timeout)
            .arg(format!("-covermode={}", self.cover_mode))
            .arg(format!("-coverprofile={}", self.coverage_file))
            .arg("./...")
    }

    pub fn test_bench(&self) -> CommandSpec {
        self.test_base(&self.test_timeout)
            .args(["-run", "^$", "-bench", ".", "-benchmem", "./..."])
    }

    pub fn test_integration(&self) -> CommandSpec {
        self.test_base(&self.integration_timeout)
            .arg("-tags")
            .arg(&self.integration_tag)
            .arg("./...")
    }

    pub fn vet(&self) -> CommandSpec {
        CommandSpec::new("go").args(["vet", "./..."])
    }

    pub fn lint(&self, extra: &[&str]) -> CommandSpec {
        let mut cmd = CommandSpec::new("golangci-lint")
            .arg("run")
            .arg(format!("--timeout={}", self.lint_timeout));
        if let Some(config) = &self.lint_config {
            cmd = cmd.arg(format!("--config={}", config));
        }
        cmd.args(extra.iter().copied()).arg("./...")
    }

    pub fn gofmt_write(&self) -> CommandSpec {
        CommandSpec::new("gofmt").args(["-s", "-w", "."])
    }

    pub fn gofmt_list(&self) -> CommandSpec {
        CommandSpec::new("gofmt").args(["-s", "-l", "."])
    }

    pub fn goimports_write(&self) -> CommandSpec {
        CommandSpec::new("goimports").args(["-w", "."])
    }

    pub fn go_mod(&self, subcommand: &str) -> CommandSpec {
        CommandSpec::new("go").args(["mod", subcommand])
    }

    pub fn deps_update(&self) -> CommandSpec {
        CommandSpec::new("go").args(["get", "-u", "./..."])
    }

    pub fn vulncheck(&self) -> CommandSpec {
        CommandSpec::new("govulncheck").arg("./...")
    }

    pub fn install_tool(&self, module: &str) -> CommandSpec {
        CommandSpec::new("go").arg("install").arg(module)
    }
}

fn build_flags(config: &Config) -> Vec<String> {
    let build = &config.build;
    let mut flags = Vec::new();

    if !build.tags.is_empty() {
        flags.push("-tags".to_string());
        flags.push(build.tags.join(","));
    }

    flags.push("-ldflags".to_string());
    flags.push(ldflags(config, Utc::now()));

    if build.trimpath {
        flags.push("-trimpath".to_string());
    }

    if build.verbose {
        flags.push("-v".to_string());
    }

    flags.extend(build.go_flags.iter().cloned());
    flags
}

/// Configured ldflags with their placeholders expanded, or the standard
/// `main.version`/`main.commit`/`main.buildDate`/`main.buildTime` stamps
/// when none are configured.
fn ldflags(config: &Config, now: DateTime<Utc>) -> String {
    let mut flags = Vec::new();
    if config.build.strip {
        flags.push("-s -w".to_string());
    }

    if config.build.ldflags.is_empty() {
        flags.extend(
            DEFAULT_LDFLAGS
                .iter()
                .map(|flag| expand_ldflag(flag, config, now)),
        );
    } else {
        flags.extend(
            config
                .build
                .ldflags
                .iter()
                .map(|flag| expand_ldflag(flag, config, now)),
        );
    }

    flags.join(" ")
}

const DEFAULT_LDFLAGS: [&str; 4] = [
    "-X main.version={{.Version}}",
    "-X main.commit={{.Commit}}",
    "-X main.buildDate={{.BuildDate}}",
    "-X main.buildTime={{.BuildTime}}",
];

fn expand_ldflag(flag: &str, config: &Config, now: DateTime<Utc>) -> String {
    let commit = config.project.commit.as_deref().unwrap_or("unknown");

    flag.replace("{{.Version}}", &config.project.version)
        .replace("{{.Commit}}", commit)
        .replace("{{.BuildDate}}", &now.format("%Y-%m-%d").to_string())
        .replace("{{.BuildTime}}", &now.format("%H:%M:%S").to_string())
        .replace("{{.Date}}", &now.to_rfc3339_opts(SecondsFormat::Secs, true))
}
