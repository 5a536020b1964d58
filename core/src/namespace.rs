use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use crate::command::CommandSpec;
use crate::config::Config;
use crate::error::{TaskError, TaskResult};
use crate::executor::CommandExecutor;
use crate::logger::Logger;
use crate::operation::{operation, OperationRef};
use crate::toolchain::Toolchain;

pub const DEFAULT_OPERATION: &str = "default";

/// Everything a namespace factory needs. Cloning is cheap.
#[derive(Clone)]
pub struct NamespaceContext {
    pub config: Arc<Config>,
    pub root: PathBuf,
    pub executor: Arc<dyn CommandExecutor>,
    pub toolchain: Arc<dyn Toolchain>,
    pub logger: Logger,
}

impl NamespaceContext {
    pub fn new(
        config: Arc<Config>,
        root: PathBuf,
        executor: Arc<dyn CommandExecutor>,
        toolchain: Arc<dyn Toolchain>,
        logger: Logger,
    ) -> Self {
        Self {
            config,
            root,
            executor,
            toolchain,
            logger,
        }
    }

    /// Fails with `MissingDependency` unless `tool` is available.
    pub fn require(&self, tool: &str) -> TaskResult<()> {
        if self.toolchain.is_available(tool) {
            return Ok(());
        }

        let hint = if self.config.tools.install.contains_key(tool) {
            "run `taskmill tools:install`".to_string()
        } else {
            format!("install `{}` and make sure it is on PATH", tool)
        };

        Err(TaskError::MissingDependency {
            tool: tool.to_string(),
            hint,
        })
    }

    /// Runs `spec` from the project root with the project environment.
    pub async fn run(&self, spec: CommandSpec) -> TaskResult<()> {
        let spec = self.prepare(spec);
        self.executor.run(&spec).await
    }

    pub async fn output(&self, spec: CommandSpec) -> TaskResult<String> {
        let spec = self.prepare(spec);
        self.executor.output(&spec).await
    }

    fn prepare(&self, spec: CommandSpec) -> CommandSpec {
        let spec = spec.envs(&self.config.project.env);
        if spec.working_dir.is_some() {
            spec
        } else {
            spec.current_dir(&self.root)
        }
    }

    pub fn resolve_path(&self, relative: impl AsRef<std::path::Path>) -> PathBuf {
        self.root.join(relative)
    }
}

/// A group of related operations with one default entry point.
pub trait Namespace {
    fn descriptor(&self) -> NamespaceDescriptor;
}

/// The immutable, externally visible shape of a namespace.
#[derive(Clone)]
pub struct NamespaceDescriptor {
    name: String,
    description: String,
    default: OperationRef,
    operations: Vec<(String, OperationRef)>,
}

impl NamespaceDescriptor {
    pub fn builder(name: &str, description: &str) -> DescriptorBuilder {
        DescriptorBuilder {
            name: name.to_ascii_lowercase(),
            description: description.to_string(),
            default: None,
            operations: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn default_operation(&self) -> &OperationRef {
        &self.default
    }

    /// Sub-operations in declaration order, without the default.
    pub fn operations(&self) -> impl Iterator<Item = (&str, &OperationRef)> {
        self.operations.iter().map(|(name, op)| (name.as_str(), op))
    }

    /// `default` maps to the default operation.
    pub fn operation(&self, name: &str) -> Option<&OperationRef> {
        let name = name.to_ascii_lowercase();
        if name == DEFAULT_OPERATION {
            return Some(&self.default);
        }
        self.operations
            .iter()
            .find(|(sub, _)| *sub == name)
            .map(|(_, op)| op)
    }

    pub fn operation_names(&self) -> Vec<&str> {
        self.operations.iter().map(|(name, _)| name.as_str()).collect()
    }
}

pub struct DescriptorBuilder {
    name: String,
    description: String,
    default: Option<OperationRef>,
    operations: Vec<(String, OperationRef)>,
}

impl DescriptorBuilder {
    pub fn default_op<T, F, Fut>(mut self, description: &str, receiver: T, body: F) -> Self
    where
        T: Clone + Send + Sync + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = TaskResult<()>> + Send + 'static,
    {
        self.default = Some(operation(self.name.clone(), description, receiver, body));
        self
    }

    pub fn op<T, F, Fut>(mut self, name: &str, description: &str, receiver: T, body: F) -> Self
    where
        T: Clone + Send + Sync + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = TaskResult<()>> + Send + 'static,
    {
        let name = name.to_ascii_lowercase();
        let qualified = format!("{}:{}", self.name, name);
        self.operations
            .push((name, operation(qualified, description, receiver, body)));
        self
    }

    /// Registers an already-built operation, e.g. a pipeline.
    pub fn op_ref(mut self, name: &str, op: OperationRef) -> Self {
        self.operations.push((name.to_ascii_lowercase(), op));
        self
    }

    pub fn default_ref(mut self, op: OperationRef) -> Self {
        self.default = Some(op);
        self
    }

    /// A namespace without an explicit default falls back to its first
    /// operation; one with no operations at all gets a no-op default.
    pub fn build(self) -> NamespaceDescriptor {
        let default = match (self.default, self.operations.first()) {
            (Some(default), _) => default,
            (None, Some((_, first))) => first.clone(),
            (None, None) => operation(self.name.clone(), "", (), |_| async { Ok(()) }),
        };

        NamespaceDescriptor {
            name: self.name,
            description: self.description,
            default,
            operations: self.operations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::RecordingExecutor;
    use crate::toolchain::StaticToolchain;

    fn context(executor: Arc<RecordingExecutor>) -> NamespaceContext {
        let mut config = Config::default();
        config
            .project
            .env
            .insert("CGO_ENABLED".to_string(), "0".to_string());

        NamespaceContext::new(
            Arc::new(config),
            PathBuf::from("/work/project"),
            executor,
            Arc::new(StaticToolchain::new().with_tool("go")),
            Logger::new(),
        )
    }

    #[test]
    fn test_require_classifies_missing_tool() {
        let ctx = context(RecordingExecutor::new().into_shared());

        assert!(ctx.require("go").is_ok());
        match ctx.require("golangci-lint") {
            Err(TaskError::MissingDependency { tool, hint }) => {
                assert_eq!(tool, "golangci-lint");
                assert!(hint.contains("tools:install"));
            }
            other => panic!("Expected MissingDependency, got {:?}", other),
        }
        match ctx.require("docker") {
            Err(TaskError::MissingDependency { hint, .. }) => assert!(hint.contains("PATH")),
            other => panic!("Expected MissingDependency, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_run_applies_root_and_project_env() {
        let executor = RecordingExecutor::new().into_shared();
        let ctx = context(executor.clone());

        ctx.run(CommandSpec::new("go").arg("vet")).await.unwrap();

        let calls = executor.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].working_dir, Some(PathBuf::from("/work/project")));
        assert_eq!(calls[0].env_value("CGO_ENABLED"), Some("0"));
    }

    #[tokio::test]
    async fn test_descriptor_lookup() {
        let descriptor = NamespaceDescriptor::builder("Demo", "Demo operations")
            .default_op("Does the usual", (), |_| async { Ok(()) })
            .op("First", "First thing", (), |_| async { Ok(()) })
            .op("second", "Second thing", (), |_| async { Ok(()) })
            .build();

        assert_eq!(descriptor.name(), "demo");
        assert_eq!(descriptor.operation_names(), vec!["first", "second"]);
        assert_eq!(descriptor.default_operation().name(), "demo");
        assert_eq!(descriptor.operation("FIRST").unwrap().name(), "demo:first");
        assert!(Arc::ptr_eq(
            descriptor.operation("default").unwrap(),
            descriptor.default_operation()
        ));
        assert!(descriptor.operation("third").is_none());
    }

    #[test]
    fn test_builder_falls_back_to_first_operation() {
        let descriptor = NamespaceDescriptor::builder("solo", "")
            .op("only", "", (), |_| async { Ok(()) })
            .build();

        assert!(Arc::ptr_eq(
            descriptor.default_operation(),
            descriptor.operation("only").unwrap()
        ));
    }
}
