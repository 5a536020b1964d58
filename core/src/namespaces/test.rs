use crate::command::GoCommands;
use crate::error::{TaskError, TaskResult};
use crate::namespace::{Namespace, NamespaceContext, NamespaceDescriptor};
use crate::namespaces::Lint;

/// Test suites. The default suite lints first.
#[derive(Clone)]
pub struct Test {
    ctx: NamespaceContext,
    go: GoCommands,
    lint: Lint,
}

impl Test {
    pub fn new(ctx: &NamespaceContext) -> Self {
        Self {
            ctx: ctx.clone(),
            go: GoCommands::new(&ctx.config),
            lint: Lint::new(ctx),
        }
    }

    pub async fn run(&self) -> TaskResult<()> {
        self.lint
            .run()
            .await
            .map_err(|err| TaskError::composition("lint", err))?;
        self.unit().await
    }

    pub async fn unit(&self) -> TaskResult<()> {
        self.ctx.logger.info("Running unit tests");
        self.ctx.run(self.go.test()).await
    }

    pub async fn short(&self) -> TaskResult<()> {
        self.ctx.run(self.go.test_short()).await
    }

    pub async fn race(&self) -> TaskResult<()> {
        self.ctx.logger.info("Running tests with the race detector");
        self.ctx.run(self.go.test_race()).await
    }

    pub async fn cover(&self) -> TaskResult<()> {
        self.ctx.run(self.go.test_cover()).await?;
        self.ctx.logger.success(&format!(
            "Coverage written to {}",
            self.ctx.config.test.coverage_file
        ));
        Ok(())
    }

    pub async fn bench(&self) -> TaskResult<()> {
        self.ctx.run(self.go.test_bench()).await
    }

    pub async fn integration(&self) -> TaskResult<()> {
        self.ctx.logger.info("Running integration tests");
        self.ctx.run(self.go.test_integration()).await
    }
}

impl Namespace for Test {
    fn descriptor(&self) -> NamespaceDescriptor {
        NamespaceDescriptor::builder("test", "Run tests")
            .default_op("Lint, then run the unit tests", self.clone(), |t| async move {
                t.run().await
            })
            .op("unit", "Run the unit tests", self.clone(), |t| async move {
                t.unit().await
            })
            .op("short", "Run tests in -short mode", self.clone(), |t| async move {
                t.short().await
            })
            .op("race", "Run tests with the race detector", self.clone(), |t| async move {
                t.race().await
            })
            .op("cover", "Run tests with a coverage profile", self.clone(), |t| async move {
                t.cover().await
            })
            .op("bench", "Run benchmarks", self.clone(), |t| async move {
                t.bench().await
            })
            .op("integration", "Run tests tagged as integration", self.clone(), |t| async move {
                t.integration().await
            })
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::RecordingExecutor;
    use crate::namespaces::fixtures;

    #[tokio::test]
    async fn test_default_lints_first() {
        let executor = RecordingExecutor::new().into_shared();
        let test = Test::new(&fixtures::context(executor.clone()));

        test.run().await.unwrap();

        assert_eq!(
            executor.command_lines(),
            vec![
                "golangci-lint run --timeout=5m ./...",
                "go vet ./...",
                "go test -timeout 10m ./...",
            ]
        );
    }

    #[tokio::test]
    async fn test_lint_failure_stops_tests() {
        let executor = RecordingExecutor::new()
            .fail_when(|spec| spec.args.first().map(String::as_str) == Some("vet"), 2)
            .into_shared();
        let test = Test::new(&fixtures::context(executor.clone()));

        let err = test.run().await.unwrap_err();

        assert!(err.to_string().starts_with("lint failed: "));
        assert_eq!(err.exit_code(), 2);
        assert!(executor
            .command_lines()
            .iter()
            .all(|line| !line.starts_with("go test")));
    }

    #[tokio::test]
    async fn test_cover_and_race_flags() {
        let executor = RecordingExecutor::new().into_shared();
        let test = Test::new(&fixtures::context(executor.clone()));

        test.cover().await.unwrap();
        test.race().await.unwrap();

        assert_eq!(
            executor.command_lines(),
            vec![
                "go test -timeout 10m -covermode=atomic -coverprofile=coverage.txt ./...",
                "go test -timeout 10m -race ./...",
            ]
        );
    }
}
