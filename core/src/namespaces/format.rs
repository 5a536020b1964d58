use crate::command::GoCommands;
use crate::error::{TaskError, TaskResult};
use crate::namespace::{Namespace, NamespaceContext, NamespaceDescriptor};

#[derive(Clone)]
pub struct Format {
    ctx: NamespaceContext,
    go: GoCommands,
}

impl Format {
    pub fn new(ctx: &NamespaceContext) -> Self {
        Self {
            ctx: ctx.clone(),
            go: GoCommands::new(&ctx.config),
        }
    }

    /// Rewrites sources in place with gofmt.
    pub async fn write(&self) -> TaskResult<()> {
        self.ctx.run(self.go.gofmt_write()).await
    }

    /// Fails with the list of files gofmt would change.
    pub async fn check(&self) -> TaskResult<()> {
        let listing = self.ctx.output(self.go.gofmt_list()).await?;
        let files: Vec<String> = listing
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();

        if files.is_empty() {
            self.ctx.logger.success("All files are formatted");
            return Ok(());
        }

        for file in &files {
            self.ctx.logger.warn(&format!("needs formatting: {}", file));
        }
        Err(TaskError::Unformatted(files))
    }

    pub async fn imports(&self) -> TaskResult<()> {
        self.ctx.require("goimports")?;
        self.ctx.run(self.go.goimports_write()).await
    }
}

impl Namespace for Format {
    fn descriptor(&self) -> NamespaceDescriptor {
        NamespaceDescriptor::builder("format", "Source formatting")
            .default_op("Format sources with gofmt", self.clone(), |f| async move {
                f.write().await
            })
            .op("check", "Fail if any file needs formatting", self.clone(), |f| async move {
                f.check().await
            })
            .op("imports", "Fix imports with goimports", self.clone(), |f| async move {
                f.imports().await
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
    async fn test_check_reports_unformatted_files() {
        let executor = RecordingExecutor::new()
            .respond("gofmt", "main.go\ninternal/api/handler.go\n")
            .into_shared();
        let format = Format::new(&fixtures::context(executor.clone()));

        match format.check().await {
            Err(TaskError::Unformatted(files)) => {
                assert_eq!(files, vec!["main.go", "internal/api/handler.go"]);
            }
            other => panic!("Expected Unformatted, got {:?}", other),
        }
        assert_eq!(executor.command_lines(), vec!["gofmt -s -l ."]);
    }

    #[tokio::test]
    async fn test_check_passes_on_clean_tree() {
        let executor = RecordingExecutor::new().respond("gofmt", "\n").into_shared();
        let format = Format::new(&fixtures::context(executor));

        assert!(format.check().await.is_ok());
    }

    #[tokio::test]
    async fn test_default_writes_in_place() {
        let executor = RecordingExecutor::new().into_shared();
        let descriptor = Format::new(&fixtures::context(executor.clone())).descriptor();

        descriptor.default_operation().run().await.unwrap();
        assert_eq!(executor.command_lines(), vec!["gofmt -s -w ."]);
    }
}
