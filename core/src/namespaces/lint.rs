use crate::command::GoCommands;
use crate::error::TaskResult;
use crate::namespace::{Namespace, NamespaceContext, NamespaceDescriptor};

const LINTER: &str = "golangci-lint";

/// Static analysis with golangci-lint and go vet.
#[derive(Clone)]
pub struct Lint {
    ctx: NamespaceContext,
    go: GoCommands,
}

impl Lint {
    pub fn new(ctx: &NamespaceContext) -> Self {
        Self {
            ctx: ctx.clone(),
            go: GoCommands::new(&ctx.config),
        }
    }

    /// golangci-lint followed by go vet.
    pub async fn run(&self) -> TaskResult<()> {
        self.ctx.require(LINTER)?;
        self.ctx.logger.info("Running golangci-lint");
        self.ctx.run(self.go.lint(&[])).await?;
        self.vet().await
    }

    pub async fn fix(&self) -> TaskResult<()> {
        self.ctx.require(LINTER)?;
        self.ctx.run(self.go.lint(&["--fix"])).await
    }

    pub async fn fast(&self) -> TaskResult<()> {
        self.ctx.require(LINTER)?;
        self.ctx.run(self.go.lint(&["--fast"])).await
    }

    pub async fn vet(&self) -> TaskResult<()> {
        self.ctx.logger.info("Running go vet");
        self.ctx.run(self.go.vet()).await
    }
}

impl Namespace for Lint {
    fn descriptor(&self) -> NamespaceDescriptor {
        NamespaceDescriptor::builder("lint", "Static analysis")
            .default_op("Run golangci-lint and go vet", self.clone(), |l| async move {
                l.run().await
            })
            .op("fix", "Run golangci-lint with --fix", self.clone(), |l| async move {
                l.fix().await
            })
            .op("fast", "Run only the fast linters", self.clone(), |l| async move {
                l.fast().await
            })
            .op("vet", "Run go vet", self.clone(), |l| async move { l.vet().await })
            .build()
    }
}
