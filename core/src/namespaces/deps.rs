use crate::command::GoCommands;
use crate::error::TaskResult;
use crate::namespace::{Namespace, NamespaceContext, NamespaceDescriptor};

/// Go module maintenance.
#[derive(Clone)]
pub struct Deps {
    ctx: NamespaceContext,
    go: GoCommands,
}

impl Deps {
    pub fn new(ctx: &NamespaceContext) -> Self {
        Self {
            ctx: ctx.clone(),
            go: GoCommands::new(&ctx.config),
        }
    }

    pub async fn download(&self) -> TaskResult<()> {
        self.ctx.run(self.go.go_mod("download")).await
    }

    pub async fn tidy(&self) -> TaskResult<()> {
        self.ctx.run(self.go.go_mod("tidy")).await
    }

    /// Upgrades every dependency, then tidies go.mod.
    pub async fn update(&self) -> TaskResult<()> {
        self.ctx.logger.info("Updating dependencies");
        self.ctx.run(self.go.deps_update()).await?;
        self.tidy().await
    }

    pub async fn verify(&self) -> TaskResult<()> {
        self.ctx.run(self.go.go_mod("verify")).await
    }

    pub async fn vendor(&self) -> TaskResult<()> {
        self.ctx.run(self.go.go_mod("vendor")).await
    }

    pub async fn graph(&self) -> TaskResult<()> {
        self.ctx.run(self.go.go_mod("graph")).await
    }

    pub async fn audit(&self) -> TaskResult<()> {
        self.ctx.require("govulncheck")?;
        self.ctx.logger.info("Scanning dependencies for known vulnerabilities");
        self.ctx.run(self.go.vulncheck()).await
    }
}

impl Namespace for Deps {
    fn descriptor(&self) -> NamespaceDescriptor {
        NamespaceDescriptor::builder("deps", "Module dependencies")
            .default_op("Download modules", self.clone(), |d| async move {
                d.download().await
            })
            .op("download", "Download modules", self.clone(), |d| async move {
                d.download().await
            })
            .op("tidy", "Run go mod tidy", self.clone(), |d| async move { d.tidy().await })
            .op("update", "Upgrade all dependencies", self.clone(), |d| async move {
                d.update().await
            })
            .op("verify", "Verify module checksums", self.clone(), |d| async move {
                d.verify().await
            })
            .op("vendor", "Vendor dependencies", self.clone(), |d| async move {
                d.vendor().await
            })
            .op("graph", "Print the module graph", self.clone(), |d| async move {
                d.graph().await
            })
            .op("audit", "Check for known vulnerabilities", self.clone(), |d| async move {
                d.audit().await
            })
            .build()
    }
}
