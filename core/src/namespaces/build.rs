use crate::command::GoCommands;
use crate::error::{TaskError, TaskResult};
use crate::namespace::{Namespace, NamespaceContext, NamespaceDescriptor};
use crate::operation::{operation, OperationRef};
use crate::pipeline::{fan_out, FanOutPolicy};
use crate::platform::Platform;

/// Compiles the project binary, natively or for the configured platforms.
#[derive(Clone)]
pub struct Build {
    ctx: NamespaceContext,
    go: GoCommands,
    platforms: Vec<Platform>,
    policy: FanOutPolicy,
    clean_cache: bool,
}

impl Build {
    pub fn new(ctx: &NamespaceContext) -> Self {
        Self {
            ctx: ctx.clone(),
            go: GoCommands::new(&ctx.config),
            platforms: ctx.config.build.platforms.clone(),
            policy: ctx.config.build.fan_out,
            clean_cache: ctx.config.build.clean_cache,
        }
    }

    /// Builds for the host platform.
    pub async fn host(&self) -> TaskResult<()> {
        self.ctx.logger.info("Building for the host platform");
        self.ctx.run(self.go.build()).await
    }

    /// Builds for one platform. `GOOS`/`GOARCH` only reach the child process.
    pub async fn platform(&self, platform: &Platform) -> TaskResult<()> {
        self.ctx.logger.info(&format!("Building for {}", platform));
        self.ctx.run(self.go.build_platform(platform)).await
    }

    pub async fn all(&self) -> TaskResult<()> {
        self.fan_out_platforms("build:all", self.platforms.clone()).await
    }

    pub async fn linux(&self) -> TaskResult<()> {
        self.platform(&Platform::new("linux", "amd64")).await
    }

    pub async fn darwin(&self) -> TaskResult<()> {
        let platforms = vec![
            Platform::new("darwin", "amd64"),
            Platform::new("darwin", "arm64"),
        ];
        self.fan_out_platforms("build:darwin", platforms).await
    }

    pub async fn windows(&self) -> TaskResult<()> {
        self.platform(&Platform::new("windows", "amd64")).await
    }

    /// Removes the output directory and Go's test cache. Safe to repeat.
    pub async fn clean(&self) -> TaskResult<()> {
        let output = self.ctx.resolve_path(self.go.output_dir());

        if tokio::fs::try_exists(&output).await.unwrap_or(false) {
            self.ctx
                .logger
                .info(&format!("Removing {}", output.display()));
            tokio::fs::remove_dir_all(&output)
                .await
                .map_err(|err| TaskError::io("failed to remove build output", &output, err))?;
        }

        self.ctx.run(self.go.clean_test_cache()).await?;

        if self.clean_cache {
            self.ctx.run(self.go.clean_build_cache()).await?;
        }

        self.ctx.logger.success("Clean complete");
        Ok(())
    }

    pub async fn install(&self) -> TaskResult<()> {
        self.ctx.run(self.go.install()).await
    }

    pub async fn generate(&self) -> TaskResult<()> {
        self.ctx.run(self.go.generate()).await
    }

    async fn fan_out_platforms(&self, name: &str, platforms: Vec<Platform>) -> TaskResult<()> {
        self.ctx.logger.debug(&format!(
            "{}: {} platform(s), {}",
            name,
            platforms.len(),
            self.policy
        ));

        let targets = platforms
            .into_iter()
            .map(|platform| (platform.to_string(), self.platform_operation(platform)))
            .collect();

        fan_out(name, self.policy, targets).await
    }

    fn platform_operation(&self, platform: Platform) -> OperationRef {
        let name = format!("build:{}", platform);
        operation(name, "", (self.clone(), platform), |(build, platform)| async move {
            build.platform(&platform).await
        })
    }
}

impl Namespace for Build {
    fn descriptor(&self) -> NamespaceDescriptor {
        NamespaceDescriptor::builder("build", "Compile the project")
            .default_op("Build for the host platform", self.clone(), |b| async move {
                b.host().await
            })
            .op("all", "Build for every configured platform", self.clone(), |b| async move {
                b.all().await
            })
            .op("linux", "Build for linux/amd64", self.clone(), |b| async move {
                b.linux().await
            })
            .op("darwin", "Build for darwin/amd64 and darwin/arm64", self.clone(), |b| async move {
                b.darwin().await
            })
            .op("windows", "Build for windows/amd64", self.clone(), |b| async move {
                b.windows().await
            })
            .op("clean", "Remove build artifacts and the test cache", self.clone(), |b| async move {
                b.clean().await
            })
            .op("install", "Install the binary with go install", self.clone(), |b| async move {
                b.install().await
            })
            .op("generate", "Run go generate", self.clone(), |b| async move {
                b.generate().await
            })
            .build()
    }
}
