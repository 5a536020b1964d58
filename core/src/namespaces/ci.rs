use std::future::Future;

use crate::error::TaskResult;
use crate::namespace::{Namespace, NamespaceContext, NamespaceDescriptor};
use crate::namespaces::{Build, Format, Lint, Test};
use crate::operation::{operation, OperationRef};
use crate::pipeline::Pipeline;

/// Pipelines assembled from the other namespaces.
#[derive(Clone)]
pub struct Ci {
    ctx: NamespaceContext,
    build: Build,
    format: Format,
    lint: Lint,
    test: Test,
}

fn step<T, F, Fut>(name: &str, receiver: T, body: F) -> OperationRef
where
    T: Clone + Send + Sync + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = TaskResult<()>> + Send + 'static,
{
    operation(name, "", receiver, body)
}

impl Ci {
    pub fn new(ctx: &NamespaceContext) -> Self {
        Self {
            ctx: ctx.clone(),
            build: Build::new(ctx),
            format: Format::new(ctx),
            lint: Lint::new(ctx),
            test: Test::new(ctx),
        }
    }

    fn pipeline(&self, name: &str, description: &str) -> Pipeline {
        Pipeline::new(name, description).with_logger(self.ctx.logger.clone())
    }

    /// format:check, lint, test:race, build
    pub fn full_pipeline(&self) -> Pipeline {
        self.pipeline("ci", "Check formatting, lint, race-test and build")
            .stage(
                "format:check",
                step("format:check", self.format.clone(), |f| async move {
                    f.check().await
                }),
            )
            .stage(
                "lint",
                step("lint", self.lint.clone(), |l| async move { l.run().await }),
            )
            .stage(
                "test:race",
                step("test:race", self.test.clone(), |t| async move {
                    t.race().await
                }),
            )
            .stage(
                "build",
                step("build", self.build.clone(), |b| async move { b.host().await }),
            )
    }

    /// lint:fast, test:unit, build
    pub fn fast_pipeline(&self) -> Pipeline {
        self.pipeline("ci:fast", "Fast lint, unit tests and build")
            .stage(
                "lint:fast",
                step("lint:fast", self.lint.clone(), |l| async move { l.fast().await }),
            )
            .stage(
                "test:unit",
                step("test:unit", self.test.clone(), |t| async move {
                    t.unit().await
                }),
            )
            .stage(
                "build",
                step("build", self.build.clone(), |b| async move { b.host().await }),
            )
    }

    /// format, test:short
    pub fn precommit_pipeline(&self) -> Pipeline {
        self.pipeline("ci:precommit", "Format sources and run short tests")
            .stage(
                "format",
                step("format", self.format.clone(), |f| async move {
                    f.write().await
                }),
            )
            .stage(
                "test:short",
                step("test:short", self.test.clone(), |t| async move {
                    t.short().await
                }),
            )
    }

    /// The full CI pipeline followed by build:all.
    pub fn release_pipeline(&self) -> Pipeline {
        self.pipeline("ci:release", "Full CI, then build every platform")
            .stage("ci", self.full_pipeline().into_operation())
            .stage(
                "build:all",
                step("build:all", self.build.clone(), |b| async move {
                    b.all().await
                }),
            )
    }

    pub async fn run(&self) -> TaskResult<()> {
        self.full_pipeline().execute().await
    }

    pub async fn fast(&self) -> TaskResult<()> {
        self.fast_pipeline().execute().await
    }

    pub async fn precommit(&self) -> TaskResult<()> {
        self.precommit_pipeline().execute().await
    }

    pub async fn release(&self) -> TaskResult<()> {
        self.release_pipeline().execute().await
    }
}

impl Namespace for Ci {
    fn descriptor(&self) -> NamespaceDescriptor {
        NamespaceDescriptor::builder("ci", "Continuous integration pipelines")
            .default_ref(self.full_pipeline().into_operation())
            .op_ref("fast", self.fast_pipeline().into_operation())
            .op_ref("precommit", self.precommit_pipeline().into_operation())
            .op_ref("release", self.release_pipeline().into_operation())
            .build()
    }
}
