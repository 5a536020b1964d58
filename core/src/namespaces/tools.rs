use std::collections::BTreeMap;

use crate::command::GoCommands;
use crate::error::{TaskError, TaskResult};
use crate::namespace::{Namespace, NamespaceContext, NamespaceDescriptor};

/// Development tools installed through `go install`.
#[derive(Clone)]
pub struct Tools {
    ctx: NamespaceContext,
    go: GoCommands,
    tools: BTreeMap<String, String>,
}

impl Tools {
    pub fn new(ctx: &NamespaceContext) -> Self {
        Self {
            ctx: ctx.clone(),
            go: GoCommands::new(&ctx.config),
            tools: ctx.config.tools.install.clone(),
        }
    }

    fn missing(&self) -> Vec<(&str, &str)> {
        self.tools
            .iter()
            .filter(|(tool, _)| !self.ctx.toolchain.is_available(tool))
            .map(|(tool, module)| (tool.as_str(), module.as_str()))
            .collect()
    }

    /// Installs every configured tool that is not already on PATH.
    pub async fn install(&self) -> TaskResult<()> {
        self.ctx.require("go")?;

        let missing = self.missing();
        if missing.is_empty() {
            self.ctx.logger.success("All tools are installed");
            return Ok(());
        }

        for (tool, module) in missing {
            self.ctx.logger.info(&format!("Installing {} ({})", tool, module));
            self.ctx
                .run(self.go.install_tool(module))
                .await
                .map_err(|err| TaskError::composition(format!("install {}", tool), err))?;
        }
        Ok(())
    }

    pub async fn check(&self) -> TaskResult<()> {
        let missing: Vec<&str> = self.missing().into_iter().map(|(tool, _)| tool).collect();
        if missing.is_empty() {
            self.ctx.logger.success("All tools are installed");
            return Ok(());
        }

        Err(TaskError::MissingDependency {
            tool: missing.join(", "),
            hint: "run `taskmill tools:install`".to_string(),
        })
    }

    pub async fn list(&self) -> TaskResult<()> {
        for (tool, module) in &self.tools {
            match self.ctx.toolchain.version(tool).await {
                Some(version) => self.ctx.logger.info(&format!("{:<16} {}", tool, version)),
                None if self.ctx.toolchain.is_available(tool) => {
                    self.ctx.logger.info(&format!("{:<16} installed", tool))
                }
                None => self
                    .ctx
                    .logger
                    .warn(&format!("{:<16} missing ({})", tool, module)),
            }
        }
        Ok(())
    }
}

impl Namespace for Tools {
    fn descriptor(&self) -> NamespaceDescriptor {
        NamespaceDescriptor::builder("tools", "Development tools")
            .default_op("Install missing tools", self.clone(), |t| async move {
                t.install().await
            })
            .op("install", "Install missing tools", self.clone(), |t| async move {
                t.install().await
            })
            .op("check", "Fail if any tool is missing", self.clone(), |t| async move {
                t.check().await
            })
            .op("list", "Show tool versions", self.clone(), |t| async move {
                t.list().await
            })
            .build()
    }
}
