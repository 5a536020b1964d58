use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use crate::error::{TaskError, TaskResult};
use crate::logger::Logger;
use crate::operation::{Operation, OperationRef};

/// How an operation that targets several platforms reacts to a failing
/// target. One policy applies to every multi-target operation of a process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FanOutPolicy {
    /// Run targets in order and stop at the first failure.
    #[default]
    FailFast,
    /// Run every target concurrently and report all failures together.
    Aggregate,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown fan-out policy `{0}` (expected fail-fast or aggregate)")]
pub struct FanOutParseError(String);

impl FromStr for FanOutPolicy {
    type Err = FanOutParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fail-fast" | "failfast" | "fail_fast" => Ok(FanOutPolicy::FailFast),
            "aggregate" => Ok(FanOutPolicy::Aggregate),
            _ => Err(FanOutParseError(s.to_string())),
        }
    }
}

impl fmt::Display for FanOutPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            FanOutPolicy::FailFast => "fail-fast",
            FanOutPolicy::Aggregate => "aggregate",
        };
        write!(f, "{value}")
    }
}

#[derive(Clone)]
struct Stage {
    label: String,
    operation: OperationRef,
}

/// An ordered sequence of operations. The first failing stage stops the run
/// and comes back wrapped with its label; stages that already succeeded are
/// left as they are.
#[derive(Clone)]
pub struct Pipeline {
    name: String,
    description: String,
    stages: Vec<Stage>,
    logger: Option<Logger>,
}

impl Pipeline {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            stages: Vec::new(),
            logger: None,
        }
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn stage(mut self, label: impl Into<String>, operation: OperationRef) -> Self {
        self.stages.push(Stage {
            label: label.into(),
            operation,
        });
        self
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub async fn execute(&self) -> TaskResult<()> {
        let start = Instant::now();
        let total = self.stages.len();

        for (index, stage) in self.stages.iter().enumerate() {
            if let Some(logger) = &self.logger {
                logger.header(&format!(
                    "[{}/{}] {} ({})",
                    index + 1,
                    total,
                    stage.label,
                    stage.operation.name()
                ));
            }

            let stage_start = Instant::now();
            if let Err(err) = stage.operation.run().await {
                if let Some(logger) = &self.logger {
                    logger.error(&format!(
                        "{} failed after {:.1}s",
                        stage.label,
                        stage_start.elapsed().as_secs_f64()
                    ));
                }
                return Err(TaskError::composition(stage.label.clone(), err));
            }

            if let Some(logger) = &self.logger {
                logger.success(&format!(
                    "{} passed in {:.1}s",
                    stage.label,
                    stage_start.elapsed().as_secs_f64()
                ));
            }
        }

        if let Some(logger) = &self.logger {
            logger.success(&format!(
                "{} completed in {:.1}s",
                self.name,
                start.elapsed().as_secs_f64()
            ));
        }

        Ok(())
    }

    pub fn into_operation(self) -> OperationRef {
        std::sync::Arc::new(self)
    }
}

#[async_trait]
impl Operation for Pipeline {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn run(&self) -> TaskResult<()> {
        self.execute().await
    }
}

/// Runs one operation per target under `policy`.
///
/// `FailFast` runs targets sequentially in the given order; `Aggregate`
/// spawns them all, waits for every one, and returns a single
/// [`TaskError::Aggregate`] listing the failures in target order.
pub async fn fan_out(
    operation: &str,
    policy: FanOutPolicy,
    targets: Vec<(String, OperationRef)>,
) -> TaskResult<()> {
    match policy {
        FanOutPolicy::FailFast => {
            for (label, target) in targets {
                target
                    .run()
                    .await
                    .map_err(|err| TaskError::composition(label, err))?;
            }
            Ok(())
        }
        FanOutPolicy::Aggregate => {
            let total = targets.len();
            let handles: Vec<_> = targets
                .into_iter()
                .map(|(label, target)| {
                    let handle = tokio::spawn(async move { target.run().await });
                    (label, handle)
                })
                .collect();

            let mut failures = Vec::new();
            let mut panic = None;
            for (label, handle) in handles {
                let result = match handle.await {
                    Ok(result) => result,
                    Err(join_err) if join_err.is_panic() => {
                        if panic.is_none() {
                            panic = Some(join_err.into_panic());
                        }
                        continue;
                    }
                    Err(join_err) => Err(TaskError::Execution {
                        command: label.clone(),
                        code: None,
                        reason: join_err.to_string(),
                    }),
                };

                if let Err(err) = result {
                    failures.push(TaskError::composition(label, err));
                }
            }

            // Re-raised only once every target has settled.
            if let Some(payload) = panic {
                std::panic::resume_unwind(payload);
            }

            if failures.is_empty() {
                Ok(())
            } else {
                Err(TaskError::Aggregate {
                    operation: operation.to_string(),
                    total,
                    failures,
                })
            }
        }
    }
}
