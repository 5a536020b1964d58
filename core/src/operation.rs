use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::error::TaskResult;

/// A named, zero-argument unit of work.
///
/// Operations close over everything they need when they are built, so
/// running one twice runs the same thing twice.
#[async_trait]
pub trait Operation: Send + Sync {
    /// Qualified name, `namespace` or `namespace:sub`.
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    async fn run(&self) -> TaskResult<()>;
}

pub type OperationRef = Arc<dyn Operation>;

impl fmt::Debug for dyn Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("name", &self.name())
            .finish()
    }
}

/// Adapts an async function over a cloneable receiver, typically a
/// namespace handle, into an [`Operation`].
pub struct FnOperation<T, F> {
    name: String,
    description: String,
    receiver: T,
    body: F,
}

#[async_trait]
impl<T, F, Fut> Operation for FnOperation<T, F>
where
    T: Clone + Send + Sync + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = TaskResult<()>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn run(&self) -> TaskResult<()> {
        (self.body)(self.receiver.clone()).await
    }
}

pub fn operation<T, F, Fut>(
    name: impl Into<String>,
    description: impl Into<String>,
    receiver: T,
    body: F,
) -> OperationRef
where
    T: Clone + Send + Sync + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = TaskResult<()>> + Send + 'static,
{
    Arc::new(FnOperation {
        name: name.into(),
        description: description.into(),
        receiver,
        body,
    })
}
