//! The standard Go project namespaces.

pub mod build;
pub mod ci;
pub mod deps;
pub mod format;
pub mod lint;
pub mod test;
pub mod tools;

pub use build::Build;
pub use ci::Ci;
pub use deps::Deps;
pub use format::Format;
pub use lint::Lint;
pub use test::Test;
pub use tools::Tools;

use crate::error::TaskResult;
use crate::namespace::{Namespace, NamespaceContext};
use crate::registry::TargetRegistry;

/// Short names for the targets people type most.
pub const STANDARD_ALIASES: [(&str, &str); 7] = [
    ("fmt", "format"),
    ("vet", "lint:vet"),
    ("cover", "test:cover"),
    ("tidy", "deps:tidy"),
    ("audit", "deps:audit"),
    ("precommit", "ci:precommit"),
    ("release", "ci:release"),
];

/// Builds every standard namespace over `ctx` and registers it along with
/// [`STANDARD_ALIASES`]. Nothing is executed.
pub fn standard_registry(ctx: &NamespaceContext) -> TaskResult<TargetRegistry> {
    let namespaces: Vec<Box<dyn Namespace>> = vec![
        Box::new(Build::new(ctx)),
        Box::new(Lint::new(ctx)),
        Box::new(Test::new(ctx)),
        Box::new(Format::new(ctx)),
        Box::new(Deps::new(ctx)),
        Box::new(Tools::new(ctx)),
        Box::new(Ci::new(ctx)),
    ];

    let mut registry = TargetRegistry::new();
    for namespace in namespaces {
        registry.register(namespace.descriptor())?;
    }
    for (alias, target) in STANDARD_ALIASES {
        registry.alias(alias, target)?;
    }
    Ok(registry)
}
