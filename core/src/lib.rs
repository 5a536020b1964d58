pub mod cli;
pub mod command;
pub mod config;
pub mod error;
pub mod executor;
pub mod git;
pub mod history;
pub mod logger;
pub mod namespace;
pub mod namespaces;
pub mod operation;
pub mod pipeline;
pub mod platform;
pub mod registry;
pub mod toolchain;

pub use cli::Cli;
pub use command::{CommandSpec, GoCommands};
pub use config::Config;
pub use error::{TaskError, TaskResult};
pub use executor::{CommandExecutor, ProcessExecutor, RecordingExecutor, ValidatingExecutor};
pub use history::{RunHistory, RunHistoryEntry};
pub use logger::{LogLevel, Logger};
pub use namespace::{Namespace, NamespaceContext, NamespaceDescriptor};
pub use namespaces::standard_registry;
pub use operation::{Operation, OperationRef};
pub use pipeline::{fan_out, FanOutPolicy, Pipeline};
pub use platform::Platform;
pub use registry::{TargetEntry, TargetRegistry};
pub use toolchain::{StaticToolchain, SystemToolchain, Toolchain};
