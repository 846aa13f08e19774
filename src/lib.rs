pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::cli::CliConfig;

#[cfg(feature = "lambda")]
pub use adapters::dynamodb::DynamoStore;
#[cfg(feature = "lambda")]
pub use config::lambda::LambdaConfig;

pub use adapters::memory::MemoryStore;
pub use core::dispatcher::{Dispatcher, Operation};
pub use core::runtime::InvocationLimiter;
pub use core::service::{DispatchService, Reply};
pub use domain::model::{Outcome, Request};
pub use domain::ports::DocumentStore;
pub use utils::error::{DispatchError, ErrorKind, Result};
