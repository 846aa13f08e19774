// Adapters layer: concrete document stores and the HTTP front end.

pub mod expression;
pub mod memory;

#[cfg(feature = "cli")]
pub mod http;

#[cfg(feature = "lambda")]
pub mod dynamodb;
