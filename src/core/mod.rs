pub mod dispatcher;
pub mod runtime;
pub mod service;

pub use crate::domain::model::{Document, Request};
pub use crate::domain::ports::{ConfigProvider, DocumentStore};
pub use crate::utils::error::Result;
