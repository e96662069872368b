pub mod error;
pub mod gateway;
pub mod image_model;
pub mod invoker;

pub use error::{FailureKind, GenerationError};
pub use image_model::{GenerationRequest, GenerationResult, Model};
pub use invoker::{HttpGateway, ImageGateway, ResilientInvoker, RetryPolicy};
