//! service-core: Shared infrastructure for micros microservices.
pub mod config;
pub mod error;
pub mod grpc;
pub mod observability;
pub mod retry;

pub use axum;
pub use tonic;
pub use tracing;
pub use validator;
