//! gRPC utilities shared by micros services.
//!
//! - Retry helpers for service-to-service calls
//! - Bill item service client used for billing reconciliation

pub mod bill_item_client;
pub mod retry;

// Include the generated proto code for clients
pub mod proto {
    pub mod order {
        tonic::include_proto!("micros.order.v1");
    }
}

pub use bill_item_client::{BillItemClient, BillItemClientConfig};
pub use retry::{is_retryable, retry_grpc_call};

// Re-export commonly used tonic types
pub use tonic::{Code, Request, Response, Status};
