//! Bill item service gRPC client.
//!
//! The bill item service belongs to the order domain. Its status update is
//! not transactional: a response can carry per-item errors for a subset of
//! the updates while the rest were applied.

use std::time::Duration;
use tonic::Request;
use tonic::transport::{Channel, Endpoint};

use super::proto::order::bill_item_service_client::BillItemServiceClient;
use super::proto::order::{
    BillItemStatusUpdate, BillingStatus, UpdateBillItemStatusRequest,
    UpdateBillItemStatusResponse,
};
use super::retry::retry_grpc_call;
use crate::retry::RetryConfig;

/// Configuration for the bill item service client.
#[derive(Clone, Debug)]
pub struct BillItemClientConfig {
    /// The gRPC endpoint of the bill item service.
    pub endpoint: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub retry_config: RetryConfig,
}

impl Default for BillItemClientConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:50061".to_string(),
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(30),
            retry_config: RetryConfig::quick(),
        }
    }
}

/// Bill item service client with retry support.
#[derive(Clone)]
pub struct BillItemClient {
    client: BillItemServiceClient<Channel>,
    retry_config: RetryConfig,
}

impl BillItemClient {
    /// Create a new client with the given configuration.
    ///
    /// The channel connects lazily so the owning service can start while
    /// the bill item service is still coming up.
    pub fn new(config: BillItemClientConfig) -> Result<Self, tonic::transport::Error> {
        let channel = Endpoint::from_shared(config.endpoint)?
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .connect_lazy();

        Ok(Self {
            client: BillItemServiceClient::new(channel),
            retry_config: config.retry_config,
        })
    }

    /// Update the billing status of several bill items at once.
    ///
    /// Returns the per-item errors reported by the service; an empty list
    /// means every update was applied.
    pub async fn update_bill_item_status(
        &self,
        organization_id: &str,
        acting_user_id: &str,
        updates: Vec<(i32, BillingStatus)>,
    ) -> Result<UpdateBillItemStatusResponse, tonic::Status> {
        let client = self.client.clone();
        let request = UpdateBillItemStatusRequest {
            organization_id: organization_id.to_string(),
            acting_user_id: acting_user_id.to_string(),
            updates: updates
                .into_iter()
                .map(|(sequence_number, status)| BillItemStatusUpdate {
                    bill_item_sequence_number: sequence_number,
                    billing_status: status.into(),
                })
                .collect(),
        };

        retry_grpc_call(&self.retry_config, "update_bill_item_status", || {
            let mut c = client.clone();
            let req = request.clone();
            async move {
                let response = c.update_bill_item_status(Request::new(req)).await?;
                Ok(response.into_inner())
            }
        })
        .await
    }
}
