//! Billing reconciliation with the order domain's bill item service.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use service_core::error::AppError;
use service_core::grpc::BillItemClient;
use service_core::grpc::proto::order::BillingStatus as BillingStatusProto;
use tracing::{error, info, instrument};

use crate::models::BillingStatus;

/// Restoration request for one bill item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BillItemRestoration {
    pub bill_item_sequence_number: i32,
    pub billing_status: BillingStatus,
}

/// Error the billing service reported for one bill item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillItemError {
    pub bill_item_sequence_number: i32,
    pub error: String,
}

#[async_trait]
pub trait BillingReconciliation: Send + Sync {
    /// Send restorations and return the per-item errors. The remote side
    /// has no rollback; items without an error were applied.
    async fn restore_bill_item_status(
        &self,
        items: &[BillItemRestoration],
        acting_user_id: &str,
        organization_id: &str,
    ) -> Result<Vec<BillItemError>, AppError>;
}

/// Status a bill item goes back to when its invoice is voided.
///
/// It returns to PENDING only if it was pending before invoicing and its
/// bill date has not passed yet; otherwise it should already be billed.
pub fn restoration_status(
    past_billing_status: Option<BillingStatus>,
    bill_date: DateTime<Utc>,
    now: DateTime<Utc>,
) -> BillingStatus {
    if past_billing_status == Some(BillingStatus::Pending) && bill_date > now {
        BillingStatus::Pending
    } else {
        BillingStatus::Billed
    }
}

/// Call the billing service and turn any failure into
/// `ReconciliationFailed`. An empty batch is not sent.
#[instrument(skip(billing, items), fields(items = items.len()))]
pub async fn restore_bill_items<B>(
    billing: &B,
    items: &[BillItemRestoration],
    acting_user_id: &str,
    organization_id: &str,
) -> Result<(), AppError>
where
    B: BillingReconciliation + ?Sized,
{
    if items.is_empty() {
        return Ok(());
    }

    let errors = billing
        .restore_bill_item_status(items, acting_user_id, organization_id)
        .await
        .map_err(|e| match e {
            AppError::ReconciliationFailed(_) => e,
            other => AppError::ReconciliationFailed(anyhow::anyhow!(
                "Failed to update bill item status: {}",
                other
            )),
        })?;

    if !errors.is_empty() {
        let joined = errors
            .iter()
            .map(|e| format!("bill item {}: {}", e.bill_item_sequence_number, e.error))
            .collect::<Vec<_>>()
            .join("; ");
        error!(failed_items = errors.len(), errors = %joined, "Bill item restoration partially failed");
        return Err(AppError::ReconciliationFailed(anyhow::anyhow!(
            "bill item status update returned errors: {}",
            joined
        )));
    }

    info!("Bill item statuses restored");
    Ok(())
}

impl From<BillingStatus> for BillingStatusProto {
    fn from(status: BillingStatus) -> Self {
        match status {
            BillingStatus::Pending => BillingStatusProto::Pending,
            BillingStatus::Billed => BillingStatusProto::Billed,
            BillingStatus::Invoiced => BillingStatusProto::Invoiced,
            BillingStatus::Cancelled => BillingStatusProto::Cancelled,
        }
    }
}

#[async_trait]
impl BillingReconciliation for BillItemClient {
    async fn restore_bill_item_status(
        &self,
        items: &[BillItemRestoration],
        acting_user_id: &str,
        organization_id: &str,
    ) -> Result<Vec<BillItemError>, AppError> {
        let updates = items
            .iter()
            .map(|item| {
                (
                    item.bill_item_sequence_number,
                    BillingStatusProto::from(item.billing_status),
                )
            })
            .collect();

        let response = self
            .update_bill_item_status(organization_id, acting_user_id, updates)
            .await
            .map_err(|status: tonic::Status| {
                AppError::ReconciliationFailed(anyhow::anyhow!(
                    "BillItemService.UpdateBillItemStatus failed: {} ({:?})",
                    status.message(),
                    status.code()
                ))
            })?;

        Ok(response
            .errors
            .into_iter()
            .map(|e| BillItemError {
                bill_item_sequence_number: e.bill_item_sequence_number,
                error: e.error,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::sync::Mutex;

    #[test]
    fn test_pending_with_future_bill_date_stays_pending() {
        let now = Utc::now();
        assert_eq!(
            restoration_status(Some(BillingStatus::Pending), now + Duration::days(3), now),
            BillingStatus::Pending
        );
    }

    #[test]
    fn test_pending_with_past_bill_date_becomes_billed() {
        let now = Utc::now();
        assert_eq!(
            restoration_status(Some(BillingStatus::Pending), now - Duration::days(1), now),
            BillingStatus::Billed
        );
    }

    #[test]
    fn test_previously_billed_stays_billed() {
        let now = Utc::now();
        assert_eq!(
            restoration_status(Some(BillingStatus::Billed), now + Duration::days(3), now),
            BillingStatus::Billed
        );
        assert_eq!(
            restoration_status(None, now + Duration::days(3), now),
            BillingStatus::Billed
        );
    }

    struct ScriptedBilling {
        errors: Vec<BillItemError>,
        calls: Mutex<usize>,
    }

    #[async_trait]
    impl BillingReconciliation for ScriptedBilling {
        async fn restore_bill_item_status(
            &self,
            _items: &[BillItemRestoration],
            _acting_user_id: &str,
            _organization_id: &str,
        ) -> Result<Vec<BillItemError>, AppError> {
            *self.calls.lock().unwrap() += 1;
            Ok(self.errors.clone())
        }
    }

    fn item(n: i32) -> BillItemRestoration {
        BillItemRestoration {
            bill_item_sequence_number: n,
            billing_status: BillingStatus::Billed,
        }
    }

    #[tokio::test]
    async fn test_empty_batch_skips_call() {
        let billing = ScriptedBilling {
            errors: vec![],
            calls: Mutex::new(0),
        };
        restore_bill_items(&billing, &[], "user", "org").await.unwrap();
        assert_eq!(*billing.calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_per_item_errors_fail_the_request() {
        let billing = ScriptedBilling {
            errors: vec![BillItemError {
                bill_item_sequence_number: 2,
                error: "bill item is locked".to_string(),
            }],
            calls: Mutex::new(0),
        };
        let err = restore_bill_items(&billing, &[item(1), item(2)], "user", "org")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ReconciliationFailed(_)));
        assert!(err.to_string().contains("bill item 2: bill item is locked"));
    }
}
