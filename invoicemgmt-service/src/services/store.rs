//! Repository contracts used by the lifecycle engine.
//!
//! Every repository method runs inside the unit of work opened by
//! [`LedgerStore::begin`] and is scoped to that unit's tenant.

use async_trait::async_trait;
use service_core::error::AppError;
use tracing::warn;
use uuid::Uuid;

use crate::models::{
    AdjustmentUpsert, BankAccount, BillItem, BulkPayment, BulkPaymentStatus, Invoice,
    InvoiceAdjustment, InvoiceBillItem, InvoiceUpdate, NewActionLog, NewBulkPayment, NewPayment,
    Payment, PaymentStatus, PaymentUpdate, StudentPaymentDetail,
};

#[async_trait]
pub trait InvoiceRepository: Send {
    async fn find_invoice(&mut self, invoice_id: Uuid) -> Result<Option<Invoice>, AppError>;

    async fn update_invoice(
        &mut self,
        invoice_id: Uuid,
        update: InvoiceUpdate,
    ) -> Result<Invoice, AppError>;

    /// Stage ids into the working set used by bulk operations.
    async fn stage_invoice_ids(&mut self, invoice_ids: &[Uuid]) -> Result<(), AppError>;

    async fn find_staged_invoices(&mut self) -> Result<Vec<Invoice>, AppError>;

    /// Set every staged invoice to ISSUED in one statement.
    async fn issue_staged_invoices(&mut self) -> Result<u64, AppError>;

    async fn retrieve_invoice(&mut self, invoice_id: Uuid) -> Result<Invoice, AppError> {
        self.find_invoice(invoice_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("invoice {} not found", invoice_id)))
    }
}

#[async_trait]
pub trait PaymentRepository: Send {
    /// The authoritative payment of an invoice. `None` is a valid state.
    async fn find_latest_payment(&mut self, invoice_id: Uuid)
        -> Result<Option<Payment>, AppError>;

    /// Insert payments in one batch. A sequence number collision is a
    /// `Conflict`.
    async fn create_payments(&mut self, payments: &[NewPayment]) -> Result<Vec<Payment>, AppError>;

    async fn update_payment(
        &mut self,
        payment_id: Uuid,
        update: PaymentUpdate,
    ) -> Result<Payment, AppError>;

    /// Try to take the tenant's payment sequence lock for the rest of the
    /// unit of work.
    async fn try_lock_payment_sequence(&mut self) -> Result<bool, AppError>;

    /// Highest payment sequence number in use, 0 when there is none.
    async fn latest_payment_sequence_number(&mut self) -> Result<i32, AppError>;

    /// Payments of a bulk payment, other than `payment_id`, whose status
    /// is not `status`.
    async fn count_other_bulk_payments_not_in_status(
        &mut self,
        bulk_payment_id: Uuid,
        payment_id: Uuid,
        status: PaymentStatus,
    ) -> Result<i64, AppError>;
}

#[async_trait]
pub trait ActionLogRepository: Send {
    async fn create_action_logs(&mut self, logs: &[NewActionLog]) -> Result<u64, AppError>;
}

#[async_trait]
pub trait BulkPaymentRepository: Send {
    async fn create_bulk_payment(
        &mut self,
        bulk_payment: NewBulkPayment,
    ) -> Result<BulkPayment, AppError>;

    async fn update_bulk_payment_status(
        &mut self,
        bulk_payment_id: Uuid,
        status: BulkPaymentStatus,
    ) -> Result<(), AppError>;
}

#[async_trait]
pub trait BillItemRepository: Send {
    async fn find_invoice_bill_items(
        &mut self,
        invoice_id: Uuid,
    ) -> Result<Vec<InvoiceBillItem>, AppError>;

    async fn find_bill_item(&mut self, sequence_number: i32)
        -> Result<Option<BillItem>, AppError>;
}

#[async_trait]
pub trait AdjustmentRepository: Send {
    /// A non-deleted adjustment.
    async fn find_adjustment(
        &mut self,
        adjustment_id: Uuid,
    ) -> Result<Option<InvoiceAdjustment>, AppError>;

    async fn upsert_adjustments(
        &mut self,
        adjustments: &[AdjustmentUpsert],
    ) -> Result<Vec<InvoiceAdjustment>, AppError>;

    async fn soft_delete_adjustments(&mut self, adjustment_ids: &[Uuid]) -> Result<u64, AppError>;
}

#[async_trait]
pub trait StudentRepository: Send {
    async fn find_payment_details(
        &mut self,
        student_ids: &[Uuid],
    ) -> Result<Vec<StudentPaymentDetail>, AppError>;

    async fn find_bank_accounts(
        &mut self,
        student_ids: &[Uuid],
    ) -> Result<Vec<BankAccount>, AppError>;
}

/// One unit of work. Dropping it without `commit` discards its writes.
#[async_trait]
pub trait LedgerTx:
    InvoiceRepository
    + PaymentRepository
    + ActionLogRepository
    + BulkPaymentRepository
    + BillItemRepository
    + AdjustmentRepository
    + StudentRepository
    + Send
{
    async fn commit(self) -> Result<(), AppError>;

    async fn rollback(self) -> Result<(), AppError>;
}

/// Opens units of work.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    type Tx: LedgerTx;

    async fn begin(&self, tenant_id: Uuid) -> Result<Self::Tx, AppError>;
}

/// Commit on success, roll back on error. The body's error wins over a
/// rollback error.
pub async fn finish<T, X: LedgerTx>(tx: X, result: Result<T, AppError>) -> Result<T, AppError> {
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                warn!(error = %rollback_err, "Rollback failed");
            }
            Err(err)
        }
    }
}
