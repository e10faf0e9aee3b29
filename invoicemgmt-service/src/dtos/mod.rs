//! Request and response types for the lifecycle operations.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::{
    AdjustmentAction, BulkIssueMethod, BulkPayment, Invoice, InvoiceAdjustment, InvoiceType,
    Payment, PaymentMethod,
};

/// Due and expiry date of a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub due_date: NaiveDate,
    pub expiry_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct IssueInvoiceRequest {
    #[validate(length(min = 1, message = "invoice id is required"))]
    pub invoice_id: String,
    pub payment_method: PaymentMethod,
    pub due_date: NaiveDate,
    pub expiry_date: NaiveDate,
    #[serde(default)]
    pub remarks: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ApproveInvoicePaymentRequest {
    #[validate(length(min = 1, message = "InvoiceId is required"))]
    pub invoice_id: String,
    pub payment_date: Option<DateTime<Utc>>,
    /// Overrides the recorded payment method; CASH or BANK_TRANSFER only.
    pub payment_method: Option<PaymentMethod>,
    #[serde(default)]
    pub remarks: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CancelInvoicePaymentRequest {
    #[validate(length(min = 1, message = "invoice id is required"))]
    pub invoice_id: String,
    #[serde(default)]
    pub remarks: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RefundInvoiceRequest {
    #[validate(length(min = 1, message = "invoice id is required"))]
    pub invoice_id: String,
    pub refund_method: PaymentMethod,
    pub amount: Decimal,
    #[serde(default)]
    pub remarks: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct VoidInvoiceRequest {
    #[validate(length(min = 1, message = "invoice id is required"))]
    pub invoice_id: String,
    #[serde(default)]
    pub remarks: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AddInvoicePaymentRequest {
    #[validate(length(min = 1, message = "invoice id is required"))]
    pub invoice_id: String,
    pub payment_method: PaymentMethod,
    pub amount: Decimal,
    pub due_date: NaiveDate,
    pub expiry_date: NaiveDate,
    #[serde(default)]
    pub remarks: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceAdjustmentDetail {
    /// Must be empty for `Create`, set for `Edit` and `Delete`.
    pub invoice_adjustment_id: Option<String>,
    #[serde(default)]
    pub description: String,
    pub amount: Decimal,
    pub action: AdjustmentAction,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpsertInvoiceAdjustmentsRequest {
    #[validate(length(min = 1, message = "invoice id is required"))]
    pub invoice_id: String,
    /// Expected invoice total after the adjustments are applied.
    pub invoice_total: Decimal,
    /// Expected invoice subtotal after the adjustments are applied.
    pub invoice_sub_total: Decimal,
    #[validate(length(min = 1, message = "invoice adjustment detail is empty"))]
    pub details: Vec<InvoiceAdjustmentDetail>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BulkIssueInvoicesRequest {
    #[validate(length(min = 1, message = "invoice ids cannot be empty"))]
    pub invoice_ids: Vec<String>,
    pub payment_method: BulkIssueMethod,
    pub convenience_store_dates: Option<DateRange>,
    pub direct_debit_dates: Option<DateRange>,
    #[validate(length(min = 1, message = "invoice types cannot be empty"))]
    pub invoice_types: Vec<InvoiceType>,
    #[serde(default)]
    pub remarks: String,
}

impl BulkIssueInvoicesRequest {
    /// Date range supplied for a payment method, if any.
    pub fn dates_for(&self, method: PaymentMethod) -> Option<DateRange> {
        match method {
            PaymentMethod::ConvenienceStore => self.convenience_store_dates,
            PaymentMethod::DirectDebit => self.direct_debit_dates,
            PaymentMethod::Cash | PaymentMethod::BankTransfer => None,
        }
    }
}

/// Result of a single-invoice transition.
#[derive(Debug, Clone, Serialize)]
pub struct InvoiceTransition {
    pub invoice: Invoice,
    pub payment: Option<Payment>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VoidInvoiceResponse {
    pub invoice: Invoice,
    pub payment: Option<Payment>,
    /// Number of bill items sent to the billing service for restoration.
    pub restored_bill_items: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpsertInvoiceAdjustmentsResponse {
    pub invoice: Invoice,
    pub adjustments: Vec<InvoiceAdjustment>,
    pub deleted: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkIssueInvoicesResponse {
    pub bulk_payment: BulkPayment,
    pub payments: Vec<Payment>,
}
