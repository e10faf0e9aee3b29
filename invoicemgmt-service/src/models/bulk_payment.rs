//! Bulk payment model for invoicemgmt-service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::{InvoiceStatus, InvoiceType, PaymentMethod};

/// Bulk payment status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BulkPaymentStatus {
    Pending,
    Cancelled,
}

impl BulkPaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BulkPaymentStatus::Pending => "PENDING",
            BulkPaymentStatus::Cancelled => "CANCELLED",
        }
    }
}

/// Payment method selection for a bulk issue.
///
/// `Default` resolves each student's configured method from their payment
/// detail record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BulkIssueMethod {
    ConvenienceStore,
    DirectDebit,
    Default,
}

impl BulkIssueMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            BulkIssueMethod::ConvenienceStore => "CONVENIENCE_STORE",
            BulkIssueMethod::DirectDebit => "DIRECT_DEBIT",
            BulkIssueMethod::Default => "DEFAULT_PAYMENT",
        }
    }

    /// The method applied to every invoice, if the selection fixes one.
    pub fn fixed_method(&self) -> Option<PaymentMethod> {
        match self {
            BulkIssueMethod::ConvenienceStore => Some(PaymentMethod::ConvenienceStore),
            BulkIssueMethod::DirectDebit => Some(PaymentMethod::DirectDebit),
            BulkIssueMethod::Default => None,
        }
    }

    /// Payment methods whose date range must be present in the request.
    pub fn required_date_ranges(&self) -> &'static [PaymentMethod] {
        match self {
            BulkIssueMethod::ConvenienceStore => &[PaymentMethod::ConvenienceStore],
            BulkIssueMethod::DirectDebit => &[PaymentMethod::DirectDebit],
            BulkIssueMethod::Default => {
                &[PaymentMethod::ConvenienceStore, PaymentMethod::DirectDebit]
            }
        }
    }
}

/// Group of payments created by one bulk issue.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BulkPayment {
    pub bulk_payment_id: Uuid,
    pub tenant_id: Uuid,
    pub bulk_payment_status: String,
    pub payment_method: String,
    pub invoice_status: String,
    pub invoice_type: Vec<String>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewBulkPayment {
    pub bulk_payment_id: Uuid,
    pub payment_method: BulkIssueMethod,
    pub invoice_status: InvoiceStatus,
    pub invoice_types: Vec<InvoiceType>,
}
