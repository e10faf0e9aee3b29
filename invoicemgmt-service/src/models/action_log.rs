//! Invoice action log model for invoicemgmt-service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Business event recorded against an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvoiceAction {
    Issued,
    BulkIssued,
    Paid,
    Refunded,
    Failed,
    Voided,
    Adjusted,
    PaymentAdded,
    EditCreditNote,
    RemoveCreditNote,
}

impl InvoiceAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceAction::Issued => "ISSUED",
            InvoiceAction::BulkIssued => "BULK_ISSUED",
            InvoiceAction::Paid => "PAID",
            InvoiceAction::Refunded => "REFUNDED",
            InvoiceAction::Failed => "FAILED",
            InvoiceAction::Voided => "VOIDED",
            InvoiceAction::Adjusted => "ADJUSTED",
            InvoiceAction::PaymentAdded => "PAYMENT_ADDED",
            InvoiceAction::EditCreditNote => "EDIT_CREDIT_NOTE",
            InvoiceAction::RemoveCreditNote => "REMOVE_CREDIT_NOTE",
        }
    }
}

/// Immutable audit entry.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ActionLog {
    pub action_log_id: Uuid,
    pub tenant_id: Uuid,
    pub invoice_id: Uuid,
    pub action: String,
    pub action_detail: String,
    pub action_comment: String,
    pub user_id: String,
    pub payment_sequence_number: Option<i32>,
    pub bulk_payment_id: Option<Uuid>,
    pub created_utc: DateTime<Utc>,
}

/// Action log row to insert, already mapped to its stored kind and detail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewActionLog {
    pub action_log_id: Uuid,
    pub invoice_id: Uuid,
    pub action: String,
    pub action_detail: String,
    pub action_comment: String,
    pub user_id: String,
    pub payment_sequence_number: Option<i32>,
    pub bulk_payment_id: Option<Uuid>,
}
