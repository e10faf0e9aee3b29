//! Bill item links for invoicemgmt-service.
//!
//! Bill items belong to the order domain; this service only keeps the link
//! to the invoice and a read model of the fields it needs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Billing status of a bill item in the order domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BillingStatus {
    Pending,
    Billed,
    Invoiced,
    Cancelled,
}

impl BillingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingStatus::Pending => "BILLING_STATUS_PENDING",
            BillingStatus::Billed => "BILLING_STATUS_BILLED",
            BillingStatus::Invoiced => "BILLING_STATUS_INVOICED",
            BillingStatus::Cancelled => "BILLING_STATUS_CANCELLED",
        }
    }

    pub fn from_string(s: &str) -> Option<Self> {
        match s {
            "BILLING_STATUS_PENDING" => Some(BillingStatus::Pending),
            "BILLING_STATUS_BILLED" => Some(BillingStatus::Billed),
            "BILLING_STATUS_INVOICED" => Some(BillingStatus::Invoiced),
            "BILLING_STATUS_CANCELLED" => Some(BillingStatus::Cancelled),
            _ => None,
        }
    }
}

/// Link between an invoice and a bill item.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InvoiceBillItem {
    pub invoice_bill_item_id: Uuid,
    pub tenant_id: Uuid,
    pub invoice_id: Uuid,
    pub bill_item_sequence_number: i32,
    /// Billing status the bill item had before it was invoiced.
    pub past_billing_status: String,
    pub created_utc: DateTime<Utc>,
}

/// Read model of a bill item.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BillItem {
    pub tenant_id: Uuid,
    pub bill_item_sequence_number: i32,
    pub billing_status: String,
    pub bill_date: DateTime<Utc>,
}
