//! Invoice model for invoicemgmt-service.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Invoice status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvoiceStatus {
    Draft,
    Issued,
    Paid,
    Refunded,
    Failed,
    Void,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "DRAFT",
            InvoiceStatus::Issued => "ISSUED",
            InvoiceStatus::Paid => "PAID",
            InvoiceStatus::Refunded => "REFUNDED",
            InvoiceStatus::Failed => "FAILED",
            InvoiceStatus::Void => "VOID",
        }
    }

    pub fn from_string(s: &str) -> Option<Self> {
        match s {
            "DRAFT" => Some(InvoiceStatus::Draft),
            "ISSUED" => Some(InvoiceStatus::Issued),
            "PAID" => Some(InvoiceStatus::Paid),
            "REFUNDED" => Some(InvoiceStatus::Refunded),
            "FAILED" => Some(InvoiceStatus::Failed),
            "VOID" => Some(InvoiceStatus::Void),
            _ => None,
        }
    }

    /// Statuses from which an invoice may still be voided.
    pub fn is_voidable(&self) -> bool {
        matches!(
            self,
            InvoiceStatus::Draft | InvoiceStatus::Issued | InvoiceStatus::Failed
        )
    }
}

/// Invoice type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvoiceType {
    Manual,
    Scheduled,
}

impl InvoiceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceType::Manual => "MANUAL",
            InvoiceType::Scheduled => "SCHEDULED",
        }
    }

    pub fn from_string(s: &str) -> Option<Self> {
        match s {
            "MANUAL" => Some(InvoiceType::Manual),
            "SCHEDULED" => Some(InvoiceType::Scheduled),
            _ => None,
        }
    }
}

/// Invoice for one student.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Invoice {
    pub invoice_id: Uuid,
    pub tenant_id: Uuid,
    pub student_id: Uuid,
    pub status: String,
    pub invoice_type: String,
    pub sub_total: Decimal,
    pub total: Decimal,
    pub outstanding_balance: Decimal,
    pub amount_paid: Decimal,
    pub amount_refunded: Decimal,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl Invoice {
    pub fn status(&self) -> Option<InvoiceStatus> {
        InvoiceStatus::from_string(&self.status)
    }

    pub fn has_status(&self, status: InvoiceStatus) -> bool {
        self.status == status.as_str()
    }
}

/// Columns an invoice transition may change. `None` leaves the column as is.
#[derive(Debug, Clone, Default)]
pub struct InvoiceUpdate {
    pub status: Option<InvoiceStatus>,
    pub sub_total: Option<Decimal>,
    pub total: Option<Decimal>,
    pub outstanding_balance: Option<Decimal>,
    pub amount_paid: Option<Decimal>,
    pub amount_refunded: Option<Decimal>,
}

impl InvoiceUpdate {
    pub fn status(status: InvoiceStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    /// Apply the update to an in-memory copy.
    pub fn apply_to(&self, invoice: &mut Invoice) {
        if let Some(status) = self.status {
            invoice.status = status.as_str().to_string();
        }
        if let Some(sub_total) = self.sub_total {
            invoice.sub_total = sub_total;
        }
        if let Some(total) = self.total {
            invoice.total = total;
        }
        if let Some(outstanding_balance) = self.outstanding_balance {
            invoice.outstanding_balance = outstanding_balance;
        }
        if let Some(amount_paid) = self.amount_paid {
            invoice.amount_paid = amount_paid;
        }
        if let Some(amount_refunded) = self.amount_refunded {
            invoice.amount_refunded = amount_refunded;
        }
        invoice.updated_utc = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parsing_is_case_sensitive() {
        assert_eq!(InvoiceStatus::from_string("ISSUED"), Some(InvoiceStatus::Issued));
        assert_eq!(InvoiceStatus::from_string("issued"), None);
    }

    #[test]
    fn test_voidable_statuses() {
        assert!(InvoiceStatus::Draft.is_voidable());
        assert!(InvoiceStatus::Failed.is_voidable());
        assert!(!InvoiceStatus::Paid.is_voidable());
        assert!(!InvoiceStatus::Void.is_voidable());
    }
}
