//! Payment model for invoicemgmt-service.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Payment status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Successful,
    Failed,
    None,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Successful => "SUCCESSFUL",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::None => "NONE",
        }
    }

    pub fn from_string(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(PaymentStatus::Pending),
            "SUCCESSFUL" => Some(PaymentStatus::Successful),
            "FAILED" => Some(PaymentStatus::Failed),
            "NONE" => Some(PaymentStatus::None),
            _ => None,
        }
    }
}

/// Payment method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    ConvenienceStore,
    DirectDebit,
    Cash,
    BankTransfer,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::ConvenienceStore => "CONVENIENCE_STORE",
            PaymentMethod::DirectDebit => "DIRECT_DEBIT",
            PaymentMethod::Cash => "CASH",
            PaymentMethod::BankTransfer => "BANK_TRANSFER",
        }
    }

    pub fn from_string(s: &str) -> Option<Self> {
        match s {
            "CONVENIENCE_STORE" => Some(PaymentMethod::ConvenienceStore),
            "DIRECT_DEBIT" => Some(PaymentMethod::DirectDebit),
            "CASH" => Some(PaymentMethod::Cash),
            "BANK_TRANSFER" => Some(PaymentMethod::BankTransfer),
            _ => None,
        }
    }

    /// Methods collected through the payment file exchange.
    pub fn is_collection_method(&self) -> bool {
        matches!(
            self,
            PaymentMethod::ConvenienceStore | PaymentMethod::DirectDebit
        )
    }

    /// Methods a back office user can record by hand.
    pub fn is_manual_method(&self) -> bool {
        matches!(self, PaymentMethod::Cash | PaymentMethod::BankTransfer)
    }
}

/// One collection attempt against an invoice.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Payment {
    pub payment_id: Uuid,
    pub tenant_id: Uuid,
    pub invoice_id: Uuid,
    pub student_id: Uuid,
    pub bulk_payment_id: Option<Uuid>,
    pub payment_status: String,
    pub payment_method: String,
    pub payment_sequence_number: i32,
    pub amount: Decimal,
    pub payment_due_date: NaiveDate,
    pub payment_expiry_date: NaiveDate,
    pub payment_date: Option<DateTime<Utc>>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl Payment {
    pub fn has_status(&self, status: PaymentStatus) -> bool {
        self.payment_status == status.as_str()
    }
}

/// Payment row to insert. A `None` sequence number is assigned by the
/// database on insert.
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub payment_id: Uuid,
    pub invoice_id: Uuid,
    pub student_id: Uuid,
    pub bulk_payment_id: Option<Uuid>,
    pub payment_status: PaymentStatus,
    pub payment_method: PaymentMethod,
    pub payment_sequence_number: Option<i32>,
    pub amount: Decimal,
    pub payment_due_date: NaiveDate,
    pub payment_expiry_date: NaiveDate,
    pub payment_date: Option<DateTime<Utc>>,
}

impl NewPayment {
    /// A pending collection for the given invoice.
    pub fn pending(
        invoice_id: Uuid,
        student_id: Uuid,
        method: PaymentMethod,
        amount: Decimal,
        due_date: NaiveDate,
        expiry_date: NaiveDate,
    ) -> Self {
        Self {
            payment_id: Uuid::new_v4(),
            invoice_id,
            student_id,
            bulk_payment_id: None,
            payment_status: PaymentStatus::Pending,
            payment_method: method,
            payment_sequence_number: None,
            amount,
            payment_due_date: due_date,
            payment_expiry_date: expiry_date,
            payment_date: None,
        }
    }
}

/// Columns a transition may change on a payment.
#[derive(Debug, Clone, Default)]
pub struct PaymentUpdate {
    pub payment_status: Option<PaymentStatus>,
    pub payment_method: Option<PaymentMethod>,
    pub amount: Option<Decimal>,
    pub payment_date: Option<DateTime<Utc>>,
}

impl PaymentUpdate {
    pub fn status(status: PaymentStatus) -> Self {
        Self {
            payment_status: Some(status),
            ..Default::default()
        }
    }

    /// Apply the update to an in-memory copy.
    pub fn apply_to(&self, payment: &mut Payment) {
        if let Some(status) = self.payment_status {
            payment.payment_status = status.as_str().to_string();
        }
        if let Some(method) = self.payment_method {
            payment.payment_method = method.as_str().to_string();
        }
        if let Some(amount) = self.amount {
            payment.amount = amount;
        }
        if let Some(payment_date) = self.payment_date {
            payment.payment_date = Some(payment_date);
        }
        payment.updated_utc = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_groups() {
        assert!(PaymentMethod::DirectDebit.is_collection_method());
        assert!(!PaymentMethod::Cash.is_collection_method());
        assert!(PaymentMethod::BankTransfer.is_manual_method());
        assert!(!PaymentMethod::ConvenienceStore.is_manual_method());
    }

    #[test]
    fn test_unknown_method_is_rejected() {
        assert_eq!(PaymentMethod::from_string("CREDIT_CARD"), None);
        assert_eq!(
            PaymentMethod::from_string("DIRECT_DEBIT"),
            Some(PaymentMethod::DirectDebit)
        );
    }
}
