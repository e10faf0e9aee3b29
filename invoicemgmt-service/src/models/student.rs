//! Student payment settings used when issuing invoices.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StudentPaymentDetail {
    pub student_payment_detail_id: Uuid,
    pub tenant_id: Uuid,
    pub student_id: Uuid,
    /// Default payment method; empty when the student has not chosen one.
    pub payment_method: String,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BankAccount {
    pub bank_account_id: Uuid,
    pub tenant_id: Uuid,
    pub student_id: Uuid,
    pub is_verified: bool,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}
