//! Invoice adjustment model for invoicemgmt-service.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// What an adjustment detail does to its row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdjustmentAction {
    Create,
    Edit,
    Delete,
}

impl AdjustmentAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdjustmentAction::Create => "CREATE_ADJUSTMENT",
            AdjustmentAction::Edit => "EDIT_ADJUSTMENT",
            AdjustmentAction::Delete => "DELETE_ADJUSTMENT",
        }
    }
}

/// Line-level correction on a draft invoice.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InvoiceAdjustment {
    pub invoice_adjustment_id: Uuid,
    pub tenant_id: Uuid,
    pub invoice_id: Uuid,
    pub student_id: Uuid,
    pub description: String,
    pub amount: Decimal,
    pub invoice_adjustment_sequence_number: i32,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
    pub deleted_utc: Option<DateTime<Utc>>,
}

/// Row to insert or overwrite, keyed by `invoice_adjustment_id`.
#[derive(Debug, Clone)]
pub struct AdjustmentUpsert {
    pub invoice_adjustment_id: Uuid,
    pub invoice_id: Uuid,
    pub student_id: Uuid,
    pub description: String,
    pub amount: Decimal,
}
