//! Action log recorder.
//!
//! Builds the audit entry for a transition and persists it in the caller's
//! unit of work.

use service_core::error::AppError;
use tracing::instrument;
use uuid::Uuid;

use crate::models::{InvoiceAction, NewActionLog, PaymentMethod};
use crate::services::store::ActionLogRepository;

pub const PAYMENT_SUCCESSFUL_DETAIL: &str = "PAYMENT_SUCCESSFUL";
pub const INVOICE_REFUNDED_DETAIL: &str = "INVOICE_REFUNDED";
pub const PAYMENT_FAILED_DETAIL: &str = "PAYMENT_FAILED";
pub const EDIT_CREDIT_NOTE_DETAIL: &str = "Edited credit note";
pub const REMOVE_CREDIT_NOTE_DETAIL: &str = "Removed credit note";

/// Input to the recorder.
#[derive(Debug, Clone)]
pub struct ActionLogInput {
    pub invoice_id: Uuid,
    pub action: InvoiceAction,
    pub payment_sequence_number: Option<i32>,
    pub payment_method: Option<PaymentMethod>,
    pub comment: String,
    pub user_id: String,
    pub bulk_payment_id: Option<Uuid>,
}

impl ActionLogInput {
    pub fn new(invoice_id: Uuid, action: InvoiceAction, user_id: &str, comment: &str) -> Self {
        Self {
            invoice_id,
            action,
            payment_sequence_number: None,
            payment_method: None,
            comment: comment.to_string(),
            user_id: user_id.to_string(),
            bulk_payment_id: None,
        }
    }

    pub fn with_payment(mut self, sequence_number: i32, method: Option<PaymentMethod>) -> Self {
        self.payment_sequence_number = Some(sequence_number);
        self.payment_method = method;
        self
    }

    pub fn with_bulk_payment(mut self, bulk_payment_id: Uuid) -> Self {
        self.bulk_payment_id = Some(bulk_payment_id);
        self
    }
}

impl InvoiceAction {
    /// Kind written to storage. Removing a credit note is stored as an edit
    /// and told apart by its detail.
    pub fn stored_kind(&self) -> InvoiceAction {
        match self {
            InvoiceAction::RemoveCreditNote => InvoiceAction::EditCreditNote,
            other => *other,
        }
    }

    pub fn requires_sequence_number(&self) -> bool {
        !matches!(
            self,
            InvoiceAction::Voided
                | InvoiceAction::Adjusted
                | InvoiceAction::EditCreditNote
                | InvoiceAction::RemoveCreditNote
        )
    }

    pub fn requires_payment_method(&self) -> bool {
        matches!(
            self,
            InvoiceAction::Issued | InvoiceAction::BulkIssued | InvoiceAction::PaymentAdded
        )
    }
}

/// Stored detail text for an action.
fn action_detail(action: InvoiceAction, method: Option<PaymentMethod>) -> String {
    match action {
        InvoiceAction::Issued | InvoiceAction::BulkIssued | InvoiceAction::PaymentAdded => method
            .map(|m| m.as_str().to_string())
            .unwrap_or_default(),
        InvoiceAction::Paid => PAYMENT_SUCCESSFUL_DETAIL.to_string(),
        InvoiceAction::Refunded => INVOICE_REFUNDED_DETAIL.to_string(),
        InvoiceAction::Failed => PAYMENT_FAILED_DETAIL.to_string(),
        InvoiceAction::Voided | InvoiceAction::Adjusted => String::new(),
        InvoiceAction::EditCreditNote => EDIT_CREDIT_NOTE_DETAIL.to_string(),
        InvoiceAction::RemoveCreditNote => REMOVE_CREDIT_NOTE_DETAIL.to_string(),
    }
}

/// Validate the input and map it to a storable row.
pub fn build_action_log(input: ActionLogInput) -> Result<NewActionLog, AppError> {
    if input.invoice_id.is_nil() {
        return Err(AppError::bad_request("action log invoice id cannot be empty"));
    }

    let sequence_number = input.payment_sequence_number.filter(|n| *n != 0);
    if input.action.requires_sequence_number() && sequence_number.is_none() {
        return Err(AppError::bad_request(format!(
            "action log {} requires a payment sequence number",
            input.action.as_str()
        )));
    }

    if input.action.requires_payment_method() && input.payment_method.is_none() {
        return Err(AppError::bad_request(format!(
            "action log {} requires a payment method",
            input.action.as_str()
        )));
    }

    Ok(NewActionLog {
        action_log_id: Uuid::new_v4(),
        invoice_id: input.invoice_id,
        action: input.action.stored_kind().as_str().to_string(),
        action_detail: action_detail(input.action, input.payment_method),
        action_comment: input.comment,
        user_id: input.user_id,
        payment_sequence_number: sequence_number,
        bulk_payment_id: input.bulk_payment_id,
    })
}

/// Build and persist one entry.
#[instrument(skip(tx, input), fields(invoice_id = %input.invoice_id, action = input.action.as_str()))]
pub async fn record_action_log<T>(tx: &mut T, input: ActionLogInput) -> Result<(), AppError>
where
    T: ActionLogRepository,
{
    let log = build_action_log(input)?;
    tx.create_action_logs(std::slice::from_ref(&log)).await?;
    Ok(())
}

/// Build every entry first, then persist them in one batch. Nothing is
/// written if any entry is invalid.
#[instrument(skip(tx, inputs), fields(count = inputs.len()))]
pub async fn record_action_logs<T>(tx: &mut T, inputs: Vec<ActionLogInput>) -> Result<u64, AppError>
where
    T: ActionLogRepository,
{
    let logs = inputs
        .into_iter()
        .map(build_action_log)
        .collect::<Result<Vec<_>, _>>()?;
    tx.create_action_logs(&logs).await
}
