//! Adjustments on draft invoices.

use std::collections::HashSet;

use rust_decimal::Decimal;
use service_core::error::AppError;
use service_core::retry::retry_with;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::dtos::{
    InvoiceAdjustmentDetail, UpsertInvoiceAdjustmentsRequest, UpsertInvoiceAdjustmentsResponse,
};
use crate::models::{
    AdjustmentAction, AdjustmentUpsert, InvoiceAction, InvoiceStatus, InvoiceUpdate,
};
use crate::services::action_log::{record_action_log, ActionLogInput};
use crate::services::billing::BillingReconciliation;
use crate::services::features::RequestContext;
use crate::services::lifecycle::InvoiceLifecycleEngine;
use crate::services::metrics::{record_attempt, record_transition};
use crate::services::store::{finish, AdjustmentRepository, InvoiceRepository, LedgerStore};
use crate::services::validation::{amounts_match, parse_id};

/// A request detail after its id has been checked against its action.
#[derive(Debug, Clone)]
struct AdjustmentChange {
    action: AdjustmentAction,
    adjustment_id: Option<Uuid>,
    description: String,
    amount: Decimal,
}

fn parse_detail(detail: &InvoiceAdjustmentDetail) -> Result<AdjustmentChange, AppError> {
    let raw_id = detail
        .invoice_adjustment_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty());

    let adjustment_id = match (detail.action, raw_id) {
        (AdjustmentAction::Create, Some(id)) => {
            return Err(AppError::bad_request(format!(
                "invalid invoice adjustment id: {} should be null when creating new record",
                id
            )));
        }
        (AdjustmentAction::Create, None) => None,
        (action, None) => {
            return Err(AppError::bad_request(format!(
                "invoice adjustment id is required for {}",
                action.as_str()
            )));
        }
        (_, Some(id)) => Some(parse_id(id, "invoice adjustment id")?),
    };

    if detail.action != AdjustmentAction::Delete && detail.description.trim().is_empty() {
        return Err(AppError::bad_request(
            "invoice adjustment detail description is empty",
        ));
    }

    Ok(AdjustmentChange {
        action: detail.action,
        adjustment_id,
        description: detail.description.clone(),
        amount: detail.amount,
    })
}

/// Each existing adjustment may be touched once per request, since every
/// delta is taken against the stored amount.
fn reject_repeated_ids(changes: &[AdjustmentChange]) -> Result<(), AppError> {
    let mut seen = HashSet::new();
    for id in changes.iter().filter_map(|c| c.adjustment_id) {
        if !seen.insert(id) {
            return Err(AppError::bad_request(format!(
                "invoice adjustment {} appears more than once",
                id
            )));
        }
    }
    Ok(())
}

impl<S, B> InvoiceLifecycleEngine<S, B>
where
    S: LedgerStore,
    B: BillingReconciliation,
{
    /// Apply create, edit and delete adjustments to a draft invoice.
    ///
    /// The caller states the total and subtotal it expects afterwards; the
    /// request is rejected unless the deltas add up to exactly that. Each
    /// attempt runs in a fresh unit of work and is retried on conflict.
    #[instrument(skip(self, ctx, request), fields(tenant_id = %ctx.tenant_id, invoice_id = %request.invoice_id, details = request.details.len()))]
    pub async fn upsert_invoice_adjustments(
        &self,
        ctx: &RequestContext,
        request: &UpsertInvoiceAdjustmentsRequest,
    ) -> Result<UpsertInvoiceAdjustmentsResponse, AppError> {
        let result = self.upsert_invoice_adjustments_inner(ctx, request).await;
        record_transition("upsert_invoice_adjustments", &result);
        result
    }

    async fn upsert_invoice_adjustments_inner(
        &self,
        ctx: &RequestContext,
        request: &UpsertInvoiceAdjustmentsRequest,
    ) -> Result<UpsertInvoiceAdjustmentsResponse, AppError> {
        request.validate()?;
        let invoice_id = parse_id(&request.invoice_id, "invoice id")?;
        let changes = request
            .details
            .iter()
            .map(parse_detail)
            .collect::<Result<Vec<_>, _>>()?;
        reject_repeated_ids(&changes)?;

        let response = retry_with(
            &self.adjustment_retry,
            "upsert_invoice_adjustments",
            AppError::is_retryable,
            || async {
                record_attempt("upsert_invoice_adjustments");
                let mut tx = self.store.begin(ctx.tenant_id).await?;
                let result =
                    Self::adjust_in_tx(&mut tx, ctx, invoice_id, request, &changes).await;
                finish(tx, result).await
            },
        )
        .await?;

        info!(
            invoice_id = %invoice_id,
            total = %response.invoice.total,
            upserted = response.adjustments.len(),
            deleted = response.deleted,
            "Invoice adjustments applied"
        );
        Ok(response)
    }

    async fn adjust_in_tx(
        tx: &mut S::Tx,
        ctx: &RequestContext,
        invoice_id: Uuid,
        request: &UpsertInvoiceAdjustmentsRequest,
        changes: &[AdjustmentChange],
    ) -> Result<UpsertInvoiceAdjustmentsResponse, AppError> {
        let invoice = tx.retrieve_invoice(invoice_id).await?;
        if !invoice.has_status(InvoiceStatus::Draft) {
            return Err(AppError::bad_request(format!(
                "error invoice status: {} should be in draft",
                invoice.status
            )));
        }

        let mut delta = Decimal::ZERO;
        let mut upserts = Vec::new();
        let mut deletes = Vec::new();

        for change in changes {
            let existing = match change.adjustment_id {
                Some(id) => {
                    let adjustment = tx.find_adjustment(id).await?.ok_or_else(|| {
                        AppError::not_found(format!("invoice adjustment {} not found", id))
                    })?;
                    if adjustment.invoice_id != invoice_id {
                        return Err(AppError::bad_request(format!(
                            "invoice adjustment {} does not belong to invoice {}",
                            id, invoice_id
                        )));
                    }
                    Some(adjustment)
                }
                None => None,
            };

            match (change.action, existing) {
                (AdjustmentAction::Create, _) => {
                    delta += change.amount;
                    upserts.push(AdjustmentUpsert {
                        invoice_adjustment_id: Uuid::new_v4(),
                        invoice_id,
                        student_id: invoice.student_id,
                        description: change.description.clone(),
                        amount: change.amount,
                    });
                }
                (AdjustmentAction::Edit, Some(existing)) => {
                    delta += change.amount - existing.amount;
                    upserts.push(AdjustmentUpsert {
                        invoice_adjustment_id: existing.invoice_adjustment_id,
                        invoice_id,
                        student_id: invoice.student_id,
                        description: change.description.clone(),
                        amount: change.amount,
                    });
                }
                (AdjustmentAction::Delete, Some(existing)) => {
                    delta -= existing.amount;
                    deletes.push(existing.invoice_adjustment_id);
                }
                (action, None) => {
                    return Err(AppError::bad_request(format!(
                        "invoice adjustment id is required for {}",
                        action.as_str()
                    )));
                }
            }
        }

        let expected_total = invoice.total + delta;
        if !amounts_match(expected_total, request.invoice_total) {
            return Err(AppError::bad_request(format!(
                "expected invoice total amount {} received {}",
                expected_total.round_dp(2),
                request.invoice_total
            )));
        }
        let expected_sub_total = invoice.sub_total + delta;
        if !amounts_match(expected_sub_total, request.invoice_sub_total) {
            return Err(AppError::bad_request(format!(
                "expected invoice subtotal amount {} received {}",
                expected_sub_total.round_dp(2),
                request.invoice_sub_total
            )));
        }

        let adjustments = if upserts.is_empty() {
            Vec::new()
        } else {
            tx.upsert_adjustments(&upserts).await?
        };
        let deleted = if deletes.is_empty() {
            0
        } else {
            tx.soft_delete_adjustments(&deletes).await?
        };

        let invoice = tx
            .update_invoice(
                invoice_id,
                InvoiceUpdate {
                    total: Some(expected_total),
                    sub_total: Some(expected_sub_total),
                    outstanding_balance: Some(expected_total),
                    ..Default::default()
                },
            )
            .await?;
        record_action_log(
            tx,
            ActionLogInput::new(invoice_id, InvoiceAction::Adjusted, &ctx.user_id, ""),
        )
        .await?;

        Ok(UpsertInvoiceAdjustmentsResponse {
            invoice,
            adjustments,
            deleted,
        })
    }
}
