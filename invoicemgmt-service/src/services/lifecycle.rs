//! Invoice lifecycle engine.
//!
//! Each transition runs in one unit of work. Inside it rows are changed in a
//! fixed order: payment, then invoice, then the action log. Void is the one
//! operation that reaches an external system; that call happens after the
//! local commit and cannot be undone.

use chrono::Utc;
use rust_decimal::Decimal;
use service_core::error::AppError;
use service_core::retry::RetryConfig;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::dtos::{
    AddInvoicePaymentRequest, ApproveInvoicePaymentRequest, CancelInvoicePaymentRequest,
    InvoiceTransition, IssueInvoiceRequest, RefundInvoiceRequest, VoidInvoiceRequest,
    VoidInvoiceResponse,
};
use crate::models::{
    BillingStatus, BulkPaymentStatus, Invoice, InvoiceAction, InvoiceStatus, InvoiceUpdate, NewPayment,
    Payment, PaymentMethod, PaymentStatus, PaymentUpdate,
};
use crate::services::action_log::{record_action_log, ActionLogInput};
use crate::services::billing::{
    restoration_status, restore_bill_items, BillItemRestoration, BillingReconciliation,
};
use crate::services::features::RequestContext;
use crate::services::metrics::record_transition;
use crate::services::sequence::{assign_sequence_numbers, SequenceMode};
use crate::services::store::{
    finish, BillItemRepository, BulkPaymentRepository, InvoiceRepository,
    LedgerStore, PaymentRepository,
};
use crate::services::validation::{
    amounts_match, ensure_verified_bank_account, parse_id, validate_dates,
};

/// Which void rules apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VoidRules {
    V1,
    /// Requires bill items, zeroes the payment amount and cancels an
    /// emptied bulk payment.
    V2,
}

pub struct InvoiceLifecycleEngine<S, B> {
    pub(crate) store: Arc<S>,
    billing: Arc<B>,
    pub(crate) adjustment_retry: RetryConfig,
}

impl<S, B> InvoiceLifecycleEngine<S, B>
where
    S: LedgerStore,
    B: BillingReconciliation,
{
    pub fn new(store: Arc<S>, billing: Arc<B>, adjustment_retry: RetryConfig) -> Self {
        Self {
            store,
            billing,
            adjustment_retry,
        }
    }

    // =========================================================================
    // Issue
    // =========================================================================

    /// Issue a draft invoice and open its first payment.
    #[instrument(skip(self, ctx, request), fields(tenant_id = %ctx.tenant_id, invoice_id = %request.invoice_id))]
    pub async fn issue_invoice(
        &self,
        ctx: &RequestContext,
        request: &IssueInvoiceRequest,
    ) -> Result<InvoiceTransition, AppError> {
        let result = self.issue_invoice_inner(ctx, request).await;
        record_transition("issue_invoice", &result);
        result
    }

    async fn issue_invoice_inner(
        &self,
        ctx: &RequestContext,
        request: &IssueInvoiceRequest,
    ) -> Result<InvoiceTransition, AppError> {
        request.validate()?;
        let invoice_id = parse_id(&request.invoice_id, "invoice id")?;
        validate_dates(
            request.due_date,
            request.expiry_date,
            Utc::now().date_naive(),
        )?;

        let mut tx = self.store.begin(ctx.tenant_id).await?;
        let result = Self::issue_in_tx(&mut tx, ctx, invoice_id, request).await;
        let transition = finish(tx, result).await?;

        info!(invoice_id = %invoice_id, "Invoice issued");
        Ok(transition)
    }

    async fn issue_in_tx(
        tx: &mut S::Tx,
        ctx: &RequestContext,
        invoice_id: Uuid,
        request: &IssueInvoiceRequest,
    ) -> Result<InvoiceTransition, AppError> {
        let invoice = tx.retrieve_invoice(invoice_id).await?;
        if !invoice.has_status(InvoiceStatus::Draft) {
            return Err(AppError::bad_request(format!(
                "invoice should be in DRAFT status, found {}",
                invoice.status
            )));
        }
        if invoice.total <= Decimal::ZERO {
            return Err(AppError::bad_request(
                "invoice total should be greater than 0",
            ));
        }
        if request.payment_method == PaymentMethod::DirectDebit {
            ensure_verified_bank_account(tx, invoice.student_id).await?;
        }

        let mut payments = vec![NewPayment::pending(
            invoice.invoice_id,
            invoice.student_id,
            request.payment_method,
            invoice.total,
            request.due_date,
            request.expiry_date,
        )];
        assign_sequence_numbers(tx, SequenceMode::from_features(&ctx.features), &mut payments)
            .await?;

        let payment = single_payment(tx.create_payments(&payments).await?)?;
        let invoice = tx
            .update_invoice(invoice_id, InvoiceUpdate::status(InvoiceStatus::Issued))
            .await?;
        record_action_log(
            tx,
            ActionLogInput::new(invoice_id, InvoiceAction::Issued, &ctx.user_id, &request.remarks)
                .with_payment(payment.payment_sequence_number, Some(request.payment_method)),
        )
        .await?;

        Ok(InvoiceTransition {
            invoice,
            payment: Some(payment),
        })
    }

    // =========================================================================
    // Approve / cancel payment
    // =========================================================================

    /// Settle the pending payment of an issued invoice. A negative total
    /// settles as a refund.
    #[instrument(skip(self, ctx, request), fields(tenant_id = %ctx.tenant_id, invoice_id = %request.invoice_id))]
    pub async fn approve_invoice_payment(
        &self,
        ctx: &RequestContext,
        request: &ApproveInvoicePaymentRequest,
    ) -> Result<InvoiceTransition, AppError> {
        let result = self.approve_invoice_payment_inner(ctx, request).await;
        record_transition("approve_invoice_payment", &result);
        result
    }

    async fn approve_invoice_payment_inner(
        &self,
        ctx: &RequestContext,
        request: &ApproveInvoicePaymentRequest,
    ) -> Result<InvoiceTransition, AppError> {
        request.validate()?;
        let invoice_id = parse_id(&request.invoice_id, "InvoiceId")?;
        let payment_date = request
            .payment_date
            .ok_or_else(|| AppError::bad_request("payment date cannot be empty"))?;
        if let Some(method) = request.payment_method {
            if !method.is_manual_method() {
                return Err(AppError::bad_request(format!(
                    "invalid payment method: {}, only CASH or BANK_TRANSFER can be approved",
                    method.as_str()
                )));
            }
        }

        let mut tx = self.store.begin(ctx.tenant_id).await?;
        let result: Result<InvoiceTransition, AppError> = async {
            let invoice = tx.retrieve_invoice(invoice_id).await?;
            if !invoice.has_status(InvoiceStatus::Issued) {
                return Err(AppError::bad_request("Invoice should be in ISSUED status"));
            }

            let payment = tx
                .find_latest_payment(invoice_id)
                .await?
                .filter(|p| p.has_status(PaymentStatus::Pending))
                .ok_or_else(|| AppError::bad_request("Payment should be in PENDING status"))?;

            let bill_items = tx.find_invoice_bill_items(invoice_id).await?;
            if bill_items.is_empty() {
                return Err(AppError::bad_request(
                    "No invoice bill items; cannot approve payment",
                ));
            }

            let (status, action, mut update) = settlement_for(invoice.total);
            update.status = Some(status);
            update.outstanding_balance = Some(Decimal::ZERO);

            let payment = tx
                .update_payment(
                    payment.payment_id,
                    PaymentUpdate {
                        payment_status: Some(PaymentStatus::Successful),
                        payment_method: request.payment_method,
                        amount: None,
                        payment_date: Some(payment_date),
                    },
                )
                .await?;
            let invoice = tx.update_invoice(invoice_id, update).await?;
            record_action_log(
                &mut tx,
                ActionLogInput::new(invoice_id, action, &ctx.user_id, &request.remarks)
                    .with_payment(payment.payment_sequence_number, None),
            )
            .await?;

            Ok(InvoiceTransition {
                invoice,
                payment: Some(payment),
            })
        }
        .await;

        let transition = finish(tx, result).await?;
        info!(
            invoice_id = %invoice_id,
            status = %transition.invoice.status,
            "Invoice payment approved"
        );
        Ok(transition)
    }

    /// Fail the pending payment of an issued invoice.
    #[instrument(skip(self, ctx, request), fields(tenant_id = %ctx.tenant_id, invoice_id = %request.invoice_id))]
    pub async fn cancel_invoice_payment(
        &self,
        ctx: &RequestContext,
        request: &CancelInvoicePaymentRequest,
    ) -> Result<InvoiceTransition, AppError> {
        let result = self.cancel_invoice_payment_inner(ctx, request).await;
        record_transition("cancel_invoice_payment", &result);
        result
    }

    async fn cancel_invoice_payment_inner(
        &self,
        ctx: &RequestContext,
        request: &CancelInvoicePaymentRequest,
    ) -> Result<InvoiceTransition, AppError> {
        request.validate()?;
        let invoice_id = parse_id(&request.invoice_id, "invoice id")?;

        let mut tx = self.store.begin(ctx.tenant_id).await?;
        let result: Result<InvoiceTransition, AppError> = async {
            let invoice = tx.retrieve_invoice(invoice_id).await?;
            if !invoice.has_status(InvoiceStatus::Issued) {
                return Err(AppError::bad_request("Invoice should be in ISSUED status"));
            }

            let payment = tx
                .find_latest_payment(invoice_id)
                .await?
                .filter(|p| p.has_status(PaymentStatus::Pending))
                .ok_or_else(|| AppError::bad_request("Payment should be in PENDING status"))?;

            let payment = tx
                .update_payment(
                    payment.payment_id,
                    PaymentUpdate::status(PaymentStatus::Failed),
                )
                .await?;
            let invoice = tx
                .update_invoice(invoice_id, InvoiceUpdate::status(InvoiceStatus::Failed))
                .await?;
            record_action_log(
                &mut tx,
                ActionLogInput::new(
                    invoice_id,
                    InvoiceAction::Failed,
                    &ctx.user_id,
                    &request.remarks,
                )
                .with_payment(payment.payment_sequence_number, None),
            )
            .await?;

            Ok(InvoiceTransition {
                invoice,
                payment: Some(payment),
            })
        }
        .await;

        let transition = finish(tx, result).await?;
        info!(invoice_id = %invoice_id, "Invoice payment cancelled");
        Ok(transition)
    }

    // =========================================================================
    // Refund
    // =========================================================================

    /// Refund the negative outstanding balance of an issued invoice.
    ///
    /// The refund is recorded as a successful payment: the pending payment
    /// is settled with the refund method, or a new one is created when the
    /// invoice has no pending payment.
    #[instrument(skip(self, ctx, request), fields(tenant_id = %ctx.tenant_id, invoice_id = %request.invoice_id, amount = %request.amount))]
    pub async fn refund_invoice(
        &self,
        ctx: &RequestContext,
        request: &RefundInvoiceRequest,
    ) -> Result<InvoiceTransition, AppError> {
        let result = self.refund_invoice_inner(ctx, request).await;
        record_transition("refund_invoice", &result);
        result
    }

    async fn refund_invoice_inner(
        &self,
        ctx: &RequestContext,
        request: &RefundInvoiceRequest,
    ) -> Result<InvoiceTransition, AppError> {
        request.validate()?;
        let invoice_id = parse_id(&request.invoice_id, "invoice id")?;
        if !request.refund_method.is_manual_method() {
            return Err(AppError::bad_request(format!(
                "invalid refund method: {}",
                request.refund_method.as_str()
            )));
        }

        let mut tx = self.store.begin(ctx.tenant_id).await?;
        let result = Self::refund_in_tx(&mut tx, ctx, invoice_id, request).await;
        let transition = finish(tx, result).await?;

        info!(invoice_id = %invoice_id, "Invoice refunded");
        Ok(transition)
    }

    async fn refund_in_tx(
        tx: &mut S::Tx,
        ctx: &RequestContext,
        invoice_id: Uuid,
        request: &RefundInvoiceRequest,
    ) -> Result<InvoiceTransition, AppError> {
        let invoice = tx.retrieve_invoice(invoice_id).await?;
        if !invoice.has_status(InvoiceStatus::Issued) {
            return Err(AppError::bad_request("invoice should be in ISSUED status"));
        }
        if invoice.total >= Decimal::ZERO {
            return Err(AppError::bad_request(
                "invoice total should be negative to refund",
            ));
        }
        if invoice.outstanding_balance >= Decimal::ZERO {
            return Err(AppError::bad_request(
                "invoice outstanding balance should be negative to refund",
            ));
        }
        if !amounts_match(request.amount, invoice.outstanding_balance) {
            return Err(AppError::bad_request(
                "amount should be equal to outstanding balance",
            ));
        }

        let now = Utc::now();
        let payment = match tx.find_latest_payment(invoice_id).await? {
            Some(pending) if pending.has_status(PaymentStatus::Pending) => {
                tx.update_payment(
                    pending.payment_id,
                    PaymentUpdate {
                        payment_status: Some(PaymentStatus::Successful),
                        payment_method: Some(request.refund_method),
                        amount: Some(request.amount),
                        payment_date: Some(now),
                    },
                )
                .await?
            }
            latest => {
                let today = now.date_naive();
                let due_date = latest
                    .map(|p| p.payment_due_date.max(today))
                    .unwrap_or(today);
                let mut payments = vec![NewPayment {
                    payment_status: PaymentStatus::Successful,
                    payment_date: Some(now),
                    ..NewPayment::pending(
                        invoice_id,
                        invoice.student_id,
                        request.refund_method,
                        request.amount,
                        due_date,
                        due_date,
                    )
                }];
                assign_sequence_numbers(
                    tx,
                    SequenceMode::from_features(&ctx.features),
                    &mut payments,
                )
                .await?;
                single_payment(tx.create_payments(&payments).await?)?
            }
        };

        let invoice = tx
            .update_invoice(
                invoice_id,
                InvoiceUpdate {
                    status: Some(InvoiceStatus::Refunded),
                    outstanding_balance: Some(invoice.outstanding_balance - request.amount),
                    amount_refunded: Some(request.amount),
                    ..Default::default()
                },
            )
            .await?;
        record_action_log(
            tx,
            ActionLogInput::new(
                invoice_id,
                InvoiceAction::Refunded,
                &ctx.user_id,
                &request.remarks,
            )
            .with_payment(payment.payment_sequence_number, None),
        )
        .await?;

        Ok(InvoiceTransition {
            invoice,
            payment: Some(payment),
        })
    }

    // =========================================================================
    // Void
    // =========================================================================

    /// Void an invoice and send its bill items back to billing.
    #[instrument(skip(self, ctx, request), fields(tenant_id = %ctx.tenant_id, invoice_id = %request.invoice_id))]
    pub async fn void_invoice(
        &self,
        ctx: &RequestContext,
        request: &VoidInvoiceRequest,
    ) -> Result<VoidInvoiceResponse, AppError> {
        let result = self.void_invoice_inner(ctx, request, VoidRules::V1).await;
        record_transition("void_invoice", &result);
        result
    }

    /// Void with the stricter rules: bill items must exist, the payment
    /// amount is zeroed and an emptied bulk payment is cancelled.
    #[instrument(skip(self, ctx, request), fields(tenant_id = %ctx.tenant_id, invoice_id = %request.invoice_id))]
    pub async fn void_invoice_v2(
        &self,
        ctx: &RequestContext,
        request: &VoidInvoiceRequest,
    ) -> Result<VoidInvoiceResponse, AppError> {
        let result = self.void_invoice_inner(ctx, request, VoidRules::V2).await;
        record_transition("void_invoice_v2", &result);
        result
    }

    async fn void_invoice_inner(
        &self,
        ctx: &RequestContext,
        request: &VoidInvoiceRequest,
        rules: VoidRules,
    ) -> Result<VoidInvoiceResponse, AppError> {
        request.validate()?;
        let invoice_id = parse_id(&request.invoice_id, "invoice id")?;

        let mut tx = self.store.begin(ctx.tenant_id).await?;
        let result = Self::void_in_tx(&mut tx, ctx, invoice_id, request, rules).await;
        let (invoice, payment, restorations) = finish(tx, result).await?;

        info!(
            invoice_id = %invoice_id,
            bill_items = restorations.len(),
            "Invoice voided"
        );

        // Local state is committed from here on.
        restore_bill_items(
            self.billing.as_ref(),
            &restorations,
            &ctx.user_id,
            &ctx.organization_id,
        )
        .await
        .inspect_err(|e| {
            warn!(
                invoice_id = %invoice_id,
                error = %e,
                "Invoice voided but bill item restoration failed; manual reconciliation required"
            )
        })?;

        Ok(VoidInvoiceResponse {
            invoice,
            payment,
            restored_bill_items: restorations.len(),
        })
    }

    async fn void_in_tx(
        tx: &mut S::Tx,
        ctx: &RequestContext,
        invoice_id: Uuid,
        request: &VoidInvoiceRequest,
        rules: VoidRules,
    ) -> Result<(Invoice, Option<Payment>, Vec<BillItemRestoration>), AppError> {
        let invoice = tx.retrieve_invoice(invoice_id).await?;
        let voidable = invoice.status().map(|s| s.is_voidable()).unwrap_or(false);
        if !voidable {
            return Err(AppError::bad_request(format!(
                "invoice should be in DRAFT, ISSUED or FAILED status, found {}",
                invoice.status
            )));
        }

        let bill_items = tx.find_invoice_bill_items(invoice_id).await?;
        if rules == VoidRules::V2 && bill_items.is_empty() {
            return Err(AppError::bad_request(
                "No invoice bill items; cannot void invoice",
            ));
        }

        let now = Utc::now();
        let mut restorations = Vec::with_capacity(bill_items.len());
        for link in &bill_items {
            let bill_item = tx
                .find_bill_item(link.bill_item_sequence_number)
                .await?
                .ok_or_else(|| {
                    AppError::not_found(format!(
                        "bill item {} not found",
                        link.bill_item_sequence_number
                    ))
                })?;
            restorations.push(BillItemRestoration {
                bill_item_sequence_number: link.bill_item_sequence_number,
                billing_status: restoration_status(
                    BillingStatus::from_string(&link.past_billing_status),
                    bill_item.bill_date,
                    now,
                ),
            });
        }

        let payment = match tx.find_latest_payment(invoice_id).await? {
            None => None,
            Some(payment) => {
                let mut update = PaymentUpdate::default();
                if !payment.has_status(PaymentStatus::Failed) {
                    update.payment_status = Some(PaymentStatus::Failed);
                }
                if rules == VoidRules::V2 {
                    update.amount = Some(Decimal::ZERO);
                }
                let payment = tx.update_payment(payment.payment_id, update).await?;

                if rules == VoidRules::V2 {
                    if let Some(bulk_payment_id) = payment.bulk_payment_id {
                        let remaining = tx
                            .count_other_bulk_payments_not_in_status(
                                bulk_payment_id,
                                payment.payment_id,
                                PaymentStatus::Failed,
                            )
                            .await?;
                        if remaining == 0 {
                            tx.update_bulk_payment_status(
                                bulk_payment_id,
                                BulkPaymentStatus::Cancelled,
                            )
                            .await?;
                            info!(bulk_payment_id = %bulk_payment_id, "Bulk payment cancelled");
                        }
                    }
                }
                Some(payment)
            }
        };

        let invoice = tx
            .update_invoice(invoice_id, InvoiceUpdate::status(InvoiceStatus::Void))
            .await?;

        let mut log = ActionLogInput::new(
            invoice_id,
            InvoiceAction::Voided,
            &ctx.user_id,
            &request.remarks,
        );
        log.payment_sequence_number = payment.as_ref().map(|p| p.payment_sequence_number);
        record_action_log(tx, log).await?;

        Ok((invoice, payment, restorations))
    }

    // =========================================================================
    // Add payment
    // =========================================================================

    /// Open a new collection for an issued invoice whose last payment failed.
    #[instrument(skip(self, ctx, request), fields(tenant_id = %ctx.tenant_id, invoice_id = %request.invoice_id))]
    pub async fn add_invoice_payment(
        &self,
        ctx: &RequestContext,
        request: &AddInvoicePaymentRequest,
    ) -> Result<InvoiceTransition, AppError> {
        let result = self.add_invoice_payment_inner(ctx, request).await;
        record_transition("add_invoice_payment", &result);
        result
    }

    async fn add_invoice_payment_inner(
        &self,
        ctx: &RequestContext,
        request: &AddInvoicePaymentRequest,
    ) -> Result<InvoiceTransition, AppError> {
        request.validate()?;
        let invoice_id = parse_id(&request.invoice_id, "invoice id")?;
        if request.amount <= Decimal::ZERO {
            return Err(AppError::bad_request(
                "amount cannot be less than or equal to 0",
            ));
        }
        if !request.payment_method.is_collection_method() {
            return Err(AppError::bad_request(format!(
                "invalid payment method: {}",
                request.payment_method.as_str()
            )));
        }
        validate_dates(
            request.due_date,
            request.expiry_date,
            Utc::now().date_naive(),
        )?;

        let mut tx = self.store.begin(ctx.tenant_id).await?;
        let result: Result<InvoiceTransition, AppError> = async {
            let invoice = tx.retrieve_invoice(invoice_id).await?;
            if !invoice.has_status(InvoiceStatus::Issued) {
                return Err(AppError::bad_request("invoice should be in ISSUED status"));
            }
            if invoice.total <= Decimal::ZERO {
                return Err(AppError::bad_request(
                    "invoice total should be greater than 0",
                ));
            }
            if !amounts_match(request.amount, invoice.outstanding_balance) {
                return Err(AppError::bad_request(
                    "amount should be equal to outstanding balance",
                ));
            }
            if let Some(latest) = tx.find_latest_payment(invoice_id).await? {
                if !latest.has_status(PaymentStatus::Failed) {
                    return Err(AppError::bad_request(format!(
                        "latest payment should be in FAILED status, found {}",
                        latest.payment_status
                    )));
                }
            }
            if request.payment_method == PaymentMethod::DirectDebit {
                ensure_verified_bank_account(&mut tx, invoice.student_id).await?;
            }

            let mut payments = vec![NewPayment::pending(
                invoice_id,
                invoice.student_id,
                request.payment_method,
                request.amount,
                request.due_date,
                request.expiry_date,
            )];
            assign_sequence_numbers(
                &mut tx,
                SequenceMode::from_features(&ctx.features),
                &mut payments,
            )
            .await?;
            let payment = single_payment(tx.create_payments(&payments).await?)?;
            record_action_log(
                &mut tx,
                ActionLogInput::new(
                    invoice_id,
                    InvoiceAction::PaymentAdded,
                    &ctx.user_id,
                    &request.remarks,
                )
                .with_payment(payment.payment_sequence_number, Some(request.payment_method)),
            )
            .await?;

            Ok(InvoiceTransition {
                invoice,
                payment: Some(payment),
            })
        }
        .await;

        let transition = finish(tx, result).await?;
        info!(invoice_id = %invoice_id, "Invoice payment added");
        Ok(transition)
    }
}

/// Target status, action and amount column for settling a total.
fn settlement_for(total: Decimal) -> (InvoiceStatus, InvoiceAction, InvoiceUpdate) {
    if total < Decimal::ZERO {
        (
            InvoiceStatus::Refunded,
            InvoiceAction::Refunded,
            InvoiceUpdate {
                amount_refunded: Some(total),
                ..Default::default()
            },
        )
    } else {
        (
            InvoiceStatus::Paid,
            InvoiceAction::Paid,
            InvoiceUpdate {
                amount_paid: Some(total),
                ..Default::default()
            },
        )
    }
}

fn single_payment(payments: Vec<Payment>) -> Result<Payment, AppError> {
    payments
        .into_iter()
        .next()
        .ok_or_else(|| AppError::InternalError(anyhow::anyhow!("payment was not created")))
}
