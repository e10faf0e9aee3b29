//! Bulk issuance.
//!
//! A batch either issues every requested invoice or none of them. The whole
//! attempt is retried in a fresh unit of work when it fails on a payment
//! sequence number conflict.

use chrono::Utc;
use service_core::error::AppError;
use service_core::retry::{retry_with, RetryConfig};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::dtos::{BulkIssueInvoicesRequest, BulkIssueInvoicesResponse};
use crate::models::{
    BulkIssueMethod, Invoice, InvoiceAction, InvoiceStatus, InvoiceUpdate, NewBulkPayment,
    NewPayment, PaymentMethod,
};
use crate::services::action_log::{record_action_log, record_action_logs, ActionLogInput};
use crate::services::features::RequestContext;
use crate::services::metrics::{record_attempt, record_transition};
use crate::services::sequence::{assign_sequence_numbers, SequenceMode};
use crate::services::store::{
    finish, BulkPaymentRepository, InvoiceRepository, LedgerStore, PaymentRepository,
    StudentRepository,
};
use crate::services::validation::{parse_id, validate_dates, validate_issuable};

const OPERATION: &str = "bulk_issue_invoices";

pub struct BulkIssueOrchestrator<S> {
    store: Arc<S>,
    retry: RetryConfig,
}

impl<S: LedgerStore> BulkIssueOrchestrator<S> {
    pub fn new(store: Arc<S>, retry: RetryConfig) -> Self {
        Self { store, retry }
    }

    /// Issue a batch of draft invoices and create one pending payment each.
    #[instrument(skip(self, ctx, request), fields(tenant_id = %ctx.tenant_id, invoices = request.invoice_ids.len(), method = request.payment_method.as_str()))]
    pub async fn bulk_issue_invoices(
        &self,
        ctx: &RequestContext,
        request: &BulkIssueInvoicesRequest,
    ) -> Result<BulkIssueInvoicesResponse, AppError> {
        let result = self.bulk_issue_inner(ctx, request).await;
        record_transition(OPERATION, &result);
        result
    }

    async fn bulk_issue_inner(
        &self,
        ctx: &RequestContext,
        request: &BulkIssueInvoicesRequest,
    ) -> Result<BulkIssueInvoicesResponse, AppError> {
        let invoice_ids = validate_request(request)?;

        let response = retry_with(&self.retry, OPERATION, AppError::is_retryable, || async {
            record_attempt(OPERATION);
            let mut tx = self.store.begin(ctx.tenant_id).await?;
            let result = if ctx.features.improved_bulk_issue {
                Self::issue_staged(&mut tx, ctx, request, &invoice_ids).await
            } else {
                Self::issue_one_by_one(&mut tx, ctx, request, &invoice_ids).await
            };
            finish(tx, result).await
        })
        .await?;

        info!(
            bulk_payment_id = %response.bulk_payment.bulk_payment_id,
            payments = response.payments.len(),
            "Invoices bulk issued"
        );
        Ok(response)
    }

    /// Batch path: stage ids, check them together, write in batches.
    async fn issue_staged(
        tx: &mut S::Tx,
        ctx: &RequestContext,
        request: &BulkIssueInvoicesRequest,
        invoice_ids: &[Uuid],
    ) -> Result<BulkIssueInvoicesResponse, AppError> {
        let bulk_payment = tx.create_bulk_payment(new_bulk_payment(request)).await?;

        tx.stage_invoice_ids(invoice_ids).await?;
        let invoices = tx.find_staged_invoices().await?;
        if invoices.len() != invoice_ids.len() {
            return Err(AppError::bad_request(format!(
                "there are {} invoices that does not exist",
                invoice_ids.len() - invoices.len()
            )));
        }
        for invoice in &invoices {
            validate_issuable(invoice)?;
        }

        let methods = resolve_payment_methods(tx, request.payment_method, &invoices).await?;
        ensure_direct_debit_accounts(tx, &methods).await?;

        let issued = tx.issue_staged_invoices().await?;
        if issued != invoices.len() as u64 {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "there are {} invoices that were not issued",
                invoices.len() as u64 - issued.min(invoices.len() as u64)
            )));
        }

        let mut payments = invoices
            .iter()
            .map(|invoice| {
                new_bulk_item_payment(request, invoice, &methods, bulk_payment.bulk_payment_id)
            })
            .collect::<Result<Vec<_>, _>>()?;
        assign_sequence_numbers(tx, SequenceMode::from_features(&ctx.features), &mut payments)
            .await?;

        let created = tx.create_payments(&payments).await?;
        if created.len() != payments.len() {
            return Err(AppError::InternalError(anyhow::anyhow!(
                "there are {} payments that were not created",
                payments.len() - created.len()
            )));
        }

        let logs = created
            .iter()
            .map(|payment| {
                let method = PaymentMethod::from_string(&payment.payment_method);
                ActionLogInput::new(
                    payment.invoice_id,
                    InvoiceAction::BulkIssued,
                    &ctx.user_id,
                    &request.remarks,
                )
                .with_payment(payment.payment_sequence_number, method)
                .with_bulk_payment(bulk_payment.bulk_payment_id)
            })
            .collect();
        record_action_logs(tx, logs).await?;

        Ok(BulkIssueInvoicesResponse {
            bulk_payment,
            payments: created,
        })
    }

    /// Invoice-by-invoice path, still inside one unit of work.
    async fn issue_one_by_one(
        tx: &mut S::Tx,
        ctx: &RequestContext,
        request: &BulkIssueInvoicesRequest,
        invoice_ids: &[Uuid],
    ) -> Result<BulkIssueInvoicesResponse, AppError> {
        let bulk_payment = tx.create_bulk_payment(new_bulk_payment(request)).await?;
        let mode = SequenceMode::from_features(&ctx.features);
        let mut created = Vec::with_capacity(invoice_ids.len());

        for invoice_id in invoice_ids {
            let invoice = tx.retrieve_invoice(*invoice_id).await?;
            validate_issuable(&invoice)?;

            let methods = resolve_payment_methods(
                tx,
                request.payment_method,
                std::slice::from_ref(&invoice),
            )
            .await?;
            ensure_direct_debit_accounts(tx, &methods).await?;

            tx.update_invoice(invoice.invoice_id, InvoiceUpdate::status(InvoiceStatus::Issued))
                .await?;

            let mut payments = vec![new_bulk_item_payment(
                request,
                &invoice,
                &methods,
                bulk_payment.bulk_payment_id,
            )?];
            let method = payments[0].payment_method;
            assign_sequence_numbers(tx, mode, &mut payments).await?;
            let payment = tx
                .create_payments(&payments)
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| {
                    AppError::InternalError(anyhow::anyhow!(
                        "there are 1 payments that were not created"
                    ))
                })?;

            record_action_log(
                tx,
                ActionLogInput::new(
                    invoice.invoice_id,
                    InvoiceAction::BulkIssued,
                    &ctx.user_id,
                    &request.remarks,
                )
                .with_payment(payment.payment_sequence_number, Some(method))
                .with_bulk_payment(bulk_payment.bulk_payment_id),
            )
            .await?;
            created.push(payment);
        }

        Ok(BulkIssueInvoicesResponse {
            bulk_payment,
            payments: created,
        })
    }
}

/// Checks that need no stored state. Returns the parsed ids.
fn validate_request(request: &BulkIssueInvoicesRequest) -> Result<Vec<Uuid>, AppError> {
    request.validate()?;

    let mut seen = HashSet::with_capacity(request.invoice_ids.len());
    let mut invoice_ids = Vec::with_capacity(request.invoice_ids.len());
    for raw in &request.invoice_ids {
        let id = parse_id(raw, "invoice id")?;
        if !seen.insert(id) {
            return Err(AppError::bad_request(format!("duplicate invoice id: {}", id)));
        }
        invoice_ids.push(id);
    }

    let today = Utc::now().date_naive();
    for method in request.payment_method.required_date_ranges() {
        let range = request.dates_for(*method).ok_or_else(|| {
            AppError::bad_request(match method {
                PaymentMethod::DirectDebit => "direct debit dates cannot be empty",
                _ => "convenience store dates cannot be empty",
            })
        })?;
        validate_dates(range.due_date, range.expiry_date, today)?;
    }

    Ok(invoice_ids)
}

fn new_bulk_payment(request: &BulkIssueInvoicesRequest) -> NewBulkPayment {
    NewBulkPayment {
        bulk_payment_id: Uuid::new_v4(),
        payment_method: request.payment_method,
        invoice_status: InvoiceStatus::Draft,
        invoice_types: request.invoice_types.clone(),
    }
}

fn new_bulk_item_payment(
    request: &BulkIssueInvoicesRequest,
    invoice: &Invoice,
    methods: &HashMap<Uuid, PaymentMethod>,
    bulk_payment_id: Uuid,
) -> Result<NewPayment, AppError> {
    let method = *methods.get(&invoice.student_id).ok_or_else(|| {
        AppError::InternalError(anyhow::anyhow!(
            "no payment method resolved for student {}",
            invoice.student_id
        ))
    })?;
    let dates = request.dates_for(method).ok_or_else(|| {
        AppError::bad_request(format!("{} dates cannot be empty", method.as_str()))
    })?;

    let mut payment = NewPayment::pending(
        invoice.invoice_id,
        invoice.student_id,
        method,
        invoice.total,
        dates.due_date,
        dates.expiry_date,
    );
    payment.bulk_payment_id = Some(bulk_payment_id);
    Ok(payment)
}

/// Payment method per student of the given invoices.
async fn resolve_payment_methods<T>(
    tx: &mut T,
    selection: BulkIssueMethod,
    invoices: &[Invoice],
) -> Result<HashMap<Uuid, PaymentMethod>, AppError>
where
    T: StudentRepository,
{
    let student_ids: Vec<Uuid> = invoices
        .iter()
        .map(|i| i.student_id)
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();

    if let Some(method) = selection.fixed_method() {
        return Ok(student_ids.into_iter().map(|id| (id, method)).collect());
    }

    let details = tx.find_payment_details(&student_ids).await?;
    let configured: HashMap<Uuid, &str> = details
        .iter()
        .map(|d| (d.student_id, d.payment_method.as_str()))
        .collect();

    let missing = student_ids
        .iter()
        .filter(|id| !configured.contains_key(id))
        .count();
    if missing > 0 {
        return Err(AppError::bad_request(format!(
            "there are {} students that does not have student payment detail",
            missing
        )));
    }

    let mut methods = HashMap::with_capacity(student_ids.len());
    for student_id in student_ids {
        let raw = configured.get(&student_id).copied().unwrap_or_default();
        if raw.trim().is_empty() {
            return Err(AppError::bad_request(format!(
                "bulk issue student: {} payment method in student payment detail is empty",
                student_id
            )));
        }
        let method = PaymentMethod::from_string(raw)
            .filter(PaymentMethod::is_collection_method)
            .ok_or_else(|| {
                AppError::bad_request(format!(
                    "bulk issue student: {} payment method {} is not supported",
                    student_id, raw
                ))
            })?;
        methods.insert(student_id, method);
    }
    Ok(methods)
}

/// Every direct debit student needs a verified bank account.
async fn ensure_direct_debit_accounts<T>(
    tx: &mut T,
    methods: &HashMap<Uuid, PaymentMethod>,
) -> Result<(), AppError>
where
    T: StudentRepository,
{
    let direct_debit: Vec<Uuid> = methods
        .iter()
        .filter(|(_, m)| **m == PaymentMethod::DirectDebit)
        .map(|(id, _)| *id)
        .collect();
    if direct_debit.is_empty() {
        return Ok(());
    }

    let verified: HashSet<Uuid> = tx
        .find_bank_accounts(&direct_debit)
        .await?
        .into_iter()
        .filter(|a| a.is_verified)
        .map(|a| a.student_id)
        .collect();
    let missing = direct_debit
        .iter()
        .filter(|id| !verified.contains(id))
        .count();
    if missing > 0 {
        return Err(AppError::bad_request(format!(
            "there are {} students that does not have a verified bank account",
            missing
        )));
    }
    Ok(())
}
