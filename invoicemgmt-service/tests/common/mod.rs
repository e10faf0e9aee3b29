//! Test helper module for invoicemgmt-service integration tests.
//!
//! Provides an in-memory ledger store with real unit-of-work semantics
//! (snapshot on begin, apply on commit) and a recording billing fake.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use invoicemgmt_service::models::{
    ActionLog, AdjustmentUpsert, BankAccount, BillItem, BillingStatus, BulkPayment,
    BulkPaymentStatus, Invoice, InvoiceAdjustment, InvoiceBillItem, InvoiceStatus, InvoiceType,
    InvoiceUpdate, NewActionLog, NewBulkPayment, NewPayment, Payment, PaymentMethod,
    PaymentStatus, PaymentUpdate, StudentPaymentDetail,
};
use invoicemgmt_service::services::billing::{
    BillItemError, BillItemRestoration, BillingReconciliation,
};
use invoicemgmt_service::services::store::{
    ActionLogRepository, AdjustmentRepository, BillItemRepository, BulkPaymentRepository,
    InvoiceRepository, LedgerStore, LedgerTx, PaymentRepository, StudentRepository,
};
use invoicemgmt_service::services::{
    BulkIssueOrchestrator, InvoiceLifecycleEngine, RequestContext, ResolvedFeatures,
};
use rust_decimal::Decimal;
use service_core::error::AppError;
use service_core::retry::RetryConfig;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, Once};
use uuid::Uuid;

pub const TEST_TENANT_ID: &str = "11111111-1111-1111-1111-111111111111";
pub const TEST_USER_ID: &str = "back-office-user";

static INIT: Once = Once::new();

pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

pub fn tenant_id() -> Uuid {
    Uuid::parse_str(TEST_TENANT_ID).unwrap()
}

pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

// =============================================================================
// In-memory ledger
// =============================================================================

/// Committed rows of every table.
#[derive(Debug, Clone, Default)]
pub struct LedgerState {
    pub invoices: HashMap<Uuid, Invoice>,
    pub payments: Vec<Payment>,
    pub action_logs: Vec<ActionLog>,
    pub bulk_payments: HashMap<Uuid, BulkPayment>,
    pub invoice_bill_items: Vec<InvoiceBillItem>,
    pub bill_items: Vec<BillItem>,
    pub adjustments: HashMap<Uuid, InvoiceAdjustment>,
    pub payment_details: Vec<StudentPaymentDetail>,
    pub bank_accounts: Vec<BankAccount>,
}

impl LedgerState {
    pub fn invoice(&self, invoice_id: Uuid) -> &Invoice {
        &self.invoices[&invoice_id]
    }

    pub fn payments_of(&self, invoice_id: Uuid) -> Vec<&Payment> {
        self.payments
            .iter()
            .filter(|p| p.invoice_id == invoice_id)
            .collect()
    }

    pub fn logs_of(&self, invoice_id: Uuid) -> Vec<&ActionLog> {
        self.action_logs
            .iter()
            .filter(|l| l.invoice_id == invoice_id)
            .collect()
    }

    fn latest_payment(&self, tenant_id: Uuid, invoice_id: Uuid) -> Option<Payment> {
        self.payments
            .iter()
            .filter(|p| p.tenant_id == tenant_id && p.invoice_id == invoice_id)
            .max_by(|a, b| {
                a.payment_due_date
                    .cmp(&b.payment_due_date)
                    .then(a.created_utc.cmp(&b.created_utc))
                    .then(a.payment_sequence_number.cmp(&b.payment_sequence_number))
            })
            .cloned()
    }

    fn max_payment_sequence_number(&self, tenant_id: Uuid) -> i32 {
        self.payments
            .iter()
            .filter(|p| p.tenant_id == tenant_id)
            .map(|p| p.payment_sequence_number)
            .max()
            .unwrap_or(0)
    }
}

struct Shared {
    state: Mutex<LedgerState>,
    begins: AtomicU32,
    commits: AtomicU32,
    rollbacks: AtomicU32,
    payment_insert_conflicts: AtomicU32,
    adjustment_insert_conflicts: AtomicU32,
    sequence_lock_held: AtomicBool,
    sequence_lock_attempts: AtomicU32,
}

/// Ledger store backed by process memory.
#[derive(Clone)]
pub struct InMemoryLedger {
    shared: Arc<Shared>,
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(LedgerState::default()),
                begins: AtomicU32::new(0),
                commits: AtomicU32::new(0),
                rollbacks: AtomicU32::new(0),
                payment_insert_conflicts: AtomicU32::new(0),
                adjustment_insert_conflicts: AtomicU32::new(0),
                sequence_lock_held: AtomicBool::new(false),
                sequence_lock_attempts: AtomicU32::new(0),
            }),
        }
    }

    /// Copy of the committed state.
    pub fn state(&self) -> LedgerState {
        self.shared.state.lock().unwrap().clone()
    }

    pub fn with_state<F: FnOnce(&mut LedgerState)>(&self, f: F) {
        f(&mut self.shared.state.lock().unwrap());
    }

    pub fn begins(&self) -> u32 {
        self.shared.begins.load(Ordering::SeqCst)
    }

    pub fn commits(&self) -> u32 {
        self.shared.commits.load(Ordering::SeqCst)
    }

    pub fn rollbacks(&self) -> u32 {
        self.shared.rollbacks.load(Ordering::SeqCst)
    }

    pub fn sequence_lock_attempts(&self) -> u32 {
        self.shared.sequence_lock_attempts.load(Ordering::SeqCst)
    }

    /// The next `n` payment inserts fail with a sequence number conflict.
    pub fn fail_payment_inserts(&self, n: u32) {
        self.shared
            .payment_insert_conflicts
            .store(n, Ordering::SeqCst);
    }

    /// The next `n` adjustment upserts fail with a sequence number conflict.
    pub fn fail_adjustment_upserts(&self, n: u32) {
        self.shared
            .adjustment_insert_conflicts
            .store(n, Ordering::SeqCst);
    }

    /// Simulate another transaction holding the payment sequence lock.
    pub fn hold_sequence_lock(&self, held: bool) {
        self.shared.sequence_lock_held.store(held, Ordering::SeqCst);
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedger {
    type Tx = InMemoryTx;

    async fn begin(&self, tenant_id: Uuid) -> Result<InMemoryTx, AppError> {
        self.shared.begins.fetch_add(1, Ordering::SeqCst);
        Ok(InMemoryTx {
            shared: self.shared.clone(),
            working: self.state(),
            tenant_id,
            staged: Vec::new(),
        })
    }
}

pub struct InMemoryTx {
    shared: Arc<Shared>,
    working: LedgerState,
    tenant_id: Uuid,
    staged: Vec<Uuid>,
}

#[async_trait]
impl LedgerTx for InMemoryTx {
    async fn commit(self) -> Result<(), AppError> {
        *self.shared.state.lock().unwrap() = self.working;
        self.shared.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(self) -> Result<(), AppError> {
        self.shared.rollbacks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl InvoiceRepository for InMemoryTx {
    async fn find_invoice(&mut self, invoice_id: Uuid) -> Result<Option<Invoice>, AppError> {
        Ok(self
            .working
            .invoices
            .get(&invoice_id)
            .filter(|i| i.tenant_id == self.tenant_id)
            .cloned())
    }

    async fn update_invoice(
        &mut self,
        invoice_id: Uuid,
        update: InvoiceUpdate,
    ) -> Result<Invoice, AppError> {
        let tenant_id = self.tenant_id;
        let invoice = self
            .working
            .invoices
            .get_mut(&invoice_id)
            .filter(|i| i.tenant_id == tenant_id)
            .ok_or_else(|| AppError::not_found(format!("invoice {} not found", invoice_id)))?;
        update.apply_to(invoice);
        Ok(invoice.clone())
    }

    async fn stage_invoice_ids(&mut self, invoice_ids: &[Uuid]) -> Result<(), AppError> {
        for id in invoice_ids {
            if !self.staged.contains(id) {
                self.staged.push(*id);
            }
        }
        Ok(())
    }

    async fn find_staged_invoices(&mut self) -> Result<Vec<Invoice>, AppError> {
        Ok(self
            .staged
            .iter()
            .filter_map(|id| self.working.invoices.get(id))
            .filter(|i| i.tenant_id == self.tenant_id)
            .cloned()
            .collect())
    }

    async fn issue_staged_invoices(&mut self) -> Result<u64, AppError> {
        let mut issued = 0;
        for id in &self.staged {
            if let Some(invoice) = self.working.invoices.get_mut(id) {
                if invoice.tenant_id == self.tenant_id && invoice.has_status(InvoiceStatus::Draft)
                {
                    InvoiceUpdate::status(InvoiceStatus::Issued).apply_to(invoice);
                    issued += 1;
                }
            }
        }
        Ok(issued)
    }
}

#[async_trait]
impl PaymentRepository for InMemoryTx {
    async fn find_latest_payment(
        &mut self,
        invoice_id: Uuid,
    ) -> Result<Option<Payment>, AppError> {
        Ok(self.working.latest_payment(self.tenant_id, invoice_id))
    }

    async fn create_payments(&mut self, payments: &[NewPayment]) -> Result<Vec<Payment>, AppError> {
        let conflicts = &self.shared.payment_insert_conflicts;
        if conflicts.load(Ordering::SeqCst) > 0 {
            conflicts.fetch_sub(1, Ordering::SeqCst);
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Failed to create payments: duplicate key value violates unique constraint \"payments_sequence_number_unique\""
            )));
        }

        let mut created = Vec::with_capacity(payments.len());
        for new in payments {
            let next = self.working.max_payment_sequence_number(self.tenant_id) + 1;
            let sequence_number = new.payment_sequence_number.unwrap_or(next);
            let taken = self.working.payments.iter().any(|p| {
                p.tenant_id == self.tenant_id && p.payment_sequence_number == sequence_number
            });
            if taken {
                return Err(AppError::Conflict(anyhow::anyhow!(
                    "Failed to create payments: payment sequence number {} already exists",
                    sequence_number
                )));
            }

            let now = Utc::now();
            let payment = Payment {
                payment_id: new.payment_id,
                tenant_id: self.tenant_id,
                invoice_id: new.invoice_id,
                student_id: new.student_id,
                bulk_payment_id: new.bulk_payment_id,
                payment_status: new.payment_status.as_str().to_string(),
                payment_method: new.payment_method.as_str().to_string(),
                payment_sequence_number: sequence_number,
                amount: new.amount,
                payment_due_date: new.payment_due_date,
                payment_expiry_date: new.payment_expiry_date,
                payment_date: new.payment_date,
                created_utc: now,
                updated_utc: now,
            };
            self.working.payments.push(payment.clone());
            created.push(payment);
        }
        Ok(created)
    }

    async fn update_payment(
        &mut self,
        payment_id: Uuid,
        update: PaymentUpdate,
    ) -> Result<Payment, AppError> {
        let tenant_id = self.tenant_id;
        let payment = self
            .working
            .payments
            .iter_mut()
            .find(|p| p.payment_id == payment_id && p.tenant_id == tenant_id)
            .ok_or_else(|| AppError::not_found(format!("payment {} not found", payment_id)))?;
        update.apply_to(payment);
        Ok(payment.clone())
    }

    async fn try_lock_payment_sequence(&mut self) -> Result<bool, AppError> {
        self.shared
            .sequence_lock_attempts
            .fetch_add(1, Ordering::SeqCst);
        Ok(!self.shared.sequence_lock_held.load(Ordering::SeqCst))
    }

    async fn latest_payment_sequence_number(&mut self) -> Result<i32, AppError> {
        Ok(self.working.max_payment_sequence_number(self.tenant_id))
    }

    async fn count_other_bulk_payments_not_in_status(
        &mut self,
        bulk_payment_id: Uuid,
        payment_id: Uuid,
        status: PaymentStatus,
    ) -> Result<i64, AppError> {
        Ok(self
            .working
            .payments
            .iter()
            .filter(|p| {
                p.tenant_id == self.tenant_id
                    && p.bulk_payment_id == Some(bulk_payment_id)
                    && p.payment_id != payment_id
                    && !p.has_status(status)
            })
            .count() as i64)
    }
}

#[async_trait]
impl ActionLogRepository for InMemoryTx {
    async fn create_action_logs(&mut self, logs: &[NewActionLog]) -> Result<u64, AppError> {
        for log in logs {
            self.working.action_logs.push(ActionLog {
                action_log_id: log.action_log_id,
                tenant_id: self.tenant_id,
                invoice_id: log.invoice_id,
                action: log.action.clone(),
                action_detail: log.action_detail.clone(),
                action_comment: log.action_comment.clone(),
                user_id: log.user_id.clone(),
                payment_sequence_number: log.payment_sequence_number,
                bulk_payment_id: log.bulk_payment_id,
                created_utc: Utc::now(),
            });
        }
        Ok(logs.len() as u64)
    }
}

#[async_trait]
impl BulkPaymentRepository for InMemoryTx {
    async fn create_bulk_payment(
        &mut self,
        bulk_payment: NewBulkPayment,
    ) -> Result<BulkPayment, AppError> {
        let now = Utc::now();
        let row = BulkPayment {
            bulk_payment_id: bulk_payment.bulk_payment_id,
            tenant_id: self.tenant_id,
            bulk_payment_status: BulkPaymentStatus::Pending.as_str().to_string(),
            payment_method: bulk_payment.payment_method.as_str().to_string(),
            invoice_status: bulk_payment.invoice_status.as_str().to_string(),
            invoice_type: bulk_payment
                .invoice_types
                .iter()
                .map(|t| t.as_str().to_string())
                .collect(),
            created_utc: now,
            updated_utc: now,
        };
        self.working
            .bulk_payments
            .insert(row.bulk_payment_id, row.clone());
        Ok(row)
    }

    async fn update_bulk_payment_status(
        &mut self,
        bulk_payment_id: Uuid,
        status: BulkPaymentStatus,
    ) -> Result<(), AppError> {
        let row = self
            .working
            .bulk_payments
            .get_mut(&bulk_payment_id)
            .ok_or_else(|| {
                AppError::not_found(format!("bulk payment {} not found", bulk_payment_id))
            })?;
        row.bulk_payment_status = status.as_str().to_string();
        row.updated_utc = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl BillItemRepository for InMemoryTx {
    async fn find_invoice_bill_items(
        &mut self,
        invoice_id: Uuid,
    ) -> Result<Vec<InvoiceBillItem>, AppError> {
        Ok(self
            .working
            .invoice_bill_items
            .iter()
            .filter(|b| b.tenant_id == self.tenant_id && b.invoice_id == invoice_id)
            .cloned()
            .collect())
    }

    async fn find_bill_item(&mut self, sequence_number: i32) -> Result<Option<BillItem>, AppError> {
        Ok(self
            .working
            .bill_items
            .iter()
            .find(|b| {
                b.tenant_id == self.tenant_id && b.bill_item_sequence_number == sequence_number
            })
            .cloned())
    }
}

#[async_trait]
impl AdjustmentRepository for InMemoryTx {
    async fn find_adjustment(
        &mut self,
        adjustment_id: Uuid,
    ) -> Result<Option<InvoiceAdjustment>, AppError> {
        Ok(self
            .working
            .adjustments
            .get(&adjustment_id)
            .filter(|a| a.tenant_id == self.tenant_id && a.deleted_utc.is_none())
            .cloned())
    }

    async fn upsert_adjustments(
        &mut self,
        adjustments: &[AdjustmentUpsert],
    ) -> Result<Vec<InvoiceAdjustment>, AppError> {
        let conflicts = &self.shared.adjustment_insert_conflicts;
        if conflicts.load(Ordering::SeqCst) > 0 {
            conflicts.fetch_sub(1, Ordering::SeqCst);
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Failed to upsert invoice adjustments: duplicate invoice adjustment sequence number"
            )));
        }

        let mut upserted = Vec::with_capacity(adjustments.len());
        for a in adjustments {
            let now = Utc::now();
            let next = self
                .working
                .adjustments
                .values()
                .filter(|x| x.tenant_id == self.tenant_id)
                .map(|x| x.invoice_adjustment_sequence_number)
                .max()
                .unwrap_or(0)
                + 1;
            let row = match self.working.adjustments.get(&a.invoice_adjustment_id) {
                Some(existing) => InvoiceAdjustment {
                    description: a.description.clone(),
                    amount: a.amount,
                    updated_utc: now,
                    ..existing.clone()
                },
                None => InvoiceAdjustment {
                    invoice_adjustment_id: a.invoice_adjustment_id,
                    tenant_id: self.tenant_id,
                    invoice_id: a.invoice_id,
                    student_id: a.student_id,
                    description: a.description.clone(),
                    amount: a.amount,
                    invoice_adjustment_sequence_number: next,
                    created_utc: now,
                    updated_utc: now,
                    deleted_utc: None,
                },
            };
            self.working
                .adjustments
                .insert(row.invoice_adjustment_id, row.clone());
            upserted.push(row);
        }
        Ok(upserted)
    }

    async fn soft_delete_adjustments(&mut self, adjustment_ids: &[Uuid]) -> Result<u64, AppError> {
        let mut deleted = 0;
        for id in adjustment_ids {
            if let Some(row) = self.working.adjustments.get_mut(id) {
                if row.deleted_utc.is_none() {
                    row.deleted_utc = Some(Utc::now());
                    deleted += 1;
                }
            }
        }
        Ok(deleted)
    }
}

#[async_trait]
impl StudentRepository for InMemoryTx {
    async fn find_payment_details(
        &mut self,
        student_ids: &[Uuid],
    ) -> Result<Vec<StudentPaymentDetail>, AppError> {
        Ok(self
            .working
            .payment_details
            .iter()
            .filter(|d| d.tenant_id == self.tenant_id && student_ids.contains(&d.student_id))
            .cloned()
            .collect())
    }

    async fn find_bank_accounts(
        &mut self,
        student_ids: &[Uuid],
    ) -> Result<Vec<BankAccount>, AppError> {
        Ok(self
            .working
            .bank_accounts
            .iter()
            .filter(|a| a.tenant_id == self.tenant_id && student_ids.contains(&a.student_id))
            .cloned()
            .collect())
    }
}

// =============================================================================
// Billing fake
// =============================================================================

/// Records every restoration request and answers with scripted errors.
#[derive(Default)]
pub struct RecordingBilling {
    calls: Mutex<Vec<Vec<BillItemRestoration>>>,
    item_errors: Mutex<Vec<BillItemError>>,
    unavailable: AtomicBool,
}

impl RecordingBilling {
    pub fn calls(&self) -> Vec<Vec<BillItemRestoration>> {
        self.calls.lock().unwrap().clone()
    }

    pub fn fail_item(&self, bill_item_sequence_number: i32, error: &str) {
        self.item_errors.lock().unwrap().push(BillItemError {
            bill_item_sequence_number,
            error: error.to_string(),
        });
    }

    pub fn set_unavailable(&self) {
        self.unavailable.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl BillingReconciliation for RecordingBilling {
    async fn restore_bill_item_status(
        &self,
        items: &[BillItemRestoration],
        _acting_user_id: &str,
        _organization_id: &str,
    ) -> Result<Vec<BillItemError>, AppError> {
        self.calls.lock().unwrap().push(items.to_vec());
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::ServiceUnavailable);
        }
        Ok(self.item_errors.lock().unwrap().clone())
    }
}

// =============================================================================
// Fixtures
// =============================================================================

pub type TestEngine = InvoiceLifecycleEngine<InMemoryLedger, RecordingBilling>;

pub struct TestHarness {
    pub ledger: InMemoryLedger,
    pub billing: Arc<RecordingBilling>,
    pub engine: TestEngine,
    pub bulk: BulkIssueOrchestrator<InMemoryLedger>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_retry(RetryConfig::fixed(20, std::time::Duration::from_millis(1)))
    }

    pub fn with_retry(retry: RetryConfig) -> Self {
        init_tracing();
        let ledger = InMemoryLedger::new();
        let billing = Arc::new(RecordingBilling::default());
        let store = Arc::new(ledger.clone());
        Self {
            engine: InvoiceLifecycleEngine::new(store.clone(), billing.clone(), retry.clone()),
            bulk: BulkIssueOrchestrator::new(store, retry),
            ledger,
            billing,
        }
    }
}

pub fn context() -> RequestContext {
    RequestContext::new(tenant_id(), TEST_USER_ID, ResolvedFeatures::default())
}

pub fn context_with(features: ResolvedFeatures) -> RequestContext {
    RequestContext::new(tenant_id(), TEST_USER_ID, features)
}

pub fn manual_sequence() -> ResolvedFeatures {
    ResolvedFeatures {
        manual_payment_sequence: true,
        improved_bulk_issue: false,
    }
}

pub fn improved_bulk_issue() -> ResolvedFeatures {
    ResolvedFeatures {
        manual_payment_sequence: false,
        improved_bulk_issue: true,
    }
}

/// Insert an invoice whose outstanding balance equals its total.
pub fn seed_invoice(ledger: &InMemoryLedger, status: InvoiceStatus, total: Decimal) -> Invoice {
    seed_invoice_for(ledger, Uuid::new_v4(), status, total)
}

pub fn seed_invoice_for(
    ledger: &InMemoryLedger,
    student_id: Uuid,
    status: InvoiceStatus,
    total: Decimal,
) -> Invoice {
    let now = Utc::now();
    let invoice = Invoice {
        invoice_id: Uuid::new_v4(),
        tenant_id: tenant_id(),
        student_id,
        status: status.as_str().to_string(),
        invoice_type: InvoiceType::Manual.as_str().to_string(),
        sub_total: total,
        total,
        outstanding_balance: total,
        amount_paid: Decimal::ZERO,
        amount_refunded: Decimal::ZERO,
        created_utc: now,
        updated_utc: now,
    };
    ledger.with_state(|s| {
        s.invoices.insert(invoice.invoice_id, invoice.clone());
    });
    invoice
}

pub fn seed_payment(
    ledger: &InMemoryLedger,
    invoice: &Invoice,
    status: PaymentStatus,
    method: PaymentMethod,
) -> Payment {
    let mut payment = None;
    ledger.with_state(|s| {
        let now = Utc::now();
        let row = Payment {
            payment_id: Uuid::new_v4(),
            tenant_id: invoice.tenant_id,
            invoice_id: invoice.invoice_id,
            student_id: invoice.student_id,
            bulk_payment_id: None,
            payment_status: status.as_str().to_string(),
            payment_method: method.as_str().to_string(),
            payment_sequence_number: s.max_payment_sequence_number(invoice.tenant_id) + 1,
            amount: invoice.total,
            payment_due_date: today(),
            payment_expiry_date: today() + Duration::days(7),
            payment_date: None,
            created_utc: now,
            updated_utc: now,
        };
        s.payments.push(row.clone());
        payment = Some(row);
    });
    payment.unwrap()
}

pub fn seed_bill_item(
    ledger: &InMemoryLedger,
    invoice: &Invoice,
    sequence_number: i32,
    past_status: BillingStatus,
    bill_date: DateTime<Utc>,
) {
    ledger.with_state(|s| {
        s.bill_items.push(BillItem {
            tenant_id: invoice.tenant_id,
            bill_item_sequence_number: sequence_number,
            billing_status: BillingStatus::Invoiced.as_str().to_string(),
            bill_date,
        });
        s.invoice_bill_items.push(InvoiceBillItem {
            invoice_bill_item_id: Uuid::new_v4(),
            tenant_id: invoice.tenant_id,
            invoice_id: invoice.invoice_id,
            bill_item_sequence_number: sequence_number,
            past_billing_status: past_status.as_str().to_string(),
            created_utc: Utc::now(),
        });
    });
}

pub fn seed_adjustment(ledger: &InMemoryLedger, invoice: &Invoice, amount: Decimal) -> Uuid {
    let id = Uuid::new_v4();
    ledger.with_state(|s| {
        let now = Utc::now();
        let sequence_number = s.adjustments.len() as i32 + 1;
        s.adjustments.insert(
            id,
            InvoiceAdjustment {
                invoice_adjustment_id: id,
                tenant_id: invoice.tenant_id,
                invoice_id: invoice.invoice_id,
                student_id: invoice.student_id,
                description: "Seeded adjustment".to_string(),
                amount,
                invoice_adjustment_sequence_number: sequence_number,
                created_utc: now,
                updated_utc: now,
                deleted_utc: None,
            },
        );
    });
    id
}

pub fn seed_payment_detail(ledger: &InMemoryLedger, student_id: Uuid, method: &str) {
    ledger.with_state(|s| {
        let now = Utc::now();
        s.payment_details.push(StudentPaymentDetail {
            student_payment_detail_id: Uuid::new_v4(),
            tenant_id: tenant_id(),
            student_id,
            payment_method: method.to_string(),
            created_utc: now,
            updated_utc: now,
        });
    });
}

pub fn seed_bank_account(ledger: &InMemoryLedger, student_id: Uuid, verified: bool) {
    ledger.with_state(|s| {
        let now = Utc::now();
        s.bank_accounts.push(BankAccount {
            bank_account_id: Uuid::new_v4(),
            tenant_id: tenant_id(),
            student_id,
            is_verified: verified,
            created_utc: now,
            updated_utc: now,
        });
    });
}
