//! PostgreSQL ledger store for invoicemgmt-service.

use async_trait::async_trait;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, QueryBuilder, Transaction};
use std::time::Duration;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::models::{
    AdjustmentUpsert, BankAccount, BillItem, BulkPayment, BulkPaymentStatus, Invoice,
    InvoiceAdjustment, InvoiceBillItem, InvoiceStatus, InvoiceUpdate, NewActionLog,
    NewBulkPayment, NewPayment, Payment, PaymentStatus, PaymentUpdate, StudentPaymentDetail,
};
use crate::services::metrics::DB_QUERY_DURATION;
use crate::services::store::{
    ActionLogRepository, AdjustmentRepository, BillItemRepository, BulkPaymentRepository,
    InvoiceRepository, LedgerStore, LedgerTx, PaymentRepository, StudentRepository,
};

const PAYMENT_SEQUENCE_LOCK_PREFIX: &str = "payment-sequence-number-";

/// Map a query error. Unique violations are conflicts the caller may retry.
fn db_error(action: &str, e: sqlx::Error) -> AppError {
    match e {
        sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
            AppError::Conflict(anyhow::anyhow!("Failed to {}: {}", action, db_err))
        }
        _ => AppError::DatabaseError(anyhow::anyhow!("Failed to {}: {}", action, e)),
    }
}

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "invoicemgmt-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for Database {
    type Tx = PgLedgerTx;

    async fn begin(&self, tenant_id: Uuid) -> Result<PgLedgerTx, AppError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("begin transaction", e))?;
        Ok(PgLedgerTx { tx, tenant_id })
    }
}

/// One PostgreSQL transaction scoped to a tenant.
pub struct PgLedgerTx {
    tx: Transaction<'static, Postgres>,
    tenant_id: Uuid,
}

#[async_trait]
impl LedgerTx for PgLedgerTx {
    async fn commit(self) -> Result<(), AppError> {
        self.tx
            .commit()
            .await
            .map_err(|e| db_error("commit transaction", e))
    }

    async fn rollback(self) -> Result<(), AppError> {
        self.tx
            .rollback()
            .await
            .map_err(|e| db_error("roll back transaction", e))
    }
}

// -----------------------------------------------------------------------------
// Invoices
// -----------------------------------------------------------------------------

#[async_trait]
impl InvoiceRepository for PgLedgerTx {
    #[instrument(skip(self), fields(tenant_id = %self.tenant_id))]
    async fn find_invoice(&mut self, invoice_id: Uuid) -> Result<Option<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_invoice"])
            .start_timer();

        let invoice = sqlx::query_as::<_, Invoice>(
            r#"
            SELECT * FROM invoices
            WHERE tenant_id = $1 AND invoice_id = $2
            FOR UPDATE
            "#,
        )
        .bind(self.tenant_id)
        .bind(invoice_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| db_error("find invoice", e))?;

        timer.observe_duration();
        Ok(invoice)
    }

    #[instrument(skip(self, update), fields(tenant_id = %self.tenant_id))]
    async fn update_invoice(
        &mut self,
        invoice_id: Uuid,
        update: InvoiceUpdate,
    ) -> Result<Invoice, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_invoice"])
            .start_timer();

        let invoice = sqlx::query_as::<_, Invoice>(
            r#"
            UPDATE invoices SET
                status = COALESCE($3, status),
                sub_total = COALESCE($4, sub_total),
                total = COALESCE($5, total),
                outstanding_balance = COALESCE($6, outstanding_balance),
                amount_paid = COALESCE($7, amount_paid),
                amount_refunded = COALESCE($8, amount_refunded),
                updated_utc = NOW()
            WHERE tenant_id = $1 AND invoice_id = $2
            RETURNING *
            "#,
        )
        .bind(self.tenant_id)
        .bind(invoice_id)
        .bind(update.status.map(|s| s.as_str()))
        .bind(update.sub_total)
        .bind(update.total)
        .bind(update.outstanding_balance)
        .bind(update.amount_paid)
        .bind(update.amount_refunded)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| db_error("update invoice", e))?
        .ok_or_else(|| AppError::not_found(format!("invoice {} not found", invoice_id)))?;

        timer.observe_duration();
        debug!(invoice_id = %invoice_id, status = %invoice.status, "Invoice updated");
        Ok(invoice)
    }

    #[instrument(skip(self, invoice_ids), fields(tenant_id = %self.tenant_id, count = invoice_ids.len()))]
    async fn stage_invoice_ids(&mut self, invoice_ids: &[Uuid]) -> Result<(), AppError> {
        sqlx::query(
            r#"
            CREATE TEMPORARY TABLE IF NOT EXISTS temp_invoice_ids (
                invoice_id UUID PRIMARY KEY
            ) ON COMMIT DROP
            "#,
        )
        .execute(&mut *self.tx)
        .await
        .map_err(|e| db_error("create temp_invoice_ids", e))?;

        sqlx::query(
            r#"
            INSERT INTO temp_invoice_ids (invoice_id)
            SELECT UNNEST($1::uuid[])
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(invoice_ids)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| db_error("stage invoice ids", e))?;

        Ok(())
    }

    #[instrument(skip(self), fields(tenant_id = %self.tenant_id))]
    async fn find_staged_invoices(&mut self) -> Result<Vec<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_staged_invoices"])
            .start_timer();

        let invoices = sqlx::query_as::<_, Invoice>(
            r#"
            SELECT i.* FROM invoices i
            JOIN temp_invoice_ids t ON t.invoice_id = i.invoice_id
            WHERE i.tenant_id = $1
            ORDER BY i.created_utc, i.invoice_id
            FOR UPDATE OF i
            "#,
        )
        .bind(self.tenant_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| db_error("find staged invoices", e))?;

        timer.observe_duration();
        Ok(invoices)
    }

    #[instrument(skip(self), fields(tenant_id = %self.tenant_id))]
    async fn issue_staged_invoices(&mut self) -> Result<u64, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["issue_staged_invoices"])
            .start_timer();

        let result = sqlx::query(
            r#"
            UPDATE invoices SET status = $2, updated_utc = NOW()
            WHERE tenant_id = $1
              AND status = $3
              AND invoice_id IN (SELECT invoice_id FROM temp_invoice_ids)
            "#,
        )
        .bind(self.tenant_id)
        .bind(InvoiceStatus::Issued.as_str())
        .bind(InvoiceStatus::Draft.as_str())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| db_error("issue staged invoices", e))?;

        timer.observe_duration();
        Ok(result.rows_affected())
    }
}

// -----------------------------------------------------------------------------
// Payments
// -----------------------------------------------------------------------------

#[async_trait]
impl PaymentRepository for PgLedgerTx {
    #[instrument(skip(self), fields(tenant_id = %self.tenant_id))]
    async fn find_latest_payment(
        &mut self,
        invoice_id: Uuid,
    ) -> Result<Option<Payment>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_latest_payment"])
            .start_timer();

        let payment = sqlx::query_as::<_, Payment>(
            r#"
            SELECT * FROM payments
            WHERE tenant_id = $1 AND invoice_id = $2
            ORDER BY payment_due_date DESC, created_utc DESC, payment_sequence_number DESC
            LIMIT 1
            FOR UPDATE
            "#,
        )
        .bind(self.tenant_id)
        .bind(invoice_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| db_error("find latest payment", e))?;

        timer.observe_duration();
        Ok(payment)
    }

    #[instrument(skip(self, payments), fields(tenant_id = %self.tenant_id, count = payments.len()))]
    async fn create_payments(&mut self, payments: &[NewPayment]) -> Result<Vec<Payment>, AppError> {
        if payments.is_empty() {
            return Ok(Vec::new());
        }

        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_payments"])
            .start_timer();

        let tenant_id = self.tenant_id;
        let mut builder = QueryBuilder::<Postgres>::new(
            "INSERT INTO payments (payment_id, tenant_id, invoice_id, student_id, bulk_payment_id, \
             payment_status, payment_method, payment_sequence_number, amount, payment_due_date, \
             payment_expiry_date, payment_date) ",
        );
        builder.push_values(payments, |mut row, p| {
            row.push_bind(p.payment_id)
                .push_bind(tenant_id)
                .push_bind(p.invoice_id)
                .push_bind(p.student_id)
                .push_bind(p.bulk_payment_id)
                .push_bind(p.payment_status.as_str())
                .push_bind(p.payment_method.as_str())
                .push_bind(p.payment_sequence_number)
                .push_bind(p.amount)
                .push_bind(p.payment_due_date)
                .push_bind(p.payment_expiry_date)
                .push_bind(p.payment_date);
        });
        builder.push(" RETURNING *");

        let created = builder
            .build_query_as::<Payment>()
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| db_error("create payments", e))?;

        timer.observe_duration();
        info!(count = created.len(), "Payments created");
        Ok(created)
    }

    #[instrument(skip(self, update), fields(tenant_id = %self.tenant_id))]
    async fn update_payment(
        &mut self,
        payment_id: Uuid,
        update: PaymentUpdate,
    ) -> Result<Payment, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_payment"])
            .start_timer();

        let payment = sqlx::query_as::<_, Payment>(
            r#"
            UPDATE payments SET
                payment_status = COALESCE($3, payment_status),
                payment_method = COALESCE($4, payment_method),
                amount = COALESCE($5, amount),
                payment_date = COALESCE($6, payment_date),
                updated_utc = NOW()
            WHERE tenant_id = $1 AND payment_id = $2
            RETURNING *
            "#,
        )
        .bind(self.tenant_id)
        .bind(payment_id)
        .bind(update.payment_status.map(|s| s.as_str()))
        .bind(update.payment_method.map(|m| m.as_str()))
        .bind(update.amount)
        .bind(update.payment_date)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| db_error("update payment", e))?
        .ok_or_else(|| AppError::not_found(format!("payment {} not found", payment_id)))?;

        timer.observe_duration();
        Ok(payment)
    }

    #[instrument(skip(self), fields(tenant_id = %self.tenant_id))]
    async fn try_lock_payment_sequence(&mut self) -> Result<bool, AppError> {
        let key = format!("{}{}", PAYMENT_SEQUENCE_LOCK_PREFIX, self.tenant_id);
        sqlx::query_scalar::<_, bool>("SELECT pg_try_advisory_xact_lock(hashtext($1))")
            .bind(key)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| db_error("acquire payment sequence lock", e))
    }

    #[instrument(skip(self), fields(tenant_id = %self.tenant_id))]
    async fn latest_payment_sequence_number(&mut self) -> Result<i32, AppError> {
        sqlx::query_scalar::<_, i32>(
            r#"
            SELECT COALESCE(MAX(payment_sequence_number), 0)
            FROM payments
            WHERE tenant_id = $1
            "#,
        )
        .bind(self.tenant_id)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| db_error("read latest payment sequence number", e))
    }

    #[instrument(skip(self), fields(tenant_id = %self.tenant_id))]
    async fn count_other_bulk_payments_not_in_status(
        &mut self,
        bulk_payment_id: Uuid,
        payment_id: Uuid,
        status: PaymentStatus,
    ) -> Result<i64, AppError> {
        sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM payments
            WHERE tenant_id = $1
              AND bulk_payment_id = $2
              AND payment_id <> $3
              AND payment_status <> $4
            "#,
        )
        .bind(self.tenant_id)
        .bind(bulk_payment_id)
        .bind(payment_id)
        .bind(status.as_str())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| db_error("count bulk payment members", e))
    }
}

// -----------------------------------------------------------------------------
// Action logs
// -----------------------------------------------------------------------------

#[async_trait]
impl ActionLogRepository for PgLedgerTx {
    #[instrument(skip(self, logs), fields(tenant_id = %self.tenant_id, count = logs.len()))]
    async fn create_action_logs(&mut self, logs: &[NewActionLog]) -> Result<u64, AppError> {
        if logs.is_empty() {
            return Ok(0);
        }

        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_action_logs"])
            .start_timer();

        let tenant_id = self.tenant_id;
        let mut builder = QueryBuilder::<Postgres>::new(
            "INSERT INTO invoice_action_logs (action_log_id, tenant_id, invoice_id, action, \
             action_detail, action_comment, user_id, payment_sequence_number, bulk_payment_id) ",
        );
        builder.push_values(logs, |mut row, log| {
            row.push_bind(log.action_log_id)
                .push_bind(tenant_id)
                .push_bind(log.invoice_id)
                .push_bind(&log.action)
                .push_bind(&log.action_detail)
                .push_bind(&log.action_comment)
                .push_bind(&log.user_id)
                .push_bind(log.payment_sequence_number)
                .push_bind(log.bulk_payment_id);
        });

        let result = builder
            .build()
            .execute(&mut *self.tx)
            .await
            .map_err(|e| db_error("create action logs", e))?;

        timer.observe_duration();
        Ok(result.rows_affected())
    }
}

// -----------------------------------------------------------------------------
// Bulk payments
// -----------------------------------------------------------------------------

#[async_trait]
impl BulkPaymentRepository for PgLedgerTx {
    #[instrument(skip(self, bulk_payment), fields(tenant_id = %self.tenant_id, bulk_payment_id = %bulk_payment.bulk_payment_id))]
    async fn create_bulk_payment(
        &mut self,
        bulk_payment: NewBulkPayment,
    ) -> Result<BulkPayment, AppError> {
        let invoice_types: Vec<&str> = bulk_payment
            .invoice_types
            .iter()
            .map(|t| t.as_str())
            .collect();

        sqlx::query_as::<_, BulkPayment>(
            r#"
            INSERT INTO bulk_payments (bulk_payment_id, tenant_id, bulk_payment_status, payment_method, invoice_status, invoice_type)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(bulk_payment.bulk_payment_id)
        .bind(self.tenant_id)
        .bind(BulkPaymentStatus::Pending.as_str())
        .bind(bulk_payment.payment_method.as_str())
        .bind(bulk_payment.invoice_status.as_str())
        .bind(invoice_types)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| db_error("create bulk payment", e))
    }

    #[instrument(skip(self), fields(tenant_id = %self.tenant_id))]
    async fn update_bulk_payment_status(
        &mut self,
        bulk_payment_id: Uuid,
        status: BulkPaymentStatus,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE bulk_payments SET bulk_payment_status = $3, updated_utc = NOW()
            WHERE tenant_id = $1 AND bulk_payment_id = $2
            "#,
        )
        .bind(self.tenant_id)
        .bind(bulk_payment_id)
        .bind(status.as_str())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| db_error("update bulk payment status", e))?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!(
                "bulk payment {} not found",
                bulk_payment_id
            )));
        }
        Ok(())
    }
}

// -----------------------------------------------------------------------------
// Bill items
// -----------------------------------------------------------------------------

#[async_trait]
impl BillItemRepository for PgLedgerTx {
    async fn find_invoice_bill_items(
        &mut self,
        invoice_id: Uuid,
    ) -> Result<Vec<InvoiceBillItem>, AppError> {
        sqlx::query_as::<_, InvoiceBillItem>(
            r#"
            SELECT * FROM invoice_bill_items
            WHERE tenant_id = $1 AND invoice_id = $2
            ORDER BY bill_item_sequence_number
            "#,
        )
        .bind(self.tenant_id)
        .bind(invoice_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| db_error("find invoice bill items", e))
    }

    async fn find_bill_item(&mut self, sequence_number: i32) -> Result<Option<BillItem>, AppError> {
        sqlx::query_as::<_, BillItem>(
            r#"
            SELECT * FROM bill_items
            WHERE tenant_id = $1 AND bill_item_sequence_number = $2
            "#,
        )
        .bind(self.tenant_id)
        .bind(sequence_number)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| db_error("find bill item", e))
    }
}

// -----------------------------------------------------------------------------
// Adjustments
// -----------------------------------------------------------------------------

#[async_trait]
impl AdjustmentRepository for PgLedgerTx {
    async fn find_adjustment(
        &mut self,
        adjustment_id: Uuid,
    ) -> Result<Option<InvoiceAdjustment>, AppError> {
        sqlx::query_as::<_, InvoiceAdjustment>(
            r#"
            SELECT * FROM invoice_adjustments
            WHERE tenant_id = $1 AND invoice_adjustment_id = $2 AND deleted_utc IS NULL
            FOR UPDATE
            "#,
        )
        .bind(self.tenant_id)
        .bind(adjustment_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| db_error("find invoice adjustment", e))
    }

    #[instrument(skip(self, adjustments), fields(tenant_id = %self.tenant_id, count = adjustments.len()))]
    async fn upsert_adjustments(
        &mut self,
        adjustments: &[AdjustmentUpsert],
    ) -> Result<Vec<InvoiceAdjustment>, AppError> {
        if adjustments.is_empty() {
            return Ok(Vec::new());
        }

        let timer = DB_QUERY_DURATION
            .with_label_values(&["upsert_adjustments"])
            .start_timer();

        let tenant_id = self.tenant_id;
        let mut builder = QueryBuilder::<Postgres>::new(
            "INSERT INTO invoice_adjustments (invoice_adjustment_id, tenant_id, invoice_id, \
             student_id, description, amount) ",
        );
        builder.push_values(adjustments, |mut row, a| {
            row.push_bind(a.invoice_adjustment_id)
                .push_bind(tenant_id)
                .push_bind(a.invoice_id)
                .push_bind(a.student_id)
                .push_bind(&a.description)
                .push_bind(a.amount);
        });
        builder.push(
            " ON CONFLICT (invoice_adjustment_id) DO UPDATE SET \
             description = EXCLUDED.description, amount = EXCLUDED.amount, updated_utc = NOW() \
             RETURNING *",
        );

        let upserted = builder
            .build_query_as::<InvoiceAdjustment>()
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| db_error("upsert invoice adjustments", e))?;

        timer.observe_duration();
        Ok(upserted)
    }

    async fn soft_delete_adjustments(&mut self, adjustment_ids: &[Uuid]) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE invoice_adjustments SET deleted_utc = NOW(), updated_utc = NOW()
            WHERE tenant_id = $1 AND invoice_adjustment_id = ANY($2) AND deleted_utc IS NULL
            "#,
        )
        .bind(self.tenant_id)
        .bind(adjustment_ids)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| db_error("delete invoice adjustments", e))?;

        Ok(result.rows_affected())
    }
}

// -----------------------------------------------------------------------------
// Student payment settings
// -----------------------------------------------------------------------------

#[async_trait]
impl StudentRepository for PgLedgerTx {
    async fn find_payment_details(
        &mut self,
        student_ids: &[Uuid],
    ) -> Result<Vec<StudentPaymentDetail>, AppError> {
        sqlx::query_as::<_, StudentPaymentDetail>(
            r#"
            SELECT * FROM student_payment_details
            WHERE tenant_id = $1 AND student_id = ANY($2)
            "#,
        )
        .bind(self.tenant_id)
        .bind(student_ids)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| db_error("find student payment details", e))
    }

    async fn find_bank_accounts(
        &mut self,
        student_ids: &[Uuid],
    ) -> Result<Vec<BankAccount>, AppError> {
        sqlx::query_as::<_, BankAccount>(
            r#"
            SELECT * FROM bank_accounts
            WHERE tenant_id = $1 AND student_id = ANY($2)
            "#,
        )
        .bind(self.tenant_id)
        .bind(student_ids)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| db_error("find bank accounts", e))
    }
}
