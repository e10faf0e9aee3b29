//! Services module for invoicemgmt-service.

pub mod action_log;
pub mod adjustment;
pub mod billing;
pub mod bulk_issue;
pub mod database;
pub mod features;
pub mod lifecycle;
pub mod metrics;
pub mod sequence;
pub mod store;
pub mod validation;

pub use billing::{BillItemRestoration, BillingReconciliation};
pub use bulk_issue::BulkIssueOrchestrator;
pub use database::{Database, PgLedgerTx};
pub use features::{ConfigFeatureToggle, FeatureToggle, RequestContext, ResolvedFeatures};
pub use lifecycle::InvoiceLifecycleEngine;
pub use metrics::{get_metrics, init_metrics};
pub use store::{LedgerStore, LedgerTx};
