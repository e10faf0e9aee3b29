//! Domain models for invoicemgmt-service.

pub mod action_log;
pub mod adjustment;
pub mod bill_item;
pub mod bulk_payment;
pub mod invoice;
pub mod payment;
pub mod student;

pub use action_log::{ActionLog, InvoiceAction, NewActionLog};
pub use adjustment::{AdjustmentAction, AdjustmentUpsert, InvoiceAdjustment};
pub use bill_item::{BillItem, BillingStatus, InvoiceBillItem};
pub use bulk_payment::{BulkIssueMethod, BulkPayment, BulkPaymentStatus, NewBulkPayment};
pub use invoice::{Invoice, InvoiceStatus, InvoiceType, InvoiceUpdate};
pub use payment::{NewPayment, Payment, PaymentMethod, PaymentStatus, PaymentUpdate};
pub use student::{BankAccount, StudentPaymentDetail};
