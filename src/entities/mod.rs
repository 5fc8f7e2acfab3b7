// Entity Models
//
// Debts are owned by the ledger; credit entries arrive from an external
// credit report and are only ever linked, never edited.

pub mod debt;
pub mod credit_entry;

pub use debt::{Debt, DebtType, MinimumPayment};
pub use credit_entry::{CreditEntry, load_credit_report, parse_credit_report};
