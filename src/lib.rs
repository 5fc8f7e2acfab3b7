// Debt Ledger - Core Library
// Exposes all modules for use in CLI, API server, and tests

pub mod config;
pub mod db;
pub mod entities;
pub mod reconciliation; // Credit report ↔ debt matching
pub mod alerts;         // Promo / APR / payment alerts
pub mod summary;        // Debt totals

// Re-export commonly used types
pub use config::{AlertSettings, Config};
pub use db::{
    Event, ImportSummary,
    setup_database, insert_debt, get_all_debts, get_debt,
    insert_credit_entries, get_all_credit_entries, get_credit_entry,
    link_debt, add_to_debts, apply_command,
    insert_event, get_events_for_entity,
};
pub use entities::{
    CreditEntry, Debt, DebtType, MinimumPayment,
    load_credit_report, parse_credit_report,
};
pub use reconciliation::{
    reconcile, find_match,
    Command, ComparisonResult, ComparisonStatus, MatchRule, ReconciliationReport,
    DISCREPANCY_TOLERANCE,
};
pub use alerts::{Alert, AlertEngine, AlertType, Severity, next_payment_date};
pub use summary::DebtSummary;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
