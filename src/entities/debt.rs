// 💳 Debt Entity - A liability tracked inside the ledger
//
// "Debt id is IDENTITY (never changes), balance/APR/promo are VALUES"
//
// The reconciler only reads debts. Alerts and summaries read the optional
// rate and payment fields; a debt without them is still a valid debt.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::credit_entry::CreditEntry;

// ============================================================================
// DEBT TYPE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebtType {
    /// Revolving credit card balance
    CreditCard,

    /// Personal / car loan with fixed term
    Loan,

    /// Secured mortgage
    Mortgage,

    /// Arranged overdraft on a current account
    Overdraft,

    /// Buy-now-pay-later plan
    Bnpl,

    /// Retailer store card
    StoreCard,

    /// Other / Unknown
    Other,
}

impl DebtType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DebtType::CreditCard => "credit_card",
            DebtType::Loan => "loan",
            DebtType::Mortgage => "mortgage",
            DebtType::Overdraft => "overdraft",
            DebtType::Bnpl => "bnpl",
            DebtType::StoreCard => "store_card",
            DebtType::Other => "other",
        }
    }

    /// Parse from a stored or user-supplied string.
    ///
    /// Case-insensitive; `-` and spaces are accepted in place of `_`.
    /// Anything unrecognised is `Other` rather than an error.
    pub fn parse(value: &str) -> Self {
        let normalized = value.trim().to_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "credit_card" | "creditcard" | "card" => DebtType::CreditCard,
            "loan" | "personal_loan" => DebtType::Loan,
            "mortgage" => DebtType::Mortgage,
            "overdraft" => DebtType::Overdraft,
            "bnpl" | "buy_now_pay_later" => DebtType::Bnpl,
            "store_card" | "storecard" => DebtType::StoreCard,
            _ => DebtType::Other,
        }
    }
}

impl Default for DebtType {
    fn default() -> Self {
        DebtType::Other
    }
}

impl std::fmt::Display for DebtType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// MINIMUM PAYMENT
// ============================================================================

/// Minimum monthly payment, either a fixed amount or a percentage of balance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum MinimumPayment {
    Fixed(f64),
    Percent(f64),
}

impl MinimumPayment {
    /// Resolve to a currency amount for the given balance.
    ///
    /// Percentages convert as `balance * pct / 100`, rounded to cents.
    /// Negative inputs resolve to zero.
    pub fn amount_for(&self, balance: f64) -> f64 {
        let raw = match *self {
            MinimumPayment::Fixed(amount) => amount,
            MinimumPayment::Percent(pct) => balance.max(0.0) * pct / 100.0,
        };
        round_cents(raw.max(0.0))
    }
}

pub(crate) fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// ============================================================================
// DEBT ENTITY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Debt {
    /// Stable identity (UUID for debts created here, any string for imports)
    pub id: String,

    /// Display name, e.g. "Barclaycard Platinum"
    pub name: String,

    /// Lender / issuer, e.g. "Barclays"
    #[serde(default)]
    pub lender: Option<String>,

    /// Outstanding balance in the account's currency
    pub balance: f64,

    #[serde(rename = "type", default)]
    pub debt_type: DebtType,

    /// Standard APR in percent (e.g. 24.9)
    #[serde(default)]
    pub apr: Option<f64>,

    /// Promotional APR in percent while the promo lasts
    #[serde(default)]
    pub promo_apr: Option<f64>,

    #[serde(default)]
    pub promo_end_date: Option<NaiveDate>,

    #[serde(default)]
    pub minimum_payment: Option<MinimumPayment>,

    /// Day of month the payment is due (1-31)
    #[serde(default)]
    pub payment_day: Option<u32>,
}

impl Debt {
    /// Create new debt with a fresh UUID and no rate/payment details
    pub fn new(name: String, lender: Option<String>, balance: f64, debt_type: DebtType) -> Self {
        Debt {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            lender,
            balance,
            debt_type,
            apr: None,
            promo_apr: None,
            promo_end_date: None,
            minimum_payment: None,
            payment_day: None,
        }
    }

    /// Materialize an unmatched credit-report entry as a tracked debt.
    pub fn from_credit_entry(entry: &CreditEntry) -> Self {
        Debt::new(
            entry.name.clone(),
            entry.lender.clone(),
            entry.balance,
            DebtType::Other,
        )
    }

    /// Resolved minimum payment, if one is configured
    pub fn minimum_payment_amount(&self) -> Option<f64> {
        self.minimum_payment.map(|mp| mp.amount_for(self.balance))
    }

    /// APR currently charged: promo rate while the promo is live, else standard.
    pub fn effective_apr(&self, today: NaiveDate) -> Option<f64> {
        match (self.promo_apr, self.promo_end_date) {
            (Some(promo), Some(end)) if end >= today => Some(promo),
            (Some(promo), None) => Some(promo),
            _ => self.apr,
        }
    }

    pub fn is_outstanding(&self) -> bool {
        self.balance > 0.0
    }
}

// ============================================================================
// TESTS
// ============================================================================
