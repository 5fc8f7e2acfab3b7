// 📊 Debt Summary - Totals across all tracked debts

use crate::entities::debt::round_cents;
use crate::entities::{Debt, DebtType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebtSummary {
    pub debt_count: usize,
    pub total_balance: f64,

    /// Sum of resolved minimum payments (debts without one count as 0)
    pub total_minimum_payment: f64,

    /// Balance-weighted standard APR over debts with an APR and a positive balance
    pub weighted_average_apr: Option<f64>,

    pub highest_apr_debt_id: Option<String>,
    pub balance_by_type: BTreeMap<DebtType, f64>,
}

impl DebtSummary {
    pub fn from_debts(debts: &[Debt]) -> Self {
        let total_balance: f64 = debts.iter().map(|d| d.balance).sum();

        let total_minimum_payment: f64 = debts
            .iter()
            .filter_map(|d| d.minimum_payment_amount())
            .sum();

        let mut weighted_sum = 0.0;
        let mut weight = 0.0;
        for debt in debts.iter().filter(|d| d.is_outstanding()) {
            if let Some(apr) = debt.apr {
                weighted_sum += apr * debt.balance;
                weight += debt.balance;
            }
        }
        let weighted_average_apr = if weight > 0.0 {
            Some(round_cents(weighted_sum / weight))
        } else {
            None
        };

        // First debt wins on equal APR
        let mut highest: Option<&Debt> = None;
        for debt in debts.iter().filter(|d| d.apr.is_some()) {
            match highest {
                Some(h) if h.apr >= debt.apr => {}
                _ => highest = Some(debt),
            }
        }

        let mut balance_by_type = BTreeMap::new();
        for debt in debts {
            *balance_by_type.entry(debt.debt_type).or_insert(0.0) += debt.balance;
        }

        DebtSummary {
            debt_count: debts.len(),
            total_balance: round_cents(total_balance),
            total_minimum_payment: round_cents(total_minimum_payment),
            weighted_average_apr,
            highest_apr_debt_id: highest.map(|d| d.id.clone()),
            balance_by_type,
        }
    }

    pub fn summary(&self) -> String {
        let apr = self
            .weighted_average_apr
            .map(|a| format!("{:.2}%", a))
            .unwrap_or_else(|| "n/a".to_string());
        format!(
            "{} debts, total ${:.2}, minimum payments ${:.2}/month, average APR {}",
            self.debt_count, self.total_balance, self.total_minimum_payment, apr
        )
    }
}

// ============================================================================
// TESTS
// ============================================================================
