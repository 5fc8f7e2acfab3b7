// 🚨 Alert Engine - Flag debts that need attention
//
// Pure derivation over the debt list and a reference date:
//   - promotional rate already ended   → Critical
//   - promotional rate ending soon     → Warning
//   - effective APR at/above threshold → Warning
//   - payment due within N days        → Info
//
// Same inputs + same `today` ⇒ same alerts, in the same order.

use crate::config::AlertSettings;
use crate::entities::Debt;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

// ============================================================================
// ALERT TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    PromoExpiring,
    PromoExpired,
    HighApr,
    UpcomingPayment,
}

/// Ordered most to least urgent
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    Warning,
    Info,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    pub title: String,
    pub description: String,
    pub severity: Severity,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub debt_id: Option<String>,
}

// ============================================================================
// ALERT ENGINE
// ============================================================================

pub struct AlertEngine {
    pub settings: AlertSettings,
}

impl AlertEngine {
    pub fn new() -> Self {
        AlertEngine {
            settings: AlertSettings::default(),
        }
    }

    pub fn with_settings(settings: AlertSettings) -> Self {
        AlertEngine { settings }
    }

    /// Derive alerts for `debts` as of `today`.
    ///
    /// Sorted by severity; ties keep debt order, then rule order.
    pub fn derive(&self, debts: &[Debt], today: NaiveDate) -> Vec<Alert> {
        let mut alerts: Vec<Alert> = debts
            .iter()
            .filter(|debt| debt.is_outstanding())
            .flat_map(|debt| {
                [
                    self.check_promo(debt, today),
                    self.check_high_apr(debt, today),
                    self.check_upcoming_payment(debt, today),
                ]
            })
            .flatten()
            .collect();

        alerts.sort_by_key(|alert| alert.severity);
        alerts
    }

    fn check_promo(&self, debt: &Debt, today: NaiveDate) -> Option<Alert> {
        let end = debt.promo_end_date?;
        let days_left = (end - today).num_days();

        if days_left < 0 {
            let revert = debt
                .apr
                .map(|apr| format!(" and reverted to {:.1}% APR", apr))
                .unwrap_or_default();
            return Some(Alert {
                alert_type: AlertType::PromoExpired,
                title: format!("{}: promotional rate ended", debt.name),
                description: format!(
                    "Promotional rate ended on {}{}. Balance: ${:.2}",
                    end, revert, debt.balance
                ),
                severity: Severity::Critical,
                debt_id: Some(debt.id.clone()),
            });
        }

        if days_left <= self.settings.promo_warning_days {
            return Some(Alert {
                alert_type: AlertType::PromoExpiring,
                title: format!("{}: promotional rate ending", debt.name),
                description: format!(
                    "Promotional rate ends on {} ({} days). Balance: ${:.2}",
                    end, days_left, debt.balance
                ),
                severity: Severity::Warning,
                debt_id: Some(debt.id.clone()),
            });
        }

        None
    }

    fn check_high_apr(&self, debt: &Debt, today: NaiveDate) -> Option<Alert> {
        let apr = debt.effective_apr(today)?;
        if apr < self.settings.high_apr_threshold {
            return None;
        }

        Some(Alert {
            alert_type: AlertType::HighApr,
            title: format!("{}: high interest rate", debt.name),
            description: format!(
                "{:.1}% APR on ${:.2}. Consider paying this down first or moving the balance.",
                apr, debt.balance
            ),
            severity: Severity::Warning,
            debt_id: Some(debt.id.clone()),
        })
    }

    fn check_upcoming_payment(&self, debt: &Debt, today: NaiveDate) -> Option<Alert> {
        let due = next_payment_date(debt.payment_day?, today)?;
        let days_until = (due - today).num_days();
        if days_until > self.settings.upcoming_payment_days {
            return None;
        }

        let amount = debt
            .minimum_payment_amount()
            .map(|a| format!(" Minimum payment: ${:.2}.", a))
            .unwrap_or_default();
        let when = match days_until {
            0 => "today".to_string(),
            1 => "tomorrow".to_string(),
            n => format!("in {} days", n),
        };

        Some(Alert {
            alert_type: AlertType::UpcomingPayment,
            title: format!("{}: payment due {}", debt.name, when),
            description: format!("Payment due on {}.{}", due, amount),
            severity: Severity::Info,
            debt_id: Some(debt.id.clone()),
        })
    }
}

impl Default for AlertEngine {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// DATE HELPERS
// ============================================================================

fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)?.pred_opt()
}

/// `payment_day` in the given month, clamped to the month's last day
fn due_date_in_month(year: i32, month: u32, payment_day: u32) -> Option<NaiveDate> {
    let last = last_day_of_month(year, month)?;
    NaiveDate::from_ymd_opt(year, month, payment_day.min(last.day()))
}

/// Next due date on or after `today`. `None` for a day outside 1-31.
pub fn next_payment_date(payment_day: u32, today: NaiveDate) -> Option<NaiveDate> {
    if !(1..=31).contains(&payment_day) {
        return None;
    }

    let this_month = due_date_in_month(today.year(), today.month(), payment_day)?;
    if this_month >= today {
        return Some(this_month);
    }

    let (year, month) = if today.month() == 12 {
        (today.year() + 1, 1)
    } else {
        (today.year(), today.month() + 1)
    };
    due_date_in_month(year, month, payment_day)
}

// ============================================================================
// TESTS
// ============================================================================
