// ⚖️ Reconciliation Engine - Match credit report entries to tracked debts
//
// For every credit entry:
//   1. explicit link (matched_debt_id) wins outright
//   2. else the first debt whose name/lender matches heuristically
//   3. else unmatched
//
// Matched pairs whose balances differ by more than DISCREPANCY_TOLERANCE are
// discrepancies. The engine is a pure function of its two inputs: it never
// mutates them and never talks to storage. Link/create requests are returned
// as `Command`s for the caller to forward.

use crate::entities::{CreditEntry, Debt};
use serde::{Deserialize, Serialize};

/// Balance difference (report currency units) above which a match is flagged.
/// A difference of exactly this value is still a match.
pub const DISCREPANCY_TOLERANCE: f64 = 10.0;

// ============================================================================
// MATCH RULES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchRule {
    /// entry.matched_debt_id == debt.id
    ExplicitLink,

    /// debt.name is contained in entry.name (case-insensitive)
    DebtNameInEntry,

    /// entry.name is contained in debt.name (case-insensitive)
    EntryNameInDebt,

    /// Both lenders present and equal (case-insensitive)
    SameLender,
}

impl MatchRule {
    /// Rules in the order they are tried. `ExplicitLink` short-circuits the
    /// rest: an entry carrying a link is never matched heuristically.
    pub const PRECEDENCE: [MatchRule; 4] = [
        MatchRule::ExplicitLink,
        MatchRule::DebtNameInEntry,
        MatchRule::EntryNameInDebt,
        MatchRule::SameLender,
    ];

    /// The slice of `PRECEDENCE` consulted for `entry`
    pub fn candidates(entry: &CreditEntry) -> &'static [MatchRule] {
        if entry.is_linked() {
            &Self::PRECEDENCE[..1]
        } else {
            &Self::PRECEDENCE[1..]
        }
    }

    /// Does this rule pair `entry` with `debt`?
    pub fn applies(&self, entry: &CreditEntry, debt: &Debt) -> bool {
        match self {
            MatchRule::ExplicitLink => entry.matched_debt_id.as_deref() == Some(debt.id.as_str()),
            MatchRule::DebtNameInEntry => contains_ignore_case(&entry.name, &debt.name),
            MatchRule::EntryNameInDebt => contains_ignore_case(&debt.name, &entry.name),
            MatchRule::SameLender => match (&entry.lender, &debt.lender) {
                (Some(a), Some(b)) => a.to_lowercase() == b.to_lowercase(),
                _ => false,
            },
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MatchRule::ExplicitLink => "explicit link",
            MatchRule::DebtNameInEntry => "debt name in entry name",
            MatchRule::EntryNameInDebt => "entry name in debt name",
            MatchRule::SameLender => "same lender",
        }
    }
}

/// `needle` is a case-insensitive substring of `haystack`
fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

// ============================================================================
// COMPARISON RESULT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonStatus {
    /// Matched and balances agree within tolerance
    Matched,

    /// No debt satisfies any rule
    Unmatched,

    /// Matched but balances differ by more than tolerance
    Discrepancy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub credit_entry: CreditEntry,
    pub matched_debt: Option<Debt>,
    pub status: ComparisonStatus,

    /// |entry.balance - debt.balance|, only for discrepancies
    pub balance_diff: Option<f64>,

    /// Which rule produced the match
    pub matched_by: Option<MatchRule>,
}

impl ComparisonResult {
    fn classify(entry: &CreditEntry, found: Option<(&Debt, MatchRule)>) -> Self {
        match found {
            None => ComparisonResult {
                credit_entry: entry.clone(),
                matched_debt: None,
                status: ComparisonStatus::Unmatched,
                balance_diff: None,
                matched_by: None,
            },
            Some((debt, rule)) => {
                let difference = (entry.balance - debt.balance).abs();
                let (status, balance_diff) = if difference > DISCREPANCY_TOLERANCE {
                    (ComparisonStatus::Discrepancy, Some(difference))
                } else {
                    (ComparisonStatus::Matched, None)
                };

                ComparisonResult {
                    credit_entry: entry.clone(),
                    matched_debt: Some(debt.clone()),
                    status,
                    balance_diff,
                    matched_by: Some(rule),
                }
            }
        }
    }

    pub fn is_matched(&self) -> bool {
        self.status == ComparisonStatus::Matched
    }

    pub fn is_unmatched(&self) -> bool {
        self.status == ComparisonStatus::Unmatched
    }

    pub fn is_discrepancy(&self) -> bool {
        self.status == ComparisonStatus::Discrepancy
    }
}

// ============================================================================
// COMMANDS (requested upward, never executed here)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    /// Persist an explicit match between a credit entry and a debt
    LinkDebt { entry_id: String, debt_id: String },

    /// Materialize an unmatched credit entry as a new debt
    AddToDebts { entry_id: String },
}

// ============================================================================
// RECONCILIATION
// ============================================================================

/// Find the debt an entry pairs with, and by which rule.
///
/// Debt order is the tie-break: each debt is tried against every candidate
/// rule before the next debt is considered.
pub fn find_match<'a>(entry: &CreditEntry, debts: &'a [Debt]) -> Option<(&'a Debt, MatchRule)> {
    let rules = MatchRule::candidates(entry);

    debts.iter().find_map(|debt| {
        rules
            .iter()
            .find(|rule| rule.applies(entry, debt))
            .map(|rule| (debt, *rule))
    })
}

/// Reconcile credit report entries against tracked debts.
///
/// Returns exactly one result per entry, in entry order.
///
/// Example:
/// ```
/// use debt_ledger::{reconcile, ComparisonStatus, CreditEntry, Debt, DebtType};
///
/// let entries = vec![CreditEntry {
///     id: "c1".to_string(),
///     name: "Barclaycard Platinum".to_string(),
///     lender: Some("Barclays".to_string()),
///     balance: 500.0,
///     matched_debt_id: None,
///     reported_at: None,
/// }];
/// let mut debt = Debt::new("Barclaycard".to_string(), Some("Barclays".to_string()), 480.0, DebtType::CreditCard);
/// debt.id = "d1".to_string();
///
/// let results = reconcile(&entries, &[debt]);
/// assert_eq!(results[0].status, ComparisonStatus::Discrepancy);
/// assert_eq!(results[0].balance_diff, Some(20.0));
/// ```
pub fn reconcile(credit_entries: &[CreditEntry], debts: &[Debt]) -> Vec<ComparisonResult> {
    credit_entries
        .iter()
        .map(|entry| ComparisonResult::classify(entry, find_match(entry, debts)))
        .collect()
}

// ============================================================================
// RECONCILIATION REPORT
// ============================================================================

/// Stable partition of a reconciliation pass, for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub discrepancies: Vec<ComparisonResult>,
    pub unmatched: Vec<ComparisonResult>,
    pub matched: Vec<ComparisonResult>,
}

impl ReconciliationReport {
    /// Partition results; `None` when there is nothing to report, in which
    /// case the report is not shown at all.
    pub fn from_results(results: Vec<ComparisonResult>) -> Option<Self> {
        if results.is_empty() {
            return None;
        }

        let mut report = ReconciliationReport {
            discrepancies: Vec::new(),
            unmatched: Vec::new(),
            matched: Vec::new(),
        };

        for result in results {
            match result.status {
                ComparisonStatus::Discrepancy => report.discrepancies.push(result),
                ComparisonStatus::Unmatched => report.unmatched.push(result),
                ComparisonStatus::Matched => report.matched.push(result),
            }
        }

        Some(report)
    }

    /// Reconcile and partition in one step
    pub fn build(credit_entries: &[CreditEntry], debts: &[Debt]) -> Option<Self> {
        Self::from_results(reconcile(credit_entries, debts))
    }

    pub fn entry_count(&self) -> usize {
        self.discrepancies.len() + self.unmatched.len() + self.matched.len()
    }

    pub fn is_clean(&self) -> bool {
        self.discrepancies.is_empty() && self.unmatched.is_empty()
    }

    /// Sum of absolute balance differences across discrepancies
    pub fn total_balance_diff(&self) -> f64 {
        self.discrepancies
            .iter()
            .filter_map(|r| r.balance_diff)
            .sum()
    }

    /// `AddToDebts` for every unmatched entry, in report order
    pub fn suggested_commands(&self) -> Vec<Command> {
        self.unmatched
            .iter()
            .map(|r| Command::AddToDebts {
                entry_id: r.credit_entry.id.clone(),
            })
            .collect()
    }

    pub fn summary(&self) -> String {
        format!(
            "Credit report: {} entries, {} matched, {} discrepancies (${:.2} total difference), {} unmatched",
            self.entry_count(),
            self.matched.len(),
            self.discrepancies.len(),
            self.total_balance_diff(),
            self.unmatched.len()
        )
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::DebtType;

    fn create_entry(id: &str, name: &str, lender: Option<&str>, balance: f64) -> CreditEntry {
        CreditEntry {
            id: id.to_string(),
            name: name.to_string(),
            lender: lender.map(|l| l.to_string()),
            balance,
            matched_debt_id: None,
            reported_at: None,
        }
    }

    fn create_debt(id: &str, name: &str, lender: Option<&str>, balance: f64) -> Debt {
        let mut debt = Debt::new(
            name.to_string(),
            lender.map(|l| l.to_string()),
            balance,
            DebtType::CreditCard,
        );
        debt.id = id.to_string();
        debt
    }

    #[test]
    fn test_scenario_matched_within_tolerance() {
        let entries = vec![create_entry("c1", "Barclaycard Platinum", Some("Barclays"), 500.0)];
        let debts = vec![create_debt("d1", "Barclaycard", Some("Barclays"), 505.0)];

        let results = reconcile(&entries, &debts);

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].status, ComparisonStatus::Matched);
        assert_eq!(results[0].balance_diff, None);
        assert_eq!(results[0].matched_debt.as_ref().unwrap().id, "d1");
        assert_eq!(results[0].matched_by, Some(MatchRule::DebtNameInEntry));
    }

    #[test]
    fn test_scenario_discrepancy() {
        let entries = vec![create_entry("c1", "Barclaycard Platinum", Some("Barclays"), 500.0)];
        let debts = vec![create_debt("d1", "Barclaycard", Some("Barclays"), 480.0)];

        let results = reconcile(&entries, &debts);

        assert_eq!(results[0].status, ComparisonStatus::Discrepancy);
        assert_eq!(results[0].balance_diff, Some(20.0));
    }

    #[test]
    fn test_scenario_unmatched_without_debts() {
        let entries = vec![create_entry("c2", "Unknown Finance Co", Some("XYZ"), 300.0)];

        let results = reconcile(&entries, &[]);

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].status, ComparisonStatus::Unmatched);
        assert!(results[0].matched_debt.is_none());
        assert_eq!(results[0].balance_diff, None);
        assert_eq!(results[0].matched_by, None);
    }

    #[test]
    fn test_scenario_explicit_link_beats_heuristics() {
        let mut entry = create_entry("c3", "Mystery Account", None, 100.0);
        entry.matched_debt_id = Some("d9".to_string());

        let debts = vec![
            create_debt("d1", "Mystery Account", None, 100.0),
            create_debt("d9", "Completely Different", Some("Other"), 100.005),
        ];

        let results = reconcile(&[entry], &debts);

        assert_eq!(results[0].status, ComparisonStatus::Matched);
        assert_eq!(results[0].matched_debt.as_ref().unwrap().id, "d9");
        assert_eq!(results[0].matched_by, Some(MatchRule::ExplicitLink));
    }

    #[test]
    fn test_scenario_empty_entries_suppresses_report() {
        let debts = vec![create_debt("d1", "Barclaycard", None, 10.0)];

        assert!(reconcile(&[], &debts).is_empty());
        assert!(ReconciliationReport::build(&[], &debts).is_none());
    }

    #[test]
    fn test_dangling_link_is_unmatched() {
        let mut entry = create_entry("c1", "Barclaycard", None, 100.0);
        entry.matched_debt_id = Some("gone".to_string());
        let debts = vec![create_debt("d1", "Barclaycard", None, 100.0)];

        let results = reconcile(&[entry], &debts);

        assert_eq!(results[0].status, ComparisonStatus::Unmatched);
    }

    #[test]
    fn test_tolerance_boundary() {
        let debts = vec![create_debt("d1", "Loan", None, 100.0)];

        let exact = reconcile(&[create_entry("c1", "Loan", None, 110.0)], &debts);
        assert_eq!(exact[0].status, ComparisonStatus::Matched);
        assert_eq!(exact[0].balance_diff, None);

        let over = reconcile(&[create_entry("c1", "Loan", None, 110.01)], &debts);
        assert_eq!(over[0].status, ComparisonStatus::Discrepancy);
        assert!((over[0].balance_diff.unwrap() - 10.01).abs() < 1e-9);

        let under = reconcile(&[create_entry("c1", "Loan", None, 90.0)], &debts);
        assert_eq!(under[0].status, ComparisonStatus::Matched);
    }

    #[test]
    fn test_first_debt_wins_tie() {
        let entries = vec![create_entry("c1", "HSBC Credit Card", Some("HSBC"), 50.0)];
        let debts = vec![
            create_debt("d1", "Something Else", Some("hsbc"), 50.0),
            create_debt("d2", "HSBC Credit Card", Some("HSBC"), 50.0),
        ];

        let results = reconcile(&entries, &debts);

        // d1 only matches on lender, but it comes first
        assert_eq!(results[0].matched_debt.as_ref().unwrap().id, "d1");
        assert_eq!(results[0].matched_by, Some(MatchRule::SameLender));
    }

    #[test]
    fn test_entry_name_in_debt_name() {
        let entries = vec![create_entry("c1", "amex", None, 0.0)];
        let debts = vec![create_debt("d1", "AMEX Gold Card", None, 0.0)];

        let results = reconcile(&entries, &debts);

        assert_eq!(results[0].matched_by, Some(MatchRule::EntryNameInDebt));
    }

    #[test]
    fn test_missing_lender_does_not_match() {
        let entries = vec![create_entry("c1", "Card A", None, 10.0)];
        let debts = vec![create_debt("d1", "Card B", None, 10.0)];

        let results = reconcile(&entries, &debts);

        assert_eq!(results[0].status, ComparisonStatus::Unmatched);
    }

    #[test]
    fn test_empty_debt_name_is_substring_of_any_entry() {
        let entries = vec![create_entry("c1", "Halifax Loan", None, 10.0)];
        let debts = vec![
            create_debt("d1", "", None, 10.0),
            create_debt("d2", "Halifax Loan", None, 10.0),
        ];

        let results = reconcile(&entries, &debts);

        assert_eq!(results[0].status, ComparisonStatus::Matched);
        assert_eq!(results[0].matched_debt.as_ref().unwrap().id, "d1");
        assert_eq!(results[0].matched_by, Some(MatchRule::DebtNameInEntry));
    }

    #[test]
    fn test_order_preserved_and_idempotent() {
        let entries = vec![
            create_entry("c1", "Unknown", None, 1.0),
            create_entry("c2", "Barclaycard", None, 500.0),
            create_entry("c3", "Loan", None, 900.0),
        ];
        let debts = vec![
            create_debt("d1", "Barclaycard", None, 500.0),
            create_debt("d2", "Loan", None, 1000.0),
        ];

        let first = reconcile(&entries, &debts);
        let second = reconcile(&entries, &debts);

        assert_eq!(first, second);
        let ids: Vec<&str> = first.iter().map(|r| r.credit_entry.id.as_str()).collect();
        assert_eq!(ids, vec!["c1", "c2", "c3"]);
    }

    #[test]
    fn test_report_partition_and_commands() {
        let entries = vec![
            create_entry("c1", "Unknown A", None, 1.0),
            create_entry("c2", "Barclaycard", None, 500.0),
            create_entry("c3", "Loan", None, 900.0),
            create_entry("c4", "Unknown B", None, 2.0),
        ];
        let debts = vec![
            create_debt("d1", "Barclaycard", None, 500.0),
            create_debt("d2", "Loan", None, 1000.0),
        ];

        let report = ReconciliationReport::build(&entries, &debts).unwrap();

        assert_eq!(report.entry_count(), 4);
        assert_eq!(report.matched.len(), 1);
        assert_eq!(report.discrepancies.len(), 1);
        assert_eq!(report.total_balance_diff(), 100.0);
        assert!(!report.is_clean());

        let unmatched: Vec<&str> = report
            .unmatched
            .iter()
            .map(|r| r.credit_entry.id.as_str())
            .collect();
        assert_eq!(unmatched, vec!["c1", "c4"]);

        assert_eq!(
            report.suggested_commands(),
            vec![
                Command::AddToDebts { entry_id: "c1".to_string() },
                Command::AddToDebts { entry_id: "c4".to_string() },
            ]
        );
        assert!(report.summary().contains("4 entries"));
    }

    #[test]
    fn test_candidate_rules_follow_precedence() {
        let unlinked = create_entry("c1", "Card", None, 1.0);
        let mut linked = unlinked.clone();
        linked.matched_debt_id = Some("d9".to_string());

        assert_eq!(MatchRule::candidates(&linked), &[MatchRule::ExplicitLink]);
        assert_eq!(
            MatchRule::candidates(&unlinked),
            &[
                MatchRule::DebtNameInEntry,
                MatchRule::EntryNameInDebt,
                MatchRule::SameLender,
            ]
        );
    }

    #[test]
    fn test_inputs_not_mutated() {
        let entries = vec![create_entry("c1", "Barclaycard", None, 500.0)];
        let debts = vec![create_debt("d1", "Barclaycard", None, 400.0)];
        let entries_before = entries.clone();
        let debts_before = debts.clone();

        let _ = reconcile(&entries, &debts);

        assert_eq!(entries, entries_before);
        assert_eq!(debts, debts_before);
    }
}
