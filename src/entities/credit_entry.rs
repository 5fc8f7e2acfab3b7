// 📄 Credit Entry - One account line from an external credit report
//
// Entries are immutable once fetched. The only thing that changes about an
// entry over its life is `matched_debt_id`, and that is written by the
// persistence layer when the user links it, never by the reconciler.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditEntry {
    /// Identity assigned by the credit-report provider
    pub id: String,

    /// Account name as the report prints it
    pub name: String,

    #[serde(default)]
    pub lender: Option<String>,

    /// Reported outstanding balance
    pub balance: f64,

    /// Explicit link to a tracked debt (set by the user)
    #[serde(default)]
    pub matched_debt_id: Option<String>,

    /// Date the report was generated
    #[serde(default)]
    pub reported_at: Option<NaiveDate>,
}

impl CreditEntry {
    /// Compute idempotency hash for duplicate detection on re-import.
    ///
    /// Identity = id (provider), Deduplication = hash (content)
    pub fn compute_idempotency_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(format!(
            "{}|{}|{:.2}|{}",
            self.name.trim().to_lowercase(),
            self.lender.as_deref().unwrap_or("").trim().to_lowercase(),
            self.balance,
            self.reported_at.map(|d| d.to_string()).unwrap_or_default()
        ));
        format!("{:x}", hasher.finalize())
    }

    pub fn is_linked(&self) -> bool {
        self.matched_debt_id.is_some()
    }
}

// ============================================================================
// CSV IMPORT
// ============================================================================

/// Load a credit report CSV from disk.
///
/// Expected headers: `id,name,lender,balance,matched_debt_id,reported_at`.
/// The last three columns are optional; empty cells become `None`.
pub fn load_credit_report(csv_path: &Path) -> Result<Vec<CreditEntry>> {
    let file = std::fs::File::open(csv_path)
        .with_context(|| format!("Failed to open credit report {}", csv_path.display()))?;
    parse_credit_report(file)
}

/// Parse credit report rows from any reader
pub fn parse_credit_report<R: Read>(reader: R) -> Result<Vec<CreditEntry>> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut entries = Vec::new();

    for (line, result) in rdr.deserialize().enumerate() {
        let mut entry: CreditEntry = result
            .with_context(|| format!("Failed to deserialize credit entry on row {}", line + 1))?;

        // Blank strings are absent values, not empty lenders
        entry.lender = entry.lender.filter(|l| !l.is_empty());
        entry.matched_debt_id = entry.matched_debt_id.filter(|id| !id.is_empty());

        entries.push(entry);
    }

    log::debug!("Parsed {} credit report rows", entries.len());

    Ok(entries)
}

// ============================================================================
// TESTS
// ============================================================================
