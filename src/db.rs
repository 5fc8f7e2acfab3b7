// 🗄️ Persistence - SQLite store for debts and credit report entries
//
// Supplies snapshots to the pure reconciler / alert engine and executes the
// commands they request (link, add-to-debts). Every write appends an Event
// to the audit trail.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::entities::{CreditEntry, Debt, DebtType, MinimumPayment};
use crate::reconciliation::Command;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Event for audit trail ("every change is an event")
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(
        event_type: &str,
        entity_type: &str,
        entity_id: &str,
        data: serde_json::Value,
        actor: &str,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: actor.to_string(),
        }
    }
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery (in-memory databases report "memory")
    conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;

    // ==========================================================================
    // Debts Table
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS debts (
            row_id INTEGER PRIMARY KEY AUTOINCREMENT,
            debt_id TEXT UNIQUE NOT NULL,
            name TEXT NOT NULL,
            lender TEXT,
            balance REAL NOT NULL,
            debt_type TEXT NOT NULL,
            apr REAL,
            promo_apr REAL,
            promo_end_date TEXT,
            min_payment_kind TEXT,
            min_payment_value REAL,
            payment_day INTEGER,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Credit Entries Table (imported credit report rows)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS credit_entries (
            row_id INTEGER PRIMARY KEY AUTOINCREMENT,
            entry_id TEXT UNIQUE NOT NULL,
            idempotency_hash TEXT NOT NULL,
            name TEXT NOT NULL,
            lender TEXT,
            balance REAL NOT NULL,
            matched_debt_id TEXT,
            reported_at TEXT,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Events Table (audit trail)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_credit_matched ON credit_entries(matched_debt_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// ROW CONVERSION
// ============================================================================

fn parse_date_column(idx: usize, value: Option<String>) -> rusqlite::Result<Option<NaiveDate>> {
    value
        .map(|s| {
            NaiveDate::parse_from_str(&s, DATE_FORMAT)
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
        })
        .transpose()
}

fn min_payment_columns(mp: Option<MinimumPayment>) -> (Option<&'static str>, Option<f64>) {
    match mp {
        Some(MinimumPayment::Fixed(v)) => (Some("fixed"), Some(v)),
        Some(MinimumPayment::Percent(v)) => (Some("percent"), Some(v)),
        None => (None, None),
    }
}

const DEBT_COLUMNS: &str = "debt_id, name, lender, balance, debt_type, apr, promo_apr,
    promo_end_date, min_payment_kind, min_payment_value, payment_day";

fn debt_from_row(row: &Row) -> rusqlite::Result<Debt> {
    let debt_type: String = row.get(4)?;
    let kind: Option<String> = row.get(8)?;
    let value: Option<f64> = row.get(9)?;

    let minimum_payment = match (kind.as_deref(), value) {
        (Some("fixed"), Some(v)) => Some(MinimumPayment::Fixed(v)),
        (Some("percent"), Some(v)) => Some(MinimumPayment::Percent(v)),
        _ => None,
    };

    Ok(Debt {
        id: row.get(0)?,
        name: row.get(1)?,
        lender: row.get(2)?,
        balance: row.get(3)?,
        debt_type: DebtType::parse(&debt_type),
        apr: row.get(5)?,
        promo_apr: row.get(6)?,
        promo_end_date: parse_date_column(7, row.get(7)?)?,
        minimum_payment,
        payment_day: row.get(10)?,
    })
}

const CREDIT_ENTRY_COLUMNS: &str = "entry_id, name, lender, balance, matched_debt_id, reported_at";

fn credit_entry_from_row(row: &Row) -> rusqlite::Result<CreditEntry> {
    Ok(CreditEntry {
        id: row.get(0)?,
        name: row.get(1)?,
        lender: row.get(2)?,
        balance: row.get(3)?,
        matched_debt_id: row.get(4)?,
        reported_at: parse_date_column(5, row.get(5)?)?,
    })
}

// ============================================================================
// DEBTS
// ============================================================================

pub fn insert_debt(conn: &Connection, debt: &Debt) -> Result<()> {
    if debt.name.trim().is_empty() {
        bail!("Debt name must not be blank ({})", debt.id);
    }

    let (kind, value) = min_payment_columns(debt.minimum_payment);

    conn.execute(
        "INSERT INTO debts (
            debt_id, name, lender, balance, debt_type, apr, promo_apr,
            promo_end_date, min_payment_kind, min_payment_value, payment_day
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            debt.id,
            debt.name,
            debt.lender,
            debt.balance,
            debt.debt_type.as_str(),
            debt.apr,
            debt.promo_apr,
            debt.promo_end_date.map(|d| d.format(DATE_FORMAT).to_string()),
            kind,
            value,
            debt.payment_day,
        ],
    )
    .with_context(|| format!("Failed to insert debt {}", debt.id))?;

    let event = Event::new(
        "debt_added",
        "debt",
        &debt.id,
        serde_json::json!({
            "name": debt.name,
            "balance": debt.balance,
            "type": debt.debt_type.as_str(),
        }),
        "ledger",
    );
    insert_event(conn, &event)?;

    log::info!("Added debt {} ({})", debt.id, debt.name);

    Ok(())
}

/// All debts in insertion order (the reconciler's tie-break order)
pub fn get_all_debts(conn: &Connection) -> Result<Vec<Debt>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM debts ORDER BY row_id",
        DEBT_COLUMNS
    ))?;

    let debts = stmt
        .query_map([], debt_from_row)?
        .collect::<Result<Vec<_>, _>>()
        .context("Failed to read debts")?;

    Ok(debts)
}

pub fn get_debt(conn: &Connection, debt_id: &str) -> Result<Option<Debt>> {
    let debt = conn
        .query_row(
            &format!("SELECT {} FROM debts WHERE debt_id = ?1", DEBT_COLUMNS),
            params![debt_id],
            debt_from_row,
        )
        .optional()
        .with_context(|| format!("Failed to read debt {}", debt_id))?;

    Ok(debt)
}

// ============================================================================
// CREDIT ENTRIES
// ============================================================================

/// Outcome of importing one credit report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
}

impl ImportSummary {
    pub fn total(&self) -> usize {
        self.inserted + self.updated + self.unchanged
    }
}

/// Import credit report entries keyed by provider id.
///
/// A new id is inserted. A known id with the same content hash is left alone.
/// A known id with new content (e.g. a later balance) is refreshed in place
/// and keeps its `matched_debt_id`. Distinct ids are never merged, even when
/// their content is identical.
pub fn insert_credit_entries(conn: &Connection, entries: &[CreditEntry]) -> Result<ImportSummary> {
    let mut summary = ImportSummary::default();

    for entry in entries {
        let hash = entry.compute_idempotency_hash();
        let reported_at = entry.reported_at.map(|d| d.format(DATE_FORMAT).to_string());

        let stored_hash: Option<String> = conn
            .query_row(
                "SELECT idempotency_hash FROM credit_entries WHERE entry_id = ?1",
                params![entry.id],
                |row| row.get(0),
            )
            .optional()
            .with_context(|| format!("Failed to read credit entry {}", entry.id))?;

        match stored_hash {
            None => {
                conn.execute(
                    "INSERT INTO credit_entries (
                        entry_id, idempotency_hash, name, lender, balance, matched_debt_id, reported_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        entry.id,
                        hash,
                        entry.name,
                        entry.lender,
                        entry.balance,
                        entry.matched_debt_id,
                        reported_at,
                    ],
                )
                .with_context(|| format!("Failed to insert credit entry {}", entry.id))?;
                summary.inserted += 1;

                let event = Event::new(
                    "credit_entry_imported",
                    "credit_entry",
                    &entry.id,
                    serde_json::json!({
                        "name": entry.name,
                        "balance": entry.balance,
                        "hash": hash,
                    }),
                    "credit_report_importer",
                );
                insert_event(conn, &event)?;
            }
            Some(stored) if stored == hash => {
                log::debug!("Credit entry {} unchanged", entry.id);
                summary.unchanged += 1;
            }
            Some(_) => {
                conn.execute(
                    "UPDATE credit_entries
                     SET idempotency_hash = ?2, name = ?3, lender = ?4, balance = ?5,
                         reported_at = ?6, matched_debt_id = COALESCE(matched_debt_id, ?7)
                     WHERE entry_id = ?1",
                    params![
                        entry.id,
                        hash,
                        entry.name,
                        entry.lender,
                        entry.balance,
                        reported_at,
                        entry.matched_debt_id,
                    ],
                )
                .with_context(|| format!("Failed to update credit entry {}", entry.id))?;
                summary.updated += 1;

                let event = Event::new(
                    "credit_entry_updated",
                    "credit_entry",
                    &entry.id,
                    serde_json::json!({
                        "name": entry.name,
                        "balance": entry.balance,
                        "hash": hash,
                    }),
                    "credit_report_importer",
                );
                insert_event(conn, &event)?;
            }
        }
    }

    log::info!(
        "Imported {} credit entries, updated {}, unchanged {}",
        summary.inserted,
        summary.updated,
        summary.unchanged
    );

    Ok(summary)
}

/// All credit entries in import order
pub fn get_all_credit_entries(conn: &Connection) -> Result<Vec<CreditEntry>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM credit_entries ORDER BY row_id",
        CREDIT_ENTRY_COLUMNS
    ))?;

    let entries = stmt
        .query_map([], credit_entry_from_row)?
        .collect::<Result<Vec<_>, _>>()
        .context("Failed to read credit entries")?;

    Ok(entries)
}

pub fn get_credit_entry(conn: &Connection, entry_id: &str) -> Result<Option<CreditEntry>> {
    let entry = conn
        .query_row(
            &format!(
                "SELECT {} FROM credit_entries WHERE entry_id = ?1",
                CREDIT_ENTRY_COLUMNS
            ),
            params![entry_id],
            credit_entry_from_row,
        )
        .optional()
        .with_context(|| format!("Failed to read credit entry {}", entry_id))?;

    Ok(entry)
}

// ============================================================================
// COMMANDS
// ============================================================================

/// Persist an explicit match between a credit entry and a debt
pub fn link_debt(conn: &Connection, entry_id: &str, debt_id: &str) -> Result<()> {
    if get_debt(conn, debt_id)?.is_none() {
        bail!("Debt not found: {}", debt_id);
    }

    let updated = conn.execute(
        "UPDATE credit_entries SET matched_debt_id = ?1 WHERE entry_id = ?2",
        params![debt_id, entry_id],
    )?;
    if updated == 0 {
        bail!("Credit entry not found: {}", entry_id);
    }

    let event = Event::new(
        "credit_entry_linked",
        "credit_entry",
        entry_id,
        serde_json::json!({ "debt_id": debt_id }),
        "ledger",
    );
    insert_event(conn, &event)?;

    log::info!("Linked credit entry {} to debt {}", entry_id, debt_id);

    Ok(())
}

/// Create a debt from a credit entry and link the entry to it
pub fn add_to_debts(conn: &Connection, entry_id: &str) -> Result<Debt> {
    let entry = get_credit_entry(conn, entry_id)?
        .with_context(|| format!("Credit entry not found: {}", entry_id))?;

    let debt = Debt::from_credit_entry(&entry);

    let tx = conn.unchecked_transaction()?;
    insert_debt(&tx, &debt)?;
    link_debt(&tx, &entry.id, &debt.id)?;
    tx.commit()?;

    Ok(debt)
}

/// Execute a command requested by the reconciliation report
pub fn apply_command(conn: &Connection, command: &Command) -> Result<()> {
    match command {
        Command::LinkDebt { entry_id, debt_id } => link_debt(conn, entry_id, debt_id),
        Command::AddToDebts { entry_id } => add_to_debts(conn, entry_id).map(|_| ()),
    }
}

// ============================================================================
// AUDIT TRAIL
// ============================================================================

/// Insert event into audit trail
pub fn insert_event(conn: &Connection, event: &Event) -> Result<()> {
    let data_json = serde_json::to_string(&event.data)?;

    conn.execute(
        "INSERT INTO events (
            event_id, timestamp, event_type, entity_type, entity_id, data, actor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.event_id,
            event.timestamp.to_rfc3339(),
            event.event_type,
            event.entity_type,
            event.entity_id,
            data_json,
            event.actor,
        ],
    )?;

    Ok(())
}

/// Get events for a specific entity, oldest first
pub fn get_events_for_entity(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
) -> Result<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
         FROM events
         WHERE entity_type = ?1 AND entity_id = ?2
         ORDER BY id",
    )?;

    let events = stmt
        .query_map(params![entity_type, entity_id], |row| {
            let timestamp_str: String = row.get(1)?;
            let data_json: String = row.get(5)?;

            Ok(Event {
                event_id: row.get(0)?,
                timestamp: DateTime::parse_from_rfc3339(&timestamp_str)
                    .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e)))?
                    .with_timezone(&Utc),
                event_type: row.get(2)?,
                entity_type: row.get(3)?,
                entity_id: row.get(4)?,
                data: serde_json::from_str(&data_json)
                    .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e)))?,
                actor: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(events)
}

// ============================================================================
// TESTS
// ============================================================================
