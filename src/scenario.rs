// SQLite persistence for named trade scenarios.

use std::sync::{Mutex, MutexGuard};

use anyhow::{bail, Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::trade::simulator::{TradeProposal, TradeVerdict};

/// A saved what-if trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub signature: String,
    pub proposal: TradeProposal,
    pub verdict: TradeVerdict,
    /// Scoring-policy fingerprint the verdict was computed under, if known.
    pub scoring_hash: Option<String>,
    /// RFC 3339 UTC timestamp of the last save.
    pub saved_at: String,
}

/// Keep alphanumerics, `_`, `-` and spaces; an empty result becomes
/// `scenario`.
pub fn sanitize_name(name: &str) -> String {
    let safe: String = name
        .trim()
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | ' '))
        .collect();
    let safe = safe.trim();
    if safe.is_empty() {
        "scenario".to_string()
    } else {
        safe.to_string()
    }
}

/// SQLite-backed scenario store.
pub struct ScenarioStore {
    conn: Mutex<Connection>,
}

impl ScenarioStore {
    /// Open (or create) the store at `path`. Pass `":memory:"` for an
    /// ephemeral store (useful for tests).
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open scenario store at {path}"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;",
        )
        .context("failed to set database pragmas")?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS scenarios (
                name      TEXT PRIMARY KEY,
                signature TEXT NOT NULL,
                proposal  TEXT NOT NULL,
                verdict   TEXT NOT NULL,
                saved_at  TEXT NOT NULL,
                scoring_hash TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_scenarios_signature ON scenarios(signature);
            ",
        )
        .context("failed to create scenario schema")?;

        // Stores created before scoring hashes were recorded lack the column.
        conn.execute_batch("ALTER TABLE scenarios ADD COLUMN scoring_hash TEXT;")
            .ok(); // fails with "duplicate column name" once it exists

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Panics if the mutex is poisoned (another thread panicked while holding
    /// the lock).
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("scenario store mutex poisoned")
    }

    /// Save (or overwrite) a scenario. Returns the sanitized name it was
    /// stored under.
    pub fn save(&self, name: &str, proposal: &TradeProposal, verdict: &TradeVerdict) -> Result<String> {
        let name = sanitize_name(name);
        let proposal_json =
            serde_json::to_string(proposal).context("failed to serialize proposal")?;
        let verdict_json = serde_json::to_string(verdict).context("failed to serialize verdict")?;
        let saved_at = chrono::Utc::now().to_rfc3339();

        self.conn()
            .execute(
                "INSERT INTO scenarios (name, signature, proposal, verdict, saved_at, scoring_hash)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(name) DO UPDATE SET
                    signature    = excluded.signature,
                    proposal     = excluded.proposal,
                    verdict      = excluded.verdict,
                    saved_at     = excluded.saved_at,
                    scoring_hash = excluded.scoring_hash",
                params![
                    name,
                    proposal.signature(),
                    proposal_json,
                    verdict_json,
                    saved_at,
                    verdict.scoring_hash
                ],
            )
            .context("failed to save scenario")?;

        info!("saved scenario '{}'", name);
        Ok(name)
    }

    /// Load a scenario by name. Returns `None` if it does not exist.
    pub fn load(&self, name: &str) -> Result<Option<Scenario>> {
        let name = sanitize_name(name);
        let row = self
            .conn()
            .query_row(
                "SELECT name, signature, proposal, verdict, saved_at, scoring_hash
                 FROM scenarios WHERE name = ?1",
                params![name],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, Option<String>>(5)?,
                    ))
                },
            )
            .optional()
            .context("failed to load scenario")?;

        let Some((name, signature, proposal, verdict, saved_at, scoring_hash)) = row else {
            return Ok(None);
        };
        Ok(Some(Scenario {
            proposal: serde_json::from_str(&proposal)
                .with_context(|| format!("corrupt proposal in scenario '{name}'"))?,
            verdict: serde_json::from_str(&verdict)
                .with_context(|| format!("corrupt verdict in scenario '{name}'"))?,
            name,
            signature,
            scoring_hash,
            saved_at,
        }))
    }

    /// All scenario names, sorted.
    pub fn list(&self) -> Result<Vec<String>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT name FROM scenarios ORDER BY name")
            .context("failed to prepare list query")?;
        let names = stmt
            .query_map([], |row| row.get(0))
            .context("failed to list scenarios")?
            .collect::<Result<Vec<String>, _>>()
            .context("failed to read scenario row")?;
        Ok(names)
    }

    /// Delete a scenario. Deleting a missing scenario is a no-op.
    pub fn delete(&self, name: &str) -> Result<()> {
        let name = sanitize_name(name);
        self.conn()
            .execute("DELETE FROM scenarios WHERE name = ?1", params![name])
            .context("failed to delete scenario")?;
        Ok(())
    }

    /// Rename a scenario, returning the sanitized new name. Fails if the
    /// source does not exist or the target name is taken.
    pub fn rename(&self, old_name: &str, new_name: &str) -> Result<String> {
        let old = sanitize_name(old_name);
        let new = sanitize_name(new_name);
        let changed = self
            .conn()
            .execute(
                "UPDATE scenarios SET name = ?2 WHERE name = ?1",
                params![old, new],
            )
            .with_context(|| format!("failed to rename scenario '{old}' to '{new}'"))?;
        if changed == 0 {
            bail!("scenario '{old}' not found");
        }
        Ok(new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trade::roster::Roster;
    use crate::trade::simulator::{simulate_trade, TradeSide};
    use crate::valuation::composite::CompositeScorer;
    use crate::valuation::players::test_support::player;
    use crate::valuation::salary_rule::TieredSalaryRule;

    fn test_store() -> ScenarioStore {
        ScenarioStore::open(":memory:").expect("in-memory store should open")
    }

    fn sample() -> (TradeProposal, TradeVerdict) {
        let scored = CompositeScorer::default()
            .score_dataset(&[
                player("Ava", 27, 10.0, 80.0, 1.5, 60.0),
                player("Ben", 25, 12.0, 75.0, 2.0, 70.0),
            ])
            .unwrap();
        let roster = Roster::new(scored).unwrap();
        let proposal = TradeProposal::new(TradeSide::players(["Ava"]), TradeSide::players(["Ben"]));
        let verdict = simulate_trade(&roster, &proposal, &TieredSalaryRule::default()).unwrap();
        (proposal, verdict)
    }

    #[test]
    fn sanitize_strips_unsafe_characters() {
        assert_eq!(sanitize_name("  deadline/deal #1 "), "deadlinedeal 1");
        assert_eq!(sanitize_name("../../"), "scenario");
        assert_eq!(sanitize_name("plan_B-2"), "plan_B-2");
    }

    #[test]
    fn save_and_load_round_trip() {
        let store = test_store();
        let (proposal, verdict) = sample();
        let name = store.save("Deadline deal", &proposal, &verdict).unwrap();
        assert_eq!(name, "Deadline deal");

        let loaded = store.load("Deadline deal").unwrap().expect("scenario should exist");
        assert_eq!(loaded.proposal, proposal);
        assert_eq!(loaded.verdict, verdict);
        assert_eq!(loaded.signature, "A:Ava__B:Ben");
        assert!(chrono::DateTime::parse_from_rfc3339(&loaded.saved_at).is_ok());
    }

    #[test]
    fn scoring_hash_is_stored_with_the_scenario() {
        let store = test_store();
        let (proposal, verdict) = sample();
        store.save("untagged", &proposal, &verdict).unwrap();
        assert_eq!(store.load("untagged").unwrap().unwrap().scoring_hash, None);

        let tagged = TradeVerdict {
            scoring_hash: Some("5f1c0e9a2b7d".into()),
            ..verdict
        };
        store.save("tagged", &proposal, &tagged).unwrap();
        let loaded = store.load("tagged").unwrap().unwrap();
        assert_eq!(loaded.scoring_hash.as_deref(), Some("5f1c0e9a2b7d"));
        assert_eq!(loaded.verdict.scoring_hash, loaded.scoring_hash);
    }

    #[test]
    fn reopening_an_existing_store_keeps_its_rows() {
        let path = std::env::temp_dir().join("trade_value_test_reopen.db");
        let _ = std::fs::remove_file(&path);
        let path_str = path.to_string_lossy().to_string();
        let (proposal, verdict) = sample();

        ScenarioStore::open(&path_str).unwrap().save("kept", &proposal, &verdict).unwrap();
        let reopened = ScenarioStore::open(&path_str).unwrap();
        assert_eq!(reopened.list().unwrap(), vec!["kept"]);

        drop(reopened);
        let _ = std::fs::remove_file(&path);
        let _ = std::fs::remove_file(path.with_extension("db-wal"));
        let _ = std::fs::remove_file(path.with_extension("db-shm"));
    }

    #[test]
    fn load_missing_returns_none() {
        assert!(test_store().load("nope").unwrap().is_none());
    }

    #[test]
    fn save_overwrites_by_name() {
        let store = test_store();
        let (proposal, verdict) = sample();
        store.save("x", &proposal, &verdict).unwrap();
        store.save("x", &proposal.swapped(), &verdict.swapped()).unwrap();

        assert_eq!(store.list().unwrap(), vec!["x"]);
        let loaded = store.load("x").unwrap().unwrap();
        assert_eq!(loaded.signature, "A:Ben__B:Ava");
    }

    #[test]
    fn list_is_sorted() {
        let store = test_store();
        let (proposal, verdict) = sample();
        for name in ["charlie", "alpha", "bravo"] {
            store.save(name, &proposal, &verdict).unwrap();
        }
        assert_eq!(store.list().unwrap(), vec!["alpha", "bravo", "charlie"]);
    }

    #[test]
    fn delete_is_idempotent() {
        let store = test_store();
        let (proposal, verdict) = sample();
        store.save("gone", &proposal, &verdict).unwrap();
        store.delete("gone").unwrap();
        store.delete("gone").unwrap();
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn rename_moves_and_rejects_missing_source() {
        let store = test_store();
        let (proposal, verdict) = sample();
        store.save("old", &proposal, &verdict).unwrap();

        assert_eq!(store.rename("old", "new").unwrap(), "new");
        assert_eq!(store.list().unwrap(), vec!["new"]);
        assert!(store.rename("old", "other").is_err());
    }
}
