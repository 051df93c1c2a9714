// Player table loading and scored-table export.
//
// The upstream pipeline hands over one CSV row per player with the three
// pre-computed sub-scores. Required columns: name, age, salary, perf_score,
// contract_score, fit_score. Optional: team, positions ("PG|SG"), play_style,
// market_value. Any other column is ignored.

use std::io::{Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::TradeError;
use crate::valuation::composite::ScoredPlayer;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// One player-season row as produced upstream. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub name: String,
    pub age: u32,
    /// Current salary, in millions.
    pub salary: f64,
    pub perf_score: f64,
    pub contract_score: f64,
    pub fit_score: f64,
    pub team: String,
    pub positions: Vec<String>,
    pub play_style: Option<String>,
    /// Estimated market value, in millions.
    pub market_value: Option<f64>,
}

impl PlayerRecord {
    /// Market value minus salary, when a market value is known.
    pub fn surplus_value(&self) -> Option<f64> {
        self.market_value.map(|mv| mv - self.salary)
    }

    pub fn plays_any(&self, positions: &[String]) -> bool {
        positions.iter().any(|p| self.positions.contains(p))
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("failed to open {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("row {row}: {source}")]
    Row { row: usize, source: TradeError },
}

// ---------------------------------------------------------------------------
// Raw CSV rows (private)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawPlayerRow {
    name: String,
    age: i64,
    salary: f64,
    perf_score: f64,
    contract_score: f64,
    fit_score: f64,
    #[serde(default)]
    team: String,
    #[serde(default)]
    positions: String,
    #[serde(default)]
    play_style: Option<String>,
    #[serde(default)]
    market_value: Option<f64>,
}

#[derive(Debug, Serialize)]
struct ScoredRow<'a> {
    name: &'a str,
    age: u32,
    salary: f64,
    perf_score: f64,
    contract_score: f64,
    fit_score: f64,
    team: &'a str,
    positions: String,
    play_style: &'a str,
    market_value: Option<f64>,
    #[serde(rename = "TRADE_VALUE")]
    trade_value: f64,
    #[serde(rename = "VALUE_TIER")]
    value_tier: &'static str,
}

fn check_row(raw: RawPlayerRow) -> Result<PlayerRecord, TradeError> {
    let name = raw.name.trim().to_string();
    let subject = format!("player `{name}`");
    if name.is_empty() {
        return Err(TradeError::domain("unnamed player", "name", "must not be empty"));
    }
    if raw.age < 0 || raw.age > i64::from(u32::MAX) {
        return Err(TradeError::domain(
            subject,
            "age",
            format!("must be a non-negative integer, got {}", raw.age),
        ));
    }
    if !raw.salary.is_finite() || raw.salary < 0.0 {
        return Err(TradeError::domain(
            subject,
            "salary",
            format!("must be a non-negative number, got {}", raw.salary),
        ));
    }
    let scores = [
        ("perf_score", raw.perf_score),
        ("contract_score", raw.contract_score),
        ("fit_score", raw.fit_score),
    ];
    for (field, value) in scores {
        if !value.is_finite() {
            return Err(TradeError::domain(
                subject,
                field,
                format!("must be a finite number, got {value}"),
            ));
        }
    }
    if let Some(mv) = raw.market_value {
        if !mv.is_finite() || mv < 0.0 {
            return Err(TradeError::domain(
                subject,
                "market_value",
                format!("must be a non-negative number, got {mv}"),
            ));
        }
    }

    Ok(PlayerRecord {
        name,
        age: raw.age as u32,
        salary: raw.salary,
        perf_score: raw.perf_score,
        contract_score: raw.contract_score,
        fit_score: raw.fit_score,
        team: raw.team.trim().to_string(),
        positions: raw
            .positions
            .split('|')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(String::from)
            .collect(),
        play_style: raw
            .play_style
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()),
        market_value: raw.market_value,
    })
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Parse players from any CSV reader. Every row must be valid; the first bad
/// row aborts the load with its 1-based data row number.
pub fn load_players_from_reader<R: Read>(rdr: R) -> Result<Vec<PlayerRecord>, DatasetError> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(rdr);
    let mut players = Vec::new();
    for (idx, result) in reader.deserialize::<RawPlayerRow>().enumerate() {
        let raw = result?;
        let player = check_row(raw).map_err(|source| DatasetError::Row {
            row: idx + 1,
            source,
        })?;
        players.push(player);
    }
    Ok(players)
}

pub fn load_players(path: &Path) -> Result<Vec<PlayerRecord>, DatasetError> {
    let file = std::fs::File::open(path).map_err(|source| DatasetError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let players = load_players_from_reader(file)?;
    info!("loaded {} players from {}", players.len(), path.display());
    Ok(players)
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

/// Write the input columns plus TRADE_VALUE and VALUE_TIER.
pub fn write_scored_to_writer<W: Write>(
    wtr: W,
    players: &[ScoredPlayer],
) -> Result<(), DatasetError> {
    let mut writer = csv::Writer::from_writer(wtr);
    for p in players {
        let r = &p.record;
        writer.serialize(ScoredRow {
            name: &r.name,
            age: r.age,
            salary: r.salary,
            perf_score: r.perf_score,
            contract_score: r.contract_score,
            fit_score: r.fit_score,
            team: &r.team,
            positions: r.positions.join("|"),
            play_style: r.play_style.as_deref().unwrap_or(""),
            market_value: r.market_value,
            trade_value: p.trade_value,
            value_tier: p.tier.label(),
        })?;
    }
    writer.flush().map_err(|source| DatasetError::Io {
        path: "<output>".into(),
        source,
    })?;
    Ok(())
}

pub fn write_scored(path: &Path, players: &[ScoredPlayer]) -> Result<(), DatasetError> {
    let file = std::fs::File::create(path).map_err(|source| DatasetError::Io {
        path: path.display().to_string(),
        source,
    })?;
    write_scored_to_writer(file, players)?;
    info!("wrote {} scored players to {}", players.len(), path.display());
    Ok(())
}

// ---------------------------------------------------------------------------
// Test fixtures
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod test_support {
    use super::PlayerRecord;

    pub(crate) fn player(
        name: &str,
        age: u32,
        salary: f64,
        perf: f64,
        contract: f64,
        fit: f64,
    ) -> PlayerRecord {
        PlayerRecord {
            name: name.into(),
            age,
            salary,
            perf_score: perf,
            contract_score: contract,
            fit_score: fit,
            team: "TST".into(),
            positions: vec!["SF".into()],
            play_style: None,
            market_value: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
