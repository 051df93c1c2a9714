// Historical trade backtest: replay real trades through the simulator and
// score how often the value read names the side that came out ahead.
//
// Trades CSV columns: trade_id, team_a_gives, team_b_gives, and optionally
// expected_winner (balanced | team_a | team_b; blank means balanced). Player
// lists are `|`-separated.

use std::fmt;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::TradeError;
use crate::trade::roster::Roster;
use crate::trade::simulator::{simulate_trade, TradeProposal, TradeSide, BALANCED_VALUE_MARGIN};
use crate::valuation::players::DatasetError;
use crate::valuation::salary_rule::SalaryRule;

/// Which team got the better end of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Winner {
    Balanced,
    TeamA,
    TeamB,
}

impl Winner {
    pub fn label(self) -> &'static str {
        match self {
            Winner::Balanced => "balanced",
            Winner::TeamA => "team_a",
            Winner::TeamB => "team_b",
        }
    }
}

impl fmt::Display for Winner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.label())
    }
}

impl FromStr for Winner {
    type Err = TradeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "balanced" => Ok(Winner::Balanced),
            "team_a" => Ok(Winner::TeamA),
            "team_b" => Ok(Winner::TeamB),
            other => Err(TradeError::Proposal(format!(
                "unknown trade winner `{other}`, expected balanced, team_a or team_b"
            ))),
        }
    }
}

/// Read the winner off a value difference (`side_a_value - side_b_value`).
///
/// The team that sends more value loses the exchange, so a positive
/// difference is a win for team B.
pub fn predict_winner(value_difference: f64) -> Winner {
    if value_difference.abs() < BALANCED_VALUE_MARGIN {
        Winner::Balanced
    } else if value_difference > 0.0 {
        Winner::TeamB
    } else {
        Winner::TeamA
    }
}

/// A completed trade with its known outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalTrade {
    pub trade_id: String,
    pub proposal: TradeProposal,
    pub expected_winner: Winner,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawTradeRow {
    trade_id: String,
    #[serde(default)]
    team_a_gives: String,
    #[serde(default)]
    team_b_gives: String,
    #[serde(default)]
    expected_winner: Option<String>,
}

fn split_names(raw: &str) -> Vec<String> {
    raw.split('|')
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(String::from)
        .collect()
}

fn check_trade_row(raw: RawTradeRow) -> Result<HistoricalTrade, TradeError> {
    let trade_id = raw.trade_id.trim().to_string();
    if trade_id.is_empty() {
        return Err(TradeError::domain("historical trade", "trade_id", "must not be empty"));
    }
    let expected_winner = match raw.expected_winner.as_deref().map(str::trim) {
        None | Some("") => Winner::Balanced,
        Some(label) => label.parse()?,
    };
    Ok(HistoricalTrade {
        trade_id,
        proposal: TradeProposal::new(
            TradeSide::players(split_names(&raw.team_a_gives)),
            TradeSide::players(split_names(&raw.team_b_gives)),
        ),
        expected_winner,
    })
}

/// Parse historical trades from any CSV reader. The first bad row aborts the
/// load with its 1-based data row number.
pub fn load_trades_from_reader<R: Read>(rdr: R) -> Result<Vec<HistoricalTrade>, DatasetError> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(rdr);
    let mut trades = Vec::new();
    for (idx, result) in reader.deserialize::<RawTradeRow>().enumerate() {
        let trade = check_trade_row(result?).map_err(|source| DatasetError::Row {
            row: idx + 1,
            source,
        })?;
        trades.push(trade);
    }
    Ok(trades)
}

pub fn load_trades(path: &Path) -> Result<Vec<HistoricalTrade>, DatasetError> {
    let file = std::fs::File::open(path).map_err(|source| DatasetError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let trades = load_trades_from_reader(file)?;
    info!("loaded {} historical trades from {}", trades.len(), path.display());
    Ok(trades)
}

// ---------------------------------------------------------------------------
// Replay
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum BacktestError {
    #[error("trade {trade_id}: {source}")]
    Trade { trade_id: String, source: TradeError },
}

/// Outcome of one replayed trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestRow {
    pub trade_id: String,
    pub predicted_winner: Winner,
    pub expected_winner: Winner,
    pub salary_match: bool,
    pub value_difference: f64,
    pub correct: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestReport {
    pub num_trades: usize,
    /// Share of correct predictions, rounded to four decimals. `0.0` when no
    /// trades were replayed.
    pub accuracy: f64,
    pub scoring_hash: Option<String>,
    pub details: Vec<BacktestRow>,
}

impl BacktestReport {
    pub fn num_correct(&self) -> usize {
        self.details.iter().filter(|r| r.correct).count()
    }
}

/// Replay every trade against the `roster` snapshot. A trade that cannot be
/// simulated (unknown player, empty side) aborts the run with its id.
pub fn run_backtest<R>(
    roster: &Roster,
    trades: &[HistoricalTrade],
    rule: &R,
) -> Result<BacktestReport, BacktestError>
where
    R: SalaryRule + ?Sized,
{
    let mut details = Vec::with_capacity(trades.len());
    for trade in trades {
        let verdict = simulate_trade(roster, &trade.proposal, rule).map_err(|source| {
            BacktestError::Trade {
                trade_id: trade.trade_id.clone(),
                source,
            }
        })?;
        let predicted_winner = predict_winner(verdict.value_difference);
        debug!(
            "trade {}: predicted {}, expected {}",
            trade.trade_id, predicted_winner, trade.expected_winner
        );
        details.push(BacktestRow {
            trade_id: trade.trade_id.clone(),
            predicted_winner,
            expected_winner: trade.expected_winner,
            salary_match: verdict.salary_match,
            value_difference: verdict.value_difference,
            correct: predicted_winner == trade.expected_winner,
        });
    }

    let num_trades = details.len();
    let correct = details.iter().filter(|r| r.correct).count();
    let accuracy = if num_trades == 0 {
        0.0
    } else {
        (correct as f64 / num_trades as f64 * 10_000.0).round() / 10_000.0
    };
    info!("backtest: {}/{} trades called correctly", correct, num_trades);

    Ok(BacktestReport {
        num_trades,
        accuracy,
        scoring_hash: roster.scoring_hash().map(str::to_string),
        details,
    })
}
