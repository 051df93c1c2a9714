// Read-only queries over a scored snapshot: trade targets, side-by-side
// comparison, tier counts.

use serde::Serialize;

use crate::error::TradeError;
use crate::trade::roster::Roster;
use crate::valuation::composite::{ScoredPlayer, ValueTier};

/// Filters for a target search. `None` / empty means "no constraint".
#[derive(Debug, Clone)]
pub struct TargetQuery {
    /// Salary budget, in millions (inclusive).
    pub max_salary: f64,
    pub max_age: Option<u32>,
    /// Exact play-style label.
    pub play_style: Option<String>,
    /// Match any of these positions.
    pub positions: Vec<String>,
    pub top_n: usize,
}

impl Default for TargetQuery {
    fn default() -> Self {
        Self {
            max_salary: f64::INFINITY,
            max_age: None,
            play_style: None,
            positions: Vec::new(),
            top_n: 20,
        }
    }
}

/// Players matching `query`, best trade value first, at most `top_n`.
pub fn find_targets<'a>(players: &'a [ScoredPlayer], query: &TargetQuery) -> Vec<&'a ScoredPlayer> {
    let mut matches: Vec<&ScoredPlayer> = players
        .iter()
        .filter(|p| p.record.salary <= query.max_salary)
        .filter(|p| query.max_age.map_or(true, |max| p.record.age <= max))
        .filter(|p| {
            query
                .play_style
                .as_deref()
                .map_or(true, |style| p.record.play_style.as_deref() == Some(style))
        })
        .filter(|p| query.positions.is_empty() || p.record.plays_any(&query.positions))
        .collect();

    matches.sort_by(|a, b| {
        b.trade_value
            .partial_cmp(&a.trade_value)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    matches.truncate(query.top_n);
    matches
}

/// Resolve `names` and return them best trade value first.
pub fn compare_players<'r, S: AsRef<str>>(
    roster: &'r Roster,
    names: &[S],
) -> Result<Vec<&'r ScoredPlayer>, TradeError> {
    let mut players = names
        .iter()
        .map(|n| roster.resolve(n.as_ref()))
        .collect::<Result<Vec<_>, _>>()?;
    players.sort_by(|a, b| {
        b.trade_value
            .partial_cmp(&a.trade_value)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    Ok(players)
}

/// Field-by-field difference between two players (`first - second`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerDiff {
    pub first: String,
    pub second: String,
    pub perf_norm: f64,
    pub contract_norm: f64,
    pub fit_norm: f64,
    pub age_adjustment: f64,
    pub trade_value: f64,
    pub salary: f64,
    pub first_tier: ValueTier,
    pub second_tier: ValueTier,
}

pub fn diff_players(roster: &Roster, first: &str, second: &str) -> Result<PlayerDiff, TradeError> {
    let a = roster.resolve(first)?;
    let b = roster.resolve(second)?;
    Ok(PlayerDiff {
        first: a.record.name.clone(),
        second: b.record.name.clone(),
        perf_norm: a.perf_norm - b.perf_norm,
        contract_norm: a.contract_norm - b.contract_norm,
        fit_norm: a.fit_norm - b.fit_norm,
        age_adjustment: a.age_adjustment - b.age_adjustment,
        trade_value: a.trade_value - b.trade_value,
        salary: a.record.salary - b.record.salary,
        first_tier: a.tier,
        second_tier: b.tier,
    })
}

/// Player count per tier, best tier first. Every tier is listed.
pub fn tier_distribution(players: &[ScoredPlayer]) -> Vec<(ValueTier, usize)> {
    ValueTier::ALL
        .iter()
        .map(|tier| (*tier, players.iter().filter(|p| p.tier == *tier).count()))
        .collect()
}

/// Players with the largest surplus (market value minus salary), best first.
/// Players without a market value are skipped.
pub fn best_surplus(players: &[ScoredPlayer], top_n: usize) -> Vec<(&ScoredPlayer, f64)> {
    let mut with_surplus: Vec<(&ScoredPlayer, f64)> = players
        .iter()
        .filter_map(|p| p.record.surplus_value().map(|s| (p, s)))
        .collect();
    with_surplus.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    with_surplus.truncate(top_n);
    with_surplus
}
