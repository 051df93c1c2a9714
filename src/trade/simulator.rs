// Trade simulation: resolve both sides, aggregate salary and value, check
// salary matching in both directions, report the verdict.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Side, TradeError};
use crate::trade::picks::DraftPick;
use crate::trade::roster::Roster;
use crate::valuation::composite::{ScoredPlayer, ValueTier};
use crate::valuation::salary_rule::{round_cents, RuleDecision, SalaryRule};

/// Absolute value difference below which a trade counts as balanced.
pub const BALANCED_VALUE_MARGIN: f64 = 5.0;

// ---------------------------------------------------------------------------
// Proposal
// ---------------------------------------------------------------------------

/// What one team sends out.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeSide {
    pub players: Vec<String>,
    #[serde(default)]
    pub picks: Vec<DraftPick>,
}

impl TradeSide {
    pub fn players<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Self {
        Self {
            players: names.into_iter().map(Into::into).collect(),
            picks: Vec::new(),
        }
    }

    pub fn with_pick(mut self, pick: DraftPick) -> Self {
        self.picks.push(pick);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty() && self.picks.is_empty()
    }
}

/// Two-sided exchange: side A gives `side_a`, side B gives `side_b`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeProposal {
    pub side_a: TradeSide,
    pub side_b: TradeSide,
}

impl TradeProposal {
    pub fn new(side_a: TradeSide, side_b: TradeSide) -> Self {
        Self { side_a, side_b }
    }

    /// The same trade seen from the other team.
    pub fn swapped(&self) -> Self {
        Self {
            side_a: self.side_b.clone(),
            side_b: self.side_a.clone(),
        }
    }

    /// Order-independent key, e.g. `A:Ava|Ben__B:Cal`. Picks are included
    /// after the players.
    pub fn signature(&self) -> String {
        fn side_key(side: &TradeSide) -> String {
            let mut items: Vec<String> = side.players.clone();
            items.sort();
            let mut picks: Vec<String> = side.picks.iter().map(|p| p.to_string()).collect();
            picks.sort();
            items.extend(picks);
            items.join("|")
        }
        format!("A:{}__B:{}", side_key(&self.side_a), side_key(&self.side_b))
    }

    /// Structural checks that need no dataset: non-empty sides, no name
    /// repeated within a side or across sides.
    pub fn validate(&self) -> Result<(), TradeError> {
        for (side, s) in [(Side::A, &self.side_a), (Side::B, &self.side_b)] {
            if s.is_empty() {
                return Err(TradeError::Proposal(format!("{side} gives nothing")));
            }
            let mut seen = HashSet::new();
            for name in &s.players {
                if !seen.insert(name.as_str()) {
                    return Err(TradeError::Proposal(format!(
                        "`{name}` is listed twice on {side}"
                    )));
                }
            }
        }

        let a: HashSet<&str> = self.side_a.players.iter().map(String::as_str).collect();
        if let Some(name) = self.side_b.players.iter().find(|n| a.contains(n.as_str())) {
            return Err(TradeError::Proposal(format!(
                "`{name}` appears on both sides"
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Verdict
// ---------------------------------------------------------------------------

/// Which team's incoming salary broke the rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailingDirection {
    /// Side A takes back more than its outgoing salary allows.
    SideA,
    /// Side B takes back more than its outgoing salary allows.
    SideB,
    Both,
}

impl FailingDirection {
    fn from_checks(a_legal: bool, b_legal: bool) -> Option<Self> {
        match (a_legal, b_legal) {
            (true, true) => None,
            (false, true) => Some(FailingDirection::SideA),
            (true, false) => Some(FailingDirection::SideB),
            (false, false) => Some(FailingDirection::Both),
        }
    }

    fn swapped(self) -> Self {
        match self {
            FailingDirection::SideA => FailingDirection::SideB,
            FailingDirection::SideB => FailingDirection::SideA,
            FailingDirection::Both => FailingDirection::Both,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackagePlayer {
    pub name: String,
    pub age: u32,
    pub salary: f64,
    pub trade_value: f64,
    pub tier: ValueTier,
    pub surplus_value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackagePick {
    pub pick: DraftPick,
    pub value: f64,
}

/// Everything one side sends, with its totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageSummary {
    pub players: Vec<PackagePlayer>,
    pub picks: Vec<PackagePick>,
    /// Rounded to the cent.
    pub total_salary: f64,
    /// Player trade values plus pick values.
    pub total_value: f64,
    /// Sum over players with a known market value; `None` if none have one.
    pub total_surplus: Option<f64>,
    /// `None` for a picks-only package.
    pub avg_age: Option<f64>,
}

impl PackageSummary {
    fn build(players: &[&ScoredPlayer], picks: &[DraftPick]) -> Result<Self, TradeError> {
        let picks = picks
            .iter()
            .map(|pick| {
                Ok(PackagePick {
                    pick: *pick,
                    value: pick.value()?,
                })
            })
            .collect::<Result<Vec<_>, TradeError>>()?;

        let total_salary = round_cents(players.iter().map(|p| p.record.salary).sum());
        let total_value = players.iter().map(|p| p.trade_value).sum::<f64>()
            + picks.iter().map(|p| p.value).sum::<f64>();

        let surpluses: Vec<f64> = players.iter().filter_map(|p| p.record.surplus_value()).collect();
        let total_surplus = (!surpluses.is_empty()).then(|| round_cents(surpluses.iter().sum()));

        let avg_age = (!players.is_empty()).then(|| {
            players.iter().map(|p| f64::from(p.record.age)).sum::<f64>() / players.len() as f64
        });

        Ok(Self {
            players: players
                .iter()
                .map(|p| PackagePlayer {
                    name: p.record.name.clone(),
                    age: p.record.age,
                    salary: p.record.salary,
                    trade_value: p.trade_value,
                    tier: p.tier,
                    surplus_value: p.record.surplus_value(),
                })
                .collect(),
            picks,
            total_salary,
            total_value,
            total_surplus,
            avg_age,
        })
    }
}

/// Result of one simulation. Field names match the exported record layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeVerdict {
    pub side_a_salary: f64,
    pub side_b_salary: f64,
    /// `|side_a_salary - side_b_salary|`, rounded to the cent.
    #[serde(default)]
    pub salary_diff: f64,
    pub side_a_value: f64,
    pub side_b_value: f64,
    /// `side_a_value - side_b_value`; positive means A sends more value.
    pub value_difference: f64,
    pub salary_match: bool,
    pub failing_direction: Option<FailingDirection>,
    /// Side A sends `side_a_salary` and takes back `side_b_salary`.
    pub side_a_receiving: RuleDecision,
    /// Side B sends `side_b_salary` and takes back `side_a_salary`.
    pub side_b_receiving: RuleDecision,
    pub side_a_package: PackageSummary,
    pub side_b_package: PackageSummary,
    /// Fingerprint of the scoring policy behind the trade values, when the
    /// roster was tagged with one.
    #[serde(default)]
    pub scoring_hash: Option<String>,
}

impl TradeVerdict {
    /// The verdict for the proposal with sides relabeled.
    pub fn swapped(&self) -> Self {
        Self {
            side_a_salary: self.side_b_salary,
            side_b_salary: self.side_a_salary,
            salary_diff: self.salary_diff,
            side_a_value: self.side_b_value,
            side_b_value: self.side_a_value,
            value_difference: -self.value_difference,
            salary_match: self.salary_match,
            failing_direction: self.failing_direction.map(FailingDirection::swapped),
            side_a_receiving: self.side_b_receiving.clone(),
            side_b_receiving: self.side_a_receiving.clone(),
            side_a_package: self.side_b_package.clone(),
            side_b_package: self.side_a_package.clone(),
            scoring_hash: self.scoring_hash.clone(),
        }
    }

    pub fn is_balanced(&self) -> bool {
        self.value_difference.abs() < BALANCED_VALUE_MARGIN
    }

    /// One-line read of the value exchange.
    pub fn summary(&self) -> String {
        if self.is_balanced() {
            "value exchange is roughly balanced".to_string()
        } else {
            let side = if self.value_difference > 0.0 { Side::A } else { Side::B };
            format!("{side} sends more value ({:.1})", self.value_difference.abs())
        }
    }

    /// Short bullets explaining the legality and value read.
    pub fn explain(&self) -> Vec<String> {
        let mut bullets = Vec::new();
        bullets.push(if self.salary_match {
            format!("Salary matching passed ({}).", self.side_a_receiving.rule_version)
        } else {
            format!("Salary matching failed ({}).", self.side_a_receiving.rule_version)
        });

        for (side, decision) in [(Side::A, &self.side_a_receiving), (Side::B, &self.side_b_receiving)] {
            if !decision.legal {
                bullets.push(format!(
                    "{side} sends {:.2}M and may take back at most {:.2}M, but receives {:.2}M.",
                    decision.outgoing, decision.max_incoming, decision.incoming
                ));
            }
        }

        bullets.push(if self.is_balanced() {
            "Value exchange is broadly balanced.".to_string()
        } else if self.value_difference > 0.0 {
            "Side A sends higher aggregate trade value.".to_string()
        } else {
            "Side B sends higher aggregate trade value.".to_string()
        });
        bullets
    }
}

// ---------------------------------------------------------------------------
// Simulation
// ---------------------------------------------------------------------------

fn resolve_side<'r>(roster: &'r Roster, side: &TradeSide) -> Result<Vec<&'r ScoredPlayer>, TradeError> {
    side.players.iter().map(|name| roster.resolve(name)).collect()
}

/// Simulate `proposal` against the `roster` snapshot.
///
/// Steps:
/// 1. Reject empty sides and repeated or overlapping names.
/// 2. Resolve every name and pick; any miss aborts with no partial verdict.
/// 3. Sum salary and value per side.
/// 4. Check the salary rule once per direction; both must pass.
/// 5. Report `value_difference = side_a_value - side_b_value`.
///
/// Pure and deterministic: the same roster and proposal always give the same
/// verdict.
pub fn simulate_trade<R>(
    roster: &Roster,
    proposal: &TradeProposal,
    rule: &R,
) -> Result<TradeVerdict, TradeError>
where
    R: SalaryRule + ?Sized,
{
    proposal.validate()?;

    let a_players = resolve_side(roster, &proposal.side_a)?;
    let b_players = resolve_side(roster, &proposal.side_b)?;

    let side_a_package = PackageSummary::build(&a_players, &proposal.side_a.picks)?;
    let side_b_package = PackageSummary::build(&b_players, &proposal.side_b.picks)?;

    let side_a_salary = side_a_package.total_salary;
    let side_b_salary = side_b_package.total_salary;
    let side_a_value = side_a_package.total_value;
    let side_b_value = side_b_package.total_value;

    let side_a_receiving = rule.evaluate(side_a_salary, side_b_salary)?;
    let side_b_receiving = rule.evaluate(side_b_salary, side_a_salary)?;
    let salary_match = side_a_receiving.legal && side_b_receiving.legal;
    let failing_direction =
        FailingDirection::from_checks(side_a_receiving.legal, side_b_receiving.legal);

    let salary_diff = round_cents((side_a_salary - side_b_salary).abs());
    let value_difference = side_a_value - side_b_value;

    debug!(
        "simulated {}: salary {:.2} <-> {:.2}, value {:.2} <-> {:.2}, match={}",
        proposal.signature(),
        side_a_salary,
        side_b_salary,
        side_a_value,
        side_b_value,
        salary_match
    );

    Ok(TradeVerdict {
        side_a_salary,
        side_b_salary,
        salary_diff,
        side_a_value,
        side_b_value,
        value_difference,
        salary_match,
        failing_direction,
        side_a_receiving,
        side_b_receiving,
        side_a_package,
        side_b_package,
        scoring_hash: roster.scoring_hash().map(str::to_string),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
