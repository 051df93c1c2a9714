// Composite trade value: weighted sub-scores, age adjustment, tiering.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{self, AgeBand, CompositeWeights, ConfigError, ScoringConfig};
use crate::error::TradeError;
use crate::valuation::normalize::{normalize_players, NormalizedScores, SCALE_MAX, SCALE_MIN};
use crate::valuation::players::PlayerRecord;

// ---------------------------------------------------------------------------
// Value tiers
// ---------------------------------------------------------------------------

/// Discrete bucket for a trade value, best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValueTier {
    Untouchable,
    Franchise,
    AllStar,
    QualityStarter,
    Rotation,
    Tradeable,
}

impl ValueTier {
    /// All tiers, best first.
    pub const ALL: [ValueTier; 6] = [
        ValueTier::Untouchable,
        ValueTier::Franchise,
        ValueTier::AllStar,
        ValueTier::QualityStarter,
        ValueTier::Rotation,
        ValueTier::Tradeable,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ValueTier::Untouchable => "UNTOUCHABLE",
            ValueTier::Franchise => "FRANCHISE",
            ValueTier::AllStar => "ALL_STAR",
            ValueTier::QualityStarter => "QUALITY_STARTER",
            ValueTier::Rotation => "ROTATION",
            ValueTier::Tradeable => "TRADEABLE",
        }
    }
}

impl fmt::Display for ValueTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Scored output
// ---------------------------------------------------------------------------

/// A player with derived trade value. Recomputable from the record at any
/// time; never the source of truth.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredPlayer {
    pub record: PlayerRecord,
    pub perf_norm: f64,
    pub contract_norm: f64,
    pub fit_norm: f64,
    pub age_adjustment: f64,
    /// TRADE_VALUE, clamped to [0, 100].
    pub trade_value: f64,
    /// VALUE_TIER.
    pub tier: ValueTier,
}

impl ScoredPlayer {
    pub fn name(&self) -> &str {
        &self.record.name
    }
}

// ---------------------------------------------------------------------------
// Scorer
// ---------------------------------------------------------------------------

/// Owns the validated scoring policy: weights, tier cuts and age bands.
#[derive(Debug, Clone)]
pub struct CompositeScorer {
    weights: CompositeWeights,
    contract_clip: f64,
    /// (lower bound inclusive, tier), highest cut first. TRADEABLE is the
    /// implicit catch-all.
    tier_cuts: [(f64, ValueTier); 5],
    age_bands: Vec<AgeBand>,
    older_adjustment: f64,
}

impl CompositeScorer {
    /// Build a scorer from a scoring policy, rejecting weights that do not sum
    /// to 1.0 and non-monotonic tier or age tables.
    pub fn new(scoring: &ScoringConfig) -> Result<Self, ConfigError> {
        config::validate_scoring(scoring)?;
        Ok(Self::from_validated(scoring))
    }

    fn from_validated(scoring: &ScoringConfig) -> Self {
        let t = &scoring.tier_thresholds;
        Self {
            weights: scoring.weights,
            contract_clip: scoring.contract_clip,
            tier_cuts: [
                (t.untouchable, ValueTier::Untouchable),
                (t.franchise, ValueTier::Franchise),
                (t.all_star, ValueTier::AllStar),
                (t.quality_starter, ValueTier::QualityStarter),
                (t.rotation, ValueTier::Rotation),
            ],
            age_bands: scoring.age_bands.clone(),
            older_adjustment: scoring.older_adjustment,
        }
    }

    /// Weighted combination of the normalized sub-scores, before any age
    /// adjustment or clamping.
    pub fn weighted(&self, scores: &NormalizedScores) -> f64 {
        self.weights.performance * scores.perf
            + self.weights.contract * scores.contract
            + self.weights.fit * scores.fit
    }

    /// Additive adjustment for `age`. The first band whose `max_age` covers
    /// the age wins; anything older gets the catch-all.
    pub fn age_adjustment(&self, age: u32) -> f64 {
        self.age_bands
            .iter()
            .find(|band| age <= band.max_age)
            .map_or(self.older_adjustment, |band| band.adjustment)
    }

    /// Classify a trade value. Bands are half-open, checked top-down.
    pub fn classify(&self, value: f64) -> ValueTier {
        self.tier_cuts
            .iter()
            .find(|(cut, _)| value >= *cut)
            .map_or(ValueTier::Tradeable, |(_, tier)| *tier)
    }

    /// Final trade value for one player: weight, adjust for age, clamp.
    pub fn trade_value(&self, scores: &NormalizedScores, age: u32) -> f64 {
        (self.weighted(scores) + self.age_adjustment(age)).clamp(SCALE_MIN, SCALE_MAX)
    }

    /// Score a record whose sub-scores are already normalized.
    pub fn score(&self, record: PlayerRecord, scores: NormalizedScores) -> ScoredPlayer {
        let age_adjustment = self.age_adjustment(record.age);
        let trade_value = self.trade_value(&scores, record.age);
        let tier = self.classify(trade_value);
        debug!(
            "{}: perf={:.1} contract={:.1} fit={:.1} age_adj={:+} -> {:.2} ({})",
            record.name, scores.perf, scores.contract, scores.fit, age_adjustment, trade_value, tier
        );
        ScoredPlayer {
            record,
            perf_norm: scores.perf,
            contract_norm: scores.contract,
            fit_norm: scores.fit,
            age_adjustment,
            trade_value,
            tier,
        }
    }

    /// Normalize and score a whole population, sorted descending by trade
    /// value. Ties keep input order.
    pub fn score_dataset(&self, players: &[PlayerRecord]) -> Result<Vec<ScoredPlayer>, TradeError> {
        let normalized = normalize_players(players, self.contract_clip)?;
        let mut scored: Vec<ScoredPlayer> = players
            .iter()
            .cloned()
            .zip(normalized)
            .map(|(record, scores)| self.score(record, scores))
            .collect();

        scored.sort_by(|a, b| {
            b.trade_value
                .partial_cmp(&a.trade_value)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(scored)
    }
}

impl Default for CompositeScorer {
    /// The built-in policy (see `defaults/scoring.toml`).
    fn default() -> Self {
        Self::from_validated(&ScoringConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
