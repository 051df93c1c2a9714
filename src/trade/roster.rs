// Build-once name index over a scored player snapshot.

use std::collections::HashMap;

use crate::error::TradeError;
use crate::valuation::composite::ScoredPlayer;

/// Immutable snapshot of scored players, indexed by exact name.
///
/// Duplicate names are rejected when the index is built, so a lookup that
/// fails is always "unknown", never "ambiguous". Safe to share across threads
/// for concurrent simulations.
#[derive(Debug, Clone)]
pub struct Roster {
    players: Vec<ScoredPlayer>,
    index: HashMap<String, usize>,
    scoring_hash: Option<String>,
}

impl Roster {
    pub fn new(players: Vec<ScoredPlayer>) -> Result<Self, TradeError> {
        let mut index: HashMap<String, usize> = HashMap::with_capacity(players.len());
        let mut duplicate: Option<&str> = None;
        for (i, p) in players.iter().enumerate() {
            if index.insert(p.name().to_string(), i).is_some() && duplicate.is_none() {
                duplicate = Some(p.name());
            }
        }

        if let Some(name) = duplicate {
            let count = players.iter().filter(|p| p.name() == name).count();
            return Err(TradeError::Ambiguous {
                name: name.to_string(),
                count,
            });
        }

        Ok(Self {
            players,
            index,
            scoring_hash: None,
        })
    }

    /// Tag the snapshot with the fingerprint of the policy that scored it.
    /// Verdicts built from this roster carry the tag.
    pub fn with_scoring_hash(mut self, hash: impl Into<String>) -> Self {
        self.scoring_hash = Some(hash.into());
        self
    }

    pub fn scoring_hash(&self) -> Option<&str> {
        self.scoring_hash.as_deref()
    }

    /// Exact, case-sensitive lookup.
    pub fn get(&self, name: &str) -> Option<&ScoredPlayer> {
        self.index.get(name).map(|&i| &self.players[i])
    }

    pub fn resolve(&self, name: &str) -> Result<&ScoredPlayer, TradeError> {
        self.get(name).ok_or_else(|| TradeError::unknown_player(name))
    }

    /// Players in snapshot order.
    pub fn players(&self) -> &[ScoredPlayer] {
        &self.players
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}
