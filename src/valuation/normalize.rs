// Min-max rescaling of raw sub-scores onto a shared 0-100 range.

use tracing::warn;

use crate::error::TradeError;
use crate::valuation::players::PlayerRecord;

/// Bottom of the normalized range.
pub const SCALE_MIN: f64 = 0.0;
/// Top of the normalized range.
pub const SCALE_MAX: f64 = 100.0;
/// Value assigned to every player when a column has no spread.
pub const SCALE_MIDPOINT: f64 = (SCALE_MIN + SCALE_MAX) / 2.0;

/// Min and max of a population column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnRange {
    pub min: f64,
    pub max: f64,
}

impl ColumnRange {
    /// Returns `None` for an empty slice.
    pub fn of(values: &[f64]) -> Option<Self> {
        let (first, rest) = values.split_first()?;
        let mut range = ColumnRange {
            min: *first,
            max: *first,
        };
        for v in rest {
            range.min = range.min.min(*v);
            range.max = range.max.max(*v);
        }
        Some(range)
    }

    pub fn is_degenerate(&self) -> bool {
        self.max <= self.min
    }

    /// Map a value from this range onto [SCALE_MIN, SCALE_MAX].
    pub fn rescale(&self, value: f64) -> f64 {
        if self.is_degenerate() {
            return SCALE_MIDPOINT;
        }
        SCALE_MIN + (value - self.min) / (self.max - self.min) * (SCALE_MAX - SCALE_MIN)
    }
}

/// Rescale every value in `values` onto 0-100 relative to the population.
///
/// Rank order is preserved. An empty slice yields an empty vector, and a
/// population with no spread maps every member to the midpoint (50.0).
/// Inputs must be finite; `normalize_players` checks this before calling.
pub fn normalize(values: &[f64]) -> Vec<f64> {
    match ColumnRange::of(values) {
        Some(range) => values.iter().map(|v| range.rescale(*v)).collect(),
        None => Vec::new(),
    }
}

/// The three sub-scores of one player after normalization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedScores {
    pub perf: f64,
    pub contract: f64,
    pub fit: f64,
}

/// Normalize the performance, contract and fit columns across `players`.
///
/// The contract column is clipped at `contract_clip` first so that one
/// outlier ratio does not squash the rest of the population. The output is
/// index-aligned with `players`.
pub fn normalize_players(
    players: &[PlayerRecord],
    contract_clip: f64,
) -> Result<Vec<NormalizedScores>, TradeError> {
    for p in players {
        let fields = [
            ("perf_score", p.perf_score),
            ("contract_score", p.contract_score),
            ("fit_score", p.fit_score),
        ];
        for (field, value) in fields {
            if !value.is_finite() {
                return Err(TradeError::domain(
                    format!("player `{}`", p.name),
                    field,
                    format!("must be a finite number, got {value}"),
                ));
            }
        }
    }

    let perf: Vec<f64> = players.iter().map(|p| p.perf_score).collect();
    let contract: Vec<f64> = players
        .iter()
        .map(|p| p.contract_score.min(contract_clip))
        .collect();
    let fit: Vec<f64> = players.iter().map(|p| p.fit_score).collect();

    for (name, column) in [("perf_score", &perf), ("contract_score", &contract), ("fit_score", &fit)] {
        if players.len() > 1 && ColumnRange::of(column).is_some_and(|r| r.is_degenerate()) {
            warn!("{name} has no spread across {} players; all map to {SCALE_MIDPOINT}", players.len());
        }
    }

    let perf = normalize(&perf);
    let contract = normalize(&contract);
    let fit = normalize(&fit);

    Ok(perf
        .into_iter()
        .zip(contract)
        .zip(fit)
        .map(|((perf, contract), fit)| NormalizedScores { perf, contract, fit })
        .collect())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::valuation::players::test_support::player;

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() < epsilon
    }

    #[test]
    fn normalize_known_values() {
        let out = normalize(&[10.0, 20.0, 30.0, 15.0]);
        assert!(approx_eq(out[0], 0.0, 1e-10));
        assert!(approx_eq(out[1], 50.0, 1e-10));
        assert!(approx_eq(out[2], 100.0, 1e-10));
        assert!(approx_eq(out[3], 25.0, 1e-10));
    }

    #[test]
    fn normalize_preserves_rank_order() {
        let values = [3.2, -1.0, 7.7, 0.0, 7.6, 2.5];
        let out = normalize(&values);
        for i in 0..values.len() {
            for j in 0..values.len() {
                if values[i] < values[j] {
                    assert!(out[i] < out[j], "{} vs {}", values[i], values[j]);
                }
            }
        }
    }

    #[test]
    fn normalize_all_equal_maps_to_midpoint() {
        let out = normalize(&[4.0, 4.0, 4.0]);
        assert_eq!(out, vec![50.0, 50.0, 50.0]);
    }

    #[test]
    fn normalize_single_value_maps_to_midpoint() {
        assert_eq!(normalize(&[42.0]), vec![50.0]);
    }

    #[test]
    fn normalize_small_magnitude_column_keeps_its_spread() {
        let out = normalize(&[1e-10, 2e-10, 3e-10]);
        assert!(approx_eq(out[0], 0.0, 1e-6));
        assert!(approx_eq(out[1], 50.0, 1e-6));
        assert!(approx_eq(out[2], 100.0, 1e-6));
    }

    #[test]
    fn normalize_tiny_spread_on_large_values_is_not_flattened() {
        let out = normalize(&[1000.0, 1000.0 + 1e-9, 1000.0]);
        assert!(out[0] < out[1]);
        assert_eq!(out[0], out[2]);
    }

    #[test]
    fn normalize_empty_is_empty() {
        assert!(normalize(&[]).is_empty());
    }

    #[test]
    fn normalize_does_not_touch_source() {
        let values = vec![1.0, 2.0, 3.0];
        let _ = normalize(&values);
        assert_eq!(values, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn column_range_of_empty_is_none() {
        assert!(ColumnRange::of(&[]).is_none());
    }

    #[test]
    fn normalize_players_clips_contract_outliers() {
        let players = vec![
            player("A", 25, 10.0, 90.0, 1.0, 80.0),
            player("B", 25, 10.0, 60.0, 3.0, 55.0),
            player("C", 25, 10.0, 30.0, 40.0, 30.0),
        ];
        let scores = normalize_players(&players, 5.0).unwrap();

        // Contract column becomes [1, 3, 5] after the clip.
        assert!(approx_eq(scores[0].contract, 0.0, 1e-10));
        assert!(approx_eq(scores[1].contract, 50.0, 1e-10));
        assert!(approx_eq(scores[2].contract, 100.0, 1e-10));

        assert!(approx_eq(scores[0].perf, 100.0, 1e-10));
        assert!(approx_eq(scores[2].fit, 0.0, 1e-10));
    }

    #[test]
    fn normalize_players_rejects_non_finite_scores() {
        let players = vec![
            player("A", 25, 10.0, 90.0, 1.0, 80.0),
            player("B", 25, 10.0, f64::NAN, 3.0, 55.0),
        ];
        let err = normalize_players(&players, 5.0).unwrap_err();
        assert_eq!(
            err,
            TradeError::Domain {
                subject: "player `B`".into(),
                field: "perf_score".into(),
                message: "must be a finite number, got NaN".into(),
            }
        );
    }
}
