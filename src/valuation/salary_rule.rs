// Salary-matching rule: how much incoming salary a team may take back for a
// given outgoing amount.

use serde::{Deserialize, Serialize};

use crate::config::{self, ConfigError, SalaryFormula, SalaryRuleConfig};
use crate::error::TradeError;

/// Why a rule evaluation came out the way it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    WithinCeiling,
    IncomingExceedsCeiling,
}

/// Outcome of checking one direction of a trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDecision {
    pub legal: bool,
    pub reason: ReasonCode,
    pub outgoing: f64,
    pub incoming: f64,
    /// The ceiling the incoming amount was checked against.
    pub max_incoming: f64,
    pub rule_version: String,
}

/// A salary-matching rule. The simulator only talks to this trait so a richer
/// (tax- or apron-aware) engine can be swapped in.
pub trait SalaryRule {
    fn rule_version(&self) -> &str;

    /// Largest legal incoming salary for `outgoing`.
    fn max_incoming_salary(&self, outgoing: f64) -> Result<f64, TradeError>;

    fn evaluate(&self, outgoing: f64, incoming: f64) -> Result<RuleDecision, TradeError> {
        check_amount("incoming", incoming)?;
        let max_incoming = self.max_incoming_salary(outgoing)?;
        let legal = incoming <= max_incoming;
        Ok(RuleDecision {
            legal,
            reason: if legal {
                ReasonCode::WithinCeiling
            } else {
                ReasonCode::IncomingExceedsCeiling
            },
            outgoing,
            incoming,
            max_incoming,
            rule_version: self.rule_version().to_string(),
        })
    }

    fn is_salary_match(&self, outgoing: f64, incoming: f64) -> Result<bool, TradeError> {
        Ok(self.evaluate(outgoing, incoming)?.legal)
    }
}

/// Round a money amount (millions) to the cent.
pub fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

fn check_amount(field: &str, amount: f64) -> Result<(), TradeError> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(TradeError::domain(
            "salary rule input",
            field,
            format!("must be a non-negative salary, got {amount}"),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tiered rule
// ---------------------------------------------------------------------------

/// Contiguous tiers on the outgoing amount, each with its own linear formula.
/// Upper bounds are inclusive, so an exact boundary uses the lower tier.
#[derive(Debug, Clone)]
pub struct TieredSalaryRule {
    rule_version: String,
    /// (max outgoing inclusive, formula), ascending.
    tiers: Vec<(f64, SalaryFormula)>,
    above: SalaryFormula,
}

impl TieredSalaryRule {
    pub fn new(cfg: &SalaryRuleConfig) -> Result<Self, ConfigError> {
        config::validate_salary_rule(cfg)?;
        Ok(Self::from_validated(cfg))
    }

    fn from_validated(cfg: &SalaryRuleConfig) -> Self {
        Self {
            rule_version: cfg.rule_version.clone(),
            tiers: cfg
                .tiers
                .iter()
                .map(|t| {
                    (
                        t.max_outgoing,
                        SalaryFormula {
                            multiplier: t.multiplier,
                            cushion: t.cushion,
                        },
                    )
                })
                .collect(),
            above: cfg.above,
        }
    }

    fn formula_for(&self, outgoing: f64) -> SalaryFormula {
        self.tiers
            .iter()
            .find(|(max_outgoing, _)| outgoing <= *max_outgoing)
            .map_or(self.above, |(_, formula)| *formula)
    }
}

impl Default for TieredSalaryRule {
    /// Outgoing up to 7.5M: 200% + 0.25M; up to 29M: +7.5M; above: 125% + 0.25M.
    fn default() -> Self {
        Self::from_validated(&SalaryRuleConfig::default())
    }
}

impl SalaryRule for TieredSalaryRule {
    fn rule_version(&self) -> &str {
        &self.rule_version
    }

    fn max_incoming_salary(&self, outgoing: f64) -> Result<f64, TradeError> {
        check_amount("outgoing", outgoing)?;
        let f = self.formula_for(outgoing);
        Ok(round_cents(f.multiplier * outgoing + f.cushion))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() < epsilon
    }

    fn rule() -> TieredSalaryRule {
        TieredSalaryRule::default()
    }

    #[test]
    fn max_incoming_at_tier_boundaries() {
        let r = rule();
        assert_eq!(r.max_incoming_salary(7.5).unwrap(), 15.25);
        assert_eq!(r.max_incoming_salary(29.0).unwrap(), 36.5);
        assert_eq!(r.max_incoming_salary(40.0).unwrap(), 50.25);
    }

    #[test]
    fn max_incoming_inside_each_tier() {
        let r = rule();
        assert_eq!(r.max_incoming_salary(5.0).unwrap(), 10.25);
        assert_eq!(r.max_incoming_salary(20.0).unwrap(), 27.5);
        assert_eq!(r.max_incoming_salary(0.0).unwrap(), 0.25);
    }

    #[test]
    fn exact_boundary_match() {
        let r = rule();
        assert!(r.is_salary_match(7.5, 15.25).unwrap());
        assert!(!r.is_salary_match(7.5, 15.26).unwrap());
    }

    #[test]
    fn boundary_jumps_are_bounded_by_slope_change() {
        let r = rule();
        let eps = 0.01;
        // At 7.5: tier 1 gives 15.25, tier 2 just above gives ~15.01.
        let below = r.max_incoming_salary(7.5).unwrap();
        let above = r.max_incoming_salary(7.5 + eps).unwrap();
        assert!((below - above).abs() <= 0.25 + 2.0 * eps + 1e-9);

        // At 29.0: tier 2 gives 36.5, tier 3 just above gives ~36.51.
        let below = r.max_incoming_salary(29.0).unwrap();
        let above = r.max_incoming_salary(29.0 + eps).unwrap();
        assert!((below - above).abs() <= 0.25 * 29.0 - 7.25 + 1.25 * eps + 1e-9);
    }

    #[test]
    fn match_is_monotone_in_incoming() {
        let r = rule();
        for outgoing in [0.0, 3.3, 7.5, 12.0, 29.0, 35.5, 52.0] {
            let mut seen_illegal = false;
            for step in 0..=800 {
                let incoming = step as f64 * 0.1;
                let ok = r.is_salary_match(outgoing, incoming).unwrap();
                if seen_illegal {
                    assert!(!ok, "outgoing {outgoing}: {incoming} legal after a smaller illegal amount");
                }
                if !ok {
                    seen_illegal = true;
                }
            }
        }
    }

    #[test]
    fn evaluate_reports_reason_and_ceiling() {
        let r = rule();
        let ok = r.evaluate(20.0, 27.5).unwrap();
        assert!(ok.legal);
        assert_eq!(ok.reason, ReasonCode::WithinCeiling);
        assert!(approx_eq(ok.max_incoming, 27.5, 1e-10));
        assert_eq!(ok.rule_version, "tiered_2023");

        let bad = r.evaluate(20.0, 28.0).unwrap();
        assert!(!bad.legal);
        assert_eq!(bad.reason, ReasonCode::IncomingExceedsCeiling);
        assert!(approx_eq(bad.incoming, 28.0, 1e-10));
    }

    #[test]
    fn sub_cent_overage_is_not_a_match() {
        let r = rule();
        assert_eq!(r.max_incoming_salary(7.5).unwrap(), 15.25);
        assert!(!r.is_salary_match(7.5, 15.254).unwrap());
        assert!(!r.is_salary_match(7.5, 15.250_001).unwrap());
        let decision = r.evaluate(7.5, 15.254).unwrap();
        assert_eq!(decision.reason, ReasonCode::IncomingExceedsCeiling);
    }

    #[test]
    fn negative_salary_is_a_domain_error() {
        let r = rule();
        assert!(matches!(
            r.max_incoming_salary(-1.0),
            Err(TradeError::Domain { ref field, .. }) if field == "outgoing"
        ));
        assert!(matches!(
            r.is_salary_match(10.0, -0.5),
            Err(TradeError::Domain { ref field, .. }) if field == "incoming"
        ));
        assert!(r.max_incoming_salary(f64::NAN).is_err());
    }

    #[test]
    fn custom_tiers_from_config() {
        let cfg = SalaryRuleConfig {
            rule_version: "strict_125".into(),
            tiers: vec![],
            above: SalaryFormula {
                multiplier: 1.25,
                cushion: 0.1,
            },
        };
        let r = TieredSalaryRule::new(&cfg).unwrap();
        assert_eq!(r.rule_version(), "strict_125");
        assert_eq!(r.max_incoming_salary(20.0).unwrap(), 25.1);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut cfg = SalaryRuleConfig::default();
        cfg.tiers.reverse();
        assert!(TieredSalaryRule::new(&cfg).is_err());
    }
}
