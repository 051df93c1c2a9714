// Valuation engine: sub-score normalization, composite trade value, tiers,
// and the salary-matching rule.

pub mod composite;
pub mod normalize;
pub mod players;
pub mod salary_rule;
