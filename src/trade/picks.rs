// Draft-pick valuation: base value by slot, discounted for protection and
// for how many drafts out the pick conveys.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TradeError;

/// Base value by pick number (index 0 = pick #1). 30 first-rounders, 28
/// second-rounders.
const PICK_VALUES: [f64; 58] = [
    55.0, 45.0, 40.0, 36.0, 33.0, 30.0, 28.0, 26.0, 24.0, 22.0, //
    20.0, 18.5, 17.0, 15.5, 14.0, 13.0, 12.0, 11.0, 10.0, 9.5, //
    9.0, 8.5, 8.0, 7.5, 7.0, 6.5, 6.0, 5.5, 5.0, 4.5, //
    4.0, 3.8, 3.6, 3.4, 3.2, 3.0, 2.8, 2.6, 2.4, 2.2, //
    2.0, 1.9, 1.8, 1.7, 1.6, 1.5, 1.4, 1.3, 1.2, 1.1, //
    1.0, 0.9, 0.8, 0.7, 0.6, 0.5, 0.4, 0.3,
];

/// Value lost per year a pick sits in the future.
const FUTURE_DISCOUNT_PER_YEAR: f64 = 0.9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Protection {
    #[default]
    None,
    #[serde(rename = "TOP_3")]
    Top3,
    #[serde(rename = "TOP_5")]
    Top5,
    #[serde(rename = "TOP_10")]
    Top10,
    Lottery,
}

impl Protection {
    pub fn discount(self) -> f64 {
        match self {
            Protection::None => 1.0,
            Protection::Top3 => 0.70,
            Protection::Top5 => 0.75,
            Protection::Top10 => 0.80,
            Protection::Lottery => 0.85,
        }
    }
}

impl fmt::Display for Protection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Protection::None => "NONE",
            Protection::Top3 => "TOP_3",
            Protection::Top5 => "TOP_5",
            Protection::Top10 => "TOP_10",
            Protection::Lottery => "LOTTERY",
        };
        f.write_str(s)
    }
}

impl FromStr for Protection {
    type Err = TradeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "" | "NONE" => Ok(Protection::None),
            "TOP_3" | "TOP3" => Ok(Protection::Top3),
            "TOP_5" | "TOP5" => Ok(Protection::Top5),
            "TOP_10" | "TOP10" => Ok(Protection::Top10),
            "LOTTERY" => Ok(Protection::Lottery),
            other => Err(TradeError::Proposal(format!(
                "unknown pick protection `{other}`"
            ))),
        }
    }
}

/// A draft pick included in a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftPick {
    pub pick_number: u32,
    #[serde(default)]
    pub protection: Protection,
    #[serde(default)]
    pub years_out: u32,
}

impl DraftPick {
    pub fn value(&self) -> Result<f64, TradeError> {
        pick_value(self.pick_number, self.protection, self.years_out)
    }
}

impl fmt::Display for DraftPick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pick #{}", self.pick_number)?;
        if self.protection != Protection::None {
            write!(f, " ({})", self.protection)?;
        }
        if self.years_out > 0 {
            write!(f, " +{}y", self.years_out)?;
        }
        Ok(())
    }
}

/// Parses `N`, `N:PROTECTION` or `N:PROTECTION:YEARS`, e.g. `12:TOP_10:2`.
impl FromStr for DraftPick {
    type Err = TradeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || {
            TradeError::Proposal(format!(
                "malformed draft pick `{s}`, expected N[:PROTECTION[:YEARS]]"
            ))
        };
        let mut parts = s.split(':');
        let pick_number = parts
            .next()
            .and_then(|p| p.trim().parse::<u32>().ok())
            .ok_or_else(bad)?;
        let protection = match parts.next() {
            Some(p) => p.parse()?,
            None => Protection::None,
        };
        let years_out = match parts.next() {
            Some(y) => y.trim().parse::<u32>().map_err(|_| bad())?,
            None => 0,
        };
        if parts.next().is_some() {
            return Err(bad());
        }
        Ok(DraftPick {
            pick_number,
            protection,
            years_out,
        })
    }
}

/// Value of a pick, rounded to one decimal. Pick numbers outside 1-58 do not
/// exist and fail to resolve.
pub fn pick_value(pick_number: u32, protection: Protection, years_out: u32) -> Result<f64, TradeError> {
    let base = pick_number
        .checked_sub(1)
        .and_then(|i| PICK_VALUES.get(i as usize))
        .ok_or_else(|| TradeError::Resolution {
            what: format!("draft pick #{pick_number}"),
        })?;
    let future = FUTURE_DISCOUNT_PER_YEAR.powi(years_out.min(i32::MAX as u32) as i32);
    let value = base * protection.discount() * future;
    Ok((value * 10.0).round() / 10.0)
}
