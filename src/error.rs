// Error taxonomy shared by the valuation and trade layers.

use thiserror::Error;

/// Which side of a proposal a name or pick belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    A,
    B,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::A => write!(f, "side A"),
            Side::B => write!(f, "side B"),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum TradeError {
    /// A player name or draft pick could not be found.
    #[error("cannot resolve {what}")]
    Resolution { what: String },

    /// The same name occurs on more than one row of the dataset.
    #[error("player name `{name}` is ambiguous: {count} rows share it")]
    Ambiguous { name: String, count: usize },

    /// The proposal itself is malformed (empty side, overlapping sides, ...).
    #[error("invalid trade proposal: {0}")]
    Proposal(String),

    /// Upstream data that violates the engine's input contract.
    #[error("invalid value for `{field}` of {subject}: {message}")]
    Domain {
        subject: String,
        field: String,
        message: String,
    },
}

impl TradeError {
    pub(crate) fn unknown_player(name: &str) -> Self {
        TradeError::Resolution {
            what: format!("player `{name}`"),
        }
    }

    pub(crate) fn domain(
        subject: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        TradeError::Domain {
            subject: subject.into(),
            field: field.into(),
            message: message.into(),
        }
    }
}
