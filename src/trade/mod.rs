// Trade construction: name index, draft picks, simulation, historical replay.

pub mod backtest;
pub mod picks;
pub mod roster;
pub mod simulator;
