// Library root: re-exports all modules so integration tests and the binary
// share one public API.

pub mod config;
pub mod error;
pub mod query;
pub mod scenario;
pub mod trade;
pub mod valuation;
