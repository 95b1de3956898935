//! Test infrastructure for tc_reader
//!
//! Provides:
//! - Captured `tc -s qdisc show` / `tc -s class show` outputs with the
//!   samples they must produce
//! - pass_persist request scripts
//! - Verification of the lines written back to snmpd

pub mod fixtures;
mod verification;

pub use fixtures::*;
pub use verification::*;
