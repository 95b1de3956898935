//! Common infrastructure for the tc_reader SNMP bridge.
//!
//! - [`command`]: the [`CommandExecutor`] contract, the production
//!   [`SystemCommand`] and the [`FixtureExecutor`] test double
//! - [`error`]: the [`TcReaderError`] type shared by all crates
//!
//! # Example
//!
//! ```ignore
//! use tc_reader_common::{CommandExecutor, SystemCommand, TcReaderResult, TC_CMD};
//!
//! async fn qdisc_stats(iface: &str) -> TcReaderResult<String> {
//!     let args: Vec<String> = ["-s", "qdisc", "show", "dev", iface]
//!         .iter()
//!         .map(|s| s.to_string())
//!         .collect();
//!     SystemCommand.execute(TC_CMD, &args).await
//! }
//! ```

pub mod command;
pub mod error;

// Re-export commonly used items at crate root
pub use command::{
    command_line, CommandExecutor, ExecResult, FixtureExecutor, FixtureResponse, Invocation,
    SystemCommand, TC_CMD,
};
pub use error::{TcReaderError, TcReaderResult};
