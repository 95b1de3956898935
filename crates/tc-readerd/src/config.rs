//! Configuration file support for tc_readerd
//!
//! Loads and validates the daemon configuration from a TOML file. Every
//! field is optional and falls back to its default.
//!
//! ```toml
//! tc_cmd_path = "/sbin/tc"
//! parse_interval_secs = 5
//! ifaces = ["eth0", "eth1"]
//! debug = false
//!
//! [[users]]
//! name = "alice"
//! upload_class = "eth0:2:10"
//! download_class = "eth1:2:10"
//! ```

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tc_reader_common::{TcReaderError, TcReaderResult, TC_CMD};

use crate::types::{Direction, UserClass};

/// Locations searched, in order, when no path is given on the command line.
pub const DEFAULT_CONFIG_PATHS: [&str; 2] = ["./tc_reader.toml", "/etc/tc_reader.toml"];

/// A user whose traffic is split over one upload and one download class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserConfig {
    /// User name exported under the user leaves.
    pub name: String,

    /// Composite name of the class carrying the user's upload, e.g. "eth0:2:10"
    pub upload_class: String,

    /// Composite name of the class carrying the user's download
    pub download_class: String,
}

/// Complete tc_readerd configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TcReaderConfig {
    /// Path to the tc binary
    #[serde(default = "default_tc_cmd_path")]
    pub tc_cmd_path: String,

    /// Seconds between two sampling cycles
    #[serde(default = "default_parse_interval")]
    pub parse_interval_secs: u64,

    /// Arguments listing qdisc statistics; the interface name is appended
    #[serde(default = "default_tc_qdisc_stats")]
    pub tc_qdisc_stats: Vec<String>,

    /// Arguments listing class statistics; the interface name is appended
    #[serde(default = "default_tc_class_stats")]
    pub tc_class_stats: Vec<String>,

    /// Interfaces to sample
    #[serde(default = "default_ifaces")]
    pub ifaces: Vec<String>,

    /// Users mapped onto classes
    #[serde(default)]
    pub users: Vec<UserConfig>,

    /// Verbose logging
    #[serde(default)]
    pub debug: bool,
}

// Default functions
fn default_tc_cmd_path() -> String {
    TC_CMD.to_string()
}

fn default_parse_interval() -> u64 {
    5
}

fn default_tc_qdisc_stats() -> Vec<String> {
    ["-s", "qdisc", "show", "dev"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_tc_class_stats() -> Vec<String> {
    ["-s", "class", "show", "dev"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_ifaces() -> Vec<String> {
    vec!["eth0".to_string()]
}

impl Default for TcReaderConfig {
    fn default() -> Self {
        Self {
            tc_cmd_path: default_tc_cmd_path(),
            parse_interval_secs: default_parse_interval(),
            tc_qdisc_stats: default_tc_qdisc_stats(),
            tc_class_stats: default_tc_class_stats(),
            ifaces: default_ifaces(),
            users: Vec::new(),
            debug: false,
        }
    }
}

impl TcReaderConfig {
    /// Parses a configuration from TOML text.
    pub fn from_toml(content: &str) -> TcReaderResult<Self> {
        toml::from_str(content)
            .map_err(|e| TcReaderError::config(format!("Failed to parse config: {}", e)))
    }

    /// Load configuration from file, falling back to defaults if file not found
    pub fn load_or_default(path: impl AsRef<Path>) -> TcReaderResult<Self> {
        let path = path.as_ref();

        match fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| {
                TcReaderError::config(format!(
                    "Failed to parse config file {}: {}",
                    path.display(),
                    e
                ))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(TcReaderError::Io(e)),
        }
    }

    /// Returns the first of [`DEFAULT_CONFIG_PATHS`] that exists.
    pub fn locate() -> Option<PathBuf> {
        DEFAULT_CONFIG_PATHS
            .iter()
            .map(PathBuf::from)
            .find(|path| path.is_file())
    }

    /// Time between two sampling cycles
    pub fn parse_interval(&self) -> Duration {
        Duration::from_secs(self.parse_interval_secs)
    }

    /// Full argument list for the qdisc listing of `iface`.
    pub fn qdisc_args(&self, iface: &str) -> Vec<String> {
        with_iface(&self.tc_qdisc_stats, iface)
    }

    /// Full argument list for the class listing of `iface`.
    pub fn class_args(&self, iface: &str) -> Vec<String> {
        with_iface(&self.tc_class_stats, iface)
    }

    /// Maps every configured class to the user and direction it feeds.
    pub fn user_classes(&self) -> HashMap<String, UserClass> {
        let mut classes = HashMap::with_capacity(self.users.len() * 2);
        for user in &self.users {
            classes.insert(
                user.upload_class.clone(),
                UserClass::new(Direction::Upload, &user.name),
            );
            classes.insert(
                user.download_class.clone(),
                UserClass::new(Direction::Download, &user.name),
            );
        }
        classes
    }

    /// Validate configuration
    pub fn validate(&self) -> TcReaderResult<()> {
        if self.tc_cmd_path.is_empty() {
            return Err(TcReaderError::config("tc_cmd_path must not be empty"));
        }

        if self.parse_interval_secs == 0 {
            return Err(TcReaderError::config("parse_interval_secs must be > 0"));
        }

        if self.ifaces.is_empty() {
            return Err(TcReaderError::config("ifaces must not be empty"));
        }

        if self.ifaces.iter().any(|iface| iface.is_empty()) {
            return Err(TcReaderError::config("ifaces must not contain empty names"));
        }

        let mut seen = HashSet::new();
        for user in &self.users {
            if user.name.is_empty() {
                return Err(TcReaderError::config("users: name must not be empty"));
            }
            for class in [&user.upload_class, &user.download_class] {
                if class.is_empty() {
                    return Err(TcReaderError::config(format!(
                        "users: {} has an empty class",
                        user.name
                    )));
                }
                if !seen.insert(class.as_str()) {
                    return Err(TcReaderError::config(format!(
                        "users: class {} is mapped more than once",
                        class
                    )));
                }
            }
        }

        Ok(())
    }
}

fn with_iface(template: &[String], iface: &str) -> Vec<String> {
    let mut args = Vec::with_capacity(template.len() + 1);
    args.extend_from_slice(template);
    args.push(iface.to_string());
    args
}
