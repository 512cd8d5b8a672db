//! IRF command line
//!
//! ```text
//! irf init
//! irf config set api_key sk-ant-...
//! irf framework import semiconductor_fabless.yaml
//! irf report new NVDA --framework semiconductor_fabless --quarter "Q3 2025" --inputs nvda.json
//! irf report generate NVDA
//! irf report qa NVDA
//! irf report export NVDA --format json
//! ```
//!
//! Exit status is 0 on success, 1 when a command fails and 2 for usage
//! errors.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod cli;
pub mod commands;
pub mod config;
pub mod inputs;
pub mod logging;

pub use commands::{dispatch, App};
pub use config::{AppConfig, ConfigError};
