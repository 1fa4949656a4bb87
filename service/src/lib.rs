//! Process-wide infrastructure shared by every crate in the workspace:
//! command line / environment configuration and the global logger.

pub mod config;
pub mod logging;
