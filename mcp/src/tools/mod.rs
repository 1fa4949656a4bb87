//! Tools backed by the NeonPanel REST API.

pub mod neonpanel;

pub use neonpanel::register_neonpanel_tools;
