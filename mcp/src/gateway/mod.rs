//! Outbound access to the NeonPanel REST API.

pub mod neonpanel;

pub use neonpanel::NeonPanelClient;
