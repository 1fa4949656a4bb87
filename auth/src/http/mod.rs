//! Outbound HTTP client shared by the JWKS fetcher and the NeonPanel gateway.

mod client;
mod retry;

pub use client::{HttpClient, HttpClientBuilder, HttpClientConfig};
pub use retry::BackoffPolicy;
