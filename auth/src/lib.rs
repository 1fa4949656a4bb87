//! # auth
//!
//! Bearer token authentication for the NeonPanel MCP server:
//! - RS256 access token validation against a remote JSON Web Key Set
//! - the immutable [`AuthContext`] handed to RPC handlers and SSE sessions
//! - `Authorization` header parsing and `WWW-Authenticate` challenges
//! - the outbound HTTP client builder shared with the NeonPanel gateway
//!
//! ## Usage
//!
//! ```rust,ignore
//! use auth::{jwks::JwksClient, validator::TokenValidator, AuthContext};
//!
//! let validated = validator.validate(token).await?;
//! let ctx = AuthContext::from(validated);
//! ```

pub mod bearer;
pub mod challenge;
pub mod context;
pub mod error;
pub mod http;
pub mod jwks;
pub mod validator;

pub use context::{AuthContext, ValidatedAccessToken};
pub use error::{Error, ErrorKind, TokenErrorKind, TokenValidationError};
pub use validator::TokenValidator;
