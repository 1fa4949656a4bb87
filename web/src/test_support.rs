//! Shared fixtures for router tests: a fully wired [`AppState`] whose token
//! validator trusts the RSA fixture key, and a helper minting tokens with it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use auth::jwks::StaticKeySource;
use auth::validator::TokenValidatorConfig;
use auth::TokenValidator;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use mcp::handlers::{build_dispatcher, ServerInfo};
use mcp::tool::{Tool, ToolContext, ToolError};
use mcp::ToolRegistry;
use serde_json::{json, Value};
use service::config::Config;
use sse::{Manager, ManagerConfig, SessionRegistry};

use crate::AppState;

const JWKS: &str = include_str!("../../auth/testdata/jwks.json");
const PRIVATE_KEY: &[u8] = include_bytes!("../../auth/testdata/rsa_private.pem");

pub(crate) const ISSUER: &str = "https://my.neonpanel.com";
pub(crate) const AUDIENCE: &str = "mcp://neonpanel";

pub(crate) fn app_state(max_connections: usize) -> AppState {
    app_state_with_args(&[], max_connections)
}

/// Like [`app_state`], with extra command line flags for the configuration.
pub(crate) fn app_state_with_args(args: &[&str], max_connections: usize) -> AppState {
    let mut argv = vec!["neonpanel-mcp"];
    argv.extend_from_slice(args);
    let config = Config::from_args(argv).unwrap();

    let keys = StaticKeySource::from_jwks_json(JWKS).unwrap();
    let validator = TokenValidator::new(
        Arc::new(keys),
        TokenValidatorConfig {
            issuer: ISSUER.to_string(),
            audience: AUDIENCE.to_string(),
            required_scopes: vec![],
        },
    );

    let mut tools = ToolRegistry::new();
    tools.register(WhoAmI).unwrap();
    let dispatcher = build_dispatcher(ServerInfo::from(&config), Arc::new(tools));

    let manager = Manager::new(ManagerConfig {
        heartbeat_interval: Duration::from_secs(60),
        max_connections,
        message_endpoint: "/messages".to_string(),
    });

    AppState::new(
        config,
        Arc::new(manager),
        Arc::new(SessionRegistry::new()),
        Arc::new(dispatcher),
        Arc::new(validator),
    )
}

/// A valid RS256 token for `subject`. `jti` keeps tokens for the same subject distinct.
pub(crate) fn token_for(subject: &str, jti: &str) -> String {
    let now = chrono::Utc::now().timestamp();
    sign(json!({
        "iss": ISSUER,
        "aud": AUDIENCE,
        "sub": subject,
        "jti": jti,
        "scope": "neonpanel.mcp",
        "iat": now,
        "exp": now + 600,
    }))
}

pub(crate) fn sign(claims: Value) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some("test-key-1".to_string());
    encode(&header, &claims, &EncodingKey::from_rsa_pem(PRIVATE_KEY).unwrap()).unwrap()
}

pub(crate) async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Reports who called it.
pub(crate) struct WhoAmI;

#[async_trait]
impl Tool for WhoAmI {
    fn name(&self) -> &str {
        "whoami"
    }

    fn description(&self) -> &str {
        "Returns the caller's subject"
    }

    fn input_schema(&self) -> Value {
        json!({"type": "object"})
    }

    async fn execute(&self, _args: Value, ctx: &ToolContext) -> Result<Value, ToolError> {
        Ok(json!({ "subject": ctx.auth.subject() }))
    }
}
