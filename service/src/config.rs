use clap::builder::TypedValueParser as _;
use clap::Parser;
use dotenvy::dotenv;
use log::LevelFilter;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Default OAuth issuer used when `NEONPANEL_OAUTH_ISSUER` is not set.
pub const DEFAULT_OAUTH_ISSUER: &str = "https://my.neonpanel.com";

/// Default NeonPanel REST API base URL used when `NEONPANEL_API_BASE` is not set.
pub const DEFAULT_NEONPANEL_API_BASE: &str = "https://api.neonpanel.com";

#[derive(Clone, Debug, PartialEq)]
pub enum RustEnv {
    Development,
    Production,
    Staging,
}

#[derive(Debug, PartialEq, Eq)]
pub struct RustEnvParseError;

impl FromStr for RustEnv {
    type Err = RustEnvParseError;
    fn from_str(level: &str) -> Result<RustEnv, Self::Err> {
        match level.to_lowercase().as_str() {
            "development" => Ok(RustEnv::Development),
            "production" => Ok(RustEnv::Production),
            "staging" => Ok(RustEnv::Staging),
            _ => Err(RustEnvParseError),
        }
    }
}

impl fmt::Display for RustEnv {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RustEnv::Development => write!(f, "development"),
            RustEnv::Production => write!(f, "production"),
            RustEnv::Staging => write!(f, "staging"),
        }
    }
}

#[derive(Clone, Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// A list of full CORS origin URLs that are allowed to receive server responses.
    /// A single `*` allows any origin.
    #[arg(
        long,
        env,
        value_delimiter = ',',
        use_value_delimiter = true,
        default_value = "*"
    )]
    pub allowed_origins: Vec<String>,

    /// The host interface to listen for incoming connections
    #[arg(short, long, env, default_value = "127.0.0.1")]
    pub interface: Option<String>,

    /// The host TCP port to listen for incoming connections
    #[arg(short, long, env, default_value_t = 3000)]
    pub port: u16,

    /// Set the log level verbosity threshold (level) to control what gets displayed on console output
    #[arg(
        short,
        long,
        env,
        default_value_t = LevelFilter::Info,
        value_parser = clap::builder::PossibleValuesParser::new(["OFF", "ERROR", "WARN", "INFO", "DEBUG", "TRACE"])
            .map(|s| s.parse::<LevelFilter>().unwrap()),
        )]
    pub log_level_filter: LevelFilter,

    /// Set the Rust runtime environment to use.
    #[arg(
    short,
    long,
    env,
    default_value_t = RustEnv::Development,
    value_parser = clap::builder::PossibleValuesParser::new([
        "DEVELOPMENT", "PRODUCTION", "STAGING",
        "development", "production", "staging"
    ])
        .map(|s| s.parse::<RustEnv>().unwrap()),
    )]
    pub runtime_env: RustEnv,

    /// Build identifier reported by `initialize` and the health check.
    #[arg(long, env, default_value = "dev")]
    pub build_version: String,

    /// Server name reported to MCP clients and used as the OAuth challenge realm.
    #[arg(long, env, default_value = "neonpanel-mcp")]
    pub mcp_server_name: String,

    /// MCP protocol version announced in the `initialize` result.
    #[arg(long, env, default_value = "2025-01-01")]
    pub mcp_protocol_version: String,

    /// Interval between SSE heartbeat frames, in milliseconds.
    #[arg(long, env, default_value_t = 15000, value_parser = clap::value_parser!(u64).range(1000..))]
    pub sse_heartbeat_ms: u64,

    /// Maximum number of simultaneously open SSE sessions.
    #[arg(long, env, default_value_t = 1000, value_parser = clap::value_parser!(u32).range(1..))]
    pub sse_max_connections: u32,

    /// OAuth issuer expected in the `iss` claim of access tokens.
    #[arg(long, env, default_value = DEFAULT_OAUTH_ISSUER)]
    neonpanel_oauth_issuer: String,

    /// Location of the JSON Web Key Set used to verify access token signatures.
    #[arg(
        long,
        env,
        default_value = "https://my.neonpanel.com/.well-known/jwks.json"
    )]
    pub neonpanel_oauth_jwks_uri: String,

    /// Audience expected in the `aud` claim of access tokens.
    #[arg(long, env, default_value = "mcp://neonpanel")]
    pub neonpanel_oauth_expected_audience: String,

    /// Scopes every access token must carry, separated by commas or whitespace.
    /// Empty means any valid token from the trusted issuer is accepted.
    #[arg(long, env)]
    neonpanel_oauth_required_scopes: Option<String>,

    /// Scope advertised in authentication challenges when no required scopes are configured.
    #[arg(long, env, default_value = "neonpanel.mcp")]
    pub neonpanel_oauth_default_scope: String,

    /// Maximum number of signing keys held in the JWKS cache.
    #[arg(long, env, default_value_t = 10, value_parser = clap::value_parser!(u32).range(1..))]
    pub neonpanel_jwks_cache_max_entries: u32,

    /// Maximum age of a cached signing key, in milliseconds.
    #[arg(long, env = "NEONPANEL_JWKS_CACHE_MS", default_value_t = 600_000, value_parser = clap::value_parser!(u64).range(1..))]
    pub neonpanel_jwks_cache_ms: u64,

    /// Maximum number of JWKS fetches allowed per rolling minute.
    #[arg(long, env, default_value_t = 30, value_parser = clap::value_parser!(u32).range(1..))]
    pub neonpanel_jwks_requests_per_minute: u32,

    /// The base URL of the NeonPanel REST API.
    #[arg(long, env, default_value = DEFAULT_NEONPANEL_API_BASE)]
    neonpanel_api_base: String,

    /// Timeout for outbound NeonPanel and JWKS requests, in milliseconds.
    #[arg(long, env, default_value_t = 15000, value_parser = clap::value_parser!(u64).range(1..))]
    pub neonpanel_http_timeout_ms: u64,

    /// Number of retries for transient outbound HTTP failures.
    #[arg(long, env, default_value_t = 2)]
    pub http_max_retries: u32,

    /// Maximum accepted size of a JSON-RPC request body, in bytes.
    #[arg(long, env, default_value_t = 1_048_576)]
    pub request_body_limit_bytes: usize,

    /// Length of the per-client request window on the JSON-RPC endpoints, in milliseconds.
    #[arg(long, env, default_value_t = 10_000, value_parser = clap::value_parser!(u64).range(1..))]
    pub rate_limit_window_ms: u64,

    /// Requests one client may make per window before receiving 429.
    #[arg(long, env, default_value_t = 30, value_parser = clap::value_parser!(u32).range(1..))]
    pub rate_limit_max: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        // Load .env file first
        dotenv().ok();
        // Then parse the command line parameters and flags
        Config::parse()
    }

    /// Builds a configuration from an explicit argument list without reading `.env`.
    /// The first item is the program name.
    pub fn from_args<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Config::try_parse_from(args)
    }

    /// The OAuth issuer without trailing slashes.
    pub fn oauth_issuer(&self) -> &str {
        self.neonpanel_oauth_issuer.trim_end_matches('/')
    }

    /// The NeonPanel API base URL without trailing slashes.
    pub fn neonpanel_api_base(&self) -> &str {
        self.neonpanel_api_base.trim_end_matches('/')
    }

    /// Required scopes split on commas and whitespace, empty entries dropped.
    pub fn required_scopes(&self) -> Vec<String> {
        self.neonpanel_oauth_required_scopes
            .as_deref()
            .unwrap_or_default()
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|scope| !scope.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// The scope string advertised in `WWW-Authenticate` challenges.
    pub fn challenge_scope(&self) -> String {
        let required = self.required_scopes();
        if required.is_empty() {
            self.neonpanel_oauth_default_scope.clone()
        } else {
            required.join(" ")
        }
    }

    pub fn sse_heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.sse_heartbeat_ms)
    }

    pub fn jwks_cache_max_age(&self) -> Duration {
        Duration::from_millis(self.neonpanel_jwks_cache_ms)
    }

    pub fn neonpanel_http_timeout(&self) -> Duration {
        Duration::from_millis(self.neonpanel_http_timeout_ms)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_millis(self.rate_limit_window_ms)
    }

    pub fn allows_any_origin(&self) -> bool {
        self.allowed_origins.iter().any(|origin| origin.trim() == "*")
    }

    pub fn runtime_env(&self) -> RustEnv {
        self.runtime_env.clone()
    }

    pub fn is_production(&self) -> bool {
        self.runtime_env() == RustEnv::Production
    }
}
