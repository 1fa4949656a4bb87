use std::time::Duration;

use reqwest_middleware::ClientBuilder;
use reqwest_retry::RetryTransientMiddleware;

use super::BackoffPolicy;

#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub timeout: Duration,
    pub max_retries: u32,
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(15),
            max_retries: 2,
            user_agent: format!("neonpanel-mcp/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl From<&service::config::Config> for HttpClientConfig {
    fn from(config: &service::config::Config) -> Self {
        Self {
            timeout: config.neonpanel_http_timeout(),
            max_retries: config.http_max_retries,
            user_agent: format!("{}/{}", config.mcp_server_name, config.build_version),
        }
    }
}

/// HTTP client with retry middleware. Credentials are attached per request,
/// since every NeonPanel call carries the caller's own bearer token.
pub type HttpClient = reqwest_middleware::ClientWithMiddleware;

pub struct HttpClientBuilder {
    config: HttpClientConfig,
}

impl HttpClientBuilder {
    pub fn new() -> Self {
        Self {
            config: HttpClientConfig::default(),
        }
    }

    pub fn with_config(config: HttpClientConfig) -> Self {
        Self { config }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.config.max_retries = max_retries;
        self
    }

    pub fn build(self) -> Result<HttpClient, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(self.config.timeout)
            .user_agent(self.config.user_agent)
            .build()?;

        let retry_policy = BackoffPolicy::new(self.config.max_retries);
        Ok(ClientBuilder::new(client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build())
    }
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let builder = HttpClientBuilder::new();
        assert_eq!(builder.config.timeout, Duration::from_secs(15));
        assert_eq!(builder.config.max_retries, 2);
        assert!(builder.config.user_agent.starts_with("neonpanel-mcp/"));
    }

    #[test]
    fn test_config_is_taken_from_service_config() {
        let config = service::config::Config::from_args([
            "neonpanel-mcp",
            "--neonpanel-http-timeout-ms",
            "2500",
            "--http-max-retries",
            "4",
            "--build-version",
            "1.2.3",
        ])
        .unwrap();

        let http = HttpClientConfig::from(&config);
        assert_eq!(http.timeout, Duration::from_millis(2500));
        assert_eq!(http.max_retries, 4);
        assert_eq!(http.user_agent, "neonpanel-mcp/1.2.3");
    }

    #[tokio::test]
    async fn test_build_client() {
        let result = HttpClientBuilder::new().with_max_retries(0).build();
        assert!(result.is_ok());
    }
}
