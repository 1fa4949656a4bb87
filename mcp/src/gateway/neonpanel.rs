use auth::http::HttpClient;
use log::*;
use serde_json::Value;

use crate::error::{Error, ErrorKind, GatewayErrorKind};

/// Thin client for the NeonPanel REST API. Every request carries the bearer
/// token of the caller it is made for.
#[derive(Clone)]
pub struct NeonPanelClient {
    http: HttpClient,
    base_url: String,
}

impl NeonPanelClient {
    pub fn new(http: HttpClient, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `GET {base}{path}` with `query`, returning the decoded JSON body.
    pub async fn get(
        &self,
        path: &str,
        query: &[(&str, String)],
        bearer: &str,
    ) -> Result<Value, Error> {
        let url = format!("{}{}", self.base_url, path);
        debug!("NeonPanel GET {path}");

        let response = self
            .http
            .get(&url)
            .query(query)
            .bearer_auth(bearer)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!("NeonPanel GET {path} responded with {status}");
            return Err(Error {
                source: None,
                error_kind: ErrorKind::Gateway(GatewayErrorKind::Status(status.as_u16())),
            });
        }

        response.json::<Value>().await.map_err(|err| Error {
            source: Some(Box::new(err)),
            error_kind: ErrorKind::Gateway(GatewayErrorKind::InvalidResponse),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use auth::http::HttpClientBuilder;
    use mockito::Matcher;
    use serde_json::json;

    fn client(base: String) -> NeonPanelClient {
        let http = HttpClientBuilder::new()
            .with_max_retries(0)
            .build()
            .unwrap();
        NeonPanelClient::new(http, format!("{base}/"))
    }

    #[tokio::test]
    async fn test_get_sends_bearer_and_query() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v1/companies")
            .match_header("authorization", "Bearer caller-token")
            .match_query(Matcher::UrlEncoded("page".into(), "2".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"data": [{"uuid": "c-1"}]}"#)
            .create_async()
            .await;

        let body = client(server.url())
            .get("/api/v1/companies", &[("page", "2".to_string())], "caller-token")
            .await
            .unwrap();

        assert_eq!(body, json!({"data": [{"uuid": "c-1"}]}));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_non_success_status_is_gateway_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v1/reports")
            .with_status(403)
            .with_body(r#"{"message": "forbidden"}"#)
            .create_async()
            .await;

        let err = client(server.url())
            .get("/api/v1/reports", &[], "caller-token")
            .await
            .unwrap_err();

        assert_eq!(err.error_kind, ErrorKind::Gateway(GatewayErrorKind::Status(403)));
    }

    #[tokio::test]
    async fn test_non_json_body_is_invalid_response() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v1/reports")
            .with_status(200)
            .with_body("<html>maintenance</html>")
            .create_async()
            .await;

        let err = client(server.url())
            .get("/api/v1/reports", &[], "caller-token")
            .await
            .unwrap_err();

        assert_eq!(
            err.error_kind,
            ErrorKind::Gateway(GatewayErrorKind::InvalidResponse)
        );
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let client = client("https://api.neonpanel.com".to_string());
        assert_eq!(client.base_url(), "https://api.neonpanel.com");
    }
}
