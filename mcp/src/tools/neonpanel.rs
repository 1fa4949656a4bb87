use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::Error;
use crate::gateway::NeonPanelClient;
use crate::tool::{Tool, ToolContext, ToolError, ToolRegistry};

pub const LIST_COMPANIES: &str = "neonpanel_listCompanies";
pub const LIST_REPORTS: &str = "neonpanel_listReports";

const MAX_PER_PAGE: u64 = 100;

/// Registers every NeonPanel-backed tool, sharing one client.
pub fn register_neonpanel_tools(
    registry: &mut ToolRegistry,
    client: NeonPanelClient,
) -> Result<(), Error> {
    registry.register(ListCompanies {
        client: client.clone(),
    })?;
    registry.register(ListReports { client })?;
    Ok(())
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct PageArgs {
    page: Option<u64>,
    per_page: Option<u64>,
}

impl PageArgs {
    fn parse(args: Value) -> Result<Self, ToolError> {
        let parsed: PageArgs = serde_json::from_value(args)
            .map_err(|err| ToolError::InvalidArguments(err.to_string()))?;
        if parsed.page == Some(0) {
            return Err(ToolError::InvalidArguments("page starts at 1".to_string()));
        }
        if let Some(per_page) = parsed.per_page {
            if per_page == 0 || per_page > MAX_PER_PAGE {
                return Err(ToolError::InvalidArguments(format!(
                    "perPage must be between 1 and {MAX_PER_PAGE}"
                )));
            }
        }
        Ok(parsed)
    }

    fn query(&self) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        if let Some(page) = self.page {
            query.push(("page", page.to_string()));
        }
        if let Some(per_page) = self.per_page {
            query.push(("per_page", per_page.to_string()));
        }
        query
    }
}

fn page_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "page": { "type": "integer", "minimum": 1 },
            "perPage": { "type": "integer", "minimum": 1, "maximum": MAX_PER_PAGE }
        },
        "additionalProperties": false
    })
}

fn bearer(ctx: &ToolContext) -> Result<&str, ToolError> {
    if ctx.auth.is_anonymous() {
        return Err(ToolError::Failed(
            "NeonPanel tools require an authenticated caller".to_string(),
        ));
    }
    Ok(ctx.auth.token())
}

struct ListCompanies {
    client: NeonPanelClient,
}

#[async_trait]
impl Tool for ListCompanies {
    fn name(&self) -> &str {
        LIST_COMPANIES
    }

    fn description(&self) -> &str {
        "List the NeonPanel companies the caller can access."
    }

    fn input_schema(&self) -> Value {
        page_schema()
    }

    fn examples(&self) -> Option<Value> {
        Some(json!([{ "page": 1, "perPage": 20 }]))
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<Value, ToolError> {
        let args = PageArgs::parse(args)?;
        let body = self
            .client
            .get("/api/v1/companies", &args.query(), bearer(ctx)?)
            .await?;
        Ok(body)
    }
}

struct ListReports {
    client: NeonPanelClient,
}

#[async_trait]
impl Tool for ListReports {
    fn name(&self) -> &str {
        LIST_REPORTS
    }

    fn description(&self) -> &str {
        "List the reports available in NeonPanel."
    }

    fn input_schema(&self) -> Value {
        page_schema()
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<Value, ToolError> {
        let args = PageArgs::parse(args)?;
        let body = self
            .client
            .get("/api/v1/reports", &args.query(), bearer(ctx)?)
            .await?;
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use auth::http::HttpClientBuilder;
    use auth::{AuthContext, ValidatedAccessToken};
    use mockito::Matcher;
    use secrecy::SecretString;
    use serde_json::Map;

    fn client(base: String) -> NeonPanelClient {
        let http = HttpClientBuilder::new()
            .with_max_retries(0)
            .build()
            .unwrap();
        NeonPanelClient::new(http, base)
    }

    fn authenticated(token: &str) -> ToolContext {
        ToolContext {
            auth: ValidatedAccessToken::new(SecretString::new(token.to_string()), Map::new(), vec![])
                .into(),
        }
    }

    #[test]
    fn test_registers_both_tools() {
        let mut registry = ToolRegistry::new();
        register_neonpanel_tools(&mut registry, client("http://localhost".into())).unwrap();

        let names: Vec<String> = registry.list().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec![LIST_COMPANIES, LIST_REPORTS]);
    }

    #[test]
    fn test_page_args_validation() {
        assert!(PageArgs::parse(json!({})).is_ok());
        assert!(PageArgs::parse(json!({"page": 0})).is_err());
        assert!(PageArgs::parse(json!({"perPage": 101})).is_err());
        assert!(PageArgs::parse(json!({"page": "one"})).is_err());
        assert!(PageArgs::parse(json!({"limit": 5})).is_err());

        let args = PageArgs::parse(json!({"page": 3, "perPage": 25})).unwrap();
        assert_eq!(
            args.query(),
            vec![("page", "3".to_string()), ("per_page", "25".to_string())]
        );
    }

    #[tokio::test]
    async fn test_list_companies_forwards_caller_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v1/companies")
            .match_header("authorization", "Bearer user-token")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("page".into(), "1".into()),
                Matcher::UrlEncoded("per_page".into(), "20".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"data": [], "total": 0}"#)
            .create_async()
            .await;

        let tool = ListCompanies {
            client: client(server.url()),
        };
        let output = tool
            .execute(json!({"page": 1, "perPage": 20}), &authenticated("user-token"))
            .await
            .unwrap();

        assert_eq!(output, json!({"data": [], "total": 0}));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_upstream_failure_becomes_tool_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v1/reports")
            .with_status(401)
            .create_async()
            .await;

        let tool = ListReports {
            client: client(server.url()),
        };
        let err = tool
            .execute(json!({}), &authenticated("user-token"))
            .await
            .unwrap_err();

        assert!(matches!(err, ToolError::Upstream(_)));
        assert_eq!(err.to_string(), "NeonPanel API responded with status 401");
    }

    #[tokio::test]
    async fn test_anonymous_caller_is_refused() {
        let tool = ListReports {
            client: client("http://localhost:9".into()),
        };
        let ctx = ToolContext {
            auth: AuthContext::anonymous(),
        };

        let err = tool.execute(json!({}), &ctx).await.unwrap_err();

        assert!(matches!(err, ToolError::Failed(_)));
    }
}
