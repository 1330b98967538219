//! HTTP client for the execution backend
//!
//! Both endpoints take the raw query text as the request body and answer with
//! JSON. A delegated ticket on the session identity is forwarded as a
//! `Negotiate` authorization header so the backend runs the query as that
//! principal.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use bytes::Bytes;
use pgbridge_common::{BackendSettings, BridgeError, Identity, Result};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

use super::model::{Column, ErrorEnvelope, ExecuteResponse, SchemaResponse};
use super::result::ResultSet;
use super::QueryBackend;

const QUERY_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// `QueryBackend` over reqwest with a pooled client
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(settings: &BackendSettings) -> Result<Self> {
        let mut builder = Client::builder()
            .connect_timeout(settings.connect_timeout())
            .pool_max_idle_per_host(settings.pool_max_idle_per_host)
            .tcp_nodelay(true);
        if let Some(timeout) = settings.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| BridgeError::Config(format!("failed to build backend HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: settings.base_url(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POST the query to `endpoint` and return the body of a 200 response
    async fn post(&self, endpoint: &str, query: &str, identity: &Identity) -> Result<Bytes> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let mut request = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, QUERY_CONTENT_TYPE)
            .body(query.to_owned());
        if let Some(ticket) = identity.delegated_ticket() {
            request = request.header(AUTHORIZATION, format!("Negotiate {}", STANDARD.encode(ticket)));
        }

        let response = request.send().await.map_err(|e| {
            warn!(url = %url, error = %e, "Backend request failed");
            BridgeError::Transport {
                status: None,
                body: e.to_string(),
            }
        })?;

        let status = response.status();
        let body = response.bytes().await.map_err(|e| BridgeError::Transport {
            status: Some(status.as_u16()),
            body: e.to_string(),
        })?;

        if status == StatusCode::OK {
            debug!(url = %url, bytes = body.len(), "Backend response received");
            return Ok(body);
        }

        match serde_json::from_slice::<ErrorEnvelope>(&body) {
            Ok(envelope) => {
                debug!(url = %url, status = %status, message = %envelope.message, "Backend rejected query");
                Err(BridgeError::Execution {
                    trace: envelope.trace_text(),
                    message: envelope.message,
                    sqlstate: None,
                })
            }
            Err(_) => {
                warn!(url = %url, status = %status, "Backend returned an unparsable error body");
                Err(BridgeError::Transport {
                    status: Some(status.as_u16()),
                    body: String::from_utf8_lossy(&body).into_owned(),
                })
            }
        }
    }
}

#[async_trait]
impl QueryBackend for HttpBackend {
    async fn schema(&self, query: &str, identity: &Identity) -> Result<Vec<Column>> {
        let body = self.post("schema", query, identity).await?;
        let response: SchemaResponse = serde_json::from_slice(&body)?;
        Ok(response.into_columns())
    }

    async fn execute(&self, query: &str, identity: &Identity) -> Result<ResultSet> {
        let body = self.post("execute", query, identity).await?;
        let response: ExecuteResponse = serde_json::from_slice(&body)?;
        let columns = response.columns.into_iter().map(Column::from).collect();
        let rows = response.result.rows.into_iter().map(|r| r.values).collect();
        Ok(ResultSet::from_json(columns, rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::model::DomainType;
    use crate::backend::result::Value;
    use axum::http::{HeaderMap, StatusCode as HttpStatus};
    use axum::response::{IntoResponse, Response};
    use axum::routing::post;
    use axum::{Json, Router};
    use pgbridge_common::Credential;
    use serde_json::json;

    async fn schema(body: String) -> Response {
        if body.contains("nested") {
            return Json(json!({"builder": {"columns": [{"name": "d", "type": "StrictDate"}]}})).into_response();
        }
        Json(json!({"columns": [{"name": "id", "type": "Integer"}, {"name": "name", "type": "String"}]}))
            .into_response()
    }

    async fn execute(headers: HeaderMap, body: String) -> Response {
        match body.as_str() {
            "fail" => (
                HttpStatus::INTERNAL_SERVER_ERROR,
                Json(json!({"status": "error", "message": "no such class", "trace": ["at a", "at b"]})),
            )
                .into_response(),
            "garbage" => (HttpStatus::BAD_GATEWAY, "upstream down").into_response(),
            "whoami" => {
                let auth = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("none")
                    .to_string();
                Json(json!({
                    "columns": [{"name": "auth", "type": "String"}],
                    "result": {"rows": [{"values": [auth]}]}
                }))
                .into_response()
            }
            _ => {
                let content_type = headers
                    .get("content-type")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("")
                    .to_string();
                Json(json!({
                    "columns": [{"name": "id", "type": "Integer"}, {"name": "ct", "type": "String"}],
                    "result": {"rows": [{"values": [1, content_type]}, {"values": [2, null]}]}
                }))
                .into_response()
            }
        }
    }

    async fn spawn_fake_backend() -> HttpBackend {
        let app = Router::new()
            .route("/schema", post(schema))
            .route("/execute", post(execute));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        HttpBackend::new(&BackendSettings::new("http", "127.0.0.1", port)).unwrap()
    }

    fn anonymous() -> Identity {
        Identity::anonymous(Credential::Anonymous { user: "alice".into() }, "anonymous")
    }

    #[tokio::test]
    async fn test_schema_reads_columns() {
        let backend = spawn_fake_backend().await;
        let columns = backend.schema("select", &anonymous()).await.unwrap();
        assert_eq!(
            columns,
            vec![Column::new("id", DomainType::Integer), Column::new("name", DomainType::String)]
        );

        let columns = backend.schema("nested", &anonymous()).await.unwrap();
        assert_eq!(columns, vec![Column::new("d", DomainType::DateOnly)]);
    }

    #[tokio::test]
    async fn test_execute_sends_plain_text_and_maps_rows() {
        let backend = spawn_fake_backend().await;
        let rows: Vec<_> = backend.execute("select", &anonymous()).await.unwrap().collect();
        assert_eq!(
            rows,
            vec![
                vec![Value::Integer(1), Value::String(QUERY_CONTENT_TYPE.into())],
                vec![Value::Integer(2), Value::Null],
            ]
        );
    }

    #[tokio::test]
    async fn test_error_envelope_becomes_execution_error() {
        let backend = spawn_fake_backend().await;
        match backend.execute("fail", &anonymous()).await {
            Err(BridgeError::Execution { message, trace, .. }) => {
                assert_eq!(message, "no such class");
                assert_eq!(trace.as_deref(), Some("at a\nat b"));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unparsable_error_body_is_transport_error() {
        let backend = spawn_fake_backend().await;
        match backend.execute("garbage", &anonymous()).await {
            Err(BridgeError::Transport { status, body }) => {
                assert_eq!(status, Some(502));
                assert_eq!(body, "upstream down");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_delegated_ticket_forwarded_as_negotiate() {
        let backend = spawn_fake_backend().await;
        let identity = Identity::delegated("alice@EXAMPLE.COM", b"ticket".to_vec(), "ticket");
        let rows: Vec<_> = backend.execute("whoami", &identity).await.unwrap().collect();
        assert_eq!(rows, vec![vec![Value::String("Negotiate dGlja2V0".into())]]);

        let rows: Vec<_> = backend.execute("whoami", &anonymous()).await.unwrap().collect();
        assert_eq!(rows, vec![vec![Value::String("none".into())]]);
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_transport_error() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let backend = HttpBackend::new(&BackendSettings::new("http", "127.0.0.1", port)).unwrap();
        assert!(matches!(
            backend.schema("select", &anonymous()).await,
            Err(BridgeError::Transport { status: None, .. })
        ));
    }
}
