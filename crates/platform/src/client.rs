use std::time::Duration;

use reqwest::{header, Method, RequestBuilder, StatusCode, Url};
use serde::{de::DeserializeOwned, Serialize};

use crate::{Filter, Order, PlatformError};

const REST_PATH: &str = "rest/v1";
const RETURN_REPRESENTATION: &str = "return=representation";

/// Table API client. Cheap to clone; clones share one connection pool.
#[derive(Clone)]
pub struct PlatformClient {
    rest_url: Url,
    anon_key: String,
    http: reqwest::Client,
}

impl std::fmt::Debug for PlatformClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformClient")
            .field("rest_url", &self.rest_url.as_str())
            .finish_non_exhaustive()
    }
}

impl PlatformClient {
    /// Create a client for the project at `base_url` (e.g. `https://<ref>.supabase.co`).
    pub fn new(base_url: &str, anon_key: &str, timeout: Duration) -> Result<Self, PlatformError> {
        let base = Url::parse(base_url.trim_end_matches('/'))
            .map_err(|e| PlatformError::Config(format!("platform url '{}': {}", base_url, e)))?;
        if base.cannot_be_a_base() {
            return Err(PlatformError::Config(format!(
                "platform url '{}' cannot be a base",
                base_url
            )));
        }
        let rest_url = Url::parse(&format!("{}/{}/", base.as_str().trim_end_matches('/'), REST_PATH))
            .map_err(|e| PlatformError::Config(e.to_string()))?;

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PlatformError::Config(e.to_string()))?;

        Ok(Self {
            rest_url,
            anon_key: anon_key.to_string(),
            http,
        })
    }

    /// Insert one row and return the rows the platform stored.
    #[tracing::instrument(skip_all, level = "debug", fields(%table))]
    pub async fn insert<T, R>(
        &self,
        table: &str,
        access_token: &str,
        row: &T,
    ) -> Result<Vec<R>, PlatformError>
    where
        T: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let request = self
            .request(Method::POST, table, access_token)?
            .header("Prefer", RETURN_REPRESENTATION)
            .json(row);
        self.execute(request).await
    }

    /// Select every visible row matching `filters`.
    #[tracing::instrument(skip_all, level = "debug", fields(%table))]
    pub async fn select<R>(
        &self,
        table: &str,
        access_token: &str,
        filters: &[Filter],
        order: Option<&Order>,
    ) -> Result<Vec<R>, PlatformError>
    where
        R: DeserializeOwned,
    {
        let mut request = self
            .request(Method::GET, table, access_token)?
            .query(&[("select", "*")])
            .query(&pairs(filters));
        if let Some(order) = order {
            request = request.query(&[("order", order.render())]);
        }
        self.execute(request).await
    }

    /// Apply `patch` to every visible row matching `filters`; returns the updated rows.
    #[tracing::instrument(skip_all, level = "debug", fields(%table))]
    pub async fn update<T, R>(
        &self,
        table: &str,
        access_token: &str,
        filters: &[Filter],
        patch: &T,
    ) -> Result<Vec<R>, PlatformError>
    where
        T: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let request = self
            .request(Method::PATCH, table, access_token)?
            .query(&pairs(filters))
            .header("Prefer", RETURN_REPRESENTATION)
            .json(patch);
        self.execute(request).await
    }

    /// Delete every visible row matching `filters`; returns the deleted rows.
    #[tracing::instrument(skip_all, level = "debug", fields(%table))]
    pub async fn delete<R>(
        &self,
        table: &str,
        access_token: &str,
        filters: &[Filter],
    ) -> Result<Vec<R>, PlatformError>
    where
        R: DeserializeOwned,
    {
        let request = self
            .request(Method::DELETE, table, access_token)?
            .query(&pairs(filters))
            .header("Prefer", RETURN_REPRESENTATION);
        self.execute(request).await
    }

    fn request(
        &self,
        method: Method,
        table: &str,
        access_token: &str,
    ) -> Result<RequestBuilder, PlatformError> {
        let url = self
            .rest_url
            .join(table)
            .map_err(|e| PlatformError::Config(format!("table '{}': {}", table, e)))?;

        Ok(self
            .http
            .request(method, url)
            .header("apikey", &self.anon_key)
            .header(header::ACCEPT, "application/json")
            .bearer_auth(access_token))
    }

    async fn execute<R>(&self, request: RequestBuilder) -> Result<Vec<R>, PlatformError>
    where
        R: DeserializeOwned,
    {
        let response = request.send().await.map_err(|e| {
            tracing::warn!(error = %e, "platform request failed");
            PlatformError::Unreachable(e.to_string())
        })?;
        let status = response.status();

        if status.is_success() {
            let rows = response
                .json::<Vec<R>>()
                .await
                .map_err(|e| PlatformError::Decode(e.to_string()))?;
            tracing::debug!(status = status.as_u16(), rows = rows.len(), "platform request ok");
            return Ok(rows);
        }

        let body = response.text().await.unwrap_or_default();
        let message = error_message(&body).unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("unknown error")
                .to_string()
        });
        tracing::warn!(status = status.as_u16(), %message, "platform request rejected");

        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => PlatformError::Unauthorized(message),
            _ => PlatformError::Rejected {
                status: status.as_u16(),
                message,
            },
        })
    }
}

fn pairs(filters: &[Filter]) -> Vec<(&str, &str)> {
    filters.iter().map(Filter::as_pair).collect()
}

/// The platform reports errors as `{"message": ..., "code": ..., ...}`.
fn error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("message")
        .or_else(|| value.get("msg"))
        .and_then(|m| m.as_str())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use axum::{
        body::Bytes,
        extract::{Path, RawQuery, State},
        http::HeaderMap,
        routing::any,
        Json, Router,
    };
    use serde_json::{json, Value};

    #[derive(Debug, Clone)]
    struct Captured {
        method: String,
        table: String,
        query: String,
        apikey: Option<String>,
        authorization: Option<String>,
        prefer: Option<String>,
        body: Option<Value>,
    }

    #[derive(Clone)]
    struct FakeTable {
        status: axum::http::StatusCode,
        response: Value,
        captured: Arc<Mutex<Vec<Captured>>>,
    }

    async fn handle(
        State(fake): State<FakeTable>,
        Path(table): Path<String>,
        method: axum::http::Method,
        RawQuery(query): RawQuery,
        headers: HeaderMap,
        body: Bytes,
    ) -> (axum::http::StatusCode, Json<Value>) {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        fake.captured.lock().unwrap().push(Captured {
            method: method.to_string(),
            table,
            query: query.unwrap_or_default(),
            apikey: header("apikey"),
            authorization: header("authorization"),
            prefer: header("prefer"),
            body: serde_json::from_slice(&body).ok(),
        });
        (fake.status, Json(fake.response.clone()))
    }

    async fn spawn_fake(status: u16, response: Value) -> (PlatformClient, Arc<Mutex<Vec<Captured>>>) {
        let captured = Arc::new(Mutex::new(Vec::new()));
        let fake = FakeTable {
            status: axum::http::StatusCode::from_u16(status).unwrap(),
            response,
            captured: captured.clone(),
        };
        let app = Router::new()
            .route("/rest/v1/{table}", any(handle))
            .with_state(fake);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let client =
            PlatformClient::new(&format!("http://{}/", addr), "anon-key", Duration::from_secs(5))
                .unwrap();
        (client, captured)
    }

    #[tokio::test]
    async fn select_sends_credentials_filters_and_order() {
        let (client, captured) = spawn_fake(200, json!([{ "id": "b1" }])).await;

        let rows: Vec<Value> = client
            .select(
                "books",
                "caller-token",
                &[Filter::eq("user_id", "u1"), Filter::eq("status", "wishlist")],
                Some(&Order::asc("created_at")),
            )
            .await
            .unwrap();

        assert_eq!(rows, vec![json!({ "id": "b1" })]);
        let request = captured.lock().unwrap()[0].clone();
        assert_eq!(request.method, "GET");
        assert_eq!(request.table, "books");
        assert_eq!(request.apikey.as_deref(), Some("anon-key"));
        assert_eq!(request.authorization.as_deref(), Some("Bearer caller-token"));
        assert!(request.query.contains("select=*") || request.query.contains("select=%2A"));
        assert!(request.query.contains("user_id=eq.u1"));
        assert!(request.query.contains("status=eq.wishlist"));
        assert!(request.query.contains("order=created_at.asc"));
        assert!(request.prefer.is_none());
    }

    #[tokio::test]
    async fn insert_asks_for_representation() {
        let (client, captured) = spawn_fake(201, json!([{ "id": "b1", "title": "Dune" }])).await;

        let rows: Vec<Value> = client
            .insert("books", "caller-token", &json!({ "title": "Dune" }))
            .await
            .unwrap();

        assert_eq!(rows[0]["id"], "b1");
        let request = captured.lock().unwrap()[0].clone();
        assert_eq!(request.method, "POST");
        assert_eq!(request.prefer.as_deref(), Some(RETURN_REPRESENTATION));
        assert_eq!(request.body, Some(json!({ "title": "Dune" })));
    }

    #[tokio::test]
    async fn delete_scopes_by_filters() {
        let (client, captured) = spawn_fake(200, json!([])).await;

        let rows: Vec<Value> = client
            .delete("books", "caller-token", &[Filter::eq("id", "b1")])
            .await
            .unwrap();

        assert!(rows.is_empty());
        let request = captured.lock().unwrap()[0].clone();
        assert_eq!(request.method, "DELETE");
        assert_eq!(request.query, "id=eq.b1");
        assert_eq!(request.prefer.as_deref(), Some(RETURN_REPRESENTATION));
    }

    #[tokio::test]
    async fn error_status_carries_platform_message() {
        let (client, _) = spawn_fake(
            500,
            json!({ "code": "XX000", "message": "relation is locked" }),
        )
        .await;

        let err = client
            .update::<_, Value>("books", "t", &[Filter::eq("id", "b1")], &json!({ "status": "completed" }))
            .await
            .unwrap_err();

        match err {
            PlatformError::Rejected { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "relation is locked");
            }
            other => panic!("expected Rejected, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn unauthorized_status_is_distinguished() {
        let (client, _) = spawn_fake(401, json!({ "message": "JWT expired" })).await;

        let err = client
            .select::<Value>("books", "t", &[], None)
            .await
            .unwrap_err();

        assert!(matches!(err, PlatformError::Unauthorized(ref m) if m == "JWT expired"));
    }

    #[tokio::test]
    async fn undecodable_body_is_a_decode_error() {
        let (client, _) = spawn_fake(200, json!({ "not": "an array" })).await;

        let err = client
            .select::<Value>("books", "t", &[], None)
            .await
            .unwrap_err();

        assert!(matches!(err, PlatformError::Decode(_)));
    }

    #[tokio::test]
    async fn closed_port_is_unreachable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client =
            PlatformClient::new(&format!("http://{}", addr), "anon-key", Duration::from_secs(2))
                .unwrap();
        let err = client
            .select::<Value>("books", "t", &[], None)
            .await
            .unwrap_err();

        assert!(matches!(err, PlatformError::Unreachable(_)));
    }

    #[test]
    fn invalid_base_url_is_a_config_error() {
        let err = PlatformClient::new("not a url", "k", Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, PlatformError::Config(_)));
    }

    #[test]
    fn rest_url_joins_under_rest_path() {
        let client =
            PlatformClient::new("https://project.example.co/", "k", Duration::from_secs(1)).unwrap();
        assert_eq!(
            client.rest_url.join("books").unwrap().as_str(),
            "https://project.example.co/rest/v1/books"
        );
    }
}
