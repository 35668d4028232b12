use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde_json::Value;

use crate::config::{StoreConfig, DEFAULT_STORE_TIMEOUT_SECONDS};
use crate::error::{NestwatchError, Result};
use crate::interfaces::store::{Filter, StorageGateway};

/// Gateway to a hosted relational store speaking the PostgREST dialect
/// (`?col=eq.x`, `?col=in.(...)`, `Prefer: return=representation`).
///
/// Every round trip carries an explicit deadline; exceeding it surfaces as
/// `Timeout`, and a unique-constraint rejection (HTTP 409) surfaces as
/// `Conflict` so identifier collisions are never silent.
pub struct PostgrestGateway {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl PostgrestGateway {
    pub fn new(url: &str, service_key: &str, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "apikey",
            HeaderValue::from_str(service_key).map_err(|e| NestwatchError::Config(e.to_string()))?,
        );
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {service_key}"))
                .map_err(|e| NestwatchError::Config(e.to_string()))?,
        );

        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| NestwatchError::Config(e.to_string()))?;

        Ok(Self {
            client,
            base_url: url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    pub fn from_config(config: &StoreConfig) -> Result<Self> {
        let timeout = Duration::from_secs(
            config
                .timeout_seconds
                .unwrap_or(DEFAULT_STORE_TIMEOUT_SECONDS),
        );
        Self::new(&config.url, &config.service_key, timeout)
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn request(&self, method: Method, table: &str, filters: &[Filter]) -> RequestBuilder {
        let mut request = self
            .client
            .request(method, self.table_url(table))
            .timeout(self.timeout);
        for filter in filters {
            let (column, predicate) = render_filter(filter);
            request = request.query(&[(column, predicate)]);
        }
        request
    }

    async fn rows(&self, request: RequestBuilder) -> Result<Vec<Value>> {
        let response = request.send().await.map_err(map_transport_error)?;
        let response = check_status(response).await?;
        response.json().await.map_err(map_transport_error)
    }
}

#[async_trait]
impl StorageGateway for PostgrestGateway {
    async fn select(
        &self,
        table: &str,
        columns: &[&str],
        filters: &[Filter],
    ) -> Result<Vec<Value>> {
        let mut request = self.request(Method::GET, table, filters);
        if !columns.is_empty() && columns != ["*"] {
            request = request.query(&[("select", columns.join(","))]);
        }
        self.rows(request).await
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value> {
        let request = self
            .request(Method::POST, table, &[])
            .header("Prefer", "return=representation")
            .json(&row);
        self.rows(request)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                NestwatchError::Upstream(format!("insert into {table} returned no representation"))
            })
    }

    async fn update(&self, table: &str, patch: Value, filters: &[Filter]) -> Result<Vec<Value>> {
        let request = self
            .request(Method::PATCH, table, filters)
            .header("Prefer", "return=representation")
            .json(&patch);
        self.rows(request).await
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<u64> {
        let request = self
            .request(Method::DELETE, table, filters)
            .header("Prefer", "return=representation");
        Ok(self.rows(request).await?.len() as u64)
    }
}

fn render_filter(filter: &Filter) -> (String, String) {
    match filter {
        Filter::Eq(column, value) => (column.clone(), format!("eq.{}", eq_literal(value))),
        Filter::In(column, values) => {
            let items: Vec<String> = values.iter().map(in_literal).collect();
            (column.clone(), format!("in.({})", items.join(",")))
        }
    }
}

fn eq_literal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn in_literal(value: &Value) -> String {
    match value {
        // String members of an `in` list need quoting to survive the comma syntax.
        Value::String(s) => format!("\"{s}\""),
        other => other.to_string(),
    }
}

fn map_transport_error(err: reqwest::Error) -> NestwatchError {
    if err.is_timeout() {
        NestwatchError::Timeout(err.to_string())
    } else {
        NestwatchError::Upstream(err.to_string())
    }
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    if status == StatusCode::CONFLICT {
        Err(NestwatchError::Conflict(body))
    } else {
        Err(NestwatchError::Upstream(format!("{status}: {body}")))
    }
}
