// File: src/client/core.rs
use crate::client::middleware::{UserAgentLayer, UserAgentService};
use crate::model::{Entity, User};
use crate::store::{EntityStore, Filter};

use anyhow::{Context, Result, anyhow, bail};
use http::header::{ACCEPT, CONTENT_TYPE};
use http::{HeaderValue, Method, Request, StatusCode, Uri};
use http_body_util::BodyExt;
use hyper_rustls::HttpsConnectorBuilder;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tower::ServiceExt;
use tower_http::auth::AddAuthorization;
use tower_layer::Layer;

pub(crate) type HttpsClient = UserAgentService<
    AddAuthorization<Client<hyper_rustls::HttpsConnector<HttpConnector>, String>>,
>;

/// Longest slice of an error body kept in error messages.
const ERROR_BODY_LIMIT: usize = 300;

/// Builds the shared HTTPS client: rustls with the platform's roots, bearer
/// auth on every request and our User-Agent.
pub(crate) fn build_https_client(url: &str, token: &str) -> Result<HttpsClient> {
    let uri: Uri = url
        .parse()
        .with_context(|| format!("Invalid URL '{}'", url))?;
    if uri.scheme().is_none() || uri.authority().is_none() {
        bail!("URL '{}' must be absolute (http:// or https://)", url);
    }
    HeaderValue::from_str(&format!("Bearer {}", token))
        .map_err(|_| anyhow!("Access token contains characters not allowed in a header"))?;

    let mut root_store = rustls::RootCertStore::empty();
    let result = rustls_native_certs::load_native_certs();
    root_store.add_parsable_certificates(result.certs);
    if root_store.is_empty() {
        if uri.scheme_str() == Some("https") {
            bail!("No valid system certificates found.");
        }
        log::warn!("No system certificates found; only plain HTTP will work");
    }
    let tls_config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    let https_connector = HttpsConnectorBuilder::new()
        .with_tls_config(tls_config)
        .https_or_http()
        .enable_http1()
        .build();

    let http_client = Client::builder(TokioExecutor::new()).build(https_connector);
    let auth_client = AddAuthorization::bearer(http_client, token);
    Ok(UserAgentLayer::default().layer(auth_client))
}

/// Sends one request and returns the status plus the full body.
pub(crate) async fn send_request(
    http: &HttpsClient,
    method: Method,
    uri: &str,
    body: Option<&Value>,
) -> Result<(StatusCode, Vec<u8>)> {
    let mut builder = Request::builder()
        .method(method.clone())
        .uri(uri)
        .header(ACCEPT, "application/json");
    let payload = match body {
        Some(v) => {
            builder = builder.header(CONTENT_TYPE, "application/json");
            serde_json::to_string(v)?
        }
        None => String::new(),
    };
    let req = builder
        .body(payload)
        .with_context(|| format!("Invalid request {} {}", method, uri))?;

    log::debug!("{} {}", method, uri);
    let resp = http
        .clone()
        .oneshot(req)
        .await
        .map_err(|e| anyhow!("{} {} failed: {}", method, uri, e))?;
    let status = resp.status();
    let bytes = resp
        .into_body()
        .collect()
        .await
        .map_err(|e| anyhow!("{} {}: failed to read response: {}", method, uri, e))?
        .to_bytes();
    log::debug!("{} {} -> {}", method, uri, status);
    Ok((status, bytes.to_vec()))
}

pub(crate) fn error_for_status(method: &Method, uri: &str, status: StatusCode, body: &[u8]) -> anyhow::Error {
    let text = String::from_utf8_lossy(body);
    let snippet: String = text.chars().take(ERROR_BODY_LIMIT).collect();
    anyhow!("{} {} returned {}: {}", method, uri, status, snippet.trim())
}

pub(crate) fn parse_json<T: DeserializeOwned>(uri: &str, body: &[u8]) -> Result<T> {
    serde_json::from_slice(body).with_context(|| format!("Unexpected response body from {}", uri))
}

/// Ids are opaque, but they end up in URL paths.
pub(crate) fn check_id(id: &str) -> Result<()> {
    if id.is_empty()
        || id
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '/' | '?' | '#' | '%'))
    {
        bail!("Invalid record id '{}'", id);
    }
    Ok(())
}

/// `EntityStore` over the hosted REST entity API.
#[derive(Clone, Debug)]
pub struct RemoteStore {
    http: HttpsClient,
    base_url: String,
}

impl RemoteStore {
    pub fn new(url: &str, token: &str) -> Result<Self> {
        let base_url = url.trim().trim_end_matches('/').to_string();
        let http = build_https_client(&base_url, token)?;
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn entity_uri<E: Entity>(&self, suffix: &str) -> String {
        format!("{}/entities/{}{}", self.base_url, E::NAME, suffix)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        uri: &str,
        body: Option<&Value>,
    ) -> Result<T> {
        let (status, bytes) = send_request(&self.http, method.clone(), uri, body).await?;
        if !status.is_success() {
            return Err(error_for_status(&method, uri, status, &bytes));
        }
        parse_json(uri, &bytes)
    }
}

impl EntityStore for RemoteStore {
    async fn list<E: Entity>(&self) -> Result<Vec<E>> {
        self.call(Method::GET, &self.entity_uri::<E>(""), None).await
    }

    async fn filter<E: Entity>(&self, filter: &Filter) -> Result<Vec<E>> {
        let body = filter.to_json();
        self.call(Method::POST, &self.entity_uri::<E>("/filter"), Some(&body))
            .await
    }

    async fn create<E: Entity>(&self, record: &E) -> Result<E> {
        let body = serde_json::to_value(record)?;
        let created: E = self
            .call(Method::POST, &self.entity_uri::<E>(""), Some(&body))
            .await?;
        log::debug!("Created {} {}", E::NAME, created.id());
        Ok(created)
    }

    async fn update<E: Entity>(&self, id: &str, patch: &Value) -> Result<E> {
        check_id(id)?;
        let uri = self.entity_uri::<E>(&format!("/{}", id));
        self.call(Method::PUT, &uri, Some(patch)).await
    }

    async fn delete<E: Entity>(&self, id: &str) -> Result<()> {
        check_id(id)?;
        let uri = self.entity_uri::<E>(&format!("/{}", id));
        let (status, bytes) = send_request(&self.http, Method::DELETE, &uri, None).await?;
        // Already gone counts as deleted.
        if status.is_success() || status == StatusCode::NOT_FOUND {
            return Ok(());
        }
        Err(error_for_status(&Method::DELETE, &uri, status, &bytes))
    }

    async fn me(&self) -> Result<User> {
        let uri = format!("{}/auth/me", self.base_url);
        self.call(Method::GET, &uri, None).await
    }

    async fn update_me(&self, patch: &Value) -> Result<User> {
        let uri = format!("{}/auth/me", self.base_url);
        self.call(Method::PUT, &uri, Some(patch)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_id_rejects_path_tricks() {
        assert!(check_id("64f0a1b2c3").is_ok());
        assert!(check_id("../tasks").is_err());
        assert!(check_id("a b").is_err());
        assert!(check_id("").is_err());
    }

    #[test]
    fn test_relative_url_is_rejected() {
        assert!(build_https_client("api.example.com", "t").is_err());
    }

    #[test]
    fn test_error_message_is_truncated() {
        let body = "x".repeat(1000);
        let err = error_for_status(
            &Method::GET,
            "http://h/entities/Task",
            StatusCode::INTERNAL_SERVER_ERROR,
            body.as_bytes(),
        );
        let msg = err.to_string();
        assert!(msg.starts_with("GET http://h/entities/Task returned 500"));
        assert!(msg.len() < 400);
    }
}
