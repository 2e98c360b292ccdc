//! Purpose: HTTP client for the inventory REST store (products, warehousemen).
//! Exports: `ClientConfig`, `RemoteClient`.
//! Role: `ProductStore` implementation over blocking `ureq` requests.
//! Invariants: Bodies are bare JSON records; writes send the whole product.
//! Invariants: Error envelopes `{ "error": { kind, message } }` are honored when present;
//! otherwise the HTTP status picks the error kind.
//! Invariants: No retries; every failure is returned to the caller as-is.
#![allow(clippy::result_large_err)]

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use super::store::{ApiResult, ProductStore};
use crate::core::error::{Error, ErrorKind};
use crate::core::product::{Product, ProductDraft, Warehouseman};

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:3000";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

#[derive(Clone)]
pub struct RemoteClient {
    inner: Arc<RemoteClientInner>,
}

struct RemoteClientInner {
    base_url: Url,
    timeout: Duration,
    agent: ureq::Agent,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: RemoteError,
}

#[derive(Deserialize)]
struct RemoteError {
    kind: String,
    message: Option<String>,
    hint: Option<String>,
}

impl RemoteClient {
    pub fn new(base_url: impl Into<String>) -> ApiResult<Self> {
        Self::with_config(ClientConfig {
            base_url: base_url.into(),
            ..ClientConfig::default()
        })
    }

    pub fn with_config(config: ClientConfig) -> ApiResult<Self> {
        let base_url = normalize_base_url(config.base_url)?;
        let agent = ureq::AgentBuilder::new().timeout(config.timeout).build();
        Ok(Self {
            inner: Arc::new(RemoteClientInner {
                base_url,
                timeout: config.timeout,
                agent,
            }),
        })
    }

    /// Trust only the certificates in a PEM file (self-signed store deployments).
    pub fn with_tls_ca_file(self, path: impl AsRef<Path>) -> ApiResult<Self> {
        let path = path.as_ref();
        let cert_bytes = std::fs::read(path).map_err(|err| {
            Error::new(ErrorKind::Usage)
                .with_message(format!(
                    "failed to read TLS CA/certificate file {}",
                    path.display()
                ))
                .with_source(err)
        })?;
        let mut cert_reader = Cursor::new(cert_bytes);
        let certs = rustls_pemfile::certs(&mut cert_reader)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| {
                Error::new(ErrorKind::Usage)
                    .with_message("failed to parse TLS CA/certificate file")
                    .with_source(err)
            })?;
        if certs.is_empty() {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("TLS CA/certificate file contains no certificates"));
        }

        let _ = ureq::rustls::crypto::ring::default_provider().install_default();
        let mut root_store = ureq::rustls::RootCertStore::empty();
        let (added, _) = root_store.add_parsable_certificates(certs);
        if added == 0 {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("TLS CA/certificate file contains no parsable certificates"));
        }

        let tls_config = ureq::rustls::ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth();
        let agent = ureq::builder()
            .timeout(self.inner.timeout)
            .tls_config(Arc::new(tls_config))
            .build();
        Ok(self.with_agent(agent))
    }

    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    fn request_json<T, R>(&self, method: &str, url: &Url, body: Option<&T>) -> ApiResult<R>
    where
        T: Serialize,
        R: DeserializeOwned,
    {
        let response = self.send(method, url, body)?;
        read_json_response(response)
    }

    fn send<T>(&self, method: &str, url: &Url, body: Option<&T>) -> ApiResult<ureq::Response>
    where
        T: Serialize,
    {
        tracing::debug!(%method, url = %url, "store request");
        let request = self
            .inner
            .agent
            .request(method, url.as_str())
            .set("Accept", "application/json");
        let response = match body {
            None => request.call(),
            Some(body) => {
                let payload = serde_json::to_string(body).map_err(|err| {
                    Error::new(ErrorKind::Internal)
                        .with_message("failed to encode request json")
                        .with_source(err)
                })?;
                request
                    .set("Content-Type", "application/json")
                    .send_string(&payload)
            }
        };

        match response {
            Ok(resp) => Ok(resp),
            Err(ureq::Error::Status(code, resp)) => Err(parse_error_response(code, resp)),
            Err(ureq::Error::Transport(err)) => Err(Error::new(ErrorKind::Network)
                .with_message(format!("request to {} failed", url))
                .with_hint("Check that the inventory store is reachable (--api-url).")
                .with_source(err)),
        }
    }

    fn with_agent(mut self, agent: ureq::Agent) -> Self {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.agent = agent;
        } else {
            self.inner = Arc::new(RemoteClientInner {
                base_url: self.inner.base_url.clone(),
                timeout: self.inner.timeout,
                agent,
            });
        }
        self
    }

    fn product_url(&self, id: u64) -> ApiResult<Url> {
        build_url(&self.inner.base_url, &["products", &id.to_string()])
    }
}

impl ProductStore for RemoteClient {
    fn list_products(&self) -> ApiResult<Vec<Product>> {
        let url = build_url(&self.inner.base_url, &["products"])?;
        self.request_json::<(), _>("GET", &url, None)
    }

    fn products_by_barcode(&self, barcode: &str) -> ApiResult<Vec<Product>> {
        let mut url = build_url(&self.inner.base_url, &["products"])?;
        url.query_pairs_mut().append_pair("barcode", barcode);
        self.request_json::<(), _>("GET", &url, None)
    }

    fn get_product(&self, id: u64) -> ApiResult<Product> {
        let url = self.product_url(id)?;
        self.request_json::<(), _>("GET", &url, None)
            .map_err(|err| err.with_product_id(id))
    }

    fn create_product(&self, draft: &ProductDraft) -> ApiResult<Product> {
        let url = build_url(&self.inner.base_url, &["products"])?;
        self.request_json("POST", &url, Some(draft))
    }

    fn replace_product(&self, product: &Product) -> ApiResult<Product> {
        let url = self.product_url(product.id)?;
        self.request_json("PUT", &url, Some(product))
            .map_err(|err| err.with_product_id(product.id))
    }

    fn delete_product(&self, id: u64) -> ApiResult<()> {
        let url = self.product_url(id)?;
        self.send::<()>("DELETE", &url, None)
            .map_err(|err| err.with_product_id(id))?;
        Ok(())
    }

    fn list_warehousemen(&self) -> ApiResult<Vec<Warehouseman>> {
        let url = build_url(&self.inner.base_url, &["warehousemans"])?;
        self.request_json::<(), _>("GET", &url, None)
    }
}

fn normalize_base_url(raw: String) -> ApiResult<Url> {
    let mut url = Url::parse(&raw).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message("invalid store base url")
            .with_source(err)
    })?;
    let scheme = url.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("store base url must use http or https scheme"));
    }
    if url.path() != "/" && !url.path().is_empty() {
        return Err(
            Error::new(ErrorKind::Usage).with_message("store base url must not include a path")
        );
    }
    url.set_path("/");
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

fn build_url(base_url: &Url, segments: &[&str]) -> ApiResult<Url> {
    let mut url = base_url.clone();
    {
        let mut path = url.path_segments_mut().map_err(|_| {
            Error::new(ErrorKind::Usage).with_message("store base url cannot be a base")
        })?;
        path.clear();
        for segment in segments {
            path.push(segment);
        }
    }
    Ok(url)
}

fn read_json_response<R>(response: ureq::Response) -> ApiResult<R>
where
    R: DeserializeOwned,
{
    let body = response.into_string().map_err(|err| {
        Error::new(ErrorKind::Network)
            .with_message("failed to read response body")
            .with_source(err)
    })?;
    serde_json::from_str(&body).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("invalid response json")
            .with_source(err)
    })
}

fn parse_error_response(status: u16, response: ureq::Response) -> Error {
    let body = response.into_string().unwrap_or_default();
    if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(&body) {
        return error_from_remote(envelope.error).with_status(status);
    }
    let kind = error_kind_from_status(status);
    Error::new(kind)
        .with_message(format!("store error status {status}"))
        .with_status(status)
}

fn error_from_remote(remote: RemoteError) -> Error {
    let mut err = Error::new(parse_error_kind(&remote.kind));
    if let Some(message) = remote.message {
        err = err.with_message(message);
    }
    if let Some(hint) = remote.hint {
        err = err.with_hint(hint);
    }
    err
}

fn parse_error_kind(kind: &str) -> ErrorKind {
    match kind {
        "Internal" => ErrorKind::Internal,
        "Usage" => ErrorKind::Usage,
        "Validation" => ErrorKind::Validation,
        "NotFound" => ErrorKind::NotFound,
        "Conflict" => ErrorKind::Conflict,
        "InsufficientQuantity" => ErrorKind::InsufficientQuantity,
        "Permission" => ErrorKind::Permission,
        "Network" => ErrorKind::Network,
        _ => ErrorKind::Internal,
    }
}

fn error_kind_from_status(status: u16) -> ErrorKind {
    match status {
        400 | 413 => ErrorKind::Usage,
        401 | 403 => ErrorKind::Permission,
        404 => ErrorKind::NotFound,
        409 => ErrorKind::Conflict,
        422 => ErrorKind::Validation,
        500..=599 => ErrorKind::Internal,
        _ => ErrorKind::Network,
    }
}
