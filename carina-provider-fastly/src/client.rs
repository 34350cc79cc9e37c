//! Fastly REST API client
//!
//! [`FastlyApi`] is the seam between the provider and the remote service;
//! [`FastlyClient`] implements it over HTTPS. Writes are form-encoded and
//! responses are JSON, as the Fastly API expects.

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::header::ACCEPT;
use reqwest::{Client, Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::config::FastlyConfig;
use crate::flatten::{BackendBlock, DomainBlock};
use crate::types::{
    Backend, Domain, ErrorResponse, Service, ServiceDetail, StatusResponse, Version,
};

/// Errors returned by the Fastly API client
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: the API key was rejected")]
    Unauthorized,

    #[error("Fastly API returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Failed to decode response from {path}: {source}")]
    Decode {
        path: String,
        source: serde_json::Error,
    },

    #[error("Invalid API URL: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound(_))
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Operations the provider needs from the Fastly API
#[async_trait]
pub trait FastlyApi: Send + Sync {
    async fn list_services(&self) -> ApiResult<Vec<Service>>;

    /// Create a service; the API creates version 1 along with it
    async fn create_service(&self, name: &str, comment: &str) -> ApiResult<Service>;

    async fn get_service_details(&self, service_id: &str) -> ApiResult<ServiceDetail>;

    async fn update_service_name(&self, service_id: &str, name: &str) -> ApiResult<Service>;

    /// Delete a service; fails while a version is active
    async fn delete_service(&self, service_id: &str) -> ApiResult<()>;

    /// Copy a version into a new, unlocked version
    async fn clone_version(&self, service_id: &str, version: u32) -> ApiResult<Version>;

    async fn activate_version(&self, service_id: &str, version: u32) -> ApiResult<Version>;

    async fn deactivate_version(&self, service_id: &str, version: u32) -> ApiResult<Version>;

    async fn list_domains(&self, service_id: &str, version: u32) -> ApiResult<Vec<Domain>>;

    async fn create_domain(
        &self,
        service_id: &str,
        version: u32,
        domain: &DomainBlock,
    ) -> ApiResult<Domain>;

    async fn delete_domain(&self, service_id: &str, version: u32, name: &str) -> ApiResult<()>;

    async fn list_backends(&self, service_id: &str, version: u32) -> ApiResult<Vec<Backend>>;

    async fn create_backend(
        &self,
        service_id: &str,
        version: u32,
        backend: &BackendBlock,
    ) -> ApiResult<Backend>;

    async fn delete_backend(&self, service_id: &str, version: u32, name: &str) -> ApiResult<()>;
}

/// HTTP client for the Fastly API
pub struct FastlyClient {
    http: Client,
    base_url: Url,
    api_key: String,
}

impl FastlyClient {
    pub fn new(config: &FastlyConfig) -> ApiResult<Self> {
        let base_url = Url::parse(config.base_url())
            .map_err(|e| ApiError::InvalidUrl(format!("{}: {}", config.base_url(), e)))?;
        let http = Client::builder()
            .user_agent(concat!("carina-provider-fastly/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url,
            api_key: config.api_key().to_string(),
        })
    }

    /// Build a URL from path segments, percent-encoding each one
    fn url(&self, segments: &[&str]) -> ApiResult<Url> {
        endpoint(&self.base_url, segments)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        segments: &[&str],
        form: Option<&[(&str, String)]>,
    ) -> ApiResult<T> {
        let url = self.url(segments)?;
        let path = url.path().to_string();
        debug!("{} {}", method, path);

        let mut request = self
            .http
            .request(method, url)
            .header("Fastly-Key", &self.api_key)
            .header(ACCEPT, "application/json");
        if let Some(form) = form {
            request = request.form(form);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        match status {
            StatusCode::NOT_FOUND => Err(ApiError::NotFound(path)),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ApiError::Unauthorized),
            s if !s.is_success() => Err(ApiError::Status {
                status: s.as_u16(),
                message: error_message(&body),
            }),
            _ => serde_json::from_str(&body).map_err(|source| ApiError::Decode { path, source }),
        }
    }

    async fn call_ok(&self, method: Method, segments: &[&str]) -> ApiResult<()> {
        let response: StatusResponse = self.call(method, segments, None).await?;
        if response.status != "ok" {
            warn!(
                "Unexpected status '{}' from {}",
                response.status,
                segments.join("/")
            );
        }
        Ok(())
    }
}

fn endpoint(base: &Url, segments: &[&str]) -> ApiResult<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| ApiError::InvalidUrl(base.to_string()))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Extract a readable message from an error body
fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorResponse>(body) {
        Ok(ErrorResponse {
            msg,
            detail: Some(detail),
        }) if !detail.is_empty() => format!("{} ({})", msg, detail),
        Ok(ErrorResponse { msg, .. }) => msg,
        Err(_) => body.trim().to_string(),
    }
}

fn flag(b: bool) -> String {
    let digit = if b { "1" } else { "0" };
    digit.to_string()
}

fn backend_form(backend: &BackendBlock) -> Vec<(&'static str, String)> {
    vec![
        ("name", backend.name.clone()),
        ("address", backend.address.clone()),
        ("port", backend.port.to_string()),
        ("auto_loadbalance", flag(backend.auto_loadbalance)),
        (
            "between_bytes_timeout",
            backend.between_bytes_timeout.to_string(),
        ),
        ("connect_timeout", backend.connect_timeout.to_string()),
        ("error_threshold", backend.error_threshold.to_string()),
        ("first_byte_timeout", backend.first_byte_timeout.to_string()),
        ("max_conn", backend.max_conn.to_string()),
        ("ssl_check_cert", flag(backend.ssl_check_cert)),
        ("weight", backend.weight.to_string()),
    ]
}

#[async_trait]
impl FastlyApi for FastlyClient {
    async fn list_services(&self) -> ApiResult<Vec<Service>> {
        self.call(Method::GET, &["service"], None).await
    }

    async fn create_service(&self, name: &str, comment: &str) -> ApiResult<Service> {
        let form = [("name", name.to_string()), ("comment", comment.to_string())];
        self.call(Method::POST, &["service"], Some(&form)).await
    }

    async fn get_service_details(&self, service_id: &str) -> ApiResult<ServiceDetail> {
        self.call(Method::GET, &["service", service_id, "details"], None)
            .await
    }

    async fn update_service_name(&self, service_id: &str, name: &str) -> ApiResult<Service> {
        let form = [("name", name.to_string())];
        self.call(Method::PUT, &["service", service_id], Some(&form))
            .await
    }

    async fn delete_service(&self, service_id: &str) -> ApiResult<()> {
        self.call_ok(Method::DELETE, &["service", service_id]).await
    }

    async fn clone_version(&self, service_id: &str, version: u32) -> ApiResult<Version> {
        let version = version.to_string();
        self.call(
            Method::PUT,
            &["service", service_id, "version", &version, "clone"],
            None,
        )
        .await
    }

    async fn activate_version(&self, service_id: &str, version: u32) -> ApiResult<Version> {
        let version = version.to_string();
        self.call(
            Method::PUT,
            &["service", service_id, "version", &version, "activate"],
            None,
        )
        .await
    }

    async fn deactivate_version(&self, service_id: &str, version: u32) -> ApiResult<Version> {
        let version = version.to_string();
        self.call(
            Method::PUT,
            &["service", service_id, "version", &version, "deactivate"],
            None,
        )
        .await
    }

    async fn list_domains(&self, service_id: &str, version: u32) -> ApiResult<Vec<Domain>> {
        let version = version.to_string();
        self.call(
            Method::GET,
            &["service", service_id, "version", &version, "domain"],
            None,
        )
        .await
    }

    async fn create_domain(
        &self,
        service_id: &str,
        version: u32,
        domain: &DomainBlock,
    ) -> ApiResult<Domain> {
        let version = version.to_string();
        let form = [
            ("name", domain.name.clone()),
            ("comment", domain.comment.clone()),
        ];
        self.call(
            Method::POST,
            &["service", service_id, "version", &version, "domain"],
            Some(&form),
        )
        .await
    }

    async fn delete_domain(&self, service_id: &str, version: u32, name: &str) -> ApiResult<()> {
        let version = version.to_string();
        self.call_ok(
            Method::DELETE,
            &["service", service_id, "version", &version, "domain", name],
        )
        .await
    }

    async fn list_backends(&self, service_id: &str, version: u32) -> ApiResult<Vec<Backend>> {
        let version = version.to_string();
        self.call(
            Method::GET,
            &["service", service_id, "version", &version, "backend"],
            None,
        )
        .await
    }

    async fn create_backend(
        &self,
        service_id: &str,
        version: u32,
        backend: &BackendBlock,
    ) -> ApiResult<Backend> {
        let version = version.to_string();
        let form = backend_form(backend);
        self.call(
            Method::POST,
            &["service", service_id, "version", &version, "backend"],
            Some(&form),
        )
        .await
    }

    async fn delete_backend(&self, service_id: &str, version: u32, name: &str) -> ApiResult<()> {
        let version = version.to_string();
        self.call_ok(
            Method::DELETE,
            &["service", service_id, "version", &version, "backend", name],
        )
        .await
    }
}
