//! Remote record types returned by the Fastly API
//!
//! Fields the API may send as `null` or leave out are `Option`s, or fall back
//! to their default for lists and flags. Turning them into concrete values is
//! the job of the [`flatten`](crate::flatten) module.

use serde::{Deserialize, Deserializer};

/// Deserialize `null` as the type's default value
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Service as returned by `GET /service` and `POST /service`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Service {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub customer_id: Option<String>,
    /// Active version number, absent when nothing is active
    #[serde(default, rename = "version")]
    pub active_version: Option<u32>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub versions: Vec<Version>,
}

impl Service {
    /// Highest version number known for this service
    pub fn latest_version(&self) -> Option<u32> {
        self.versions.iter().map(|v| v.number).max()
    }
}

/// Service as returned by `GET /service/{id}/details`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ServiceDetail {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub active_version: Option<Version>,
    /// Latest version
    #[serde(default)]
    pub version: Option<Version>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub versions: Vec<Version>,
}

impl ServiceDetail {
    /// Active version number, 0 when no version is active
    pub fn active_version_number(&self) -> u32 {
        self.active_version.as_ref().map(|v| v.number).unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Version {
    pub number: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub active: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub locked: bool,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub service_id: Option<String>,
}

/// Domain bound to a service version
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Domain {
    pub name: String,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub service_id: Option<String>,
    #[serde(default)]
    pub version: Option<u32>,
}

/// Origin server bound to a service version
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Backend {
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub port: Option<u32>,
    #[serde(default)]
    pub auto_loadbalance: Option<bool>,
    #[serde(default)]
    pub between_bytes_timeout: Option<u32>,
    #[serde(default)]
    pub connect_timeout: Option<u32>,
    #[serde(default)]
    pub error_threshold: Option<u32>,
    #[serde(default)]
    pub first_byte_timeout: Option<u32>,
    #[serde(default)]
    pub max_conn: Option<u32>,
    #[serde(default)]
    pub ssl_check_cert: Option<bool>,
    #[serde(default)]
    pub weight: Option<u32>,
    #[serde(default)]
    pub service_id: Option<String>,
    #[serde(default)]
    pub version: Option<u32>,
}

/// Body of write endpoints that return `{"status": "ok"}`
#[derive(Debug, Deserialize)]
pub(crate) struct StatusResponse {
    #[serde(default)]
    pub status: String,
}

/// Error body returned by the API on failure
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorResponse {
    pub msg: String,
    #[serde(default)]
    pub detail: Option<String>,
}
