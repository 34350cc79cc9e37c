//! Carina Fastly Provider
//!
//! Manages Fastly CDN services (`fastly_service_v1`): the service itself,
//! its domains and its backends, applied through versioned configuration.
//!
//! ## Module Structure
//!
//! - `client` - Fastly REST API seam and HTTP client
//! - `config` - Provider configuration (API key, base URL)
//! - `flatten` - Attribute mapping between remote records and blocks
//! - `provider` - FastlyProvider implementation
//! - `resources` - Resource type definitions
//! - `schemas` - Resource schema and block key names
//! - `types` - Remote record types

pub mod client;
pub mod config;
pub mod flatten;
pub mod provider;
pub mod resources;
pub mod schemas;
pub mod types;

#[cfg(test)]
mod fake;

// Re-export main types
pub use client::{ApiError, FastlyApi, FastlyClient};
pub use config::{ConfigError, FastlyConfig};
pub use flatten::{BackendBlock, DomainBlock, flatten_backends, flatten_domains};
pub use provider::FastlyProvider;

use carina_core::provider::{BoxFuture, Provider, ProviderResult};
use carina_core::resource::{Resource, ResourceId, State, Value};

use resources::resource_types;
use schemas::keys;

// =============================================================================
// Provider Trait Implementation
// =============================================================================

impl Provider for FastlyProvider {
    fn name(&self) -> &'static str {
        "fastly"
    }

    fn resource_types(&self) -> Vec<Box<dyn carina_core::provider::ResourceType>> {
        resource_types()
    }

    fn read(
        &self,
        id: &ResourceId,
        identifier: Option<&str>,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        let id = id.clone();
        let identifier = identifier.map(|s| s.to_string());
        Box::pin(async move { self.read_service(&id, identifier.as_deref()).await })
    }

    fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        let resource = resource.clone();
        Box::pin(async move { self.create_service(resource).await })
    }

    fn update(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: &Resource,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        let id = id.clone();
        let identifier = identifier.to_string();
        let from = from.clone();
        let to = to.clone();
        Box::pin(async move { self.update_service(id, &identifier, &from, to).await })
    }

    fn delete(
        &self,
        id: &ResourceId,
        identifier: &str,
        last: &State,
    ) -> BoxFuture<'_, ProviderResult<()>> {
        let id = id.clone();
        let identifier = identifier.to_string();
        let force_destroy = last
            .get(keys::FORCE_DESTROY)
            .and_then(Value::as_bool)
            .unwrap_or(false);
        Box::pin(async move { self.delete_service(&id, &identifier, force_destroy).await })
    }
}
