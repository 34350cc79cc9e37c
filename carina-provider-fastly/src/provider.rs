//! Fastly Provider implementation
//!
//! This module drives the service lifecycle through [`FastlyApi`]: create a
//! service and its first version, clone and activate versions when domains
//! or backends change, and project the active version back into state.

use std::collections::{HashMap, HashSet};

use carina_core::provider::{ProviderError, ProviderResult};
use carina_core::resource::{Resource, ResourceId, State, Value};
use log::{debug, info, warn};

use crate::client::{ApiError, FastlyApi, FastlyClient};
use crate::config::FastlyConfig;
use crate::flatten::{
    BackendBlock, DomainBlock, FlattenError, backends_to_value, domains_to_value,
    expand_backends, expand_domains, flatten_backends, flatten_domains, missing_from,
};
use crate::schemas::{SERVICE_V1, keys, service_v1_schema};

/// Comment attached to services created by Carina
const SERVICE_COMMENT: &str = "Managed by Carina";

/// Desired configuration of a `fastly_service_v1` resource
#[derive(Debug, Clone, PartialEq)]
struct ServiceConfig {
    name: String,
    domains: Vec<DomainBlock>,
    backends: Vec<BackendBlock>,
    force_destroy: bool,
}

impl ServiceConfig {
    fn from_resource(resource: &Resource) -> ProviderResult<Self> {
        let schema = service_v1_schema();
        if let Err(errors) = schema.validate(&resource.attributes) {
            let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            return Err(ProviderError::new(format!(
                "Invalid configuration: {}",
                messages.join("; ")
            ))
            .for_resource(resource.id.clone()));
        }

        let attrs = schema.apply_defaults(&resource.attributes);
        let invalid = |e: FlattenError| {
            ProviderError::new("Invalid configuration")
                .for_resource(resource.id.clone())
                .with_cause(e)
        };

        let config = Self {
            name: attrs
                .get(keys::NAME)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            domains: expand_domains(attrs.get(keys::DOMAIN)).map_err(invalid)?,
            backends: expand_backends(attrs.get(keys::BACKEND)).map_err(invalid)?,
            force_destroy: attrs
                .get(keys::FORCE_DESTROY)
                .and_then(Value::as_bool)
                .unwrap_or(false),
        };

        let duplicate = duplicate_name(config.domains.iter().map(|d| d.name.as_str()))
            .map(|name| (keys::DOMAIN, name))
            .or_else(|| {
                duplicate_name(config.backends.iter().map(|b| b.name.as_str()))
                    .map(|name| (keys::BACKEND, name))
            });
        if let Some((block, name)) = duplicate {
            return Err(ProviderError::new(format!(
                "Invalid configuration: {} name '{}' is used more than once",
                block, name
            ))
            .for_resource(resource.id.clone()));
        }

        Ok(config)
    }
}

/// First name that appears twice; block names are unique within a version
fn duplicate_name<'a>(names: impl Iterator<Item = &'a str>) -> Option<&'a str> {
    let mut seen = HashSet::new();
    names.into_iter().find(|name| !seen.insert(*name))
}

/// Changes between two sets of blocks
struct BlockChanges<'a, T> {
    removed: Vec<&'a T>,
    added: Vec<&'a T>,
}

impl<'a, T: PartialEq> BlockChanges<'a, T> {
    fn between(current: &'a [T], desired: &'a [T]) -> Self {
        Self {
            removed: missing_from(current, desired),
            added: missing_from(desired, current),
        }
    }

    fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.added.is_empty()
    }
}

fn api_failure(action: &str, id: &ResourceId) -> impl FnOnce(ApiError) -> ProviderError {
    let message = format!("Failed to {}", action);
    let id = id.clone();
    move |e| ProviderError::new(message).for_resource(id).with_cause(e)
}

/// Fastly Provider
pub struct FastlyProvider {
    api: Box<dyn FastlyApi>,
}

impl FastlyProvider {
    /// Create a provider talking to the Fastly API over HTTPS
    pub fn new(config: &FastlyConfig) -> ProviderResult<Self> {
        let client = FastlyClient::new(config)
            .map_err(|e| ProviderError::new("Failed to build Fastly client").with_cause(e))?;
        Ok(Self::with_api(client))
    }

    /// Create a provider on top of any [`FastlyApi`] implementation
    pub fn with_api(api: impl FastlyApi + 'static) -> Self {
        Self { api: Box::new(api) }
    }

    /// Direct access to the API, e.g. for listing services
    pub fn api(&self) -> &dyn FastlyApi {
        self.api.as_ref()
    }

    fn check_type(id: &ResourceId) -> ProviderResult<()> {
        if id.resource_type == SERVICE_V1 {
            Ok(())
        } else {
            Err(
                ProviderError::new(format!("Unknown resource type: {}", id.resource_type))
                    .for_resource(id.clone()),
            )
        }
    }

    // =========================================================================
    // Resource Operations
    // =========================================================================

    /// Read a service and its active version
    pub async fn read_service(
        &self,
        id: &ResourceId,
        identifier: Option<&str>,
    ) -> ProviderResult<State> {
        Self::check_type(id)?;

        let identifier = match identifier {
            Some(identifier) => identifier,
            None => return Ok(State::not_found(id.clone())),
        };

        let detail = match self.api.get_service_details(identifier).await {
            Ok(detail) => detail,
            Err(e) if e.is_not_found() => return Ok(State::not_found(id.clone())),
            Err(e) => return Err(api_failure("read service", id)(e)),
        };

        let active = detail.active_version_number();
        let (domains, backends) = if active > 0 {
            let domains = self
                .api
                .list_domains(identifier, active)
                .await
                .map_err(api_failure("list domains", id))?;
            let backends = self
                .api
                .list_backends(identifier, active)
                .await
                .map_err(api_failure("list backends", id))?;
            (flatten_domains(&domains), flatten_backends(&backends))
        } else {
            (Vec::new(), Vec::new())
        };
        debug!(
            "Read service {} at version {}: {} domain(s), {} backend(s)",
            identifier,
            active,
            domains.len(),
            backends.len()
        );

        let mut attributes = HashMap::new();
        attributes.insert(keys::NAME.to_string(), Value::String(detail.name));
        attributes.insert(keys::ACTIVE_VERSION.to_string(), Value::from(active));
        attributes.insert(keys::DOMAIN.to_string(), domains_to_value(&domains));
        attributes.insert(keys::BACKEND.to_string(), backends_to_value(&backends));

        Ok(State::existing(id.clone(), attributes).with_identifier(identifier))
    }

    /// Create a service, populate version 1 and activate it
    pub async fn create_service(&self, resource: Resource) -> ProviderResult<State> {
        let id = &resource.id;
        Self::check_type(id)?;
        let config = ServiceConfig::from_resource(&resource)?;

        info!("Creating Fastly service '{}'", config.name);
        let service = self
            .api
            .create_service(&config.name, SERVICE_COMMENT)
            .await
            .map_err(api_failure("create service", id))?;
        let version = service.latest_version().unwrap_or(1);

        if let Err(mut e) = self
            .populate_version(id, &service.id, version, &config)
            .await
        {
            warn!(
                "Service {} was created but version {} could not be activated, removing it",
                service.id, version
            );
            // Nothing tracks the service yet, so it must not outlive the failure
            match self.api.delete_service(&service.id).await {
                Ok(()) => info!("Removed partially created service {}", service.id),
                Err(cleanup) => {
                    warn!("Failed to remove service {}: {}", service.id, cleanup);
                    e.message = format!("{} (service {} was left behind)", e.message, service.id);
                }
            }
            return Err(e);
        }

        let state = self.read_service(id, Some(&service.id)).await?;
        Ok(with_force_destroy(state, config.force_destroy))
    }

    async fn populate_version(
        &self,
        id: &ResourceId,
        service_id: &str,
        version: u32,
        config: &ServiceConfig,
    ) -> ProviderResult<()> {
        for domain in &config.domains {
            self.api
                .create_domain(service_id, version, domain)
                .await
                .map_err(api_failure(&format!("add domain '{}'", domain.name), id))?;
        }
        for backend in &config.backends {
            self.api
                .create_backend(service_id, version, backend)
                .await
                .map_err(api_failure(&format!("add backend '{}'", backend.name), id))?;
        }
        self.api
            .activate_version(service_id, version)
            .await
            .map_err(api_failure(&format!("activate version {}", version), id))?;
        info!("Activated version {} of service {}", version, service_id);
        Ok(())
    }

    /// Update a service
    ///
    /// Renaming does not create a version. Domain and backend changes are
    /// made on a clone of the active version, which is then activated.
    pub async fn update_service(
        &self,
        id: ResourceId,
        identifier: &str,
        from: &State,
        to: Resource,
    ) -> ProviderResult<State> {
        Self::check_type(&id)?;
        let config = ServiceConfig::from_resource(&to)?;

        let current_name = from.get(keys::NAME).and_then(Value::as_str);
        if current_name != Some(config.name.as_str()) {
            info!("Renaming service {} to '{}'", identifier, config.name);
            self.api
                .update_service_name(identifier, &config.name)
                .await
                .map_err(api_failure("rename service", &id))?;
        }

        let invalid_state = |e: FlattenError| {
            ProviderError::new("Unreadable prior state")
                .for_resource(id.clone())
                .with_cause(e)
        };
        let current_domains = expand_domains(from.get(keys::DOMAIN)).map_err(invalid_state)?;
        let current_backends = expand_backends(from.get(keys::BACKEND)).map_err(invalid_state)?;

        let domain_changes = BlockChanges::between(&current_domains, &config.domains);
        let backend_changes = BlockChanges::between(&current_backends, &config.backends);

        if !domain_changes.is_empty() || !backend_changes.is_empty() {
            let base = self.base_version(&id, identifier).await?;
            let version = self
                .api
                .clone_version(identifier, base)
                .await
                .map_err(api_failure(&format!("clone version {}", base), &id))?
                .number;
            info!(
                "Cloned version {} of service {} into version {}",
                base, identifier, version
            );

            // Removals first so a changed block can be re-added under the same name
            for domain in &domain_changes.removed {
                self.api
                    .delete_domain(identifier, version, &domain.name)
                    .await
                    .map_err(api_failure(&format!("remove domain '{}'", domain.name), &id))?;
            }
            for backend in &backend_changes.removed {
                self.api
                    .delete_backend(identifier, version, &backend.name)
                    .await
                    .map_err(api_failure(&format!("remove backend '{}'", backend.name), &id))?;
            }
            for domain in &domain_changes.added {
                self.api
                    .create_domain(identifier, version, domain)
                    .await
                    .map_err(api_failure(&format!("add domain '{}'", domain.name), &id))?;
            }
            for backend in &backend_changes.added {
                self.api
                    .create_backend(identifier, version, backend)
                    .await
                    .map_err(api_failure(&format!("add backend '{}'", backend.name), &id))?;
            }

            self.api
                .activate_version(identifier, version)
                .await
                .map_err(api_failure(&format!("activate version {}", version), &id))?;
            info!("Activated version {} of service {}", version, identifier);
        }

        let state = self.read_service(&id, Some(identifier)).await?;
        Ok(with_force_destroy(state, config.force_destroy))
    }

    /// Version to clone: the active one, else the latest
    async fn base_version(&self, id: &ResourceId, identifier: &str) -> ProviderResult<u32> {
        let detail = self
            .api
            .get_service_details(identifier)
            .await
            .map_err(api_failure("read service", id))?;

        match detail.active_version_number() {
            0 => detail.version.map(|v| v.number).ok_or_else(|| {
                ProviderError::new("Service has no version to clone").for_resource(id.clone())
            }),
            active => Ok(active),
        }
    }

    /// Delete a service
    ///
    /// With `force_destroy` the active version is deactivated first; without
    /// it the API refuses to delete a service that is still serving traffic.
    pub async fn delete_service(
        &self,
        id: &ResourceId,
        identifier: &str,
        force_destroy: bool,
    ) -> ProviderResult<()> {
        Self::check_type(id)?;

        if force_destroy {
            let detail = match self.api.get_service_details(identifier).await {
                Ok(detail) => detail,
                Err(e) if e.is_not_found() => {
                    warn!("Service {} is already gone", identifier);
                    return Ok(());
                }
                Err(e) => return Err(api_failure("read service", id)(e)),
            };

            let active = detail.active_version_number();
            if active > 0 {
                info!("Deactivating version {} of service {}", active, identifier);
                self.api
                    .deactivate_version(identifier, active)
                    .await
                    .map_err(api_failure(&format!("deactivate version {}", active), id))?;
            }
        }

        info!("Deleting service {}", identifier);
        match self.api.delete_service(identifier).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_not_found() => {
                warn!("Service {} is already gone", identifier);
                Ok(())
            }
            Err(e) => Err(api_failure("delete service", id)(e)),
        }
    }
}

/// `force_destroy` is not stored remotely; carry it from configuration
fn with_force_destroy(mut state: State, force_destroy: bool) -> State {
    if state.exists {
        state
            .attributes
            .insert(keys::FORCE_DESTROY.to_string(), Value::Bool(force_destroy));
    }
    state
}
