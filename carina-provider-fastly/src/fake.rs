//! In-memory Fastly API for provider tests

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::client::{ApiError, ApiResult, FastlyApi};
use crate::flatten::{BackendBlock, DomainBlock};
use crate::types::{Backend, Domain, Service, ServiceDetail, Version};

#[derive(Debug, Clone)]
struct FakeVersion {
    number: u32,
    active: bool,
    locked: bool,
    domains: Vec<Domain>,
    backends: Vec<Backend>,
}

impl FakeVersion {
    fn new(number: u32) -> Self {
        Self {
            number,
            active: false,
            locked: false,
            domains: Vec::new(),
            backends: Vec::new(),
        }
    }

    fn to_version(&self, service_id: &str) -> Version {
        Version {
            number: self.number,
            active: self.active,
            locked: self.locked,
            comment: None,
            service_id: Some(service_id.to_string()),
        }
    }
}

#[derive(Debug)]
struct FakeService {
    name: String,
    comment: String,
    versions: Vec<FakeVersion>,
}

impl FakeService {
    fn active(&self) -> Option<&FakeVersion> {
        self.versions.iter().find(|v| v.active)
    }

    fn to_service(&self, id: &str) -> Service {
        Service {
            id: id.to_string(),
            name: self.name.clone(),
            comment: Some(self.comment.clone()),
            customer_id: None,
            active_version: self.active().map(|v| v.number),
            versions: self.versions.iter().map(|v| v.to_version(id)).collect(),
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    services: BTreeMap<String, FakeService>,
    next_id: u32,
    calls: Vec<String>,
    failing: Vec<String>,
}

impl Inner {
    fn service(&mut self, id: &str) -> ApiResult<&mut FakeService> {
        self.services
            .get_mut(id)
            .ok_or_else(|| ApiError::NotFound(format!("service {}", id)))
    }

    fn editable(&mut self, id: &str, number: u32) -> ApiResult<&mut FakeVersion> {
        let version = self
            .service(id)?
            .versions
            .iter_mut()
            .find(|v| v.number == number)
            .ok_or_else(|| ApiError::NotFound(format!("version {}", number)))?;
        if version.locked {
            return Err(ApiError::Status {
                status: 400,
                message: format!("Version {} is locked", number),
            });
        }
        Ok(version)
    }

    fn version(&mut self, id: &str, number: u32) -> ApiResult<&mut FakeVersion> {
        self.service(id)?
            .versions
            .iter_mut()
            .find(|v| v.number == number)
            .ok_or_else(|| ApiError::NotFound(format!("version {}", number)))
    }
}

/// Fastly API double that keeps services in memory and records every call
#[derive(Debug, Clone, Default)]
pub struct FakeFastly {
    inner: Arc<Mutex<Inner>>,
}

impl FakeFastly {
    fn lock(&self, call: String) -> ApiResult<MutexGuard<'_, Inner>> {
        let mut inner = self.inner.lock().unwrap();
        let method = call.split(' ').next().unwrap_or_default();
        let fails = inner.failing.iter().any(|failing| failing == method);
        inner.calls.push(call);
        if fails {
            return Err(ApiError::Status {
                status: 400,
                message: "injected failure".to_string(),
            });
        }
        Ok(inner)
    }

    /// Make every later call to `method` fail with a 400
    pub fn fail(&self, method: &str) {
        self.inner.lock().unwrap().failing.push(method.to_string());
    }

    /// IDs of services that still exist
    pub fn service_ids(&self) -> Vec<String> {
        self.inner.lock().unwrap().services.keys().cloned().collect()
    }

    /// Calls made so far, as "method arg..." strings
    pub fn calls(&self) -> Vec<String> {
        self.inner.lock().unwrap().calls.clone()
    }

    /// Number of calls that change remote state
    pub fn writes(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| !c.starts_with("list_") && !c.starts_with("get_"))
            .count()
    }
}

#[async_trait]
impl FastlyApi for FakeFastly {
    async fn list_services(&self) -> ApiResult<Vec<Service>> {
        let inner = self.lock("list_services".to_string())?;
        Ok(inner
            .services
            .iter()
            .map(|(id, s)| s.to_service(id))
            .collect())
    }

    async fn create_service(&self, name: &str, comment: &str) -> ApiResult<Service> {
        let mut inner = self.lock(format!("create_service {}", name))?;
        inner.next_id += 1;
        let id = format!("svc{}", inner.next_id);
        let service = FakeService {
            name: name.to_string(),
            comment: comment.to_string(),
            versions: vec![FakeVersion::new(1)],
        };
        let created = service.to_service(&id);
        inner.services.insert(id, service);
        Ok(created)
    }

    async fn get_service_details(&self, service_id: &str) -> ApiResult<ServiceDetail> {
        let mut inner = self.lock(format!("get_service_details {}", service_id))?;
        let service = inner.service(service_id)?;
        let versions: Vec<Version> = service
            .versions
            .iter()
            .map(|v| v.to_version(service_id))
            .collect();
        Ok(ServiceDetail {
            id: service_id.to_string(),
            name: service.name.clone(),
            comment: Some(service.comment.clone()),
            customer_id: None,
            active_version: service.active().map(|v| v.to_version(service_id)),
            version: versions.last().cloned(),
            versions,
        })
    }

    async fn update_service_name(&self, service_id: &str, name: &str) -> ApiResult<Service> {
        let mut inner = self.lock(format!("update_service_name {} {}", service_id, name))?;
        let service = inner.service(service_id)?;
        service.name = name.to_string();
        Ok(service.to_service(service_id))
    }

    async fn delete_service(&self, service_id: &str) -> ApiResult<()> {
        let mut inner = self.lock(format!("delete_service {}", service_id))?;
        if inner.service(service_id)?.active().is_some() {
            return Err(ApiError::Status {
                status: 400,
                message: "Cannot delete a service with an active version".to_string(),
            });
        }
        inner.services.remove(service_id);
        Ok(())
    }

    async fn clone_version(&self, service_id: &str, version: u32) -> ApiResult<Version> {
        let mut inner = self.lock(format!("clone_version {} {}", service_id, version))?;
        let source = inner.version(service_id, version)?.clone();
        let service = inner.service(service_id)?;
        let number = service.versions.iter().map(|v| v.number).max().unwrap_or(0) + 1;
        let cloned = FakeVersion {
            number,
            active: false,
            locked: false,
            ..source
        };
        let result = cloned.to_version(service_id);
        service.versions.push(cloned);
        Ok(result)
    }

    async fn activate_version(&self, service_id: &str, version: u32) -> ApiResult<Version> {
        let mut inner = self.lock(format!("activate_version {} {}", service_id, version))?;
        inner.version(service_id, version)?;
        let service = inner.service(service_id)?;
        for v in &mut service.versions {
            v.active = v.number == version;
            if v.active {
                v.locked = true;
            }
        }
        let activated = service
            .versions
            .iter()
            .find(|v| v.number == version)
            .map(|v| v.to_version(service_id))
            .unwrap_or_default();
        Ok(activated)
    }

    async fn deactivate_version(&self, service_id: &str, version: u32) -> ApiResult<Version> {
        let mut inner = self.lock(format!("deactivate_version {} {}", service_id, version))?;
        let v = inner.version(service_id, version)?;
        v.active = false;
        Ok(v.to_version(service_id))
    }

    async fn list_domains(&self, service_id: &str, version: u32) -> ApiResult<Vec<Domain>> {
        let mut inner = self.lock(format!("list_domains {} {}", service_id, version))?;
        Ok(inner.version(service_id, version)?.domains.clone())
    }

    async fn create_domain(
        &self,
        service_id: &str,
        version: u32,
        domain: &DomainBlock,
    ) -> ApiResult<Domain> {
        let mut inner = self.lock(format!(
            "create_domain {} {} {}",
            service_id, version, domain.name
        ))?;
        let v = inner.editable(service_id, version)?;
        let created = Domain {
            name: domain.name.clone(),
            comment: Some(domain.comment.clone()),
            service_id: Some(service_id.to_string()),
            version: Some(version),
        };
        v.domains.push(created.clone());
        Ok(created)
    }

    async fn delete_domain(&self, service_id: &str, version: u32, name: &str) -> ApiResult<()> {
        let mut inner = self.lock(format!("delete_domain {} {} {}", service_id, version, name))?;
        let v = inner.editable(service_id, version)?;
        let before = v.domains.len();
        v.domains.retain(|d| d.name != name);
        if v.domains.len() == before {
            return Err(ApiError::NotFound(format!("domain {}", name)));
        }
        Ok(())
    }

    async fn list_backends(&self, service_id: &str, version: u32) -> ApiResult<Vec<Backend>> {
        let mut inner = self.lock(format!("list_backends {} {}", service_id, version))?;
        Ok(inner.version(service_id, version)?.backends.clone())
    }

    async fn create_backend(
        &self,
        service_id: &str,
        version: u32,
        backend: &BackendBlock,
    ) -> ApiResult<Backend> {
        let mut inner = self.lock(format!(
            "create_backend {} {} {}",
            service_id, version, backend.name
        ))?;
        let v = inner.editable(service_id, version)?;
        let created = Backend {
            name: backend.name.clone(),
            address: Some(backend.address.clone()),
            port: Some(backend.port),
            auto_loadbalance: Some(backend.auto_loadbalance),
            between_bytes_timeout: Some(backend.between_bytes_timeout),
            connect_timeout: Some(backend.connect_timeout),
            error_threshold: Some(backend.error_threshold),
            first_byte_timeout: Some(backend.first_byte_timeout),
            max_conn: Some(backend.max_conn),
            ssl_check_cert: Some(backend.ssl_check_cert),
            weight: Some(backend.weight),
            service_id: Some(service_id.to_string()),
            version: Some(version),
        };
        v.backends.push(created.clone());
        Ok(created)
    }

    async fn delete_backend(&self, service_id: &str, version: u32, name: &str) -> ApiResult<()> {
        let mut inner = self.lock(format!("delete_backend {} {} {}", service_id, version, name))?;
        let v = inner.editable(service_id, version)?;
        let before = v.backends.len();
        v.backends.retain(|b| b.name != name);
        if v.backends.len() == before {
            return Err(ApiError::NotFound(format!("backend {}", name)));
        }
        Ok(())
    }
}
