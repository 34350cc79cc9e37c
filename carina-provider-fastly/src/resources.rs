//! Resource type definitions for the Fastly provider

use carina_core::provider::ResourceType;
use carina_core::schema::ResourceSchema;

use crate::schemas::{SERVICE_V1, service_v1_schema};

// =============================================================================
// Resource Type Definitions
// =============================================================================

/// `fastly_service_v1`
pub struct ServiceV1Type;

impl ResourceType for ServiceV1Type {
    fn name(&self) -> &'static str {
        SERVICE_V1
    }

    fn schema(&self) -> ResourceSchema {
        service_v1_schema()
    }
}

/// Returns all resource types supported by this provider
pub fn resource_types() -> Vec<Box<dyn ResourceType>> {
    vec![Box::new(ServiceV1Type)]
}
