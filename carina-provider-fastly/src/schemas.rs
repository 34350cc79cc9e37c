//! Schema for the `fastly_service_v1` resource
//!
//! Block key names live in [`keys`] and are shared with the
//! [`flatten`](crate::flatten) conversions, so the mapped output and the
//! schema cannot drift apart.

use carina_core::resource::Value;
use carina_core::schema::{AttributeSchema, AttributeType, BlockSchema, ResourceSchema, types};

/// Resource type name
pub const SERVICE_V1: &str = "fastly_service_v1";

/// Attribute and block key names
pub mod keys {
    pub const NAME: &str = "name";
    pub const DOMAIN: &str = "domain";
    pub const BACKEND: &str = "backend";
    pub const FORCE_DESTROY: &str = "force_destroy";
    pub const ACTIVE_VERSION: &str = "active_version";

    pub const COMMENT: &str = "comment";

    pub const ADDRESS: &str = "address";
    pub const PORT: &str = "port";
    pub const AUTO_LOADBALANCE: &str = "auto_loadbalance";
    pub const BETWEEN_BYTES_TIMEOUT: &str = "between_bytes_timeout";
    pub const CONNECT_TIMEOUT: &str = "connect_timeout";
    pub const ERROR_THRESHOLD: &str = "error_threshold";
    pub const FIRST_BYTE_TIMEOUT: &str = "first_byte_timeout";
    pub const MAX_CONN: &str = "max_conn";
    pub const SSL_CHECK_CERT: &str = "ssl_check_cert";
    pub const WEIGHT: &str = "weight";

    /// Keys of a `domain` block
    pub const DOMAIN_KEYS: [&str; 2] = [NAME, COMMENT];

    /// Keys of a `backend` block
    pub const BACKEND_KEYS: [&str; 11] = [
        NAME,
        ADDRESS,
        PORT,
        AUTO_LOADBALANCE,
        BETWEEN_BYTES_TIMEOUT,
        CONNECT_TIMEOUT,
        ERROR_THRESHOLD,
        FIRST_BYTE_TIMEOUT,
        MAX_CONN,
        SSL_CHECK_CERT,
        WEIGHT,
    ];
}

/// Schema of a `domain { ... }` block
pub fn domain_block() -> BlockSchema {
    BlockSchema::new(keys::DOMAIN)
        .attribute(
            AttributeSchema::new(keys::NAME, types::non_empty_string())
                .required()
                .with_description("Domain name that routes to this service"),
        )
        .attribute(
            AttributeSchema::new(keys::COMMENT, AttributeType::String)
                .with_default("")
                .with_description("Free-form comment"),
        )
}

/// Schema of a `backend { ... }` block
///
/// Defaults match what the Fastly API applies to a new backend.
pub fn backend_block() -> BlockSchema {
    BlockSchema::new(keys::BACKEND)
        .attribute(
            AttributeSchema::new(keys::NAME, types::non_empty_string())
                .required()
                .with_description("Unique name for this backend"),
        )
        .attribute(
            AttributeSchema::new(keys::ADDRESS, types::non_empty_string())
                .required()
                .with_description("Hostname or IP address of the origin"),
        )
        .attribute(AttributeSchema::new(keys::PORT, types::port_number()).with_default(80u32))
        .attribute(
            AttributeSchema::new(keys::AUTO_LOADBALANCE, AttributeType::Bool).with_default(true),
        )
        .attribute(
            AttributeSchema::new(keys::BETWEEN_BYTES_TIMEOUT, types::uint32())
                .with_default(10000u32)
                .with_description("Milliseconds to wait between bytes"),
        )
        .attribute(
            AttributeSchema::new(keys::CONNECT_TIMEOUT, types::uint32())
                .with_default(1000u32)
                .with_description("Milliseconds to wait for a connection"),
        )
        .attribute(AttributeSchema::new(keys::ERROR_THRESHOLD, types::uint32()).with_default(0u32))
        .attribute(
            AttributeSchema::new(keys::FIRST_BYTE_TIMEOUT, types::uint32())
                .with_default(15000u32)
                .with_description("Milliseconds to wait for the first byte"),
        )
        .attribute(AttributeSchema::new(keys::MAX_CONN, types::uint32()).with_default(200u32))
        .attribute(AttributeSchema::new(keys::SSL_CHECK_CERT, AttributeType::Bool).with_default(true))
        .attribute(
            AttributeSchema::new(keys::WEIGHT, types::uint32())
                .with_default(100u32)
                .with_description("Relative load-balancing weight"),
        )
}

/// Returns the schema for `fastly_service_v1`
pub fn service_v1_schema() -> ResourceSchema {
    ResourceSchema::new(SERVICE_V1)
        .with_description("A Fastly CDN service and its active configuration version")
        .attribute(
            AttributeSchema::new(keys::NAME, types::non_empty_string())
                .required()
                .with_description("Service name"),
        )
        .attribute(
            AttributeSchema::new(keys::DOMAIN, AttributeType::blocks(domain_block()))
                .required()
                .with_description("Domains bound to the service"),
        )
        .attribute(
            AttributeSchema::new(keys::BACKEND, AttributeType::blocks(backend_block()))
                .with_default(Value::List(vec![]))
                .with_description("Origin servers"),
        )
        .attribute(
            AttributeSchema::new(keys::FORCE_DESTROY, AttributeType::Bool)
                .with_default(false)
                .with_description("Deactivate the active version before deleting the service"),
        )
        .attribute(
            AttributeSchema::new(keys::ACTIVE_VERSION, AttributeType::Int)
                .computed()
                .with_description("Currently active version number"),
        )
}
