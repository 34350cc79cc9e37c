//! Attribute mapping between Fastly records and configuration blocks
//!
//! `flatten_*` turns remote records into typed blocks, one per record and in
//! input order, filling every absent field with its default (empty string,
//! zero or `false`). Blocks render to `Value::Map`s whose key set is exactly
//! the schema block's key set.
//!
//! `expand_*` goes the other way, reading configured blocks (with schema
//! defaults applied) into typed blocks for create and update calls.

use std::borrow::Cow;
use std::collections::HashMap;

use carina_core::resource::Value;
use carina_core::schema::BlockSchema;
use thiserror::Error;

use crate::schemas::{backend_block, domain_block, keys};
use crate::types::{Backend, Domain};

/// A `domain { ... }` block
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct DomainBlock {
    pub name: String,
    pub comment: String,
}

/// A `backend { ... }` block
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct BackendBlock {
    pub name: String,
    pub address: String,
    pub port: u32,
    pub auto_loadbalance: bool,
    pub between_bytes_timeout: u32,
    pub connect_timeout: u32,
    pub error_threshold: u32,
    pub first_byte_timeout: u32,
    pub max_conn: u32,
    pub ssl_check_cert: bool,
    pub weight: u32,
}

/// Error reading a configured block
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FlattenError {
    #[error("'{block}' must be a list of blocks")]
    NotAList { block: &'static str },

    #[error("{block}[{index}] is not a block")]
    NotABlock { block: &'static str, index: usize },

    #[error("{block}[{index}] is missing '{key}'")]
    MissingKey {
        block: &'static str,
        index: usize,
        key: &'static str,
    },

    #[error("{block}[{index}].{key}: expected {expected}")]
    WrongType {
        block: &'static str,
        index: usize,
        key: &'static str,
        expected: &'static str,
    },

    #[error("{block}[{index}].{key}: {value} does not fit in an unsigned 32-bit integer")]
    OutOfRange {
        block: &'static str,
        index: usize,
        key: &'static str,
        value: i64,
    },
}

/// Map remote domains to `domain` blocks
pub fn flatten_domains(remote: &[Domain]) -> Vec<DomainBlock> {
    remote
        .iter()
        .map(|d| DomainBlock {
            name: d.name.clone(),
            comment: d.comment.clone().unwrap_or_default(),
        })
        .collect()
}

/// Map remote backends to `backend` blocks
///
/// Absent fields become zero or `false`, not the schema defaults that
/// [`expand_backends`] applies. A backend missing e.g. `max_conn` therefore
/// never equals its configured block and is replaced on every update. The
/// Fastly API always returns these fields.
pub fn flatten_backends(remote: &[Backend]) -> Vec<BackendBlock> {
    remote
        .iter()
        .map(|b| BackendBlock {
            name: b.name.clone(),
            address: b.address.clone().unwrap_or_default(),
            port: b.port.unwrap_or_default(),
            auto_loadbalance: b.auto_loadbalance.unwrap_or_default(),
            between_bytes_timeout: b.between_bytes_timeout.unwrap_or_default(),
            connect_timeout: b.connect_timeout.unwrap_or_default(),
            error_threshold: b.error_threshold.unwrap_or_default(),
            first_byte_timeout: b.first_byte_timeout.unwrap_or_default(),
            max_conn: b.max_conn.unwrap_or_default(),
            ssl_check_cert: b.ssl_check_cert.unwrap_or_default(),
            weight: b.weight.unwrap_or_default(),
        })
        .collect()
}

impl From<&DomainBlock> for Value {
    fn from(block: &DomainBlock) -> Self {
        let mut map = HashMap::new();
        map.insert(keys::NAME.to_string(), Value::from(block.name.as_str()));
        map.insert(keys::COMMENT.to_string(), Value::from(block.comment.as_str()));
        Value::Map(map)
    }
}

impl From<&BackendBlock> for Value {
    fn from(block: &BackendBlock) -> Self {
        let entries = [
            (keys::NAME, Value::from(block.name.as_str())),
            (keys::ADDRESS, Value::from(block.address.as_str())),
            (keys::PORT, Value::from(block.port)),
            (keys::AUTO_LOADBALANCE, Value::from(block.auto_loadbalance)),
            (
                keys::BETWEEN_BYTES_TIMEOUT,
                Value::from(block.between_bytes_timeout),
            ),
            (keys::CONNECT_TIMEOUT, Value::from(block.connect_timeout)),
            (keys::ERROR_THRESHOLD, Value::from(block.error_threshold)),
            (keys::FIRST_BYTE_TIMEOUT, Value::from(block.first_byte_timeout)),
            (keys::MAX_CONN, Value::from(block.max_conn)),
            (keys::SSL_CHECK_CERT, Value::from(block.ssl_check_cert)),
            (keys::WEIGHT, Value::from(block.weight)),
        ];
        Value::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        )
    }
}

pub fn domains_to_value(blocks: &[DomainBlock]) -> Value {
    Value::List(blocks.iter().map(Value::from).collect())
}

pub fn backends_to_value(blocks: &[BackendBlock]) -> Value {
    Value::List(blocks.iter().map(Value::from).collect())
}

/// Read configured `domain` blocks. An absent attribute means no blocks.
pub fn expand_domains(value: Option<&Value>) -> Result<Vec<DomainBlock>, FlattenError> {
    let schema = domain_block();
    read_blocks(keys::DOMAIN, value, |reader| {
        let reader = reader.with_defaults(&schema);
        Ok(DomainBlock {
            name: reader.string(keys::NAME)?,
            comment: reader.string(keys::COMMENT)?,
        })
    })
}

/// Read configured `backend` blocks. An absent attribute means no blocks.
pub fn expand_backends(value: Option<&Value>) -> Result<Vec<BackendBlock>, FlattenError> {
    let schema = backend_block();
    read_blocks(keys::BACKEND, value, |reader| {
        let reader = reader.with_defaults(&schema);
        Ok(BackendBlock {
            name: reader.string(keys::NAME)?,
            address: reader.string(keys::ADDRESS)?,
            port: reader.uint(keys::PORT)?,
            auto_loadbalance: reader.boolean(keys::AUTO_LOADBALANCE)?,
            between_bytes_timeout: reader.uint(keys::BETWEEN_BYTES_TIMEOUT)?,
            connect_timeout: reader.uint(keys::CONNECT_TIMEOUT)?,
            error_threshold: reader.uint(keys::ERROR_THRESHOLD)?,
            first_byte_timeout: reader.uint(keys::FIRST_BYTE_TIMEOUT)?,
            max_conn: reader.uint(keys::MAX_CONN)?,
            ssl_check_cert: reader.boolean(keys::SSL_CHECK_CERT)?,
            weight: reader.uint(keys::WEIGHT)?,
        })
    })
}

/// Items of `desired` that are not in `current`, in `desired` order
pub fn missing_from<'a, T: PartialEq>(desired: &'a [T], current: &[T]) -> Vec<&'a T> {
    desired.iter().filter(|b| !current.contains(b)).collect()
}

fn read_blocks<T>(
    block: &'static str,
    value: Option<&Value>,
    read: impl Fn(BlockReader<'_>) -> Result<T, FlattenError>,
) -> Result<Vec<T>, FlattenError> {
    let items = match value {
        None => return Ok(Vec::new()),
        Some(Value::List(items)) => items,
        Some(_) => return Err(FlattenError::NotAList { block }),
    };

    items
        .iter()
        .enumerate()
        .map(|(index, item)| match item {
            Value::Map(map) => read(BlockReader {
                block,
                index,
                map: Cow::Borrowed(map),
            }),
            _ => Err(FlattenError::NotABlock { block, index }),
        })
        .collect()
}

struct BlockReader<'a> {
    block: &'static str,
    index: usize,
    map: Cow<'a, HashMap<String, Value>>,
}

impl BlockReader<'_> {
    fn with_defaults(self, schema: &BlockSchema) -> Self {
        Self {
            map: Cow::Owned(schema.with_defaults(&self.map)),
            ..self
        }
    }

    fn get(&self, key: &'static str) -> Result<&Value, FlattenError> {
        self.map.get(key).ok_or(FlattenError::MissingKey {
            block: self.block,
            index: self.index,
            key,
        })
    }

    fn wrong_type(&self, key: &'static str, expected: &'static str) -> FlattenError {
        FlattenError::WrongType {
            block: self.block,
            index: self.index,
            key,
            expected,
        }
    }

    fn string(&self, key: &'static str) -> Result<String, FlattenError> {
        self.get(key)?
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| self.wrong_type(key, "string"))
    }

    fn uint(&self, key: &'static str) -> Result<u32, FlattenError> {
        let n = self
            .get(key)?
            .as_int()
            .ok_or_else(|| self.wrong_type(key, "integer"))?;
        u32::try_from(n).map_err(|_| FlattenError::OutOfRange {
            block: self.block,
            index: self.index,
            key,
            value: n,
        })
    }

    fn boolean(&self, key: &'static str) -> Result<bool, FlattenError> {
        self.get(key)?
            .as_bool()
            .ok_or_else(|| self.wrong_type(key, "bool"))
    }
}
