//! Carina Core
//!
//! Resource, schema and provider model shared by the Carina CLI and its
//! providers. Providers translate between remote API objects and the
//! attribute maps defined here.

pub mod provider;
pub mod resource;
pub mod schema;
