//! # onebridge-core
//!
//! The part of the bridge that protocol handlers talk to: an entity cache
//! over friends, groups and group members backed by a remote source, and a
//! resolver that turns any inbound media reference into a local file.
//! [`Bridge`] bundles both together with the silk transcoder.

pub mod bridge;
pub mod config;
pub mod entities;
pub mod logging;
pub mod resolver;

mod error;

pub use bridge::Bridge;
pub use config::BridgeConfig;
pub use entities::{EntityCache, EntitySource};
pub use error::{CoreError, ResolveError};
pub use resolver::{FileCacheLookup, NoFileCache, PathStyle, ResolvedResource, ResourceResolver};
