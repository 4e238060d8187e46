//! Discovered service instances.

use crate::routing::DownstreamHostAndPort;

const VERSION_PREFIX: &str = "version-";

/// One concrete endpoint currently believed to implement a named service.
///
/// Produced fresh on every discovery call and never mutated; stale snapshots
/// are discarded wholesale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceInstance {
    /// Service name this instance belongs to.
    pub name: String,

    /// The endpoint itself.
    pub host_and_port: DownstreamHostAndPort,

    /// Registry-assigned instance id, empty for static instances.
    pub id: String,

    /// Version marker parsed from a `version-` tag, when present.
    pub version: Option<String>,

    /// Opaque registry tags.
    pub tags: Vec<String>,
}

impl ServiceInstance {
    /// A bare instance with no registry metadata.
    pub fn new(name: impl Into<String>, host_and_port: DownstreamHostAndPort) -> Self {
        Self {
            name: name.into(),
            host_and_port,
            id: String::new(),
            version: None,
            tags: Vec::new(),
        }
    }

    /// An instance carrying registry metadata; the version marker is taken
    /// from the first `version-`-prefixed tag.
    pub fn with_metadata(
        name: impl Into<String>,
        host_and_port: DownstreamHostAndPort,
        id: impl Into<String>,
        tags: Vec<String>,
    ) -> Self {
        let version = tags
            .iter()
            .find(|t| t.starts_with(VERSION_PREFIX))
            .map(|t| t[VERSION_PREFIX.len()..].to_string());

        Self {
            name: name.into(),
            host_and_port,
            id: id.into(),
            version,
            tags,
        }
    }
}
