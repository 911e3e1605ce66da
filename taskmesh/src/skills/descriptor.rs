//! Complete skill definition: metadata + handler + payload factory.

use super::handler::{PayloadFactory, SkillHandler};
use std::sync::Arc;

/// Everything the registry knows about one skill.
///
/// Combines metadata (id, name, description, version) with the worker-side
/// handler and the optional manager-side payload factory. The size hints
/// let buffer-conscious callers preallocate.
pub struct SkillDescriptor {
    /// Unique skill identifier.
    pub id: u32,
    /// Human-readable name.
    pub name: &'static str,
    /// Brief description of what the skill does.
    pub description: &'static str,
    /// Schema version for compatibility checking.
    pub version: u32,
    /// Worker-side implementation.
    pub handler: Arc<dyn SkillHandler>,
    /// Manager-side request construction; absent for response-only skills.
    pub payload_factory: Option<Arc<dyn PayloadFactory>>,
    /// Typical request payload size (bytes) for buffer preallocation.
    pub typical_request_size: usize,
    /// Typical response payload size (bytes) for buffer preallocation.
    pub typical_response_size: usize,
}

impl SkillDescriptor {
    /// Convenience constructor with version 1 and 256-byte size hints.
    pub fn new(
        id: u32,
        name: &'static str,
        description: &'static str,
        handler: Arc<dyn SkillHandler>,
        payload_factory: Option<Arc<dyn PayloadFactory>>,
    ) -> Self {
        Self {
            id,
            name,
            description,
            version: 1,
            handler,
            payload_factory,
            typical_request_size: 256,
            typical_response_size: 256,
        }
    }

    /// Override the size hints.
    pub fn with_typical_sizes(mut self, request: usize, response: usize) -> Self {
        self.typical_request_size = request;
        self.typical_response_size = response;
        self
    }

    /// Override the schema version.
    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }
}

impl std::fmt::Debug for SkillDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SkillDescriptor")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("version", &self.version)
            .field("has_factory", &self.payload_factory.is_some())
            .finish()
    }
}
