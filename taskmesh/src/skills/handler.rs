//! Handler and payload factory traits.

use bytes::Bytes;

/// Worker-side skill implementation.
///
/// A handler is a pure function of its input bytes: it must not retain the
/// input buffer after returning, and its response payload must be
/// self-contained (the caller frames it). Returning `None` reports a
/// handler failure to the dispatcher.
pub trait SkillHandler: Send + Sync {
    /// The skill id this handler serves.
    fn skill_id(&self) -> u32;

    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Process a request payload into a response payload.
    fn process(&self, payload: &[u8]) -> Option<Bytes>;
}

/// Manager-side request payload construction.
///
/// Factories let task producers build valid request payloads without
/// knowing each skill's encoding. `sample_request` produces a
/// representative request for generated workloads, varying with the task
/// id.
pub trait PayloadFactory: Send + Sync {
    /// The skill id this factory builds payloads for.
    fn skill_id(&self) -> u32;

    /// Build a representative request payload for a generated task.
    fn sample_request(&self, task_id: u32) -> Bytes;
}
