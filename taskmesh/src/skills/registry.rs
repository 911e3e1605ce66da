//! Process-wide skill registry.

use super::descriptor::SkillDescriptor;
use crate::log::{Logger, NoOpLogger};
use crate::{log_debug, log_warn};
use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::{Arc, OnceLock};
use thiserror::Error;

/// Dispatch failure, reported to the caller rather than thrown.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// No handler registered for the skill id.
    #[error("unknown skill id {0}")]
    UnknownSkill(u32),

    /// The handler declined to produce a response.
    #[error("handler for skill {skill_id} failed on task {task_id}")]
    HandlerFailed { skill_id: u32, task_id: u32 },
}

static GLOBAL_REGISTRY: OnceLock<SkillRegistry> = OnceLock::new();

/// Mapping from `skill_id` to descriptor, safe for concurrent lookup.
///
/// Registration is expected only at startup but stays race-safe. The map
/// entry is never held across handler execution: `dispatch` clones the
/// descriptor handle out first, so a slow handler cannot block lookups.
pub struct SkillRegistry {
    skills: DashMap<u32, Arc<SkillDescriptor>>,
    logger: RwLock<Arc<dyn Logger>>,
}

impl SkillRegistry {
    /// Create an empty registry (for tests and embedding).
    pub fn new() -> Self {
        Self {
            skills: DashMap::new(),
            logger: RwLock::new(Arc::new(NoOpLogger)),
        }
    }

    /// The process-wide registry instance.
    pub fn global() -> &'static SkillRegistry {
        GLOBAL_REGISTRY.get_or_init(SkillRegistry::new)
    }

    /// Swap the logger used for dispatch diagnostics.
    pub fn set_logger(&self, logger: Arc<dyn Logger>) {
        *self.logger.write() = logger;
    }

    /// Register or replace a skill. Last registration wins.
    pub fn register(&self, descriptor: SkillDescriptor) {
        let id = descriptor.id;
        if let Some(previous) = self.skills.insert(id, Arc::new(descriptor)) {
            let logger = self.logger.read().clone();
            log_warn!(
                logger,
                "SkillRegistry: replaced existing registration for skill {} ({})",
                id,
                previous.name
            );
        }
    }

    /// True when a handler is registered for the id.
    pub fn has_skill(&self, skill_id: u32) -> bool {
        self.skills.contains_key(&skill_id)
    }

    /// Name of a registered skill, if any.
    pub fn skill_name(&self, skill_id: u32) -> Option<&'static str> {
        self.skills.get(&skill_id).map(|entry| entry.name)
    }

    /// All registered skill ids.
    pub fn skill_ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.skills.iter().map(|entry| *entry.key()).collect();
        ids.sort_unstable();
        ids
    }

    /// Number of registered skills.
    pub fn skill_count(&self) -> usize {
        self.skills.len()
    }

    /// Payload factory for a skill, when one was registered.
    pub fn payload_factory(
        &self,
        skill_id: u32,
    ) -> Option<Arc<dyn super::handler::PayloadFactory>> {
        self.skills
            .get(&skill_id)
            .and_then(|entry| entry.payload_factory.clone())
    }

    /// Route a request payload to the registered handler.
    ///
    /// Handler execution happens after the map entry is released. Unknown
    /// ids and handler failures come back as errors, never panics.
    pub fn dispatch(
        &self,
        skill_id: u32,
        task_id: u32,
        payload: &[u8],
    ) -> Result<Bytes, DispatchError> {
        let descriptor = match self.skills.get(&skill_id) {
            Some(entry) => entry.value().clone(),
            None => {
                let logger = self.logger.read().clone();
                log_debug!(
                    logger,
                    "SkillRegistry: unknown skill_id={} for task_id={}",
                    skill_id,
                    task_id
                );
                return Err(DispatchError::UnknownSkill(skill_id));
            }
        };

        // A misbehaving handler must not take the worker loop down with it;
        // a panic becomes a handler-failed outcome like any other refusal.
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            descriptor.handler.process(payload)
        }));

        match outcome {
            Err(_) => {
                let logger = self.logger.read().clone();
                log_warn!(
                    logger,
                    "SkillRegistry: handler panicked for skill={} task_id={}",
                    descriptor.name,
                    task_id
                );
                Err(DispatchError::HandlerFailed { skill_id, task_id })
            }
            Ok(Some(response)) => {
                let logger = self.logger.read().clone();
                log_debug!(
                    logger,
                    "SkillRegistry: processed skill={} task_id={}",
                    descriptor.name,
                    task_id
                );
                Ok(response)
            }
            Ok(None) => {
                let logger = self.logger.read().clone();
                log_debug!(
                    logger,
                    "SkillRegistry: handler failed for skill={} task_id={}",
                    descriptor.name,
                    task_id
                );
                Err(DispatchError::HandlerFailed { skill_id, task_id })
            }
        }
    }

    /// Remove every registration. Test-only escape hatch.
    pub fn clear(&self) {
        self.skills.clear();
    }
}

impl Default for SkillRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skills::handler::SkillHandler;

    struct EchoHandler;

    impl SkillHandler for EchoHandler {
        fn skill_id(&self) -> u32 {
            700
        }
        fn name(&self) -> &'static str {
            "echo"
        }
        fn process(&self, payload: &[u8]) -> Option<Bytes> {
            Some(Bytes::copy_from_slice(payload))
        }
    }

    struct FailingHandler;

    impl SkillHandler for FailingHandler {
        fn skill_id(&self) -> u32 {
            701
        }
        fn name(&self) -> &'static str {
            "always-fails"
        }
        fn process(&self, _payload: &[u8]) -> Option<Bytes> {
            None
        }
    }

    fn registry_with_echo() -> SkillRegistry {
        let registry = SkillRegistry::new();
        registry.register(SkillDescriptor::new(
            700,
            "echo",
            "echoes the payload",
            Arc::new(EchoHandler),
            None,
        ));
        registry
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = registry_with_echo();
        assert!(registry.has_skill(700));
        assert!(!registry.has_skill(999));
        assert_eq!(registry.skill_name(700), Some("echo"));
        assert_eq!(registry.skill_count(), 1);
        assert_eq!(registry.skill_ids(), vec![700]);
    }

    #[test]
    fn test_dispatch_success() {
        let registry = registry_with_echo();
        let response = registry.dispatch(700, 1, b"payload").unwrap();
        assert_eq!(response, Bytes::from_static(b"payload"));
    }

    #[test]
    fn test_dispatch_unknown_skill() {
        let registry = registry_with_echo();
        let err = registry.dispatch(999, 1, b"payload").unwrap_err();
        assert_eq!(err, DispatchError::UnknownSkill(999));
    }

    #[test]
    fn test_dispatch_handler_failure() {
        let registry = SkillRegistry::new();
        registry.register(SkillDescriptor::new(
            701,
            "always-fails",
            "never produces a response",
            Arc::new(FailingHandler),
            None,
        ));

        let err = registry.dispatch(701, 42, b"payload").unwrap_err();
        assert_eq!(
            err,
            DispatchError::HandlerFailed {
                skill_id: 701,
                task_id: 42
            }
        );
    }

    #[test]
    fn test_dispatch_contains_handler_panic() {
        struct PanickingHandler;

        impl SkillHandler for PanickingHandler {
            fn skill_id(&self) -> u32 {
                702
            }
            fn name(&self) -> &'static str {
                "panics"
            }
            fn process(&self, _payload: &[u8]) -> Option<Bytes> {
                panic!("handler bug");
            }
        }

        let registry = SkillRegistry::new();
        registry.register(SkillDescriptor::new(
            702,
            "panics",
            "always panics",
            Arc::new(PanickingHandler),
            None,
        ));

        let err = registry.dispatch(702, 9, b"payload").unwrap_err();
        assert_eq!(
            err,
            DispatchError::HandlerFailed {
                skill_id: 702,
                task_id: 9
            }
        );
    }

    #[test]
    fn test_registration_is_idempotent_last_wins() {
        let registry = registry_with_echo();
        registry.register(SkillDescriptor::new(
            700,
            "echo-v2",
            "replacement",
            Arc::new(EchoHandler),
            None,
        ));
        assert_eq!(registry.skill_count(), 1);
        assert_eq!(registry.skill_name(700), Some("echo-v2"));
    }

    #[test]
    fn test_replacement_is_logged() {
        let log = Arc::new(crate::log::BufferLogger::new());
        let registry = registry_with_echo();
        registry.set_logger(log.clone());

        registry.register(SkillDescriptor::new(
            700,
            "echo-v2",
            "replacement",
            Arc::new(EchoHandler),
            None,
        ));

        assert!(log.contains("replaced existing registration for skill 700"));
    }

    #[test]
    fn test_clear() {
        let registry = registry_with_echo();
        registry.clear();
        assert_eq!(registry.skill_count(), 0);
    }

    #[test]
    fn test_concurrent_lookup_during_registration() {
        let registry = Arc::new(SkillRegistry::new());
        let writer = {
            let registry = registry.clone();
            std::thread::spawn(move || {
                for _ in 0..100 {
                    registry.register(SkillDescriptor::new(
                        700,
                        "echo",
                        "echoes",
                        Arc::new(EchoHandler),
                        None,
                    ));
                }
            })
        };
        for _ in 0..100 {
            let _ = registry.dispatch(700, 1, b"x");
        }
        writer.join().unwrap();
        assert!(registry.has_skill(700));
    }
}
