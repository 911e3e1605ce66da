//! Registry-backed task processing.

use crate::log::Logger;
use crate::log_debug;
use crate::skills::SkillRegistry;
use bytes::Bytes;
use std::sync::Arc;

/// Dispatches incoming tasks through the process-wide skill registry and
/// shapes the response.
///
/// On dispatch failure (unknown skill, handler failure) the response
/// carries `skill_id = 0` and an empty body: the manager classifies that as
/// a skill mismatch and requeues the task.
#[derive(Clone)]
pub struct TaskProcessor {
    logger: Arc<dyn Logger>,
}

impl TaskProcessor {
    pub fn new(logger: Arc<dyn Logger>) -> Self {
        Self { logger }
    }

    /// Process one task, returning `(response_skill_id, response_payload)`.
    pub fn process(&self, task_id: u32, skill_id: u32, payload: &[u8]) -> (u32, Bytes) {
        match SkillRegistry::global().dispatch(skill_id, task_id, payload) {
            Ok(response) => (skill_id, response),
            Err(err) => {
                log_debug!(
                    self.logger,
                    "TaskProcessor: dispatch failed for task {}: {}",
                    task_id,
                    err
                );
                (0, Bytes::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::NoOpLogger;
    use crate::skills::{register_builtin_skills, skill_ids};

    fn processor() -> TaskProcessor {
        register_builtin_skills();
        TaskProcessor::new(Arc::new(NoOpLogger))
    }

    #[test]
    fn test_process_known_skill() {
        let (skill_id, payload) = processor().process(7, skill_ids::STRING_REVERSE, b"hello");
        assert_eq!(skill_id, skill_ids::STRING_REVERSE);
        assert_eq!(payload, Bytes::from_static(b"olleh"));
    }

    #[test]
    fn test_process_unknown_skill_reports_mismatch() {
        let (skill_id, payload) = processor().process(7, 0xDEAD, b"hello");
        assert_eq!(skill_id, 0);
        assert!(payload.is_empty());
    }

    #[test]
    fn test_process_malformed_payload_reports_mismatch() {
        // A truncated math-op request makes the handler decline.
        let (skill_id, payload) = processor().process(7, skill_ids::MATH_OP, b"+");
        assert_eq!(skill_id, 0);
        assert!(payload.is_empty());
    }
}
